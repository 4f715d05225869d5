// pixmark/src/scheduler/mod.rs
mod aggregator;
mod cancel;
mod dispatcher;
mod enumerator;
mod observer;

use std::any::Any;

pub use aggregator::{ItemOutcome, ProgressHandle, BATCH_ERROR_FILE};
pub use cancel::CancellationToken;
pub use dispatcher::{DispatchOutcome, Dispatcher, DEFAULT_POLL_INTERVAL};
pub use enumerator::{
    classify, count_images, enumerate_work_items, find_image_files, Classified, WorkItem,
    SKIP_REASON,
};
pub use observer::ProgressObserver;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
