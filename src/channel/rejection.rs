//! Unhandled rejections: errors of detached async work nobody awaited

use once_cell::sync::Lazy;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{FailureChannel, FailureEvent};

static UNHANDLED_REJECTION: Lazy<Arc<FailureChannel>> =
    Lazy::new(|| Arc::new(FailureChannel::new("unhandled-rejection")));

/// The process-wide unhandled rejection channel
pub fn unhandled_rejection_channel() -> Arc<FailureChannel> {
    UNHANDLED_REJECTION.clone()
}

/// Report a failure value that no consumer handled
pub fn report_unhandled_rejection(reason: impl Into<Value>) {
    let event = FailureEvent::unhandled_rejection(reason);
    let handled = UNHANDLED_REJECTION.dispatch_capture(&event);
    log::warn!("Unhandled rejection: {}", event.value);
    UNHANDLED_REJECTION.dispatch_bubble(&event);
    log::trace!("report_unhandled_rejection: {} capture handler(s)", handled);
}

/// Spawn fallible work on the current tokio runtime and detach its outcome.
///
/// Nobody can observe the `Err` of such a task, so it is reported as an
/// unhandled rejection. Must be called from within a runtime.
pub fn spawn_reported<F, T, E>(future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = future.await {
            report_unhandled_rejection(e.to_string());
        }
    })
}
