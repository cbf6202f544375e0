//! Failure channels
//!
//! Two process-wide channels report failures nobody handled:
//! - uncaught: panics, fed by a chained panic hook
//! - unhandled rejection: errors of detached async work nobody awaited
//!
//! Bridges consume them through [`FailureSource`], so tests can inject their own.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub mod uncaught;
pub mod rejection;

pub use uncaught::install_panic_hook;
pub use rejection::{report_unhandled_rejection, spawn_reported};

/// What kind of unhandled failure a [`FailureEvent`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Uncaught,
    UnhandledRejection,
}

/// A failure notification delivered by a channel
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub kind: FailureKind,
    /// The failure value (panic payload or rejection reason)
    pub value: Value,
    /// Source location, when the failure is a panic
    pub location: Option<String>,
}

impl FailureEvent {
    pub fn uncaught(value: impl Into<Value>) -> Self {
        Self {
            kind: FailureKind::Uncaught,
            value: value.into(),
            location: None,
        }
    }

    pub fn unhandled_rejection(reason: impl Into<Value>) -> Self {
        Self {
            kind: FailureKind::UnhandledRejection,
            value: reason.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A failure handler. Identity is the `Arc` pointer.
pub type FailureHandler = Arc<dyn Fn(&FailureEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenOptions {
    /// Capture handlers observe a failure before the channel's default reporting
    pub capture: bool,
}

impl ListenOptions {
    pub const CAPTURE: ListenOptions = ListenOptions { capture: true };
}

/// Registration primitives of a failure channel
pub trait FailureSource: Send + Sync {
    /// Register a handler; a handler already registered with the same options is not added twice
    fn add_listener(&self, handler: FailureHandler, options: ListenOptions);

    /// Remove a handler by identity and options. No-op when absent.
    fn remove_listener(&self, handler: &FailureHandler, options: ListenOptions);
}

/// In-process failure channel
pub struct FailureChannel {
    name: &'static str,
    capture: Mutex<Vec<FailureHandler>>,
    bubble: Mutex<Vec<FailureHandler>>,
}

impl fmt::Debug for FailureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureChannel")
            .field("name", &self.name)
            .field("capture", &lock(&self.capture).len())
            .field("bubble", &lock(&self.bubble).len())
            .finish()
    }
}

fn lock(handlers: &Mutex<Vec<FailureHandler>>) -> MutexGuard<'_, Vec<FailureHandler>> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FailureChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            capture: Mutex::new(Vec::new()),
            bubble: Mutex::new(Vec::new()),
        }
    }

    fn phase(&self, options: ListenOptions) -> &Mutex<Vec<FailureHandler>> {
        if options.capture { &self.capture } else { &self.bubble }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.capture).len() + lock(&self.bubble).len()
    }

    /// Run the capture handlers. Returns how many ran.
    pub fn dispatch_capture(&self, event: &FailureEvent) -> usize {
        let handlers = lock(&self.capture).clone();
        Self::run(&handlers, event)
    }

    /// Run the bubble handlers. Returns how many ran.
    pub fn dispatch_bubble(&self, event: &FailureEvent) -> usize {
        let handlers = lock(&self.bubble).clone();
        Self::run(&handlers, event)
    }

    /// Run capture handlers, then bubble handlers. Returns how many ran.
    pub fn dispatch(&self, event: &FailureEvent) -> usize {
        log::trace!("{}: dispatching {:?}", self.name, event.kind);
        self.dispatch_capture(event) + self.dispatch_bubble(event)
    }

    fn run(handlers: &[FailureHandler], event: &FailureEvent) -> usize {
        for handler in handlers {
            handler(event);
        }
        handlers.len()
    }
}

impl FailureSource for FailureChannel {
    fn add_listener(&self, handler: FailureHandler, options: ListenOptions) {
        let mut handlers = lock(self.phase(options));
        if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            handlers.push(handler);
        }
    }

    fn remove_listener(&self, handler: &FailureHandler, options: ListenOptions) {
        lock(self.phase(options)).retain(|h| !Arc::ptr_eq(h, handler));
    }
}

/// The two failure channels a bridge listens to
#[derive(Clone)]
pub struct Channels {
    pub uncaught: Arc<dyn FailureSource>,
    pub unhandled_rejection: Arc<dyn FailureSource>,
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channels").finish_non_exhaustive()
    }
}

impl Channels {
    /// The process-wide channels. Installs the panic hook on first use.
    pub fn global() -> Self {
        install_panic_hook();
        Self {
            uncaught: uncaught::uncaught_channel(),
            unhandled_rejection: rejection::unhandled_rejection_channel(),
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::global()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collecting(seen: Arc<Mutex<Vec<String>>>, tag: &'static str) -> FailureHandler {
        Arc::new(move |event: &FailureEvent| {
            seen.lock().unwrap().push(format!("{}:{}", tag, event.value));
        })
    }

    #[test]
    fn test_capture_handlers_run_first() {
        let channel = FailureChannel::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        channel.add_listener(collecting(seen.clone(), "bubble"), ListenOptions::default());
        channel.add_listener(collecting(seen.clone(), "capture"), ListenOptions::CAPTURE);

        let ran = channel.dispatch(&FailureEvent::uncaught("boom"));

        assert_eq!(ran, 2);
        assert_eq!(*seen.lock().unwrap(), vec![r#"capture:"boom""#, r#"bubble:"boom""#]);
    }

    #[test]
    fn test_same_handler_added_once_per_phase() {
        let channel = FailureChannel::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = collecting(seen.clone(), "h");

        channel.add_listener(handler.clone(), ListenOptions::CAPTURE);
        channel.add_listener(handler.clone(), ListenOptions::CAPTURE);
        assert_eq!(channel.listener_count(), 1);

        channel.add_listener(handler.clone(), ListenOptions::default());
        assert_eq!(channel.listener_count(), 2);
    }

    #[test]
    fn test_remove_matches_identity_and_phase() {
        let channel = FailureChannel::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = collecting(seen.clone(), "h");
        channel.add_listener(handler.clone(), ListenOptions::CAPTURE);

        channel.remove_listener(&handler, ListenOptions::default());
        assert_eq!(channel.listener_count(), 1);

        channel.remove_listener(&handler, ListenOptions::CAPTURE);
        assert_eq!(channel.listener_count(), 0);
        assert_eq!(channel.dispatch(&FailureEvent::unhandled_rejection(json!(1))), 0);
    }

    #[test]
    fn test_failure_event_constructors() {
        let event = FailureEvent::unhandled_rejection("nope").with_location("src/main.rs:1:1");
        assert_eq!(event.kind, FailureKind::UnhandledRejection);
        assert_eq!(event.value, json!("nope"));
        assert_eq!(event.location.as_deref(), Some("src/main.rs:1:1"));
        assert_eq!(FailureEvent::uncaught(json!(3)).location, None);
    }
}
