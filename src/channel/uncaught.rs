//! Uncaught failures: panics, observed through a chained panic hook

use once_cell::sync::Lazy;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Once};

use super::{FailureChannel, FailureEvent};

static UNCAUGHT: Lazy<Arc<FailureChannel>> = Lazy::new(|| Arc::new(FailureChannel::new("uncaught")));
static HOOK: Once = Once::new();

/// The process-wide uncaught failure channel
pub fn uncaught_channel() -> Arc<FailureChannel> {
    UNCAUGHT.clone()
}

/// Chain a hook in front of the current panic hook, once per process.
///
/// Capture handlers run before the previous hook, bubble handlers after it.
/// The previous hook always runs, so default panic reporting is unchanged.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let event = failure_from_panic(info);
            UNCAUGHT.dispatch_capture(&event);
            previous(info);
            UNCAUGHT.dispatch_bubble(&event);
        }));
        log::debug!("install_panic_hook: uncaught channel attached");
    });
}

/// Extract the panic payload as the failure value
pub fn failure_from_panic(info: &PanicHookInfo<'_>) -> FailureEvent {
    let payload = info.payload();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    };

    let event = FailureEvent::uncaught(message);
    match info.location() {
        Some(location) => event.with_location(location.to_string()),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{FailureHandler, FailureKind, FailureSource, ListenOptions};
    use std::sync::Mutex;

    #[test]
    fn test_panic_reaches_uncaught_channel() {
        install_panic_hook();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: FailureHandler = Arc::new(move |event: &FailureEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        let channel = uncaught_channel();
        channel.add_listener(handler.clone(), ListenOptions::CAPTURE);

        let result: std::thread::Result<()> = std::panic::catch_unwind(|| panic!("uncaught-channel-unit-test"));
        channel.remove_listener(&handler, ListenOptions::CAPTURE);
        assert!(result.is_err());

        let seen = seen.lock().unwrap();
        let ours: Vec<_> = seen
            .iter()
            .filter(|e| e.value == "uncaught-channel-unit-test")
            .collect();
        assert_eq!(ours.len(), 1);
        assert_eq!(ours[0].kind, FailureKind::Uncaught);
        assert!(ours[0].location.as_deref().is_some_and(|l| l.contains("uncaught.rs")));
    }

    #[test]
    fn test_install_is_idempotent() {
        install_panic_hook();
        install_panic_hook();
        assert!(Arc::ptr_eq(&uncaught_channel(), &uncaught_channel()));
    }
}
