//! The logging bridge
//!
//! A [`Bridge`] decorates a [`Facility`]: every method call still runs the
//! facility's original method, and additionally fires an event named after the
//! method. Panics and unhandled rejections are bridged into the `error` event.
//!
//! ```
//! use logtap::{Bridge, Facility, Listener};
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! let facility = Facility::builder().method("log", |_| Ok(())).build();
//! let bridge = Bridge::with_channels(facility, logtap::channel::Channels::global());
//!
//! let listener: Listener = Arc::new(|args: &[Value]| println!("logged {:?}", args));
//! bridge.on("log", listener.clone());
//! bridge.call("log", &[json!("hello")]).unwrap();
//! bridge.off("log", Some(&listener));
//! bridge.cleanup();
//! ```

use eyre::{Result, eyre};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::channel::{Channels, FailureEvent, FailureHandler, ListenOptions};
use crate::facility::{Facility, Member, Method};

pub mod emitter;
pub mod guard;

pub use emitter::{EventEmitter, Listener};
use guard::CallGuard;

/// Event fired for panics and unhandled rejections
pub const ERROR_EVENT: &str = "error";

/// Names the bridge defines itself; facility members with these names are not exposed
pub const RESERVED_NAMES: &[&str] = &["on", "off", "cleanup"];

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The two failure handlers a bridge registered, kept for removal by identity
struct Registration {
    channels: Channels,
    uncaught: FailureHandler,
    rejection: FailureHandler,
}

impl Registration {
    fn register(channels: Channels, events: &Arc<EventEmitter>) -> Self {
        let uncaught_events = events.clone();
        let uncaught: FailureHandler = Arc::new(move |event: &FailureEvent| {
            uncaught_events.emit(ERROR_EVENT, std::slice::from_ref(&event.value));
        });

        let rejection_events = events.clone();
        let rejection: FailureHandler = Arc::new(move |event: &FailureEvent| {
            rejection_events.emit(ERROR_EVENT, std::slice::from_ref(&event.value));
        });

        channels.uncaught.add_listener(uncaught.clone(), ListenOptions::CAPTURE);
        channels
            .unhandled_rejection
            .add_listener(rejection.clone(), ListenOptions::CAPTURE);

        Self {
            channels,
            uncaught,
            rejection,
        }
    }

    fn unregister(self) {
        self.channels
            .uncaught
            .remove_listener(&self.uncaught, ListenOptions::CAPTURE);
        self.channels
            .unhandled_rejection
            .remove_listener(&self.rejection, ListenOptions::CAPTURE);
    }
}

/// An event-emitting decorator over a logging facility
pub struct Bridge {
    id: u64,
    facility: Arc<Facility>,
    methods: IndexMap<String, Method>,
    properties: IndexSet<String>,
    events: Arc<EventEmitter>,
    registration: Mutex<Option<Registration>>,
    closed: AtomicBool,
}

impl Bridge {
    /// Wrap `facility` (the ambient facility when `None`), listening to the global failure channels
    pub fn create(facility: Option<Arc<Facility>>) -> Self {
        Self::with_channels(facility.unwrap_or_else(Facility::ambient), Channels::global())
    }

    /// Wrap `facility`, listening to the given failure channels
    pub fn with_channels(facility: Arc<Facility>, channels: Channels) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let events = Arc::new(EventEmitter::new());
        let mut methods = IndexMap::new();
        let mut properties = IndexSet::new();

        for (name, member) in facility.members() {
            if RESERVED_NAMES.contains(&name) {
                log::debug!("Bridge({}): skipping reserved member `{}`", id, name);
                continue;
            }
            match member {
                Member::Method(method) => {
                    methods.insert(name.to_string(), method.clone());
                }
                Member::Property(_) => {
                    properties.insert(name.to_string());
                }
            }
        }

        let registration = Registration::register(channels, &events);
        log::debug!(
            "Bridge({}): created with {} method(s), {} property(ies)",
            id,
            methods.len(),
            properties.len()
        );

        Self {
            id,
            facility,
            methods,
            properties,
            events,
            registration: Mutex::new(Some(registration)),
            closed: AtomicBool::new(false),
        }
    }

    /// Run the facility's `name` method with `args`, then fire the `name` event.
    ///
    /// Errors of the original method are returned unchanged and no event fires.
    /// A call made from inside a listener of the same method runs the original
    /// but fires nothing.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<()> {
        let original = self.methods.get(name).ok_or_else(|| {
            if self.properties.contains(name) {
                eyre!("`{}` is a property, not a method", name)
            } else {
                eyre!("bridge has no method `{}`", name)
            }
        })?;

        let guard = CallGuard::enter(self.id, name);
        original(args)?;

        if guard.is_cyclic() {
            log::trace!("Bridge({}): suppressed recursive `{}` event (depth {})", self.id, name, guard.depth());
            return Ok(());
        }
        if self.is_closed() {
            return Ok(());
        }

        self.events.emit(name, args);
        Ok(())
    }

    /// Read a property straight from the facility
    pub fn get(&self, name: &str) -> Option<Value> {
        if !self.properties.contains(name) {
            return None;
        }
        self.facility.get(name)
    }

    /// Write a property straight through to the facility
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        if !self.properties.contains(name) {
            return Err(eyre!("bridge has no property `{}`", name));
        }
        self.facility.set(name, value)
    }

    /// Subscribe `listener` to `name`. Registering twice fires twice.
    pub fn on(&self, name: &str, listener: Listener) {
        if self.is_closed() {
            log::debug!("Bridge({}): ignoring subscription to `{}` after cleanup", self.id, name);
            return;
        }
        self.events.on(name, listener);
    }

    /// Unsubscribe `listener` from `name`, or every listener of `name` when `None`
    pub fn off(&self, name: &str, listener: Option<&Listener>) {
        self.events.off(name, listener);
    }

    /// Drop every subscription, detach from the failure channels and hand back the facility.
    ///
    /// Calling it again does nothing more.
    pub fn cleanup(&self) -> Arc<Facility> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("Bridge({}): cleanup", self.id);
        }
        self.events.remove_all_listeners();
        self.detach();
        self.facility.clone()
    }

    fn detach(&self) {
        let registration = self.registration.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(registration) = registration {
            registration.unregister();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Event names this bridge can fire from method calls, in facility order
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.events.listener_count(name)
    }

    pub fn facility(&self) -> &Arc<Facility> {
        &self.facility
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.events.remove_all_listeners();
        self.detach();
    }
}
