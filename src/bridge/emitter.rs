//! Event dispatch core
//!
//! Named events, many listeners per name, invoked in registration order.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An event listener. Identity is the `Arc` pointer.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<IndexMap<String, Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, IndexMap<String, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on(&self, name: &str, listener: Listener) {
        self.table().entry(name.to_string()).or_default().push(listener);
    }

    /// Remove every registration of `listener` under `name`, or all of them when `None`
    pub fn off(&self, name: &str, listener: Option<&Listener>) {
        let mut table = self.table();
        let Some(registered) = table.get_mut(name) else {
            return;
        };

        match listener {
            Some(target) => registered.retain(|l| !Arc::ptr_eq(l, target)),
            None => registered.clear(),
        }

        if registered.is_empty() {
            table.shift_remove(name);
        }
    }

    pub fn remove_all_listeners(&self) {
        self.table().clear();
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.table().get(name).map_or(0, Vec::len)
    }

    /// Invoke the listeners for `name`. Returns whether any were registered.
    ///
    /// The table lock is released before the first listener runs, so listeners
    /// may subscribe, unsubscribe or emit themselves.
    pub fn emit(&self, name: &str, args: &[Value]) -> bool {
        let snapshot = match self.table().get(name) {
            Some(registered) if !registered.is_empty() => registered.clone(),
            _ => return false,
        };

        for listener in &snapshot {
            listener(args);
        }
        true
    }
}
