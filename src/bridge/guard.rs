//! Recursion guard for forwarding calls
//!
//! Tracks, per thread, how deeply each `(bridge, method)` pair is currently
//! nested. A forwarding call made while the same method of the same bridge is
//! already on the stack is cyclic.

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static DEPTH: RefCell<HashMap<(u64, String), usize>> = RefCell::new(HashMap::new());
}

/// Scoped depth increment, released on drop (including unwinding)
#[derive(Debug)]
pub struct CallGuard {
    bridge: u64,
    method: String,
    depth: usize,
}

impl CallGuard {
    pub fn enter(bridge: u64, method: &str) -> Self {
        let key = (bridge, method.to_string());
        let depth = DEPTH.with(|table| {
            let mut table = table.borrow_mut();
            let depth = table.entry(key).or_insert(0);
            *depth += 1;
            *depth
        });

        Self {
            bridge,
            method: method.to_string(),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True when this call was triggered from within another call of the same method
    pub fn is_cyclic(&self) -> bool {
        self.depth > 1
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown
        let _ = DEPTH.try_with(|table| {
            let mut table = table.borrow_mut();
            let key = (self.bridge, std::mem::take(&mut self.method));
            if let Some(depth) = table.get_mut(&key) {
                *depth -= 1;
                if *depth == 0 {
                    table.remove(&key);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_depth(bridge: u64, method: &str) -> usize {
        DEPTH.with(|table| table.borrow().get(&(bridge, method.to_string())).copied().unwrap_or(0))
    }

    #[test]
    fn test_single_call_is_not_cyclic() {
        let guard = CallGuard::enter(1, "log");
        assert!(!guard.is_cyclic());
        assert_eq!(guard.depth(), 1);
    }

    #[test]
    fn test_nested_same_method_is_cyclic() {
        let outer = CallGuard::enter(2, "log");
        let inner = CallGuard::enter(2, "log");
        assert!(!outer.is_cyclic());
        assert!(inner.is_cyclic());
        drop(inner);
        assert_eq!(current_depth(2, "log"), 1);
        drop(outer);
        assert_eq!(current_depth(2, "log"), 0);
    }

    #[test]
    fn test_different_method_or_bridge_is_independent() {
        let _log = CallGuard::enter(3, "log");
        assert!(!CallGuard::enter(3, "warn").is_cyclic());
        assert!(!CallGuard::enter(4, "log").is_cyclic());
    }

    #[test]
    fn test_depth_released_on_unwind() {
        let result: std::thread::Result<()> = std::panic::catch_unwind(|| {
            let _guard = CallGuard::enter(5, "error");
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(current_depth(5, "error"), 0);
    }

    #[test]
    fn test_depth_is_per_thread() {
        let _outer = CallGuard::enter(6, "log");
        let depth = std::thread::spawn(|| CallGuard::enter(6, "log").depth()).join().unwrap();
        assert_eq!(depth, 1);
    }
}
