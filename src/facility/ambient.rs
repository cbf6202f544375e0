//! The ambient facility: the process-wide `log` facade seen as a facility
//!
//! Methods: `log`, `info`, `warn`, `error`, `debug`, `trace`.
//! Properties: `level` (the facade's max level) and `target`.

use eyre::{Result, eyre};
use log::{Level, LevelFilter};
use serde_json::Value;
use std::sync::Arc;

use super::{Facility, Property, Slot, render_args};

pub const DEFAULT_TARGET: &str = "logtap";

const METHODS: &[(&str, Level)] = &[
    ("log", Level::Info),
    ("info", Level::Info),
    ("warn", Level::Warn),
    ("error", Level::Error),
    ("debug", Level::Debug),
    ("trace", Level::Trace),
];

/// `log::max_level()` exposed as a property holding the level name
struct MaxLevel;

impl Property for MaxLevel {
    fn get(&self) -> Value {
        Value::String(log::max_level().as_str().to_lowercase())
    }

    fn set(&self, value: Value) -> Result<()> {
        let name = value
            .as_str()
            .ok_or_else(|| eyre!("level must be a string, got {}", value))?;
        let filter: LevelFilter = name.parse().map_err(|_| eyre!("unknown log level `{}`", name))?;
        log::set_max_level(filter);
        Ok(())
    }
}

impl Facility {
    /// The facility used when a bridge is created without one
    pub fn ambient() -> Arc<Facility> {
        Self::ambient_with_target(DEFAULT_TARGET)
    }

    pub fn ambient_with_target(target: &str) -> Arc<Facility> {
        let target_slot = Arc::new(Slot::new(target));
        let mut builder = Facility::builder();

        for &(name, level) in METHODS {
            let target_slot = target_slot.clone();
            builder = builder.method(name, move |args: &[Value]| {
                let target = match target_slot.get() {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                log::log!(target: &target, level, "{}", render_args(args));
                Ok(())
            });
        }

        builder
            .accessor("level", Arc::new(MaxLevel))
            .accessor("target", target_slot)
            .build()
    }
}
