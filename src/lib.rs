//! logtap - subscribe to a logging facility without changing what it does
//!
//! A [`Bridge`] wraps a [`Facility`]. Every method call still runs the
//! facility's own method, then fires an event named after the method. Panics
//! and unhandled rejections fire the `error` event.
//!
//! # Modules
//!
//! - [`facility`] - facility model and the ambient `log`-backed facility
//! - [`bridge`] - the bridge, its dispatch core and recursion guard
//! - [`channel`] - the uncaught and unhandled-rejection failure channels
//! - [`config`] - configuration for the `logtap` binary

pub mod bridge;
pub mod channel;
pub mod config;
pub mod facility;

pub use bridge::{Bridge, ERROR_EVENT, EventEmitter, Listener, RESERVED_NAMES};
pub use channel::{Channels, FailureChannel, FailureEvent, FailureKind, FailureSource, ListenOptions};
pub use facility::{Facility, Member, MemberKind, Property, Slot, render_args};
