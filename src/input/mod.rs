//! Input normalisation and command dispatch.
//!
//! Clicks, remote keys and timers all end up as a [`Command`] handed to the
//! [`InputRouter`], which gives listeners a chance to intercept it and then
//! runs the single action bound to it.

pub mod clock;
pub mod commands;
pub mod keys;
pub mod listeners;
pub mod rate_limit;
pub mod router;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use commands::Command;
pub use listeners::{CommandEvent, CommandListeners, ListenerId};
pub use router::{CommandOptions, InputRouter, RouterTargets};
