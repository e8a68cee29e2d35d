//! # Ksensor events
//!
//! This crate contains the definitions of the types that conform the telemetry
//! events delivered to subscriber callbacks, as well as some ancillary helpers
//! to facilitate inspecting and serializing them.

pub mod events;
pub use events::*;

pub mod common;
pub use common::*;
pub mod net;
pub use net::*;
pub mod syscall;
pub use syscall::*;
