//! Core infrastructure of the sensor: boundary types to the external tracing
//! engine, kernel inspection and the probe compatibility machinery.

pub mod filters;
pub mod inspect;
pub mod probe;
pub mod tracing;

use thiserror::Error;

/// Errors the embedding process must handle explicitly. Everything else in
/// this crate reports through `anyhow` and is local to a subscription.
#[derive(Error, Debug)]
pub enum SensorError {
    /// The running kernel exposes no syscall sys_enter tracepoint at all, so
    /// no syscall telemetry can be provided. Callers must treat this as fatal
    /// rather than run degraded.
    #[error("no compatible syscall sys_enter tracepoint exists")]
    ConfigurationImpossible,
}
