//! Kernel-level telemetry sensor core.
//!
//! This crate implements the probe-registration-and-decode layer of a kernel
//! telemetry sensor: it selects the right low-level tracing primitive and
//! argument layout for the running kernel, works around kernels where
//! detailed syscall kprobes stay inert unless a generic tracepoint is
//! activated, decodes raw samples into strongly-typed telemetry events and
//! dispatches them to per-subscriber filtered streams.
//!
//! The ring-buffer polling / probe-attachment engine, the filter-expression
//! compiler and the outward-facing service layer are external collaborators,
//! represented here by the [`TraceEngine`] trait and the opaque [`Filter`]
//! predicates it consumes.

pub mod core;
pub mod sensor;

pub use crate::core::{
    filters::{FieldTypeMap, Filter, ValueType},
    inspect::KernelVersion,
    probe::KprobeSpec,
    tracing::{
        EventId, FieldValue, GroupId, RawSample, SampleHandler, SampleMetadata, TraceEngine,
    },
    SensorError,
};
pub use sensor::{EventConsumer, Sensor, Subscription};

#[cfg(test)]
pub(crate) mod testing;
