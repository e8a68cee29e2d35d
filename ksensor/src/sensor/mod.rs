//! Sensor and subscription layer: per-event-kind field type declarations,
//! probe registration and the decode/dispatch path.

pub mod network;
pub mod subscription;
pub mod syscall;

pub use subscription::{EventConsumer, Subscription};

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::core::{
    inspect::KernelVersion,
    probe::{
        compat::{KernelCompat, SyscallTracepoints},
        dummy::CompatProbe,
    },
    tracing::{GroupId, TraceEngine},
};

/// Process-wide sensor state shared by all subscriptions: the tracing engine,
/// the detected kernel version, the once-resolved compatibility choices and
/// the shared compatibility probe.
pub struct Sensor {
    engine: Arc<dyn TraceEngine>,
    kernel: KernelVersion,
    compat: KernelCompat,
    compat_probe: Arc<CompatProbe>,
    /// Stable event group owned by the sensor itself, created at startup,
    /// reused for the sensor's own registrations and never torn down. The
    /// shared compatibility probe lives under it so its lifetime is tied to
    /// the sensor, not to any one subscription's group.
    control_group: GroupId,
}

impl Sensor {
    pub fn new(engine: Arc<dyn TraceEngine>, kernel: KernelVersion) -> Result<Arc<Sensor>> {
        let control_group = engine.create_event_group()?;
        info!("Sensor started on kernel {kernel}");

        Ok(Arc::new(Sensor {
            engine,
            kernel,
            compat: KernelCompat::default(),
            compat_probe: Arc::new(CompatProbe::default()),
            control_group,
        }))
    }

    /// Create a new subscription dispatching events to `consumer`.
    pub fn subscribe(self: &Arc<Self>, consumer: Arc<dyn EventConsumer>) -> Result<Subscription> {
        Subscription::new(Arc::clone(self), consumer)
    }

    pub(crate) fn engine(&self) -> &Arc<dyn TraceEngine> {
        &self.engine
    }

    pub(crate) fn kernel(&self) -> &KernelVersion {
        &self.kernel
    }

    pub(crate) fn compat_probe(&self) -> &Arc<CompatProbe> {
        &self.compat_probe
    }

    pub(crate) fn control_group(&self) -> GroupId {
        self.control_group
    }

    /// Resolve the syscall tracepoint names, once per sensor.
    pub(crate) fn syscall_tracepoints(&self) -> Result<SyscallTracepoints> {
        self.compat.syscall_tracepoints(self.engine.as_ref())
    }
}
