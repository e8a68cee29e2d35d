//! Boundary to the external tracing engine: probe registration requests on
//! one side, raw decoded samples delivered on collection threads on the
//! other.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;

use events::{CommonEvent, TaskInfo};

use crate::core::{filters::Filter, probe::KprobeSpec};

/// Identifier of a registered event source, assigned by the tracing engine.
pub type EventId = u64;

/// Identifier of an event group, under which related probes are polled
/// together.
pub type GroupId = u64;

/// Handler the engine invokes for every sample delivered on one of its
/// collection threads. Handlers must not block: decoding and dispatch are
/// synchronous, in-memory transformations.
pub type SampleHandler = Arc<dyn Fn(EventId, &RawSample) + Send + Sync>;

/// Capabilities this core requires from the underlying tracing engine. The
/// engine owns probe attachment, ring-buffer polling and filter evaluation;
/// this core only builds registration requests and decodes the samples
/// handed back.
pub trait TraceEngine: Send + Sync {
    /// Register a static tracepoint. Returns the engine event id.
    fn register_tracepoint(
        &self,
        name: &str,
        handler: SampleHandler,
        group: GroupId,
        filter: Option<&Filter>,
    ) -> Result<EventId>;

    /// Register a dynamic kprobe described by `spec`.
    fn register_kprobe(
        &self,
        spec: &KprobeSpec,
        handler: SampleHandler,
        group: GroupId,
        filter: Option<&Filter>,
    ) -> Result<EventId>;

    /// Unregister a previously registered event source.
    fn unregister_event(&self, id: EventId) -> Result<()>;

    fn create_event_group(&self) -> Result<GroupId>;
    fn destroy_event_group(&self, group: GroupId) -> Result<()>;

    fn tracepoint_exists(&self, name: &str) -> bool;
    fn kernel_symbol_available(&self, symbol: &str) -> bool;
}

/// Per-sample record metadata. Grouped so that either the whole envelope is
/// available or none of it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleMetadata {
    /// Monotonic timestamp of the sample, in ns.
    pub timestamp: u64,
    /// SMP processor id the sample was taken on.
    pub smp_id: u32,
    /// Process id of the task that fired the probe.
    pub pid: i32,
    /// Thread group id of the task that fired the probe.
    pub tgid: i32,
}

/// A single typed value extracted by the engine for a declared field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    SignedInt64(i64),
    UnsignedInt16(u16),
    UnsignedInt32(u32),
    UnsignedInt64(u64),
    String(String),
}

/// A raw, already-parsed sample as delivered by the engine: record metadata
/// plus the fields declared at registration time, accessed by name. Fields
/// can be missing; accessors return None in that case and on type mismatch.
#[derive(Clone, Debug, Default)]
pub struct RawSample {
    pub metadata: Option<SampleMetadata>,
    fields: HashMap<String, FieldValue>,
}

impl RawSample {
    pub fn new(metadata: SampleMetadata) -> RawSample {
        RawSample {
            metadata: Some(metadata),
            fields: HashMap::new(),
        }
    }

    /// Add a field to the sample, builder style.
    pub fn field<S: Into<String>>(mut self, name: S, value: FieldValue) -> RawSample {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get_s64(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::SignedInt64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u16(&self, name: &str) -> Option<u16> {
        match self.fields.get(name) {
            Some(FieldValue::UnsignedInt16(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        match self.fields.get(name) {
            Some(FieldValue::UnsignedInt32(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        match self.fields.get(name) {
            Some(FieldValue::UnsignedInt64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Materialize the common event envelope from the sample metadata.
    /// All-or-nothing: a sample without metadata yields no event at all.
    pub fn common_event(&self) -> Option<CommonEvent> {
        self.metadata.map(|m| CommonEvent {
            timestamp: m.timestamp,
            smp_id: m.smp_id,
            task: TaskInfo {
                pid: m.pid,
                tgid: m.tgid,
            },
        })
    }
}
