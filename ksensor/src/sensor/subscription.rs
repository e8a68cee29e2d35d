//! A subscription aggregates a client's filtered event sources: it owns the
//! registered probes, their event group and the consumer callback samples are
//! dispatched to.

use std::{
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Result;
use log::{debug, warn};

use events::TelemetryEvent;

use crate::{
    core::{
        filters::Filter,
        probe::{dummy::CompatProbeGuard, validate_fetch_args, KprobeSpec},
        tracing::{EventId, GroupId, RawSample, SampleHandler},
    },
    sensor::Sensor,
};

/// Consumer side of a subscription. Called synchronously on the engine's
/// collection threads, once per materialized event; implementations must not
/// block beyond the caller's backpressure budget.
pub trait EventConsumer: Send + Sync {
    fn consume(&self, event_id: EventId, event: TelemetryEvent);
}

impl<F> EventConsumer for F
where
    F: Fn(EventId, TelemetryEvent) + Send + Sync,
{
    fn consume(&self, event_id: EventId, event: TelemetryEvent) {
        self(event_id, event)
    }
}

/// Decoders turn a raw sample into a telemetry event. Returning None drops
/// the sample; a partial event is never produced.
pub(crate) type SampleDecoder = fn(&RawSample) -> Option<TelemetryEvent>;

/// An active event source owned by a subscription.
struct EventSink {
    event_id: EventId,
    /// Keeps the shared compatibility probe alive for as long as this sink
    /// needs it; released exactly once, on drop.
    _compat: Option<CompatProbeGuard>,
}

pub struct Subscription {
    sensor: Arc<Sensor>,
    consumer: Arc<dyn EventConsumer>,
    /// Event group owning this subscription's probes, exclusive to it.
    group: GroupId,
    sinks: Mutex<Vec<EventSink>>,
    /// Registration failures, kept around for the client.
    statuses: Mutex<Vec<String>>,
    /// Set when a local compatibility probe lives in our event group: the
    /// group must then survive the subscription.
    keep_group: AtomicBool,
    closed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(sensor: Arc<Sensor>, consumer: Arc<dyn EventConsumer>) -> Result<Subscription> {
        let group = sensor.engine().create_event_group()?;

        Ok(Subscription {
            sensor,
            consumer,
            group,
            sinks: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            keep_group: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn sensor(&self) -> &Arc<Sensor> {
        &self.sensor
    }

    pub(crate) fn group(&self) -> GroupId {
        self.group
    }

    /// Build the handler decoding samples and dispatching the materialized
    /// events to the consumer. It runs on the engine's collection threads and
    /// captures only the consumer: no lock is taken on the hot path.
    fn sample_handler(&self, decoder: SampleDecoder) -> SampleHandler {
        let consumer = Arc::clone(&self.consumer);
        Arc::new(move |event_id, sample| {
            if let Some(event) = decoder(sample) {
                consumer.consume(event_id, event);
            }
        })
    }

    /// Record a failure against this subscription. Non-fatal: the offending
    /// source yields no events for this subscription, other sources and other
    /// subscriptions are unaffected.
    pub(crate) fn log_status(&self, status: String) {
        warn!("{status}");
        self.statuses.lock().unwrap().push(status);
    }

    /// Failures recorded while setting up this subscription's event sources.
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    /// Register a tracepoint event source. Engine failures are logged against
    /// the subscription.
    pub(crate) fn register_tracepoint(
        &self,
        name: &str,
        decoder: SampleDecoder,
        filter: Option<&Filter>,
    ) {
        let handler = self.sample_handler(decoder);
        match self
            .sensor
            .engine()
            .register_tracepoint(name, handler, self.group, filter)
        {
            Ok(event_id) => {
                debug!("Registered tracepoint {name} (event {event_id})");
                self.sinks.lock().unwrap().push(EventSink {
                    event_id,
                    _compat: None,
                });
            }
            Err(e) => self.log_status(format!("Could not register tracepoint {name}: {e}")),
        }
    }

    /// Register a kprobe event source, optionally carrying a compatibility
    /// probe dependency. On engine failure the dependency is released again
    /// (the guard is dropped) and the error is logged against the
    /// subscription.
    pub(crate) fn register_kprobe(
        &self,
        spec: &KprobeSpec,
        decoder: SampleDecoder,
        filter: Option<&Filter>,
        compat: Option<CompatProbeGuard>,
    ) {
        if let Err(e) = validate_fetch_args(spec.fetch_args) {
            self.log_status(format!("Could not register {spec}: {e}"));
            return;
        }

        let handler = self.sample_handler(decoder);
        match self
            .sensor
            .engine()
            .register_kprobe(spec, handler, self.group, filter)
        {
            Ok(event_id) => {
                debug!("Registered {spec} (event {event_id})");
                self.sinks.lock().unwrap().push(EventSink {
                    event_id,
                    _compat: compat,
                });
            }
            Err(e) => self.log_status(format!("Could not register {spec}: {e}")),
        }
    }

    pub(crate) fn mark_keep_group(&self) {
        self.keep_group.store(true, Ordering::Relaxed);
    }

    /// Tear the subscription down: unregister every owned probe (order does
    /// not matter), release compatibility probe dependencies and remove the
    /// event group unless a local compatibility probe lives in it. Safe to
    /// call more than once; also runs on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let sinks = mem::take(&mut *self.sinks.lock().unwrap());
        for sink in sinks {
            if let Err(e) = self.sensor.engine().unregister_event(sink.event_id) {
                warn!("Could not unregister event {}: {e}", sink.event_id);
            }
            // Dropping the sink releases its compatibility probe dependency.
        }

        if !self.keep_group.load(Ordering::Relaxed) {
            if let Err(e) = self.sensor.engine().destroy_event_group(self.group) {
                warn!("Could not destroy event group {}: {e}", self.group);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
