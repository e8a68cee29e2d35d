//! The compatibility probe: some detailed syscall kprobes only fire once the
//! generic sys_enter tracepoint has at least one active consumer. Registering
//! a tracepoint with a filter that can never evaluate true puts the kernel
//! into that mode while never delivering a sample.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{debug, warn};

use crate::core::{
    filters::Filter,
    tracing::{EventId, GroupId, SampleHandler, TraceEngine},
};

/// No syscall has this id, so the predicate never matches.
pub(crate) const COMPAT_PROBE_FILTER: &str = "id == 0x7fffffff";

/// The compatibility probe never delivers samples, but the engine still wants
/// a handler.
fn inert_handler() -> SampleHandler {
    Arc::new(|_, _| {})
}

#[derive(Default)]
struct CompatProbeState {
    holders: u64,
    event_id: Option<EventId>,
}

/// Shared, reference-counted compatibility probe used on kernels >= 3. The
/// holder count and the registered event id live under one lock so the 0->1
/// and 1->0 transitions stay atomic with the registration call itself, for
/// any interleaving of independent subscriptions.
#[derive(Default)]
pub(crate) struct CompatProbe {
    state: Mutex<CompatProbeState>,
}

impl CompatProbe {
    /// Take a reference on the compatibility probe, registering it on the
    /// 0->1 transition. On registration failure nothing is kept: the count
    /// stays untouched and the error is reported to the caller. The returned
    /// guard releases the reference when dropped.
    pub(crate) fn acquire(
        self: &Arc<Self>,
        engine: &Arc<dyn TraceEngine>,
        tracepoint: &'static str,
        group: GroupId,
    ) -> Result<CompatProbeGuard> {
        let mut state = self.state.lock().unwrap();
        if state.holders == 0 {
            let id = engine.register_tracepoint(
                tracepoint,
                inert_handler(),
                group,
                Some(&Filter::new(COMPAT_PROBE_FILTER)),
            )?;
            debug!("Registered compatibility probe on {tracepoint} (event {id})");
            state.event_id = Some(id);
        }
        state.holders += 1;

        Ok(CompatProbeGuard {
            probe: Arc::clone(self),
            engine: Arc::clone(engine),
        })
    }

    /// Drop a reference, unregistering the probe on the 1->0 transition.
    /// Releasing more times than acquired is a no-op.
    pub(crate) fn release(&self, engine: &dyn TraceEngine) {
        let mut state = self.state.lock().unwrap();
        if state.holders == 0 {
            return;
        }

        state.holders -= 1;
        if state.holders == 0 {
            if let Some(id) = state.event_id.take() {
                debug!("Unregistering compatibility probe (event {id})");
                if let Err(e) = engine.unregister_event(id) {
                    warn!("Could not unregister compatibility probe (event {id}): {e}");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn holders(&self) -> u64 {
        self.state.lock().unwrap().holders
    }
}

/// Release-on-drop handle on the shared compatibility probe. Ownership makes
/// the release happen exactly once per acquisition.
pub(crate) struct CompatProbeGuard {
    probe: Arc<CompatProbe>,
    engine: Arc<dyn TraceEngine>,
}

impl Drop for CompatProbeGuard {
    fn drop(&mut self) {
        self.probe.release(self.engine.as_ref());
    }
}

/// Register a per-subscription compatibility probe, for pre-3.x kernels where
/// the shared one can't be used: those kernels crash when such an event is
/// removed again, so this one goes into the subscription's own group and is
/// deliberately never unregistered, even when the subscription is torn down.
pub(crate) fn register_local_compat_probe(
    engine: &dyn TraceEngine,
    tracepoint: &'static str,
    group: GroupId,
) -> Result<EventId> {
    let id = engine.register_tracepoint(
        tracepoint,
        inert_handler(),
        group,
        Some(&Filter::new(COMPAT_PROBE_FILTER)),
    )?;
    debug!("Registered local compatibility probe on {tracepoint} (event {id})");
    Ok(id)
}
