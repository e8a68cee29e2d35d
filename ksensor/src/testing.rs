//! Test doubles shared by the unit tests: an in-memory tracing engine that
//! records registrations and replays samples, and a consumer that collects
//! dispatched events.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use anyhow::{bail, Result};

use events::TelemetryEvent;

use crate::{
    core::{
        filters::Filter,
        probe::KprobeSpec,
        tracing::{EventId, GroupId, RawSample, SampleHandler, TraceEngine},
    },
    sensor::EventConsumer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RegistrationKind {
    Tracepoint,
    Kprobe,
}

/// Everything the fake engine saw for one registration.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) kind: RegistrationKind,
    pub(crate) target: String,
    pub(crate) is_return: bool,
    pub(crate) fetch_args: String,
    pub(crate) group: GroupId,
    pub(crate) filter: Option<String>,
    pub(crate) handler: SampleHandler,
}

#[derive(Default)]
struct State {
    next_event: EventId,
    next_group: GroupId,
    active: HashMap<EventId, Registration>,
    history: Vec<String>,
    unregistered: usize,
    destroyed_groups: Vec<GroupId>,
    tracepoint_queries: usize,
}

/// In-memory [`TraceEngine`]. Registrations succeed unless their target was
/// marked failing; the engine keeps the full registration history so tests
/// can assert on shapes and lifecycles, and [`FakeEngine::fire`] stands in
/// for a collection thread delivering a sample.
pub(crate) struct FakeEngine {
    tracepoints: HashSet<String>,
    symbols: HashSet<String>,
    failing: HashSet<String>,
    state: Mutex<State>,
}

impl FakeEngine {
    pub(crate) fn new() -> FakeEngine {
        FakeEngine {
            tracepoints: ["raw_syscalls/sys_enter", "raw_syscalls/sys_exit"]
                .map(String::from)
                .into(),
            symbols: ["syscall_trace_enter_phase1", "syscall_trace_enter"]
                .map(String::from)
                .into(),
            failing: HashSet::new(),
            state: Mutex::default(),
        }
    }

    /// Replace the set of tracepoints the fake kernel exposes.
    pub(crate) fn with_tracepoints(mut self, tracepoints: &[&str]) -> FakeEngine {
        self.tracepoints = tracepoints.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Replace the set of kernel symbols the fake kernel exposes.
    pub(crate) fn with_symbols(mut self, symbols: &[&str]) -> FakeEngine {
        self.symbols = symbols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Make every registration on `target` fail.
    pub(crate) fn fail_on(mut self, target: &str) -> FakeEngine {
        self.failing.insert(target.to_string());
        self
    }

    fn register(&self, registration: Registration) -> Result<EventId> {
        if self.failing.contains(&registration.target) {
            bail!("injected failure on {}", registration.target);
        }

        let mut state = self.state.lock().unwrap();
        state.next_event += 1;
        let id = state.next_event;
        state.history.push(registration.target.clone());
        state.active.insert(id, registration);
        Ok(id)
    }

    /// Currently registered event sources.
    pub(crate) fn active(&self) -> Vec<(EventId, Registration)> {
        let state = self.state.lock().unwrap();
        let mut active: Vec<_> = state.active.iter().map(|(id, r)| (*id, r.clone())).collect();
        active.sort_by_key(|(id, _)| *id);
        active
    }

    /// Currently registered event sources on `target`.
    pub(crate) fn active_on(&self, target: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .active
            .values()
            .filter(|r| r.target == target)
            .count()
    }

    /// Total registrations ever made on `target`, including unregistered
    /// ones.
    pub(crate) fn registrations_on(&self, target: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|t| *t == target)
            .count()
    }

    pub(crate) fn unregister_count(&self) -> usize {
        self.state.lock().unwrap().unregistered
    }

    pub(crate) fn destroyed_groups(&self) -> Vec<GroupId> {
        self.state.lock().unwrap().destroyed_groups.clone()
    }

    pub(crate) fn tracepoint_queries(&self) -> usize {
        self.state.lock().unwrap().tracepoint_queries
    }

    /// Deliver one sample to the handler of event `id`, the way an engine
    /// collection thread would. The handler runs outside the engine lock.
    pub(crate) fn fire(&self, id: EventId, sample: &RawSample) {
        let handler = match self.state.lock().unwrap().active.get(&id) {
            Some(registration) => registration.handler.clone(),
            None => panic!("fired unknown event {id}"),
        };
        handler(id, sample);
    }
}

impl TraceEngine for FakeEngine {
    fn register_tracepoint(
        &self,
        name: &str,
        handler: SampleHandler,
        group: GroupId,
        filter: Option<&Filter>,
    ) -> Result<EventId> {
        self.register(Registration {
            kind: RegistrationKind::Tracepoint,
            target: name.to_string(),
            is_return: false,
            fetch_args: String::new(),
            group,
            filter: filter.map(|f| f.predicate().to_string()),
            handler,
        })
    }

    fn register_kprobe(
        &self,
        spec: &KprobeSpec,
        handler: SampleHandler,
        group: GroupId,
        filter: Option<&Filter>,
    ) -> Result<EventId> {
        self.register(Registration {
            kind: RegistrationKind::Kprobe,
            target: spec.symbol.to_string(),
            is_return: spec.is_return,
            fetch_args: spec.fetch_args.to_string(),
            group,
            filter: filter.map(|f| f.predicate().to_string()),
            handler,
        })
    }

    fn unregister_event(&self, id: EventId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.active.remove(&id) {
            Some(_) => {
                state.unregistered += 1;
                Ok(())
            }
            None => bail!("unknown event {id}"),
        }
    }

    fn create_event_group(&self) -> Result<GroupId> {
        let mut state = self.state.lock().unwrap();
        state.next_group += 1;
        Ok(state.next_group)
    }

    fn destroy_event_group(&self, group: GroupId) -> Result<()> {
        self.state.lock().unwrap().destroyed_groups.push(group);
        Ok(())
    }

    fn tracepoint_exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().tracepoint_queries += 1;
        self.tracepoints.contains(name)
    }

    fn kernel_symbol_available(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }
}

/// Consumer collecting everything dispatched to it.
#[derive(Default)]
pub(crate) struct Collector(Mutex<Vec<(EventId, TelemetryEvent)>>);

impl Collector {
    pub(crate) fn events(&self) -> Vec<(EventId, TelemetryEvent)> {
        self.0.lock().unwrap().clone()
    }
}

impl EventConsumer for Collector {
    fn consume(&self, event_id: EventId, event: TelemetryEvent) {
        self.0.lock().unwrap().push((event_id, event));
    }
}
