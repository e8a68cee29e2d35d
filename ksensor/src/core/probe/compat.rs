//! Version- and symbol-availability-dependent choices: which syscall
//! tracepoint namespace to use, which kprobe symbol gives detailed
//! syscall-entry decoding and which compatibility-probe strategy applies.

use anyhow::Result;
use once_cell::sync::OnceCell;

use crate::core::{inspect::KernelVersion, tracing::TraceEngine, SensorError};

/// Newer kernels (>= 4.1) have refactored syscall entry code, making
/// `syscall_trace_enter_phase1` the symbol to probe. Older kernels use
/// `syscall_trace_enter`. Both have the same signature, so the fetch-args
/// don't have to change. The new symbol is tried first: the old one can
/// still be set on newer kernels, but it won't fire there.
pub(crate) const SYSCALL_ENTER_SYMBOL: &str = "syscall_trace_enter_phase1";
pub(crate) const SYSCALL_ENTER_SYMBOL_LEGACY: &str = "syscall_trace_enter";

/// Resolved pair of syscall tracepoint names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SyscallTracepoints {
    pub(crate) enter: &'static str,
    pub(crate) exit: &'static str,
}

/// Architecture-independent raw tracepoints, preferred.
const RAW_TRACEPOINTS: SyscallTracepoints = SyscallTracepoints {
    enter: "raw_syscalls/sys_enter",
    exit: "raw_syscalls/sys_exit",
};

/// Per-syscall-table tracepoints, the fallback namespace on kernels predating
/// the raw ones.
const TABLE_TRACEPOINTS: SyscallTracepoints = SyscallTracepoints {
    enter: "syscalls/sys_enter",
    exit: "syscalls/sys_exit",
};

/// Process-wide compatibility choices, resolved once on first use and
/// immutable afterwards. All subscriptions of a sensor share one instance.
#[derive(Default)]
pub(crate) struct KernelCompat {
    tracepoints: OnceCell<SyscallTracepoints>,
}

impl KernelCompat {
    /// Resolve the syscall tracepoint names. The names come from the running
    /// kernel and cannot change, so resolution happens exactly once even
    /// under concurrent first use; every caller observes the same pair.
    pub(crate) fn syscall_tracepoints(
        &self,
        engine: &dyn TraceEngine,
    ) -> Result<SyscallTracepoints> {
        Ok(*self.tracepoints.get_or_try_init(|| {
            if engine.tracepoint_exists(RAW_TRACEPOINTS.enter) {
                Ok(RAW_TRACEPOINTS)
            } else if engine.tracepoint_exists(TABLE_TRACEPOINTS.enter) {
                Ok(TABLE_TRACEPOINTS)
            } else {
                Err(anyhow::Error::new(SensorError::ConfigurationImpossible))
            }
        })?)
    }
}

/// Pick the kprobe symbol used for detailed syscall-entry decoding on this
/// kernel.
pub(crate) fn syscall_enter_symbol(engine: &dyn TraceEngine) -> &'static str {
    match engine.kernel_symbol_available(SYSCALL_ENTER_SYMBOL) {
        true => SYSCALL_ENTER_SYMBOL,
        false => SYSCALL_ENTER_SYMBOL_LEGACY,
    }
}

/// Lifecycle strategy for the compatibility probe, keyed on the detected
/// kernel major version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CompatProbeStrategy {
    /// One shared, reference-counted instance per process (kernel >= 3).
    Global,
    /// One instance per subscription, never unregistered (pre-3.x kernels
    /// cannot remove it again without crashing).
    Local,
}

impl CompatProbeStrategy {
    pub(crate) fn for_kernel(version: &KernelVersion) -> CompatProbeStrategy {
        match version.major() < 3 {
            true => CompatProbeStrategy::Local,
            false => CompatProbeStrategy::Global,
        }
    }
}
