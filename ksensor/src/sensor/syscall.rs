//! Syscall entry/exit event sources.
//!
//! Exit events come from the resolved sys_exit tracepoint. Detailed enter
//! events need a kprobe on the syscall entry slow path, which in turn only
//! fires once the generic sys_enter tracepoint has a consumer; registration
//! therefore composes the compatibility layer and the compatibility probe.

use anyhow::Result;
use once_cell::sync::Lazy;

use events::{SyscallEnterEvent, SyscallExitEvent, TelemetryEvent};

use crate::{
    core::{
        filters::{FieldTypeMap, Filter, ValueType},
        probe::{
            compat::{syscall_enter_symbol, CompatProbeStrategy},
            dummy::{register_local_compat_probe, CompatProbeGuard},
            KprobeSpec,
        },
        tracing::RawSample,
    },
    sensor::Subscription,
};

/// Field types filter expressions may use on syscall enter events.
pub static SYSCALL_ENTER_EVENT_TYPES: Lazy<FieldTypeMap> = Lazy::new(|| {
    FieldTypeMap::from([
        ("id", ValueType::SignedInt64),
        ("arg0", ValueType::UnsignedInt64),
        ("arg1", ValueType::UnsignedInt64),
        ("arg2", ValueType::UnsignedInt64),
        ("arg3", ValueType::UnsignedInt64),
        ("arg4", ValueType::UnsignedInt64),
        ("arg5", ValueType::UnsignedInt64),
    ])
});

/// Field types filter expressions may use on syscall exit events.
pub static SYSCALL_EXIT_EVENT_TYPES: Lazy<FieldTypeMap> = Lazy::new(|| {
    FieldTypeMap::from([
        ("id", ValueType::SignedInt64),
        ("ret", ValueType::SignedInt64),
    ])
});

// These offsets index into the x86_64 version of struct pt_regs in the
// kernel. This is a stable structure.
pub(crate) const SYSCALL_ENTER_FETCHARGS: &str = concat!(
    "id=+120(%di):s64 ",   // orig_ax
    "arg0=+112(%di):u64 ", // di
    "arg1=+104(%di):u64 ", // si
    "arg2=+96(%di):u64 ",  // dx
    "arg3=+56(%di):u64 ",  // r10
    "arg4=+72(%di):u64 ",  // r8
    "arg5=+64(%di):u64",   // r9
);

const SYSCALL_ARG_KEYS: [&str; 6] = ["arg0", "arg1", "arg2", "arg3", "arg4", "arg5"];

pub(crate) fn decode_syscall_enter(sample: &RawSample) -> Option<TelemetryEvent> {
    let common = sample.common_event()?;

    let mut arguments = [0u64; 6];
    for (argument, key) in arguments.iter_mut().zip(SYSCALL_ARG_KEYS) {
        *argument = sample.get_u64(key).unwrap_or_default();
    }

    Some(TelemetryEvent::SyscallEnter(SyscallEnterEvent {
        common,
        id: sample.get_s64("id").unwrap_or_default(),
        arguments,
    }))
}

pub(crate) fn decode_syscall_exit(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::SyscallExit(SyscallExitEvent {
        common: sample.common_event()?,
        id: sample.get_s64("id").unwrap_or_default(),
        ret: sample.get_s64("ret").unwrap_or_default(),
    }))
}

impl Subscription {
    /// Register the syscall enter event source. Only kernel incompatibility
    /// (no sys_enter tracepoint at all) escalates as an error; engine
    /// registration failures are logged against the subscription.
    pub fn register_syscall_enter_events(&self, filter: Option<&Filter>) -> Result<()> {
        let tracepoints = self.sensor().syscall_tracepoints()?;
        let sensor = self.sensor();

        // Put the kernel into the mode where it makes the function calls
        // needed for our kprobe to fire.
        let compat: Option<CompatProbeGuard> =
            match CompatProbeStrategy::for_kernel(sensor.kernel()) {
                CompatProbeStrategy::Local => {
                    match register_local_compat_probe(
                        sensor.engine().as_ref(),
                        tracepoints.enter,
                        self.group(),
                    ) {
                        Ok(_) => {
                            self.mark_keep_group();
                            None
                        }
                        Err(e) => {
                            self.log_status(format!(
                                "Could not register compatibility probe on {}: {e}",
                                tracepoints.enter
                            ));
                            return Ok(());
                        }
                    }
                }
                CompatProbeStrategy::Global => {
                    match sensor.compat_probe().acquire(
                        sensor.engine(),
                        tracepoints.enter,
                        sensor.control_group(),
                    ) {
                        Ok(guard) => Some(guard),
                        Err(e) => {
                            self.log_status(format!(
                                "Could not register compatibility probe on {}: {e}",
                                tracepoints.enter
                            ));
                            return Ok(());
                        }
                    }
                }
            };

        let spec = KprobeSpec {
            symbol: syscall_enter_symbol(sensor.engine().as_ref()),
            is_return: false,
            fetch_args: SYSCALL_ENTER_FETCHARGS,
        };
        self.register_kprobe(&spec, decode_syscall_enter, filter, compat);
        Ok(())
    }

    /// Register the syscall exit event source.
    pub fn register_syscall_exit_events(&self, filter: Option<&Filter>) -> Result<()> {
        let tracepoints = self.sensor().syscall_tracepoints()?;
        self.register_tracepoint(tracepoints.exit, decode_syscall_exit, filter);
        Ok(())
    }
}
