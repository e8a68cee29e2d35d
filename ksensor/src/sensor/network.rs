//! Socket lifecycle event sources: accept, bind, connect, listen, recv and
//! send, each split into an attempt (entry) and a result (exit) source.
//!
//! Results and simple attempts come from per-syscall tracepoints. Attempts
//! carrying a socket address need kprobes, as the address has to be read from
//! the caller's registers and memory.

use once_cell::sync::Lazy;

use events::{
    NetworkAddress, NetworkAddressAttemptEvent, NetworkAttemptEvent, NetworkListenAttemptEvent,
    NetworkResultEvent, TelemetryEvent,
};

use crate::{
    core::{
        filters::{FieldTypeMap, Filter, ValueType},
        probe::KprobeSpec,
        tracing::RawSample,
    },
    sensor::Subscription,
};

/// Field types filter expressions may use on network attempt events that
/// carry no address.
pub static NETWORK_ATTEMPT_EVENT_TYPES: Lazy<FieldTypeMap> =
    Lazy::new(|| FieldTypeMap::from([("fd", ValueType::UnsignedInt64)]));

/// Field types filter expressions may use on network attempt events that
/// include address information.
pub static NETWORK_ATTEMPT_WITH_ADDRESS_EVENT_TYPES: Lazy<FieldTypeMap> = Lazy::new(|| {
    FieldTypeMap::from([
        ("fd", ValueType::UnsignedInt64),
        ("sa_family", ValueType::UnsignedInt16),
        ("sin_port", ValueType::UnsignedInt16),
        ("sin_addr", ValueType::UnsignedInt32),
        ("sun_path", ValueType::String),
        ("sin6_port", ValueType::UnsignedInt16),
        ("sin6_addr_high", ValueType::UnsignedInt64),
        ("sin6_addr_low", ValueType::UnsignedInt64),
    ])
});

/// Field types filter expressions may use on network listen attempt events.
pub static NETWORK_LISTEN_ATTEMPT_EVENT_TYPES: Lazy<FieldTypeMap> = Lazy::new(|| {
    FieldTypeMap::from([
        ("fd", ValueType::UnsignedInt64),
        ("backlog", ValueType::UnsignedInt64),
    ])
});

/// Field types filter expressions may use on network result events.
pub static NETWORK_RESULT_EVENT_TYPES: Lazy<FieldTypeMap> =
    Lazy::new(|| FieldTypeMap::from([("ret", ValueType::SignedInt64)]));

// The fetchargs below encode the x86_64 calling convention of the probed
// functions: the sockaddr pointer is the second argument (%si) for bind and
// connect, the fourth (%r8) for sendto, and reached through the msghdr
// pointed to by the second argument (+0(%si)) for sendmsg. All sockaddr
// representations are fetched; decoding picks one by family.
const BIND_SYMBOL: &str = "sys_bind";
const BIND_FETCHARGS: &str = concat!(
    "fd=%di sa_family=+0(%si):u16 ",
    "sin_port=+2(%si):u16 sin_addr=+4(%si):u32 ",
    "sun_path=+2(%si):string ",
    "sin6_port=+2(%si):u16 sin6_addr_high=+8(%si):u64 sin6_addr_low=+16(%si):u64",
);

const CONNECT_SYMBOL: &str = "sys_connect";
const CONNECT_FETCHARGS: &str = concat!(
    "fd=%di sa_family=+0(%si):u16 ",
    "sin_port=+2(%si):u16 sin_addr=+4(%si):u32 ",
    "sun_path=+2(%si):string ",
    "sin6_port=+2(%si):u16 sin6_addr_high=+8(%si):u64 sin6_addr_low=+16(%si):u64",
);

const SENDMSG_SYMBOL: &str = "sys_sendmsg";
const SENDMSG_FETCHARGS: &str = concat!(
    "fd=%di sa_family=+0(+0(%si)):u16 ",
    "sin_port=+2(+0(%si)):u16 sin_addr=+4(+0(%si)):u32 ",
    "sun_path=+2(+0(%si)):string ",
    "sin6_port=+2(+0(%si)):u16 sin6_addr_high=+8(+0(%si)):u64 sin6_addr_low=+16(+0(%si)):u64",
);

const SENDTO_SYMBOL: &str = "sys_sendto";
const SENDTO_FETCHARGS: &str = concat!(
    "fd=%di sa_family=+0(%r8):u16 ",
    "sin_port=+2(%r8):u16 sin_addr=+4(%r8):u32 ",
    "sun_path=+2(%r8):string ",
    "sin6_port=+2(%r8):u16 sin6_addr_high=+8(%r8):u64 sin6_addr_low=+16(%r8):u64",
);

fn decode_fd(sample: &RawSample) -> u64 {
    sample.get_u64("fd").unwrap_or_default()
}

fn decode_ret(sample: &RawSample) -> i64 {
    sample.get_s64("ret").unwrap_or_default()
}

/// Populate exactly one address representation, picked by the decoded family
/// selector. The other representations stay zero-valued.
fn decode_address(sample: &RawSample) -> NetworkAddress {
    let family = sample.get_u16("sa_family").unwrap_or_default();
    let mut address = NetworkAddress {
        family,
        ..Default::default()
    };

    match i32::from(family) {
        libc::AF_LOCAL => {
            address.unix_path = sample.get_str("sun_path").unwrap_or_default().to_string();
        }
        libc::AF_INET => {
            address.ipv4_address = sample.get_u32("sin_addr").unwrap_or_default();
            address.ipv4_port = sample.get_u16("sin_port").unwrap_or_default();
        }
        libc::AF_INET6 => {
            address.ipv6_address_high = sample.get_u64("sin6_addr_high").unwrap_or_default();
            address.ipv6_address_low = sample.get_u64("sin6_addr_low").unwrap_or_default();
            address.ipv6_port = sample.get_u16("sin6_port").unwrap_or_default();
        }
        _ => (),
    }

    address
}

fn attempt(sample: &RawSample) -> Option<NetworkAttemptEvent> {
    Some(NetworkAttemptEvent {
        common: sample.common_event()?,
        fd: decode_fd(sample),
    })
}

fn address_attempt(sample: &RawSample) -> Option<NetworkAddressAttemptEvent> {
    Some(NetworkAddressAttemptEvent {
        common: sample.common_event()?,
        fd: decode_fd(sample),
        address: decode_address(sample),
    })
}

fn result(sample: &RawSample) -> Option<NetworkResultEvent> {
    Some(NetworkResultEvent {
        common: sample.common_event()?,
        ret: decode_ret(sample),
    })
}

pub(crate) fn decode_accept_attempt(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::AcceptAttempt(attempt(sample)?))
}

pub(crate) fn decode_accept_result(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::AcceptResult(result(sample)?))
}

pub(crate) fn decode_bind_attempt(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::BindAttempt(address_attempt(sample)?))
}

pub(crate) fn decode_bind_result(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::BindResult(result(sample)?))
}

pub(crate) fn decode_connect_attempt(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::ConnectAttempt(address_attempt(sample)?))
}

pub(crate) fn decode_connect_result(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::ConnectResult(result(sample)?))
}

pub(crate) fn decode_listen_attempt(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::ListenAttempt(NetworkListenAttemptEvent {
        common: sample.common_event()?,
        fd: decode_fd(sample),
        backlog: sample.get_u64("backlog").unwrap_or_default(),
    }))
}

pub(crate) fn decode_listen_result(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::ListenResult(result(sample)?))
}

pub(crate) fn decode_recv_attempt(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::RecvAttempt(attempt(sample)?))
}

pub(crate) fn decode_recv_result(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::RecvResult(result(sample)?))
}

pub(crate) fn decode_send_attempt(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::SendAttempt(address_attempt(sample)?))
}

pub(crate) fn decode_send_result(sample: &RawSample) -> Option<TelemetryEvent> {
    Some(TelemetryEvent::SendResult(result(sample)?))
}

impl Subscription {
    /// Register the network accept attempt event source.
    pub fn register_network_accept_attempt_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_enter_accept", decode_accept_attempt, filter);
        self.register_tracepoint("syscalls/sys_enter_accept4", decode_accept_attempt, filter);
    }

    /// Register the network accept result event source.
    pub fn register_network_accept_result_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_exit_accept", decode_accept_result, filter);
        self.register_tracepoint("syscalls/sys_exit_accept4", decode_accept_result, filter);
    }

    /// Register the network bind attempt event source.
    pub fn register_network_bind_attempt_events(&self, filter: Option<&Filter>) {
        let spec = KprobeSpec {
            symbol: BIND_SYMBOL,
            is_return: false,
            fetch_args: BIND_FETCHARGS,
        };
        self.register_kprobe(&spec, decode_bind_attempt, filter, None);
    }

    /// Register the network bind result event source.
    pub fn register_network_bind_result_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_exit_bind", decode_bind_result, filter);
    }

    /// Register the network connect attempt event source.
    pub fn register_network_connect_attempt_events(&self, filter: Option<&Filter>) {
        let spec = KprobeSpec {
            symbol: CONNECT_SYMBOL,
            is_return: false,
            fetch_args: CONNECT_FETCHARGS,
        };
        self.register_kprobe(&spec, decode_connect_attempt, filter, None);
    }

    /// Register the network connect result event source.
    pub fn register_network_connect_result_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_exit_connect", decode_connect_result, filter);
    }

    /// Register the network listen attempt event source.
    pub fn register_network_listen_attempt_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_enter_listen", decode_listen_attempt, filter);
    }

    /// Register the network listen result event source.
    pub fn register_network_listen_result_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_exit_listen", decode_listen_result, filter);
    }

    /// Register the network recv attempt event source, covering both recvfrom
    /// and recvmsg.
    pub fn register_network_recv_attempt_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_enter_recvfrom", decode_recv_attempt, filter);
        self.register_tracepoint("syscalls/sys_enter_recvmsg", decode_recv_attempt, filter);
    }

    /// Register the network recv result event source.
    pub fn register_network_recv_result_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_exit_recvfrom", decode_recv_result, filter);
        self.register_tracepoint("syscalls/sys_exit_recvmsg", decode_recv_result, filter);
    }

    /// Register the network send attempt event source, covering both sendmsg
    /// and sendto.
    pub fn register_network_send_attempt_events(&self, filter: Option<&Filter>) {
        let spec = KprobeSpec {
            symbol: SENDMSG_SYMBOL,
            is_return: false,
            fetch_args: SENDMSG_FETCHARGS,
        };
        self.register_kprobe(&spec, decode_send_attempt, filter, None);

        let spec = KprobeSpec {
            symbol: SENDTO_SYMBOL,
            is_return: false,
            fetch_args: SENDTO_FETCHARGS,
        };
        self.register_kprobe(&spec, decode_send_attempt, filter, None);
    }

    /// Register the network send result event source.
    pub fn register_network_send_result_events(&self, filter: Option<&Filter>) {
        self.register_tracepoint("syscalls/sys_exit_sendmsg", decode_send_result, filter);
        self.register_tracepoint("syscalls/sys_exit_sendto", decode_send_result, filter);
    }
}
