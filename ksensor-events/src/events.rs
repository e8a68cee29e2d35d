//! Internal representation of telemetry events. Those events can be marshaled
//! to other formats to be stored or displayed. We currently support: JSON.
//!
//! Every event kind carries the common envelope (timestamp and task
//! attribution) plus kind-specific payload fields. As an example, a bind
//! attempt serialized to JSON looks like:
//!
//! {
//!     "kind": "bind_attempt",
//!     "common": {
//!         "timestamp": 7322460997041,
//!         "smp_id": 0,
//!         "task": { "pid": 1337, "tgid": 1337 }
//!     },
//!     "fd": 4,
//!     "address": { "family": 2, "ipv4_address": 2130706433, ... }
//! }

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    common::CommonEvent,
    net::{
        NetworkAddressAttemptEvent, NetworkAttemptEvent, NetworkListenAttemptEvent,
        NetworkResultEvent,
    },
    syscall::{SyscallEnterEvent, SyscallExitEvent},
};

/// Telemetry event, with one variant per supported event source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    SyscallEnter(SyscallEnterEvent),
    SyscallExit(SyscallExitEvent),
    AcceptAttempt(NetworkAttemptEvent),
    AcceptResult(NetworkResultEvent),
    BindAttempt(NetworkAddressAttemptEvent),
    BindResult(NetworkResultEvent),
    ConnectAttempt(NetworkAddressAttemptEvent),
    ConnectResult(NetworkResultEvent),
    ListenAttempt(NetworkListenAttemptEvent),
    ListenResult(NetworkResultEvent),
    RecvAttempt(NetworkAttemptEvent),
    RecvResult(NetworkResultEvent),
    SendAttempt(NetworkAddressAttemptEvent),
    SendResult(NetworkResultEvent),
}

impl TelemetryEvent {
    /// Retrieve the envelope common to all event kinds.
    pub fn common(&self) -> &CommonEvent {
        use TelemetryEvent::*;
        match self {
            SyscallEnter(e) => &e.common,
            SyscallExit(e) => &e.common,
            AcceptAttempt(e) | RecvAttempt(e) => &e.common,
            BindAttempt(e) | ConnectAttempt(e) | SendAttempt(e) => &e.common,
            ListenAttempt(e) => &e.common,
            AcceptResult(e) | BindResult(e) | ConnectResult(e) | ListenResult(e)
            | RecvResult(e) | SendResult(e) => &e.common,
        }
    }

    /// Create a TelemetryEvent from a json string.
    pub fn from_json(line: &str) -> Result<TelemetryEvent> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TaskInfo;

    fn common() -> CommonEvent {
        CommonEvent {
            timestamp: 42,
            smp_id: 1,
            task: TaskInfo { pid: 10, tgid: 10 },
        }
    }

    #[test]
    fn common_accessor() {
        let event = TelemetryEvent::SyscallEnter(SyscallEnterEvent {
            common: common(),
            id: 59,
            arguments: [0; 6],
        });
        assert_eq!(event.common().timestamp, 42);

        let event = TelemetryEvent::ListenAttempt(NetworkListenAttemptEvent {
            common: common(),
            fd: 3,
            backlog: 128,
        });
        assert_eq!(event.common().task.pid, 10);
    }

    #[test]
    fn json_marshaling() {
        let event = TelemetryEvent::SyscallExit(SyscallExitEvent {
            common: common(),
            id: 59,
            ret: 0,
        });

        let json = event.to_json().unwrap();
        assert_eq!(json["kind"], "syscall_exit");
        assert_eq!(json["id"], 59);

        let parsed = TelemetryEvent::from_json(&json.to_string()).unwrap();
        assert_eq!(parsed, event);
    }
}
