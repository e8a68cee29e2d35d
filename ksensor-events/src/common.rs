use std::fmt;

use serde::{Deserialize, Serialize};

/// Task attribution of an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Process id.
    pub pid: i32,
    /// Thread group id.
    pub tgid: i32,
}

/// Envelope common to all telemetry events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonEvent {
    /// Monotonic timestamp of when the sample was taken, in ns.
    pub timestamp: u64,
    /// SMP processor id.
    pub smp_id: u32,
    /// Task the event is attributed to.
    pub task: TaskInfo,
}

impl fmt::Display for CommonEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.timestamp, self.smp_id)?;

        if self.task.tgid != self.task.pid {
            write!(f, " [{}/{}]", self.task.pid, self.task.tgid)
        } else {
            write!(f, " [{}]", self.task.tgid)
        }
    }
}
