use serde::{Deserialize, Serialize};

use crate::CommonEvent;

/// Event generated by the syscall enter event source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallEnterEvent {
    pub common: CommonEvent,
    /// Syscall number, as found in the syscall table of the running
    /// architecture.
    pub id: i64,
    /// Raw syscall arguments, in arg0..arg5 order.
    pub arguments: [u64; 6],
}

/// Event generated by the syscall exit event source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallExitEvent {
    pub common: CommonEvent,
    /// Syscall number.
    pub id: i64,
    /// Raw return value of the syscall.
    pub ret: i64,
}
