use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CommonEvent;

/// Returns a translation of some address families into a readable format.
pub fn family_str(family: u16) -> Option<&'static str> {
    Some(match family {
        1 => "AF_UNIX",
        2 => "AF_INET",
        10 => "AF_INET6",
        _ => return None,
    })
}

/// Socket address attached to network attempt events. Mutually exclusive by
/// address family: only the fields of the decoded family are populated, the
/// others stay zero-valued.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// Address family (`AF_UNIX`, `AF_INET`, `AF_INET6`, ...).
    pub family: u16,
    /// Path of an `AF_UNIX` socket.
    pub unix_path: String,
    /// IPv4 address, in host byte order.
    pub ipv4_address: u32,
    pub ipv4_port: u16,
    /// High and low halves of an IPv6 address.
    pub ipv6_address_high: u64,
    pub ipv6_address_low: u64,
    pub ipv6_port: u16,
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match family_str(self.family) {
            Some("AF_UNIX") => write!(f, "unix:{}", self.unix_path),
            Some("AF_INET") => {
                let ip = self.ipv4_address;
                write!(
                    f,
                    "{}.{}.{}.{}:{}",
                    ip >> 24,
                    (ip >> 16) & 0xff,
                    (ip >> 8) & 0xff,
                    ip & 0xff,
                    self.ipv4_port
                )
            }
            Some("AF_INET6") => write!(
                f,
                "[{:x}:{:x}]:{}",
                self.ipv6_address_high, self.ipv6_address_low, self.ipv6_port
            ),
            _ => write!(f, "family {}", self.family),
        }
    }
}

/// Event generated by network attempt event sources that carry no address
/// (accept, recv).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttemptEvent {
    pub common: CommonEvent,
    /// Socket file descriptor the attempt targets.
    pub fd: u64,
}

/// Event generated by network attempt event sources that carry an address
/// (bind, connect, send).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddressAttemptEvent {
    pub common: CommonEvent,
    pub fd: u64,
    pub address: NetworkAddress,
}

/// Event generated by the network listen attempt event source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkListenAttemptEvent {
    pub common: CommonEvent,
    pub fd: u64,
    /// Pending-connection backlog requested by the caller.
    pub backlog: u64,
}

/// Event generated by network result event sources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResultEvent {
    pub common: CommonEvent,
    /// Raw return value of the syscall.
    pub ret: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_names() {
        assert_eq!(family_str(1), Some("AF_UNIX"));
        assert_eq!(family_str(2), Some("AF_INET"));
        assert_eq!(family_str(10), Some("AF_INET6"));
        assert_eq!(family_str(42), None);
    }

    #[test]
    fn address_display() {
        let address = NetworkAddress {
            family: 2,
            ipv4_address: 0x7f000001,
            ipv4_port: 80,
            ..Default::default()
        };
        assert_eq!(format!("{address}"), "127.0.0.1:80");

        let address = NetworkAddress {
            family: 1,
            unix_path: "/run/control.sock".to_string(),
            ..Default::default()
        };
        assert_eq!(format!("{address}"), "unix:/run/control.sock");
    }
}
