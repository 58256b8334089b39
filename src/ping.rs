use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT: f64 = 1.0;
pub const DEFAULT_TTL: i64 = 255;
/// Sentinel meaning "no QoS value requested".
pub const QOS_UNSET: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressFamily {
    #[default]
    Unspecified,
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Maps an `AF_*` constant onto a family. Anything else is `None`.
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            libc::AF_UNSPEC => Some(AddressFamily::Unspecified),
            libc::AF_INET => Some(AddressFamily::Ipv4),
            libc::AF_INET6 => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            AddressFamily::Unspecified => libc::AF_UNSPEC,
            AddressFamily::Ipv4 => libc::AF_INET,
            AddressFamily::Ipv6 => libc::AF_INET6,
        }
    }

    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Unspecified => write!(f, "unspecified"),
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// One monitored destination, addressed through the owning session by index.
#[derive(Debug, Clone, PartialEq)]
pub struct PingTarget {
    pub address: SocketAddr,
    pub address_family: AddressFamily,
    /// `UNIX_EPOCH` until a send has been stamped.
    pub last_send_time: SystemTime,
}

impl PingTarget {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            address_family: AddressFamily::of(&address),
            last_send_time: UNIX_EPOCH,
        }
    }

    pub fn clear_send_time(&mut self) {
        self.last_send_time = UNIX_EPOCH;
    }

    pub fn has_send_time(&self) -> bool {
        self.last_send_time != UNIX_EPOCH
    }

    /// Round-trip interval between the recorded send and `now`.
    pub fn elapsed_since_send(&self, now: SystemTime) -> Option<Duration> {
        if !self.has_send_time() {
            return None;
        }
        now.duration_since(self.last_send_time).ok()
    }
}
