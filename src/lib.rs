//! Session, raw socket and transport core of a multi-host ICMP ping library.
//!
//! A [`Session`] owns the ping parameters, the raw IPv4/IPv6 sockets and the
//! table of [`PingTarget`]s. Every fallible call returns a [`PingError`] and
//! also records `"<operation>: <detail>"` for [`Session::get_error`].

pub mod config;
pub mod error;
pub mod options;
pub mod ping;
pub mod socket_manager;
pub mod transport;

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use log::warn;
use socket2::Socket;

pub use config::SessionConfig;
pub use error::{ErrorKind, ErrorReporter, PingError, Result};
pub use options::{OptionTag, SessionOption};
pub use ping::{AddressFamily, PingTarget, DEFAULT_TIMEOUT, DEFAULT_TTL, QOS_UNSET};
pub use transport::{Clock, SocketTransmit, SystemClock, Transmit};

/// Index of a target inside its session's host table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub usize);

/// One ping configuration together with the sockets and targets it owns.
pub struct Session {
    timeout: f64,
    ttl: i64,
    qos: u8,
    address_family: AddressFamily,
    source_address: Option<SocketAddr>,
    socket_v4: Option<Socket>,
    socket_v6: Option<Socket>,
    errors: ErrorReporter,
    hosts: Vec<PingTarget>,
    clock: Box<dyn Clock>,
    transmit: Box<dyn Transmit>,
}

// A session is handed to a worker thread as a whole.
const _: fn() = || {
    fn assert_send<T: Send>() {}
    assert_send::<Session>();
};

impl Default for Session {
    fn default() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("timeout", &self.timeout)
            .field("ttl", &self.ttl)
            .field("qos", &self.qos)
            .field("address_family", &self.address_family)
            .field("source_address", &self.source_address)
            .field("fd4", &self.socket_fd(AddressFamily::Ipv4))
            .field("fd6", &self.socket_fd(AddressFamily::Ipv6))
            .field("errmsg", &self.errors.get_error())
            .field("hosts", &self.hosts)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            ttl: DEFAULT_TTL,
            qos: QOS_UNSET,
            address_family: AddressFamily::Unspecified,
            source_address: None,
            socket_v4: None,
            socket_v6: None,
            errors: ErrorReporter::new(),
            hosts: Vec::new(),
            clock,
            transmit: Box::new(SocketTransmit),
        }
    }

    /// Replaces the `sendto(2)` path used by [`Session::send`].
    pub fn with_transmit(mut self, transmit: Box<dyn Transmit>) -> Self {
        self.transmit = transmit;
        self
    }

    /// Builds a session from stored defaults. Invalid stored values are
    /// reset by the setters and left in [`Session::get_error`].
    pub fn from_config(config: &SessionConfig) -> Self {
        let mut session = Self::new();
        let results = [
            session.set_timeout(config.timeout),
            session.set_ttl(config.ttl),
            session.set_qos(config.qos),
            session.set_address_family(config.address_family.to_raw()),
        ];
        for err in results.into_iter().filter_map(|r| r.err()) {
            warn!("Config value rejected: {}", err);
        }
        session.set_source_address(config.source_address);
        session
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    pub fn qos(&self) -> u8 {
        self.qos
    }

    pub fn address_family(&self) -> AddressFamily {
        self.address_family
    }

    pub fn source_address(&self) -> Option<SocketAddr> {
        self.source_address
    }

    /// Most recent error message, empty if nothing has failed yet.
    pub fn get_error(&self) -> &str {
        self.errors.get_error()
    }

    pub fn set_error_msg(&mut self, function: &str, msg: &str) {
        self.errors.set_error_msg(function, msg);
    }

    pub fn clear_error(&mut self) {
        self.errors.clear();
    }

    pub fn has_socket(&self, family: AddressFamily) -> bool {
        self.socket_fd(family).is_some()
    }

    pub fn socket_fd(&self, family: AddressFamily) -> Option<RawFd> {
        match family {
            AddressFamily::Ipv4 => self.socket_v4.as_ref().map(|s| s.as_raw_fd()),
            AddressFamily::Ipv6 => self.socket_v6.as_ref().map(|s| s.as_raw_fd()),
            AddressFamily::Unspecified => None,
        }
    }

    /// Socket for `family`, opened on first use. Later calls return the same socket.
    pub fn socket(&mut self, family: AddressFamily) -> Result<&Socket> {
        if !self.has_socket(family) {
            let socket = self.open_socket(family)?;
            match family {
                AddressFamily::Ipv4 => self.socket_v4 = Some(socket),
                AddressFamily::Ipv6 => self.socket_v6 = Some(socket),
                AddressFamily::Unspecified => {}
            }
        }

        match family {
            AddressFamily::Ipv4 => self.socket_v4.as_ref(),
            AddressFamily::Ipv6 => self.socket_v6.as_ref(),
            AddressFamily::Unspecified => None,
        }
        .ok_or_else(|| PingError::InvalidArgument("Unknown address family".into()))
    }

    pub fn push_target(&mut self, target: PingTarget) -> TargetId {
        self.hosts.push(target);
        TargetId(self.hosts.len() - 1)
    }

    pub fn target(&self, id: TargetId) -> Option<&PingTarget> {
        self.hosts.get(id.0)
    }

    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut PingTarget> {
        self.hosts.get_mut(id.0)
    }

    pub fn targets(&self) -> &[PingTarget] {
        &self.hosts
    }

    /// Removes a target. Ids of the targets after it shift down by one.
    pub fn remove_target(&mut self, id: TargetId) -> Option<PingTarget> {
        (id.0 < self.hosts.len()).then(|| self.hosts.remove(id.0))
    }
}
