//! Raw ICMP socket creation and kernel-level option handling.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use log::{debug, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::Session;
use crate::error::{PingError, Result};
use crate::ping::{AddressFamily, DEFAULT_TTL, QOS_UNSET};

/// Highest descriptor (exclusive) a `select(2)` based receive loop can watch.
pub const SELECT_FD_LIMIT: i64 = libc::FD_SETSIZE as i64;

/// socket2 has no wrapper for IP_RECVTTL.
fn enable_recv_ttl(socket: &Socket) -> io::Result<()> {
    let on: libc::c_int = 1;
    // SAFETY: the descriptor is owned by `socket` and `on` outlives the call.
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_RECVTTL,
            &on as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn check_fd_limit(fd: RawFd) -> Result<()> {
    if i64::from(fd) >= SELECT_FD_LIMIT {
        return Err(PingError::ResourceLimitExceeded(format!(
            "socket(2) returned file descriptor {fd}, which is above the file descriptor limit for select(2) (FD_SETSIZE = {SELECT_FD_LIMIT})"
        )));
    }
    Ok(())
}

fn apply_qos_to(socket: &Socket, family: AddressFamily, qos: u8) -> Result<()> {
    match family {
        AddressFamily::Ipv4 => socket
            .set_tos(u32::from(qos))
            .map_err(|e| PingError::SocketOptionFailed(format!("setsockopt(IP_TOS): {e}")))?,
        AddressFamily::Ipv6 => socket
            .set_tclass_v6(u32::from(qos))
            .map_err(|e| PingError::SocketOptionFailed(format!("setsockopt(IPV6_TCLASS): {e}")))?,
        AddressFamily::Unspecified => return Ok(()),
    }
    debug!("Applied QoS {:#04x} to {} fd {}", qos, family, socket.as_raw_fd());
    Ok(())
}

fn apply_ttl_to(socket: &Socket, family: AddressFamily, ttl: u32) -> Result<()> {
    match family {
        AddressFamily::Ipv4 => socket
            .set_ttl(ttl)
            .map_err(|e| PingError::SocketOptionFailed(format!("setsockopt(IP_TTL): {e}"))),
        AddressFamily::Ipv6 => socket
            .set_unicast_hops_v6(ttl)
            .map_err(|e| PingError::SocketOptionFailed(format!("setsockopt(IPV6_UNICAST_HOPS): {e}"))),
        AddressFamily::Unspecified => Ok(()),
    }
}

impl Session {
    /// Opens a fresh raw ICMP socket for `family`, bound to the session's
    /// source address when one is set.
    ///
    /// This does not look at sockets the session already holds; use
    /// [`Session::socket`] for the idempotent accessor.
    pub fn open_socket(&mut self, family: AddressFamily) -> Result<Socket> {
        self.try_open_socket(family)
            .map_err(|e| self.errors.record("open_socket", e))
    }

    fn try_open_socket(&self, family: AddressFamily) -> Result<Socket> {
        let (domain, protocol) = match family {
            AddressFamily::Ipv4 => (Domain::IPV4, Protocol::ICMPV4),
            AddressFamily::Ipv6 => (Domain::IPV6, Protocol::ICMPV6),
            AddressFamily::Unspecified => {
                return Err(PingError::InvalidArgument("Unknown address family".into()));
            }
        };

        let socket = Socket::new(domain, Type::RAW, Some(protocol))
            .map_err(|e| PingError::SocketCreateFailed(format!("socket(2) for {family}: {e}")))?;

        // Dropping `socket` on any early return below closes the descriptor.
        check_fd_limit(socket.as_raw_fd())?;

        if let Some(source) = self.source_address {
            socket
                .bind(&SockAddr::from(source))
                .map_err(|e| PingError::BindFailed(format!("bind(2) to {source}: {e}")))?;
        }

        if family == AddressFamily::Ipv4 {
            if let Err(e) = enable_recv_ttl(&socket) {
                warn!("IP_RECVTTL unavailable on fd {}, reply TTL will not be reported: {}", socket.as_raw_fd(), e);
            }
        }

        apply_ttl_to(&socket, family, self.ttl as u32)?;
        if self.qos != QOS_UNSET {
            apply_qos_to(&socket, family, self.qos)?;
        }

        info!("Opened raw {} socket (fd {})", family, socket.as_raw_fd());
        Ok(socket)
    }

    /// Stores `qos` and applies it as type-of-service (IPv4) and traffic
    /// class (IPv6) on every open socket.
    ///
    /// The value is stored before any kernel call, so it survives a failed
    /// application. The IPv6 socket is not touched if IPv4 fails.
    /// [`QOS_UNSET`] is stored without touching any socket, the same way
    /// [`Session::open_socket`] leaves QoS alone while it is unset.
    pub fn set_qos(&mut self, qos: u8) -> Result<()> {
        self.qos = qos;
        if qos == QOS_UNSET {
            return Ok(());
        }
        self.apply_qos().map_err(|e| self.errors.record("set_qos", e))
    }

    fn apply_qos(&self) -> Result<()> {
        if let Some(socket) = &self.socket_v4 {
            apply_qos_to(socket, AddressFamily::Ipv4, self.qos)?;
        }
        if let Some(socket) = &self.socket_v6 {
            apply_qos_to(socket, AddressFamily::Ipv6, self.qos)?;
        }
        Ok(())
    }

    /// Validates `ttl` against `1..=255`, stores it and applies it as TTL
    /// (IPv4) and unicast hop limit (IPv6) on every open socket.
    ///
    /// An out-of-range value resets the stored TTL to the default.
    pub fn set_ttl(&mut self, ttl: i64) -> Result<()> {
        if !(1..=255).contains(&ttl) {
            self.ttl = DEFAULT_TTL;
            return Err(self.errors.record(
                "set_ttl",
                PingError::InvalidArgument(format!("TTL {ttl} is outside 1..=255")),
            ));
        }

        self.ttl = ttl;
        self.apply_ttl().map_err(|e| self.errors.record("set_ttl", e))
    }

    fn apply_ttl(&self) -> Result<()> {
        let ttl = self.ttl as u32;
        if let Some(socket) = &self.socket_v4 {
            apply_ttl_to(socket, AddressFamily::Ipv4, ttl)?;
        }
        if let Some(socket) = &self.socket_v6 {
            apply_ttl_to(socket, AddressFamily::Ipv6, ttl)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fd_limit_rejects_descriptor_at_capacity() {
        let err = check_fd_limit(SELECT_FD_LIMIT as RawFd).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);
        assert!(check_fd_limit(3).is_ok());
    }

    #[test]
    fn open_socket_rejects_unspecified_family() {
        let mut session = Session::new();
        let err = session.open_socket(AddressFamily::Unspecified).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(session.get_error(), "open_socket: Unknown address family");
    }

    #[test]
    fn invalid_ttl_resets_to_default() {
        let mut session = Session::new();
        session.set_ttl(64).unwrap();
        assert_eq!(session.ttl(), 64);

        for bad in [0, -1, 256, 1000] {
            session.set_ttl(64).unwrap();
            let err = session.set_ttl(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert_eq!(session.ttl(), DEFAULT_TTL);
        }
        assert!(session.get_error().starts_with("set_ttl: "));
    }

    #[test]
    fn qos_without_sockets_is_stored_only() {
        let mut session = Session::new();
        session.set_qos(0x10).unwrap();
        assert_eq!(session.qos(), 0x10);
        assert_eq!(session.get_error(), "");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn stored_qos_survives_failed_application() {
        // IP_TOS is not an AF_UNIX option, so the kernel rejects it.
        let mut session = Session::new();
        session.socket_v4 = Some(Socket::new(Domain::UNIX, Type::DGRAM, None).unwrap());
        let v6 = match Socket::new(Domain::IPV6, Type::DGRAM, None) {
            Ok(socket) => Some(socket),
            Err(_) => None,
        };
        let v6_tclass = v6.as_ref().map(|s| s.tclass_v6().unwrap());
        session.socket_v6 = v6;

        let err = session.set_qos(0x20).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SocketOptionFailed);
        assert_eq!(session.qos(), 0x20);
        assert!(session.get_error().starts_with("set_qos: setsockopt(IP_TOS): "));

        // The IPv6 socket is not attempted after the IPv4 failure.
        if let (Some(socket), Some(before)) = (&session.socket_v6, v6_tclass) {
            assert_eq!(socket.tclass_v6().unwrap(), before);
        }
    }

    #[test]
    fn unset_qos_leaves_open_socket_alone() {
        let mut session = Session::new();
        session.socket_v4 = Some(Socket::new(Domain::IPV4, Type::DGRAM, None).unwrap());

        session.set_qos(0x10).unwrap();
        assert_eq!(session.socket_v4.as_ref().unwrap().tos().unwrap(), 0x10);

        session.set_qos(QOS_UNSET).unwrap();
        assert_eq!(session.qos(), QOS_UNSET);
        assert_eq!(session.socket_v4.as_ref().unwrap().tos().unwrap(), 0x10);
    }
}
