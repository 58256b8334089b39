//! Sending raw echo buffers and stamping the send time.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use chrono::{DateTime, Utc};
use log::{debug, log_enabled, Level};
use socket2::{SockAddr, Socket};

use crate::{Session, TargetId};
use crate::error::{PingError, Result};
use crate::ping::AddressFamily;

/// Source of send timestamps.
pub trait Clock: Send {
    fn now(&self) -> io::Result<SystemTime>;
}

/// Wall clock read through `clock_gettime(CLOCK_REALTIME)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> io::Result<SystemTime> {
        // SAFETY: an all-zero timespec is valid and `ts` is writable for the call.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) } == -1 {
            return Err(io::Error::last_os_error());
        }
        if ts.tv_sec < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "clock is before the Unix epoch"));
        }
        Ok(UNIX_EPOCH + Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
    }
}

/// Hands a finished buffer to the kernel.
pub trait Transmit: Send {
    fn send_to(&self, socket: &Socket, buf: &[u8], addr: &SockAddr) -> io::Result<usize>;
}

/// `sendto(2)` on the session's socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketTransmit;

impl Transmit for SocketTransmit {
    fn send_to(&self, socket: &Socket, buf: &[u8], addr: &SockAddr) -> io::Result<usize> {
        socket.send_to(buf, addr)
    }
}

/// Unreachable host or network means no reply will come, not that the send failed.
fn is_unreachable(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EHOSTUNREACH) | Some(libc::ENETUNREACH))
}

fn send_outcome(result: io::Result<usize>) -> std::result::Result<usize, io::Error> {
    match result {
        Ok(sent) => Ok(sent),
        Err(e) if is_unreachable(&e) => Ok(0),
        Err(e) => Err(e),
    }
}

impl Session {
    /// Sends `buf` to the target `id` over the socket of the target's family
    /// and returns the number of bytes written.
    ///
    /// The target's send time is stamped right before the send. An
    /// unreachable host or network yields `Ok(0)`.
    pub fn send(&mut self, id: TargetId, buf: &[u8]) -> Result<usize> {
        let Some(target) = self.hosts.get_mut(id.0) else {
            return Err(self.errors.record("send", PingError::InvalidArgument(format!("no target with id {}", id.0))));
        };
        let family = target.address_family;
        let address = target.address;

        match self.clock.now() {
            Ok(now) => target.last_send_time = now,
            Err(e) => {
                target.clear_send_time();
                return Err(self.errors.record("send", PingError::ClockFailure(format!("clock_gettime: {e}"))));
            }
        }

        let opened = self.socket(family).map(|_| ());
        if let Err(e) = opened {
            self.hosts[id.0].clear_send_time();
            return Err(e);
        }
        let socket = match family {
            AddressFamily::Ipv4 => self.socket_v4.as_ref(),
            AddressFamily::Ipv6 => self.socket_v6.as_ref(),
            AddressFamily::Unspecified => None,
        };
        let Some(socket) = socket else {
            return Err(self.errors.record("send", PingError::SendFailed(format!("no open {family} socket"))));
        };

        match send_outcome(self.transmit.send_to(socket, buf, &SockAddr::from(address))) {
            Ok(sent) => {
                if log_enabled!(Level::Debug) {
                    let stamp = DateTime::<Utc>::from(self.hosts[id.0].last_send_time).format("%H:%M:%S%.6f");
                    if sent == 0 {
                        debug!("{} unreachable, nothing sent at {}", address, stamp);
                    } else {
                        debug!("Sent {} bytes to {} at {}", sent, address, stamp);
                    }
                }
                Ok(sent)
            }
            Err(e) => Err(self.errors.record("send", PingError::SendFailed(format!("sendto {address}: {e}")))),
        }
    }
}
