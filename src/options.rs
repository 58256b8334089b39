use std::net::SocketAddr;
use log::debug;

use crate::Session;
use crate::error::{PingError, Result};
use crate::ping::{AddressFamily, DEFAULT_TIMEOUT, QOS_UNSET};

/// Numeric option tags accepted by [`Session::set_option_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionTag {
    Timeout = 0x01,
    Ttl = 0x02,
    AddressFamily = 0x04,
    Qos = 0x40,
}

impl OptionTag {
    pub fn from_raw(tag: i32) -> Option<Self> {
        match tag {
            0x01 => Some(OptionTag::Timeout),
            0x02 => Some(OptionTag::Ttl),
            0x04 => Some(OptionTag::AddressFamily),
            0x40 => Some(OptionTag::Qos),
            _ => None,
        }
    }
}

/// A single configuration change, carrying only the value its option needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionOption {
    Qos(u8),
    Timeout(f64),
    Ttl(i64),
    /// Raw `AF_*` value; anything but `AF_UNSPEC`, `AF_INET` and `AF_INET6` is rejected.
    AddressFamily(i32),
}

impl SessionOption {
    /// Coerces a numeric `value` to the type `tag` expects. QoS is range
    /// checked by [`Session::set_option_raw`] before this cast.
    pub fn from_tag(tag: OptionTag, value: f64) -> Self {
        match tag {
            OptionTag::Qos => SessionOption::Qos(value as u8),
            OptionTag::Timeout => SessionOption::Timeout(value),
            OptionTag::Ttl => SessionOption::Ttl(value as i64),
            OptionTag::AddressFamily => SessionOption::AddressFamily(value as i32),
        }
    }
}

impl Session {
    pub fn set_option(&mut self, option: SessionOption) -> Result<()> {
        debug!("set_option {:?}", option);
        match option {
            SessionOption::Qos(qos) => self.set_qos(qos),
            SessionOption::Timeout(timeout) => self.set_timeout(timeout),
            SessionOption::Ttl(ttl) => self.set_ttl(ttl),
            SessionOption::AddressFamily(family) => self.set_address_family(family),
        }
    }

    /// Numeric entry point: unknown tags fail without touching any state.
    ///
    /// A QoS value must be a whole number in `0..=255`; anything else resets
    /// the stored QoS to [`QOS_UNSET`] and fails with `InvalidArgument`.
    pub fn set_option_raw(&mut self, tag: i32, value: f64) -> Result<()> {
        let Some(tag) = OptionTag::from_raw(tag) else {
            return Err(self.errors.record("set_option", PingError::UnknownOption(tag)));
        };
        if tag == OptionTag::Qos && !(value.fract() == 0.0 && (0.0..=255.0).contains(&value)) {
            self.qos = QOS_UNSET;
            return Err(self.errors.record(
                "set_qos",
                PingError::InvalidArgument(format!("QoS {value} is not a byte value")),
            ));
        }
        self.set_option(SessionOption::from_tag(tag, value))
    }

    /// Timeout is only enforced by the receive loop; no socket is touched.
    pub fn set_timeout(&mut self, timeout: f64) -> Result<()> {
        if timeout.is_nan() || timeout < 0.0 {
            self.timeout = DEFAULT_TIMEOUT;
            return Err(self.errors.record(
                "set_timeout",
                PingError::InvalidArgument(format!("timeout {timeout} must not be negative")),
            ));
        }
        self.timeout = timeout;
        Ok(())
    }

    pub fn set_address_family(&mut self, family: i32) -> Result<()> {
        match AddressFamily::from_raw(family) {
            Some(family) => {
                self.address_family = family;
                Ok(())
            }
            None => {
                self.address_family = AddressFamily::Unspecified;
                Err(self.errors.record(
                    "set_address_family",
                    PingError::InvalidArgument(format!("unsupported address family {family}")),
                ))
            }
        }
    }

    /// Source address for sockets opened from now on. Already open sockets keep their binding.
    pub fn set_source_address(&mut self, source: Option<SocketAddr>) {
        self.source_address = source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ping::DEFAULT_TTL;

    #[test]
    fn negative_timeout_resets_to_default() {
        let mut session = Session::new();
        session.set_option(SessionOption::Timeout(2.5)).unwrap();
        assert_eq!(session.timeout(), 2.5);

        for bad in [-0.001, -1.0, -1e9, f64::NAN] {
            session.set_option(SessionOption::Timeout(4.0)).unwrap();
            let err = session.set_option(SessionOption::Timeout(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert_eq!(session.timeout(), DEFAULT_TIMEOUT);
        }
    }

    #[test]
    fn zero_timeout_is_accepted() {
        let mut session = Session::new();
        session.set_timeout(0.0).unwrap();
        assert_eq!(session.timeout(), 0.0);
    }

    #[test]
    fn ttl_range_is_inclusive() {
        let mut session = Session::new();
        for ttl in [1, 2, 128, 254, 255] {
            session.set_option(SessionOption::Ttl(ttl)).unwrap();
            assert_eq!(session.ttl(), ttl);
        }
    }

    #[test]
    fn unknown_family_resets_to_unspecified() {
        let mut session = Session::new();
        session.set_option(SessionOption::AddressFamily(libc::AF_INET6)).unwrap();
        assert_eq!(session.address_family(), AddressFamily::Ipv6);

        let err = session.set_option(SessionOption::AddressFamily(libc::AF_UNIX)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(session.address_family(), AddressFamily::Unspecified);
    }

    #[test]
    fn raw_tags_dispatch_with_coercion() {
        let mut session = Session::new();
        session.set_option_raw(OptionTag::Ttl as i32, 64.0).unwrap();
        session.set_option_raw(OptionTag::Timeout as i32, 0.25).unwrap();
        session.set_option_raw(OptionTag::AddressFamily as i32, f64::from(libc::AF_INET)).unwrap();
        session.set_option_raw(OptionTag::Qos as i32, 46.0).unwrap();

        assert_eq!(session.ttl(), 64);
        assert_eq!(session.timeout(), 0.25);
        assert_eq!(session.address_family(), AddressFamily::Ipv4);
        assert_eq!(session.qos(), 46);
    }

    #[test]
    fn unknown_tag_leaves_state_alone() {
        let mut session = Session::new();
        let err = session.set_option_raw(0x7f, 3.0).unwrap_err();
        assert_eq!(err, PingError::UnknownOption(0x7f));
        assert_eq!(session.get_error(), "set_option: unknown option tag 127");
        assert_eq!(session.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(session.ttl(), DEFAULT_TTL);
        assert_eq!(session.qos(), QOS_UNSET);
        assert_eq!(session.address_family(), AddressFamily::Unspecified);
    }

    #[test]
    fn successful_call_keeps_previous_error() {
        let mut session = Session::new();
        let _ = session.set_timeout(-1.0);
        session.set_timeout(3.0).unwrap();
        assert!(session.get_error().starts_with("set_timeout: "));
    }

    #[test]
    fn raw_qos_outside_byte_range_is_rejected() {
        let mut session = Session::new();
        for bad in [300.0, 256.0, -1.0, 1.5, f64::NAN, f64::INFINITY] {
            session.set_qos(0x10).unwrap();
            let err = session.set_option_raw(OptionTag::Qos as i32, bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert_eq!(session.qos(), QOS_UNSET);
            assert!(session.get_error().starts_with("set_qos: "));
        }

        session.set_option_raw(OptionTag::Qos as i32, 0.0).unwrap();
        assert_eq!(session.qos(), 0);
        session.set_option_raw(OptionTag::Qos as i32, 255.0).unwrap();
        assert_eq!(session.qos(), QOS_UNSET);
    }
}
