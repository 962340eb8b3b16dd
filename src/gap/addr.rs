use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Bluetooth device address ([Vol 6] Part B, Section 1.3).
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum::Display)]
pub enum Addr {
    Public(RawAddr),
    Random(RawAddr),
}

impl Addr {
    /// Constructs an address from the host's type code and raw components.
    /// Returns `None` for unknown address types.
    #[inline]
    #[must_use]
    pub const fn from_type(typ: u8, raw: RawAddr) -> Option<Self> {
        // [Vol 4] Part E, Sections 7.7.65.1 and 7.7.65.10
        match typ {
            // Public Device Address or Public Identity Address
            0x00 | 0x02 => Some(Self::Public(raw)),
            // Random Device Address or Random (Static) Identity Address
            0x01 | 0x03 => Some(Self::Random(raw)),
            _ => None,
        }
    }

    /// Returns the host's type code for the address.
    #[inline]
    #[must_use]
    pub const fn typ(self) -> u8 {
        match self {
            Self::Public(_) => 0x00,
            Self::Random(_) => 0x01,
        }
    }

    /// Returns the raw 48-bit address.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> RawAddr {
        match self {
            Self::Public(addr) | Self::Random(addr) => addr,
        }
    }

    /// Returns whether the address is all zeros.
    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.raw() == RawAddr::default()
    }
}

impl Default for Addr {
    #[inline]
    fn default() -> Self {
        Self::Public(RawAddr::default())
    }
}

/// 48-bit untyped device address stored in little-endian byte order.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct RawAddr([u8; 6]);

impl From<[u8; 6]> for RawAddr {
    #[inline]
    fn from(v: [u8; 6]) -> Self {
        Self(v)
    }
}

impl AsRef<[u8]> for RawAddr {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl FromStr for RawAddr {
    type Err = ParseAddrError;

    /// Parses the `"XX:XX:XX:XX:XX:XX"` form, most significant byte first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut v = [0; 6];
        let mut it = s.split(':');
        for b in v.iter_mut().rev() {
            let p = it.next().filter(|p| p.len() == 2);
            *b = (p.and_then(|p| u8::from_str_radix(p, 16).ok()))
                .ok_or_else(|| ParseAddrError(s.to_owned()))?;
        }
        match it.next() {
            None => Ok(Self(v)),
            Some(_) => Err(ParseAddrError(s.to_owned())),
        }
    }
}

impl Debug for RawAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // [Vol 3] Part C, Section 3.2.1.3
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl Display for RawAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Error returned when an address string cannot be parsed.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid device address {0:?}")]
pub struct ParseAddrError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let a: RawAddr = "C0:FF:EE:00:11:22".parse().unwrap();
        assert_eq!(a.as_ref(), &[0x22, 0x11, 0x00, 0xEE, 0xFF, 0xC0]);
        assert_eq!(a.to_string(), "C0:FF:EE:00:11:22");
        assert!("C0:FF:EE:00:11".parse::<RawAddr>().is_err());
        assert!("C0:FF:EE:00:11:22:33".parse::<RawAddr>().is_err());
        assert!("C0:FF:EE:00:11:2G".parse::<RawAddr>().is_err());
        assert_eq!(Addr::from_type(3, a), Some(Addr::Random(a)));
        assert_eq!(Addr::from_type(4, a), None);
        assert!(Addr::default().is_null());
    }
}
