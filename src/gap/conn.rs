use std::time::Duration;

use serde::Deserialize;

use crate::att;
use crate::hci::ConnHandle;

use super::Addr;

/// Local role in a connection.
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display)]
pub enum Role {
    #[default]
    Central,
    Peripheral,
}

/// Connection state snapshot reported by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnInfo {
    /// Connection handle.
    pub handle: ConnHandle,
    /// Over-the-air peer address.
    pub peer_ota_addr: Addr,
    /// Peer identity address, which differs from the over-the-air address
    /// once a resolvable private address is resolved.
    pub peer_id_addr: Addr,
    /// Local role.
    pub role: Role,
    /// Connection interval in 1.25 ms units.
    pub interval: u16,
    /// Peripheral latency in connection events.
    pub latency: u16,
    /// Supervision timeout in 10 ms units.
    pub supervision_timeout: u16,
    /// Negotiated ATT_MTU.
    pub mtu: u16,
    pub encrypted: bool,
    pub authenticated: bool,
    pub bonded: bool,
    /// Encryption key size in bytes.
    pub key_size: u8,
}

impl ConnInfo {
    /// Returns connection info for a new unencrypted link.
    #[inline]
    #[must_use]
    pub fn new(handle: ConnHandle, peer: Addr, role: Role) -> Self {
        Self {
            handle,
            peer_ota_addr: peer,
            peer_id_addr: peer,
            role,
            interval: 0,
            latency: 0,
            supervision_timeout: 0,
            mtu: att::DEFAULT_MTU,
            encrypted: false,
            authenticated: false,
            bonded: false,
            key_size: 0,
        }
    }

    /// Returns the supervision timeout as a `Duration`.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.supervision_timeout) * 10)
    }
}

/// Preferred connection parameters ([Vol 4] Part E, Section 7.8.12).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ConnParams {
    /// Scan interval in 0.625 ms units used while connecting.
    pub scan_interval: u16,
    /// Scan window in 0.625 ms units used while connecting.
    pub scan_window: u16,
    /// Minimum connection interval in 1.25 ms units.
    pub min_interval: u16,
    /// Maximum connection interval in 1.25 ms units.
    pub max_interval: u16,
    /// Peripheral latency in connection events.
    pub latency: u16,
    /// Supervision timeout in 10 ms units.
    pub supervision_timeout: u16,
    /// Minimum connection event length in 0.625 ms units.
    pub min_ce_len: u16,
    /// Maximum connection event length in 0.625 ms units.
    pub max_ce_len: u16,
}

impl ConnParams {
    /// Returns whether the parameters are within the ranges allowed by
    /// [Vol 4] Part E, Section 7.8.12.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let itvl = 0x0006..=0x0C80;
        itvl.contains(&self.min_interval)
            && itvl.contains(&self.max_interval)
            && self.min_interval <= self.max_interval
            && self.latency <= 0x01F3
            && (0x000A..=0x0C80).contains(&self.supervision_timeout)
            && (0x0004..=0x4000).contains(&self.scan_interval)
            && (0x0004..=self.scan_interval).contains(&self.scan_window)
    }
}

impl Default for ConnParams {
    fn default() -> Self {
        Self {
            scan_interval: 16,
            scan_window: 16,
            min_interval: 24,
            max_interval: 40,
            latency: 0,
            supervision_timeout: 256,
            min_ce_len: 16,
            max_ce_len: 768,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_params() {
        let mut p = ConnParams::default();
        assert!(p.is_valid());
        p.min_interval = p.max_interval + 1;
        assert!(!p.is_valid());
        p = ConnParams {
            scan_window: 17,
            ..ConnParams::default()
        };
        assert!(!p.is_valid());
    }
}
