use tracing::debug;

use crate::gap::ConnInfo;
use crate::hci::Phy;
use crate::host::{Error, TxStatus};

use super::{Characteristic, Descriptor, Server};

/// Static passkey reported by the default [`ServerCallbacks::on_passkey_display`].
pub const DEFAULT_PASSKEY: u32 = 123_456;

/// Server event callbacks. All methods are called from the host task and
/// default to logging the event.
#[allow(unused_variables)]
pub trait ServerCallbacks: Send + Sync {
    /// Peer connected.
    fn on_connect(&self, srv: &Server, info: &ConnInfo) {
        debug!("Connected: {}", info.handle);
    }

    /// Peer disconnected.
    fn on_disconnect(&self, srv: &Server, info: &ConnInfo, reason: Error) {
        debug!("Disconnected: {} ({reason})", info.handle);
    }

    /// ATT_MTU changed.
    fn on_mtu_change(&self, mtu: u16, info: &ConnInfo) {
        debug!("MTU changed to {mtu} for {}", info.handle);
    }

    /// Returns the passkey to display during pairing.
    fn on_passkey_display(&self) -> u32 {
        debug!("Using default passkey {DEFAULT_PASSKEY}");
        DEFAULT_PASSKEY
    }

    /// Returns whether the passkey displayed by the peer matches `pin`.
    fn on_confirm_passkey(&self, info: &ConnInfo, pin: u32) -> bool {
        debug!("Accepting passkey {pin} for {}", info.handle);
        true
    }

    /// Pairing or encryption procedure completed.
    fn on_authentication_complete(&self, info: &ConnInfo, status: Result<(), Error>) {
        debug!("Authentication complete for {}: {status:?}", info.handle);
    }

    /// Peer identity address was resolved.
    fn on_identity(&self, info: &ConnInfo) {
        debug!("Identity resolved for {}", info.handle);
    }

    /// Connection parameters were updated.
    fn on_conn_params_update(&self, info: &ConnInfo) {
        debug!("Connection parameters updated for {}", info.handle);
    }

    /// PHY update completed.
    fn on_phy_update(&self, info: &ConnInfo, tx: Phy, rx: Phy) {
        debug!("PHY updated for {}: tx={tx} rx={rx}", info.handle);
    }
}

/// Characteristic event callbacks.
#[allow(unused_variables)]
pub trait CharacteristicCallbacks: Send + Sync {
    /// Peer is reading the value. Called before the value is sent, once per
    /// read procedure.
    fn on_read(&self, chr: &Characteristic, info: &ConnInfo) {
        debug!("Read {}", chr.uuid());
    }

    /// Peer wrote a new value.
    fn on_write(&self, chr: &Characteristic, info: &ConnInfo) {
        debug!("Write {}", chr.uuid());
    }

    /// Notification or indication completed. Indications report only their
    /// final status.
    fn on_status(&self, chr: &Characteristic, status: TxStatus) {
        debug!("Status {}: {status:?}", chr.uuid());
    }

    /// Peer changed its subscription. `sub_value` is 0 for none, 1 for
    /// notifications, 2 for indications, and 3 for both.
    fn on_subscribe(&self, chr: &Characteristic, info: &ConnInfo, sub_value: u16) {
        debug!("Subscribe {}: {sub_value}", chr.uuid());
    }
}

/// Descriptor event callbacks.
#[allow(unused_variables)]
pub trait DescriptorCallbacks: Send + Sync {
    /// Peer is reading the value.
    fn on_read(&self, dsc: &Descriptor, info: &ConnInfo) {
        debug!("Read {}", dsc.uuid());
    }

    /// Peer wrote a new value.
    fn on_write(&self, dsc: &Descriptor, info: &ConnInfo) {
        debug!("Write {}", dsc.uuid());
    }
}

/// Callbacks that use all default implementations.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Defaults;

impl ServerCallbacks for Defaults {}
impl CharacteristicCallbacks for Defaults {}
impl DescriptorCallbacks for Defaults {}
