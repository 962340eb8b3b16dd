use std::sync::Arc;

use tracing::debug;

use crate::gap::{ConnInfo, ConnParams};
use crate::gatts::DEFAULT_PASSKEY;
use crate::hci::Phy;
use crate::host::Error;

use super::{Client, RemoteCharacteristic};

/// Handler of notifications and indications received for a subscribed
/// characteristic. The arguments are the characteristic, the received value,
/// and whether it was a notification (`true`) or an indication (`false`).
pub type NotifyCallback = Arc<dyn Fn(&RemoteCharacteristic, &[u8], bool) + Send + Sync>;

/// Client event callbacks. All methods are called from the host task except
/// `on_connect` and `on_connect_fail` for a blocking [`Client::connect`],
/// which are called from the connecting task.
#[allow(unused_variables)]
pub trait ClientCallbacks: Send + Sync {
    /// Connection established.
    fn on_connect(&self, client: &Client) {
        debug!("Client connected to {}", client.peer_address());
    }

    /// Connection attempt failed.
    fn on_connect_fail(&self, client: &Client, reason: Error) {
        debug!("Client failed to connect to {}: {reason}", client.peer_address());
    }

    /// Connection terminated.
    fn on_disconnect(&self, client: &Client, reason: Error) {
        debug!("Client disconnected from {}: {reason}", client.peer_address());
    }

    /// Peer requested new connection parameters. Returns whether to accept
    /// them.
    fn on_conn_params_update_request(&self, client: &Client, params: &ConnParams) -> bool {
        debug!("Accepting connection parameters {params:?}");
        true
    }

    /// Returns the passkey displayed by the peer.
    fn on_passkey_entry(&self, info: &ConnInfo) -> u32 {
        debug!("Entering default passkey for {}", info.handle);
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

    /// ATT_MTU changed.
    fn on_mtu_change(&self, client: &Client, mtu: u16) {
        debug!("Client MTU changed to {mtu}");
    }

    /// PHY update completed.
    fn on_phy_update(&self, client: &Client, tx: Phy, rx: Phy) {
        debug!("Client PHY updated: tx={tx} rx={rx}");
    }
}

/// Client callbacks that use all default implementations.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct Defaults;

impl ClientCallbacks for Defaults {}
