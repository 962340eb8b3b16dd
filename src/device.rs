use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::gap::Addr;
use crate::gatts::{Server, DEFAULT_PASSKEY};
use crate::gattc::Client;
use crate::hci::{ConnHandle, Status};
use crate::host::{Error, Host, PasskeyIo, Result};
use crate::util::name_of;
use crate::{SyncMutex, SyncRwLock};

/// Device configuration.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Maximum number of simultaneous connections. This bounds both the
    /// server peer table and the client pool.
    pub max_connections: usize,
    /// Preferred ATT_MTU reported to the host when it syncs.
    pub att_mtu: u16,
    /// Time allowed for a client to establish a connection.
    pub connect_timeout: Duration,
    /// Static passkey used for pairing. The server asks its callbacks for a
    /// passkey only when this is [`DEFAULT_PASSKEY`].
    pub passkey: u32,
    /// Restart advertising when a server peer disconnects.
    pub advertise_on_disconnect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections: 3,
            att_mtu: 255,
            connect_timeout: Duration::from_secs(30),
            passkey: DEFAULT_PASSKEY,
            advertise_on_disconnect: true,
        }
    }
}

type SyncFn = Arc<dyn Fn() + Send + Sync>;
type ResetFn = Arc<dyn Fn(Error) + Send + Sync>;

/// Host synchronization state shared by the device, the server, and the
/// clients.
#[derive(Default)]
pub(crate) struct HostState {
    synced: AtomicBool,
    on_sync: SyncRwLock<Option<SyncFn>>,
    on_reset: SyncRwLock<Option<ResetFn>>,
}

impl HostState {
    /// Returns whether the host and controller are synced.
    #[inline]
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Marks the host as synced and calls the sync callback.
    pub fn sync(&self) {
        self.synced.store(true, Ordering::Release);
        info!("Host synced");
        let cb = self.on_sync.read().clone();
        if let Some(cb) = cb {
            cb();
        }
    }

    /// Marks the host as reset and calls the reset callback. Repeated resets
    /// without an intervening sync are reported once.
    pub fn reset(&self, reason: Error) {
        if !self.synced.swap(false, Ordering::AcqRel) {
            debug!("Host already reset ({reason})");
            return;
        }
        error!("Host reset: {reason}");
        let cb = self.on_reset.read().clone();
        if let Some(cb) = cb {
            cb(reason);
        }
    }
}

/// Process-wide owner of the host connection, the GATT server, and the
/// client pool.
pub struct Device {
    host: Arc<dyn Host>,
    cfg: Config,
    state: Arc<HostState>,
    server: OnceCell<Arc<Server>>,
    clients: SyncMutex<Vec<Arc<Client>>>,
}

impl Device {
    /// Creates a device over the specified host. The host is expected to
    /// call [`Device::on_sync`] once it is synced with the controller.
    #[must_use]
    pub fn new(host: Arc<dyn Host>, cfg: Config) -> Self {
        Self {
            host,
            cfg,
            state: Arc::default(),
            server: OnceCell::new(),
            clients: SyncMutex::new(Vec::with_capacity(cfg.max_connections)),
        }
    }

    /// Returns the host.
    #[inline(always)]
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Returns the device configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns whether the host and controller are synced.
    #[inline]
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.state.is_synced()
    }

    /// Returns the preferred ATT_MTU used in future exchanges.
    #[inline]
    #[must_use]
    pub fn preferred_mtu(&self) -> u16 {
        self.host.att_preferred_mtu()
    }

    /// Sets the function called when the host syncs.
    pub fn set_sync_callback(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.state.on_sync.write() = Some(Arc::new(f));
    }

    /// Sets the function called when the host resets.
    pub fn set_reset_callback(&self, f: impl Fn(Error) + Send + Sync + 'static) {
        *self.state.on_reset.write() = Some(Arc::new(f));
    }

    /// Handles host synchronization.
    pub fn on_sync(&self) {
        if let Err(e) = self.host.att_set_preferred_mtu(self.cfg.att_mtu) {
            warn!("Failed to set preferred MTU to {}: {e}", self.cfg.att_mtu);
        }
        self.state.sync();
    }

    /// Handles a host reset.
    pub fn on_reset(&self, reason: Error) {
        self.state.reset(reason);
    }

    /// Returns the GATT server, creating it on first call.
    pub fn create_server(&self) -> Arc<Server> {
        Arc::clone(self.server.get_or_init(|| {
            debug!("Creating GATT server");
            Server::new(Arc::clone(&self.host), Arc::clone(&self.state), &self.cfg)
        }))
    }

    /// Returns the GATT server if it was created.
    #[inline]
    #[must_use]
    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.get().cloned()
    }

    /// Creates a client for `peer`. Returns `None` if the client pool is
    /// full.
    pub fn create_client(&self, peer: Addr) -> Option<Arc<Client>> {
        let mut clients = self.clients.lock();
        clients.retain(|c| !c.is_deleted());
        if clients.len() >= self.cfg.max_connections {
            error!("Client pool is full ({} clients)", clients.len());
            return None;
        }
        let c = Client::new(Arc::clone(&self.host), Arc::clone(&self.state), peer, &self.cfg);
        clients.push(Arc::clone(&c));
        Some(c)
    }

    /// Deletes a client. A connected client is disconnected first and
    /// removed from the pool once the disconnect completes. Returns `false`
    /// if the client is not in the pool.
    pub fn delete_client(&self, client: &Arc<Client>) -> bool {
        let mut clients = self.clients.lock();
        let Some(i) = clients.iter().position(|c| Arc::ptr_eq(c, client)) else {
            return false;
        };
        if !client.is_connected() {
            clients.swap_remove(i);
            return true;
        }
        drop(clients);
        client.delete_on_disconnect();
        if let Err(e) = client.disconnect(Status::RemoteUserTerminatedConnection) {
            warn!("Failed to disconnect deleted client: {e}");
        }
        true
    }

    /// Returns the client for the specified connection.
    #[must_use]
    pub fn client_by_handle(&self, conn: ConnHandle) -> Option<Arc<Client>> {
        (self.live_clients().into_iter()).find(|c| c.conn_handle() == Some(conn))
    }

    /// Returns the client for the specified peer address.
    #[must_use]
    pub fn client_by_peer_address(&self, peer: Addr) -> Option<Arc<Client>> {
        (self.live_clients().into_iter()).find(|c| c.peer_address() == peer)
    }

    /// Returns a client that is not connected, which can be reused for a new
    /// connection.
    #[must_use]
    pub fn disconnected_client(&self) -> Option<Arc<Client>> {
        (self.live_clients().into_iter()).find(|c| !c.is_connected())
    }

    /// Returns the number of clients in the pool.
    #[must_use]
    pub fn client_list_size(&self) -> usize {
        self.live_clients().len()
    }

    /// Responds to a passkey entry request.
    pub fn inject_passkey(&self, conn: ConnHandle, passkey: u32) -> Result<()> {
        (self.host.sm_inject_io(conn, PasskeyIo::Input(passkey))).map_err(|e| {
            warn!("Failed to inject passkey for {conn}: {e}");
            e
        })
    }

    /// Responds to a numeric comparison request.
    pub fn inject_confirm_passkey(&self, conn: ConnHandle, accept: bool) -> Result<()> {
        (self.host.sm_inject_io(conn, PasskeyIo::NumericComparison(accept))).map_err(|e| {
            warn!("Failed to inject numeric comparison for {conn}: {e}");
            e
        })
    }

    /// Starts pairing or encryption of the specified connection.
    pub fn start_security(&self, conn: ConnHandle) -> Result<()> {
        self.host.security_initiate(conn)
    }

    fn live_clients(&self) -> Vec<Arc<Client>> {
        let mut clients = self.clients.lock();
        clients.retain(|c| !c.is_deleted());
        clients.clone()
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Device))
            .field("cfg", &self.cfg)
            .field("synced", &self.is_synced())
            .finish_non_exhaustive()
    }
}
