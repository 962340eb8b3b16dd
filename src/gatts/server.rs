use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::att::{ErrorCode, Handle, HandleRange};
use crate::device::{Config, HostState};
use crate::gap::{ConnInfo, ConnParams, Uuid};
use crate::hci::{ConnHandle, Status};
use crate::host::{
    Access, AttrId, Error, GapEvent, GapHandler, GapReply, Host, HsError, PasskeyAction,
    PasskeyIo, Result,
};
use crate::util::name_of;
use crate::{SyncMutex, SyncRwLock};

use super::*;

/// Attribute object registered with the host under an [`AttrId`].
#[derive(Clone, Debug)]
pub(super) enum LocalAttr {
    Chr(Arc<Characteristic>),
    Dsc(Arc<Descriptor>),
}

/// GATT server. There is one per [`Device`](crate::Device).
///
/// The host delivers attribute accesses to [`Server::handle_access`] and GAP
/// events for connections established by advertising to the server's
/// [`GapHandler`] implementation.
pub struct Server {
    this: Weak<Self>,
    host: Arc<dyn Host>,
    state: Arc<HostState>,
    passkey: u32,
    svcs: SyncRwLock<Vec<Arc<Service>>>,
    peers: SyncMutex<Vec<Option<ConnHandle>>>,
    by_id: SyncRwLock<HashMap<AttrId, LocalAttr>>,
    by_handle: SyncRwLock<HashMap<Handle, Arc<Characteristic>>>,
    started: AtomicBool,
    changed: AtomicBool,
    adv_on_disconnect: AtomicBool,
    cb: SyncRwLock<Arc<dyn ServerCallbacks>>,
}

impl Server {
    /// Creates a new server with an empty database.
    pub(crate) fn new(host: Arc<dyn Host>, state: Arc<HostState>, cfg: &Config) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            host,
            state,
            passkey: cfg.passkey,
            svcs: SyncRwLock::new(Vec::new()),
            peers: SyncMutex::new(vec![None; cfg.max_connections.max(1)]),
            by_id: SyncRwLock::new(HashMap::new()),
            by_handle: SyncRwLock::new(HashMap::new()),
            started: AtomicBool::new(false),
            changed: AtomicBool::new(false),
            adv_on_disconnect: AtomicBool::new(cfg.advertise_on_disconnect),
            cb: SyncRwLock::new(Arc::new(Defaults)),
        })
    }

    /// Sets the server event callbacks.
    #[inline]
    pub fn set_callbacks(&self, cb: Arc<dyn ServerCallbacks>) {
        *self.cb.write() = cb;
    }

    /// Returns whether the GATT server is started.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Returns whether the database changed after the server was started and
    /// must be rebuilt.
    #[inline]
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    /// Creates a primary service. Duplicate UUIDs are allowed and resolved by
    /// index in [`Self::service_by_uuid`].
    pub fn create_service(&self, uuid: Uuid) -> Arc<Service> {
        if self.service(uuid).is_some() {
            warn!("Creating a duplicate service {uuid}");
        }
        let svc = Service::new(uuid);
        svc.set_server(Weak::clone(&self.this));
        self.svcs.write().push(Arc::clone(&svc));
        self.service_changed();
        svc
    }

    /// Adds a detached or previously removed service.
    pub fn add_service(&self, svc: &Arc<Service>) {
        let mut svcs = self.svcs.write();
        if !svcs.iter().any(|s| Arc::ptr_eq(s, svc)) {
            if svcs.iter().any(|s| s.uuid() == svc.uuid()) {
                warn!("Adding a duplicate service {}", svc.uuid());
            }
            svcs.push(Arc::clone(svc));
        }
        drop(svcs);
        svc.set_server(Weak::clone(&self.this));
        svc.set_removal(Removal::Live);
        self.service_changed();
    }

    /// Removes a service. A registered service is hidden from peers
    /// immediately and dropped or kept hidden when the database is rebuilt.
    /// Returns `false` if the host refused to hide it.
    pub fn remove_service(&self, svc: &Arc<Service>, delete: bool) -> bool {
        let mut svcs = self.svcs.write();
        let Some(i) = svcs.iter().position(|s| Arc::ptr_eq(s, svc)) else {
            return true;
        };
        let Some(hdl) = svc.handle() else {
            if delete {
                svcs.remove(i);
            } else {
                svc.set_removal(Removal::Hidden);
            }
            return true;
        };
        drop(svcs);
        if svc.removal() == Removal::PendingDelete {
            return true;
        }
        if let Err(e) = self.host.gatts_svc_set_visibility(hdl, false) {
            warn!("Failed to hide service {}: {e}", svc.uuid());
            return false;
        }
        svc.set_removal(Removal::of(delete));
        self.service_changed();
        true
    }

    /// Returns the first service with the specified UUID.
    #[inline]
    #[must_use]
    pub fn service(&self, uuid: Uuid) -> Option<Arc<Service>> {
        self.service_by_uuid(uuid, 0)
    }

    /// Returns the `i`th service with the specified UUID.
    #[must_use]
    pub fn service_by_uuid(&self, uuid: Uuid, i: usize) -> Option<Arc<Service>> {
        (self.svcs.read().iter())
            .filter(|s| s.uuid() == uuid)
            .nth(i)
            .cloned()
    }

    /// Returns all services with the specified UUID.
    #[must_use]
    pub fn services_by_uuid(&self, uuid: Uuid) -> Vec<Arc<Service>> {
        (self.svcs.read().iter())
            .filter(|s| s.uuid() == uuid)
            .cloned()
            .collect()
    }

    /// Returns the service with the specified declaration handle.
    #[must_use]
    pub fn service_by_handle(&self, hdl: Handle) -> Option<Arc<Service>> {
        (self.svcs.read().iter())
            .find(|s| s.handle() == Some(hdl))
            .cloned()
    }

    /// Returns all services.
    #[must_use]
    pub fn services(&self) -> Vec<Arc<Service>> {
        self.svcs.read().clone()
    }

    /// Returns the registered characteristic with the specified value handle.
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Arc<Characteristic>> {
        self.by_handle.read().get(&hdl).cloned()
    }

    /// Starts the GATT server. Services that are not yet registered are
    /// started first. A service that fails to register is skipped with a
    /// warning.
    pub fn start(&self) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        let svcs = self.services();
        for s in svcs.iter().filter(|s| s.removal() != Removal::PendingDelete) {
            if !s.is_started() {
                s.start();
            }
        }
        if let Err(e) = self.host.gatts_start() {
            error!("Failed to start GATT server: {e}");
            return Err(e);
        }
        let mut by_handle = HashMap::new();
        for s in svcs.iter().filter(|s| s.is_started()) {
            let h = match self.host.gatts_find_svc(s.uuid()) {
                Ok(h) => h,
                Err(e) => {
                    warn!("GATT server started without service {}: {e}", s.uuid());
                    continue;
                }
            };
            s.set_handle(h);
            if s.removal() == Removal::Hidden {
                if let Err(e) = self.host.gatts_svc_set_visibility(h, false) {
                    warn!("Failed to hide service {}: {e}", s.uuid());
                }
            }
            for c in s.characteristics() {
                if let Some(h) = c.handle() {
                    by_handle.insert(h, Arc::clone(&c));
                }
                for d in c.descriptors().iter().filter(|d| d.removal().is_live()) {
                    match self.host.gatts_find_dsc(s.uuid(), c.uuid(), d.uuid()) {
                        Ok(h) => d.set_handle(Some(h)),
                        Err(e) => debug!("Descriptor {} has no handle: {e}", d.uuid()),
                    }
                }
            }
        }
        *self.by_handle.write() = by_handle;
        if self.changed.swap(false, Ordering::AcqRel) {
            self.host.gatts_svc_changed(HandleRange::ALL);
        }
        self.started.store(true, Ordering::Release);
        info!("GATT server started");
        Ok(())
    }

    /// Starts advertising, rebuilding the database first if it changed and
    /// no peers are connected.
    pub fn start_advertising(&self, duration: Option<Duration>) -> bool {
        if self.is_changed() && self.connected_count() == 0 && !self.reset_gatt() {
            return false;
        }
        if self.start().is_err() {
            return false;
        }
        let Some(this) = self.this.upgrade() else {
            return false;
        };
        match self.host.gap_adv_start(duration, this) {
            Ok(()) | Err(Error::Host(HsError::Already)) => true,
            Err(e) => {
                warn!("Failed to start advertising: {e}");
                false
            }
        }
    }

    /// Returns whether advertising is active.
    #[inline]
    #[must_use]
    pub fn is_advertising(&self) -> bool {
        self.host.gap_adv_active()
    }

    /// Sets whether advertising restarts automatically when a peer
    /// disconnects.
    #[inline]
    pub fn advertise_on_disconnect(&self, enable: bool) {
        self.adv_on_disconnect.store(enable, Ordering::Release);
    }

    /// Terminates a connection. Returns `true` if the connection is closed or
    /// closing.
    pub fn disconnect(&self, conn: ConnHandle, reason: Status) -> bool {
        match self.host.gap_terminate(conn, reason) {
            Ok(()) | Err(Error::Host(HsError::NotConnected | HsError::Already)) => true,
            Err(e) => {
                error!("Failed to terminate {conn}: {e}");
                false
            }
        }
    }

    /// Returns the number of connected peers.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.peers.lock().iter().flatten().count()
    }

    /// Returns the handles of connected peers.
    #[inline]
    #[must_use]
    pub fn peer_devices(&self) -> Vec<ConnHandle> {
        self.peers()
    }

    /// Returns connection information for the `i`th connected peer.
    #[must_use]
    pub fn peer_info(&self, i: usize) -> Option<ConnInfo> {
        let cn = self.peers().get(i).copied()?;
        self.host.conn_find(cn)
    }

    /// Returns connection information for a connected peer.
    #[must_use]
    pub fn peer_info_by_handle(&self, conn: ConnHandle) -> Option<ConnInfo> {
        self.host.conn_find(conn)
    }

    /// Returns the negotiated ATT_MTU of a connection or 0 if it is not open.
    #[inline]
    #[must_use]
    pub fn peer_mtu(&self, conn: ConnHandle) -> u16 {
        self.host.att_mtu(conn)
    }

    /// Requests new connection parameters.
    pub fn update_conn_params(&self, conn: ConnHandle, p: &ConnParams) -> bool {
        (self.host.gap_update_params(conn, p))
            .map_err(|e| warn!("Failed to update connection parameters for {conn}: {e}"))
            .is_ok()
    }

    /// Sets the preferred number of payload octets per LL packet. The
    /// transmit time is derived for the 1M PHY.
    pub fn set_data_len(&self, conn: ConnHandle, tx_octets: u16) -> bool {
        let tx_time = (tx_octets.clamp(27, 251) + 14) * 8;
        (self.host.gap_set_data_len(conn, tx_octets, tx_time))
            .map_err(|e| warn!("Failed to set data length for {conn}: {e}"))
            .is_ok()
    }

    /// Dispatches a host access to the attribute registered under `arg`.
    /// `attr` is the accessed handle and `conn` is `None` for local accesses.
    pub fn handle_access(
        &self,
        conn: Option<ConnHandle>,
        attr: Handle,
        arg: AttrId,
        ctxt: &mut Access<'_>,
    ) -> std::result::Result<(), ErrorCode> {
        trace!("{:?} {attr} ({arg:?}) from {conn:?}", ctxt.op);
        let Some(la) = self.by_id.read().get(&arg).cloned() else {
            warn!("Access to unknown attribute {attr} ({arg:?})");
            return Err(ErrorCode::InvalidHandle);
        };
        let info = conn.and_then(|cn| self.host.conn_find(cn));
        match la {
            LocalAttr::Chr(c) => c.serve(info.as_ref(), ctxt),
            LocalAttr::Dsc(d) => d.serve(info.as_ref(), ctxt),
        }
    }

    #[inline(always)]
    pub(super) fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Marks the database as changed if the server is already started.
    pub(super) fn service_changed(&self) {
        if self.is_started() {
            self.changed.store(true, Ordering::Release);
        }
    }

    /// Records an attribute registered with the host.
    pub(super) fn register(&self, la: LocalAttr) {
        let id = match la {
            LocalAttr::Chr(ref c) => c.id(),
            LocalAttr::Dsc(ref d) => d.id(),
        };
        self.by_id.write().insert(id, la);
    }

    /// Returns the handles of connected peers.
    pub(super) fn peers(&self) -> Vec<ConnHandle> {
        self.peers.lock().iter().flatten().copied().collect()
    }

    /// Resets the host database and registers the current tree again.
    /// Refused while any peer is connected.
    pub(crate) fn reset_gatt(&self) -> bool {
        let n = self.connected_count();
        if n > 0 {
            debug!("Database rebuild deferred until {n} peer(s) disconnect");
            return false;
        }
        if let Err(e) = self.host.gap_adv_stop() {
            trace!("Advertising not stopped: {e}");
        }
        if let Err(e) = self.host.gatts_reset() {
            warn!("Failed to reset GATT server: {e}");
            return false;
        }
        self.host.gatts_init_builtin();
        self.by_id.write().clear();
        self.by_handle.write().clear();
        self.svcs.write().retain(|s| {
            s.purge();
            s.removal() != Removal::PendingDelete
        });
        self.started.store(false, Ordering::Release);
        info!("Rebuilding GATT database");
        self.start().is_ok()
    }

    fn callbacks(&self) -> Arc<dyn ServerCallbacks> {
        Arc::clone(&self.cb.read())
    }

    fn conn_info(&self, conn: ConnHandle) -> Option<ConnInfo> {
        let info = self.host.conn_find(conn);
        if info.is_none() {
            debug!("No connection info for {conn}");
        }
        info
    }

    fn on_connect(&self, conn: ConnHandle) {
        let mut peers = self.peers.lock();
        let Some(slot) = peers.iter_mut().find(|p| p.is_none()) else {
            drop(peers);
            error!("Peer table is full, terminating {conn}");
            self.disconnect(conn, Status::RemoteDeviceTerminatedConnectionDueToLowResources);
            return;
        };
        *slot = Some(conn);
        drop(peers);
        if let Some(info) = self.conn_info(conn) {
            self.callbacks().on_connect(self, &info);
        }
    }

    fn on_disconnect(&self, info: &ConnInfo, reason: Error) {
        if reason.is_host_reset() {
            error!("Host reset, disconnect reason: {reason}");
            self.state.reset(reason);
        }
        let cn = info.handle;
        for p in self.peers.lock().iter_mut().filter(|p| **p == Some(cn)) {
            *p = None;
        }
        let chrs: Vec<_> = self.by_handle.read().values().cloned().collect();
        for c in chrs {
            c.subscribe(cn, false, false);
        }
        if self.is_changed() {
            self.reset_gatt();
        }
        self.callbacks().on_disconnect(self, info, reason);
        if self.adv_on_disconnect.load(Ordering::Acquire) && self.state.is_synced() {
            self.start_advertising(None);
        }
    }

    fn on_subscribe(&self, conn: ConnHandle, attr: Handle, notify: bool, indicate: bool) {
        let Some(chr) = self.characteristic_by_handle(attr) else {
            trace!("Subscription to unmanaged attribute {attr}");
            return;
        };
        let Some(info) = self.conn_info(conn) else {
            return;
        };
        if (notify || indicate) && chr.props().read_secured() && !info.encrypted {
            if let Err(e) = self.host.security_initiate(conn) {
                warn!("Failed to secure {conn} for {}: {e}", chr.uuid());
            }
        }
        let v = chr.subscribe(conn, notify, indicate);
        chr.on_subscribe(&info, v);
    }

    fn on_passkey_action(&self, conn: ConnHandle, action: PasskeyAction) {
        let io = match action {
            PasskeyAction::Display => {
                let mut pk = self.passkey;
                if pk == DEFAULT_PASSKEY {
                    pk = self.callbacks().on_passkey_display();
                }
                PasskeyIo::Display(pk)
            }
            PasskeyAction::NumericComparison(pin) => {
                let Some(info) = self.conn_info(conn) else {
                    return;
                };
                PasskeyIo::NumericComparison(self.callbacks().on_confirm_passkey(&info, pin))
            }
            a => {
                debug!("Unsupported passkey action {a:?} for {conn}");
                return;
            }
        };
        if let Err(e) = self.host.sm_inject_io(conn, io) {
            warn!("Failed to inject passkey response for {conn}: {e}");
        }
    }
}

impl GapHandler for Server {
    fn handle_gap_event(&self, e: &GapEvent) -> GapReply {
        debug!("{e:?}");
        match *e {
            GapEvent::Connect { conn, status } => match (conn, status) {
                (Some(cn), Ok(())) => self.on_connect(cn),
                (_, status) => {
                    warn!("Connection failed: {status:?}");
                    if self.adv_on_disconnect.load(Ordering::Acquire) {
                        self.start_advertising(None);
                    }
                }
            },
            GapEvent::Disconnect { ref info, reason } => self.on_disconnect(info, reason),
            GapEvent::Subscribe {
                conn,
                attr,
                cur_notify,
                cur_indicate,
                ..
            } => self.on_subscribe(conn, attr, cur_notify, cur_indicate),
            GapEvent::Mtu { conn, mtu } => {
                if let Some(info) = self.conn_info(conn) {
                    self.callbacks().on_mtu_change(mtu, &info);
                }
            }
            GapEvent::NotifyTx {
                attr,
                status,
                indication,
                ..
            } => {
                if let Some(c) = self.characteristic_by_handle(attr) {
                    c.tx_status(status, indication);
                }
            }
            GapEvent::ConnUpdate { conn, status } => {
                if let (Ok(()), Some(info)) = (status, self.conn_info(conn)) {
                    self.callbacks().on_conn_params_update(&info);
                }
            }
            GapEvent::RepeatPairing { conn } => {
                let Some(info) = self.conn_info(conn) else {
                    return GapReply::IgnorePairing;
                };
                if let Err(e) = self.host.store_delete_peer(info.peer_id_addr) {
                    warn!("Failed to delete bond with {}: {e}", info.peer_id_addr);
                }
                return GapReply::RetryPairing;
            }
            GapEvent::EncChange { conn, status } => {
                if let Some(info) = self.conn_info(conn) {
                    self.callbacks().on_authentication_complete(&info, status);
                }
            }
            GapEvent::IdentityResolved { conn } => {
                if let Some(info) = self.conn_info(conn) {
                    self.callbacks().on_identity(&info);
                }
            }
            GapEvent::PhyUpdate {
                conn,
                status,
                tx,
                rx,
            } => {
                if let (Ok(()), Some(info)) = (status, self.conn_info(conn)) {
                    self.callbacks().on_phy_update(&info, tx, rx);
                }
            }
            GapEvent::PasskeyAction { conn, action } => self.on_passkey_action(conn, action),
            GapEvent::AdvComplete { reason } => debug!("Advertising complete: {reason:?}"),
            GapEvent::ConnUpdateReq { .. }
            | GapEvent::L2capUpdateReq { .. }
            | GapEvent::ScanReqRcvd { .. }
            | GapEvent::NotifyRx { .. }
            | GapEvent::TermFailure { .. } => {}
        }
        GapReply::Ok
    }
}

impl Debug for Server {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Server))
            .field("started", &self.is_started())
            .field("changed", &self.is_changed())
            .field("peers", &self.peers())
            .finish_non_exhaustive()
    }
}
