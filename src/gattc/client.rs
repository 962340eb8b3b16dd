use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::att::{AttValue, ErrorCode, Handle, MAX_VAL_LEN};
use crate::device::{Config, HostState};
use crate::gap::{Addr, ConnInfo, ConnParams, Uuid};
use crate::hci::{ConnHandle, Phy, PhyMask, Status};
use crate::host::{
    Error, GapEvent, GapHandler, GapReply, Host, HsError, Oneshot, PasskeyAction, PasskeyIo,
    Result, SvcInfo,
};
use crate::util::{name_of, waiter, Release};
use crate::{SyncMutex, SyncRwLock};

use super::*;

/// Client connection options.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Return from [`Client::connect`] as soon as the connection procedure
    /// starts. The outcome is reported through [`ClientCallbacks`].
    pub async_connect: bool,
    /// Exchange ATT_MTU as soon as the connection is established.
    pub exchange_mtu: bool,
    /// Parameters used to establish the connection and accepted in peer
    /// parameter update requests.
    pub conn_params: ConnParams,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            async_connect: false,
            exchange_mtu: true,
            conn_params: ConnParams::default(),
        }
    }
}

/// Operation that a task is waiting on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Wait {
    Connect,
    Secure,
}

/// GATT client for one peer connection.
pub struct Client {
    this: Weak<Self>,
    host: Arc<dyn Host>,
    state: Arc<HostState>,
    passkey: u32,
    peer: SyncMutex<Addr>,
    conn: SyncMutex<Option<ConnHandle>>,
    cfg: SyncMutex<ClientConfig>,
    connect_timeout: SyncMutex<Duration>,
    last_err: SyncMutex<Option<Error>>,
    svcs: SyncRwLock<Vec<Arc<RemoteService>>>,
    pending: SyncMutex<Option<(Wait, Release<()>)>>,
    connecting: AtomicBool,
    deleted: AtomicBool,
    term_fail_count: AtomicU8,
    secure_attempt: AtomicU8,
    cb: SyncRwLock<Arc<dyn ClientCallbacks>>,
}

impl Client {
    /// Creates a disconnected client for `peer`.
    pub(crate) fn new(
        host: Arc<dyn Host>,
        state: Arc<HostState>,
        peer: Addr,
        cfg: &Config,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            host,
            state,
            passkey: cfg.passkey,
            peer: SyncMutex::new(peer),
            conn: SyncMutex::new(None),
            cfg: SyncMutex::new(ClientConfig::default()),
            connect_timeout: SyncMutex::new(cfg.connect_timeout),
            last_err: SyncMutex::new(None),
            svcs: SyncRwLock::new(Vec::new()),
            pending: SyncMutex::new(None),
            connecting: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
            term_fail_count: AtomicU8::new(0),
            secure_attempt: AtomicU8::new(0),
            cb: SyncRwLock::new(Arc::new(callbacks::Defaults)),
        })
    }

    /// Sets the client event callbacks.
    #[inline]
    pub fn set_callbacks(&self, cb: Arc<dyn ClientCallbacks>) {
        *self.cb.write() = cb;
    }

    /// Returns the connection options.
    #[inline]
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        *self.cfg.lock()
    }

    /// Sets the connection options used by the next connection.
    #[inline]
    pub fn set_config(&self, cfg: ClientConfig) {
        *self.cfg.lock() = cfg;
    }

    /// Sets the parameters used by the next connection.
    #[inline]
    pub fn set_conn_params(&self, p: ConnParams) {
        self.cfg.lock().conn_params = p;
    }

    /// Sets the time allowed for establishing a connection.
    #[inline]
    pub fn set_connect_timeout(&self, d: Duration) {
        *self.connect_timeout.lock() = d;
    }

    /// Returns the peer address.
    #[inline]
    #[must_use]
    pub fn peer_address(&self) -> Addr {
        *self.peer.lock()
    }

    /// Sets the peer address. Fails while connected.
    pub fn set_peer_address(&self, peer: Addr) -> bool {
        if self.is_connected() {
            warn!("Cannot change the peer address while connected");
            return false;
        }
        *self.peer.lock() = peer;
        true
    }

    /// Returns the connection handle or `None` if the client is not
    /// connected.
    #[inline]
    #[must_use]
    pub fn conn_handle(&self) -> Option<ConnHandle> {
        *self.conn.lock()
    }

    /// Returns whether the client is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn_handle().is_some()
    }

    /// Returns the error of the last failed connection or security procedure.
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        *self.last_err.lock()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn conn_info(&self) -> Option<ConnInfo> {
        self.conn_handle().and_then(|cn| self.host.conn_find(cn))
    }

    /// Returns the negotiated ATT_MTU or 0 if the client is not connected.
    #[must_use]
    pub fn mtu(&self) -> u16 {
        self.conn_handle().map_or(0, |cn| self.host.att_mtu(cn))
    }

    /// Returns the RSSI of the connection.
    pub fn rssi(&self) -> Result<i8> {
        self.host.gap_conn_rssi(self.conn()?)
    }

    /// Connects to `peer` or to the current peer address. The remote
    /// database mirror is cleared first if `delete_attributes` is set.
    ///
    /// Unless the client is configured for asynchronous connection, this
    /// waits for the connection to be established and the ATT_MTU exchanged,
    /// for at most the connect timeout. The connection attempt is cancelled
    /// on timeout.
    pub async fn connect(&self, peer: Option<Addr>, delete_attributes: bool) -> Result<()> {
        let r = self.try_connect(peer, delete_attributes).await;
        let cb = self.callbacks();
        match r {
            Ok(()) if !self.config().async_connect => cb.on_connect(self),
            Ok(()) => {}
            Err(e) => {
                *self.last_err.lock() = Some(e);
                cb.on_connect_fail(self, e);
            }
        }
        r
    }

    /// Cancels a pending connection attempt.
    pub fn cancel_connect(&self) -> Result<()> {
        (self.host.gap_conn_cancel()).map_err(|e| {
            warn!("Failed to cancel connection to {}: {e}", self.peer_address());
            e
        })
    }

    /// Terminates the connection.
    pub fn disconnect(&self, reason: Status) -> Result<()> {
        let cn = self.conn()?;
        match self.host.gap_terminate(cn, reason) {
            Ok(()) | Err(Error::Host(HsError::NotConnected | HsError::Already)) => Ok(()),
            Err(e) => {
                error!("Failed to terminate {cn}: {e}");
                *self.last_err.lock() = Some(e);
                Err(e)
            }
        }
    }

    /// Requests new connection parameters.
    pub fn update_conn_params(&self, p: &ConnParams) -> Result<()> {
        self.host.gap_update_params(self.conn()?, p)
    }

    /// Sets the preferred number of payload octets per LL packet.
    pub fn set_data_len(&self, tx_octets: u16) -> Result<()> {
        let tx_time = (tx_octets.clamp(27, 251) + 14) * 8;
        self.host.gap_set_data_len(self.conn()?, tx_octets, tx_time)
    }

    /// Sets the preferred PHYs of the connection.
    pub fn set_preferred_phy(&self, tx: PhyMask, rx: PhyMask) -> Result<()> {
        self.host.gap_set_preferred_phy(self.conn()?, tx, rx)
    }

    /// Returns the current transmit and receive PHYs.
    pub fn phy(&self) -> Result<(Phy, Phy)> {
        self.host.gap_read_phy(self.conn()?)
    }

    /// Pairs with or encrypts the link to the peer and waits for the result.
    /// If the peer lost its keys, the stale bond is deleted and the procedure
    /// is retried once.
    pub async fn secure_connection(&self) -> Result<()> {
        let r = self.try_secure().await;
        if let Err(e) = r {
            *self.last_err.lock() = Some(e);
        }
        r
    }

    /// Starts pairing or encryption without waiting for the result, which is
    /// reported through [`ClientCallbacks::on_authentication_complete`].
    pub fn start_security(&self) -> Result<()> {
        let cn = self.conn()?;
        self.secure_attempt.store(1, Ordering::Release);
        self.host.security_initiate(cn)
    }

    /// Discovers all services, characteristics, and descriptors, replacing
    /// the current mirror.
    pub async fn discover_attributes(&self) -> Result<()> {
        self.delete_services();
        self.discover_services(None).await?;
        let svcs = self.svcs.read().clone();
        for s in svcs {
            s.discover_characteristics().await?;
            for c in s.cached_characteristics() {
                c.discover_descriptors().await?;
            }
        }
        Ok(())
    }

    /// Returns all services, discovering them first if the mirror is empty or
    /// `refresh` is set.
    pub async fn services(&self, refresh: bool) -> Result<Vec<Arc<RemoteService>>> {
        if refresh {
            self.delete_services();
        }
        if self.svcs.read().is_empty() {
            self.discover_services(None).await?;
        }
        Ok(self.svcs.read().clone())
    }

    /// Returns the first service with the specified UUID, discovering it if it
    /// is not in the mirror.
    pub async fn service(&self, uuid: Uuid) -> Option<Arc<RemoteService>> {
        if let Some(s) = self.cached_service(uuid) {
            return Some(s);
        }
        if let Err(e) = self.discover_services(Some(uuid)).await {
            debug!("Service {uuid} not found: {e}");
            return None;
        }
        self.cached_service(uuid)
    }

    /// Removes all services from the mirror.
    pub fn delete_services(&self) {
        self.svcs.write().clear();
    }

    /// Removes services with the specified UUID from the mirror and returns
    /// the number of remaining services.
    pub fn delete_service(&self, uuid: Uuid) -> usize {
        let mut svcs = self.svcs.write();
        svcs.retain(|s| s.uuid() != uuid);
        svcs.len()
    }

    /// Returns the mirrored characteristic with the specified value handle.
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Arc<RemoteCharacteristic>> {
        let svcs = self.svcs.read().clone();
        (svcs.iter())
            .filter(|s| s.handle() <= hdl && hdl <= s.end_handle())
            .find_map(|s| s.characteristic_by_handle(hdl))
    }

    /// Reads the value of a characteristic identified by service and
    /// characteristic UUIDs.
    pub async fn get_value(&self, svc: Uuid, chr: Uuid) -> Result<AttValue> {
        self.find_characteristic(svc, chr).await?.read_value().await
    }

    /// Writes the value of a characteristic identified by service and
    /// characteristic UUIDs.
    pub async fn set_value(&self, svc: Uuid, chr: Uuid, v: &[u8], response: bool) -> Result<()> {
        (self.find_characteristic(svc, chr).await?)
            .write_value(v, response)
            .await
    }

    /// Reads a peer attribute. A long read is tried first, falling back to a
    /// single read if the attribute is not long. Insufficient security
    /// triggers one pairing attempt followed by a retry.
    pub(super) async fn read_attr(&self, hdl: Handle) -> Result<AttValue> {
        let cn = self.conn()?;
        let (mut long, mut secured) = (true, false);
        let r = loop {
            let (mut tx, rx) = waiter();
            let started = if long {
                let mut acc = AttValue::new(MAX_VAL_LEN);
                self.host.gattc_read_long(
                    cn,
                    hdl,
                    0,
                    Box::new(move |r| match r {
                        Ok(Some(frag)) => {
                            if acc.append(&frag) {
                                return Ok(());
                            }
                            let e = Error::Att(ErrorCode::InvalidAttributeValueLength);
                            tx.release(Err(e));
                            Err(e)
                        }
                        Ok(None) => {
                            tx.release(Ok(std::mem::take(&mut acc)));
                            Ok(())
                        }
                        Err(e) => {
                            tx.release(Err(e));
                            Err(e)
                        }
                    }),
                )
            } else {
                self.host.gattc_read(
                    cn,
                    hdl,
                    Box::new(move |r| {
                        tx.release(r.map(|v| AttValue::with_value(&v, MAX_VAL_LEN)));
                    }),
                )
            };
            if let Err(e) = started {
                break Err(e);
            }
            match rx.wait().await {
                Err(Error::Att(ErrorCode::AttributeNotLong)) if long => {
                    debug!("Attribute {hdl} is not long");
                    long = false;
                }
                Err(e) if e.is_insufficient_security() && !secured => {
                    secured = true;
                    if self.secure_connection().await.is_err() {
                        break Err(e);
                    }
                }
                r => break r,
            }
        };
        r.map(|mut v| {
            v.set_timestamp(SystemTime::now());
            v
        })
        .map_err(|e| {
            warn!("Failed to read {hdl}: {e}");
            e
        })
    }

    /// Writes a peer attribute. A value that fits in one PDU is written
    /// without response unless `response` is set. Longer values use a long
    /// write, which is truncated to one PDU and retried once if the peer does
    /// not support it. Insufficient security triggers one pairing attempt
    /// followed by a retry.
    pub(super) async fn write_attr(&self, hdl: Handle, v: &[u8], response: bool) -> Result<()> {
        let cn = self.conn()?;
        let mtu = usize::from(self.mtu()).saturating_sub(3);
        if v.len() <= mtu && !response {
            return self.host.gattc_write_no_rsp(cn, hdl, v);
        }
        let (mut n, mut secured) = (v.len(), false);
        let r = loop {
            let (mut tx, rx) = waiter();
            let done: Oneshot<()> = Box::new(move |r| {
                tx.release(r);
            });
            let started = if n > mtu {
                debug!("Long write of {n} bytes to {hdl}");
                self.host.gattc_write_long(cn, hdl, 0, &v[..n], done)
            } else {
                self.host.gattc_write(cn, hdl, &v[..n], done)
            };
            if let Err(e) = started {
                break Err(e);
            }
            match rx.wait().await {
                Err(Error::Att(ErrorCode::AttributeNotLong)) if n > mtu => {
                    warn!("Long write not supported by peer, truncating to {mtu} bytes");
                    n = mtu;
                }
                Err(e) if e.is_insufficient_security() && !secured => {
                    secured = true;
                    if self.secure_connection().await.is_err() {
                        break Err(e);
                    }
                }
                r => break r,
            }
        };
        r.map_err(|e| {
            warn!("Failed to write {hdl}: {e}");
            e
        })
    }

    #[inline(always)]
    pub(super) fn host_ref(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Marks the client for deletion once it is disconnected.
    pub(crate) fn delete_on_disconnect(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    /// Returns whether the client was deleted and is now disconnected.
    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire) && !self.is_connected()
    }

    fn conn(&self) -> Result<ConnHandle> {
        self.conn_handle()
            .ok_or(Error::Host(HsError::NotConnected))
    }

    fn callbacks(&self) -> Arc<dyn ClientCallbacks> {
        Arc::clone(&self.cb.read())
    }

    fn cached_service(&self, uuid: Uuid) -> Option<Arc<RemoteService>> {
        self.svcs.read().iter().find(|s| s.uuid() == uuid).cloned()
    }

    async fn find_characteristic(&self, svc: Uuid, chr: Uuid) -> Result<Arc<RemoteCharacteristic>> {
        let not_found = Error::Att(ErrorCode::AttributeNotFound);
        let s = self.service(svc).await.ok_or(not_found)?;
        s.characteristic(chr).await.ok_or(not_found)
    }

    async fn discover_services(&self, uuid: Option<Uuid>) -> Result<()> {
        let cn = self.conn()?;
        let this = Weak::clone(&self.this);
        let r = discover(
            |cb| self.host.gattc_disc_svcs(cn, uuid, cb),
            move |info: SvcInfo| {
                if let Some(cl) = this.upgrade() {
                    cl.add_service(info);
                }
            },
        )
        .await;
        r.map_err(|e| {
            warn!("Service discovery failed: {e}");
            e
        })
    }

    fn add_service(&self, info: SvcInfo) {
        let mut svcs = self.svcs.write();
        if !svcs.iter().any(|s| s.handle() == info.range.start()) {
            debug!("Found service {} at {:?}", info.uuid, info.range);
            svcs.push(RemoteService::new(Weak::clone(&self.this), info));
        }
    }

    async fn try_connect(&self, peer: Option<Addr>, delete_attributes: bool) -> Result<()> {
        if !self.state.is_synced() {
            error!("Host is not synced");
            return Err(Error::Host(HsError::NotSynced));
        }
        if self.is_connected() {
            error!("Client is already connected");
            return Err(Error::Host(HsError::Already));
        }
        let peer = peer.unwrap_or_else(|| self.peer_address());
        if peer.is_null() {
            error!("Invalid peer address");
            return Err(Error::Host(HsError::InvalidArgs));
        }
        if self.host.conn_find_by_addr(peer).is_some() {
            error!("A connection to {peer} already exists");
            return Err(Error::Host(HsError::Already));
        }
        *self.peer.lock() = peer;
        if delete_attributes {
            self.delete_services();
        }
        let Some(this) = self.this.upgrade() else {
            return Err(Error::Host(HsError::Unknown));
        };
        let (cfg, timeout) = (self.config(), *self.connect_timeout.lock());
        let rx = if cfg.async_connect {
            None
        } else {
            let (tx, rx) = waiter();
            *self.pending.lock() = Some((Wait::Connect, tx));
            Some(rx)
        };
        self.connecting.store(true, Ordering::Release);
        info!("Connecting to {peer}");
        let mut r = self.host.gap_connect(peer, timeout, &cfg.conn_params, Arc::clone(&this) as _);
        if matches!(r, Err(Error::Host(HsError::Busy))) {
            debug!("Scan active, stopping it and retrying");
            r = (self.host.gap_disc_cancel())
                .and_then(|_| self.host.gap_connect(peer, timeout, &cfg.conn_params, this));
        }
        if let Err(e) = r {
            error!("Failed to connect to {peer}: {e}");
            self.connecting.store(false, Ordering::Release);
            self.pending.lock().take();
            return Err(e);
        }
        let Some(rx) = rx else {
            return Ok(());
        };
        match rx.wait_timeout(timeout + Duration::from_secs(1)).await {
            Some(r) => r,
            None if self.is_connected() => {
                self.pending.lock().take();
                self.connecting.store(false, Ordering::Release);
                Ok(())
            }
            None => {
                warn!("Connection to {peer} timed out, cancelling");
                self.pending.lock().take();
                self.connecting.store(false, Ordering::Release);
                if let Err(e) = self.host.gap_conn_cancel() {
                    warn!("Failed to cancel connection to {peer}: {e}");
                }
                Err(Error::Host(HsError::Timeout))
            }
        }
    }

    async fn try_secure(&self) -> Result<()> {
        let cn = self.conn()?;
        let mut retry = true;
        loop {
            let (tx, rx) = waiter();
            *self.pending.lock() = Some((Wait::Secure, tx));
            if let Err(e) = self.host.security_initiate(cn) {
                self.pending.lock().take();
                return Err(e);
            }
            match rx.wait().await {
                Err(Error::Hci(Status::PinOrKeyMissing)) if retry => {
                    debug!("Peer lost its keys, retrying security");
                    retry = false;
                }
                r => return r,
            }
        }
    }

    /// Releases the task waiting on `w`, if any.
    fn release(&self, w: Wait, r: Result<()>) {
        let mut pending = self.pending.lock();
        if matches!(*pending, Some((p, _)) if p == w) {
            if let Some((_, mut tx)) = pending.take() {
                tx.release(r);
            }
        }
    }

    /// Releases any waiting task.
    fn release_any(&self, r: Result<()>) {
        if let Some((_, mut tx)) = self.pending.lock().take() {
            tx.release(r);
        }
    }

    /// Completes the connection procedure once the link is ready for GATT
    /// procedures.
    fn established(&self) {
        if self.connecting.swap(false, Ordering::AcqRel) {
            self.release(Wait::Connect, Ok(()));
            if self.config().async_connect {
                self.callbacks().on_connect(self);
            }
        }
    }

    fn connect_failed(&self, reason: Error) {
        if self.connecting.swap(false, Ordering::AcqRel) {
            self.release(Wait::Connect, Err(reason));
            if self.config().async_connect {
                self.callbacks().on_connect_fail(self, reason);
            }
        }
    }

    fn on_connect(&self, cn: ConnHandle) {
        *self.conn.lock() = Some(cn);
        info!("Connected to {} as {cn}", self.peer_address());
        if !self.config().exchange_mtu {
            self.established();
            return;
        }
        let this = Weak::clone(&self.this);
        let r = self.host.gattc_exchange_mtu(
            cn,
            Box::new(move |r| {
                if let (Err(e), Some(cl)) = (r, this.upgrade()) {
                    warn!("MTU exchange failed: {e}");
                    cl.connect_failed(e);
                }
            }),
        );
        if let Err(e) = r {
            warn!("Failed to start MTU exchange: {e}");
            self.connect_failed(e);
        }
    }

    fn on_disconnect(&self, reason: Error) {
        if reason.is_host_reset() {
            error!("Host reset, disconnect reason: {reason}");
            self.state.reset(reason);
        }
        self.term_fail_count.store(0, Ordering::Release);
        self.secure_attempt.store(0, Ordering::Release);
        *self.conn.lock() = None;
        let connecting = self.connecting.swap(false, Ordering::AcqRel);
        self.release_any(Err(reason));
        let cb = self.callbacks();
        if connecting && self.config().async_connect {
            cb.on_connect_fail(self, reason);
        } else {
            cb.on_disconnect(self, reason);
        }
    }

    fn on_enc_change(&self, cn: ConnHandle, status: Result<()>) {
        let Some(info) = self.host.conn_find(cn) else {
            self.release(Wait::Secure, status);
            return;
        };
        if status == Err(Error::Hci(Status::PinOrKeyMissing)) {
            warn!("Peer {} lost its keys, deleting bond", info.peer_id_addr);
            if let Err(e) = self.host.store_delete_peer(info.peer_id_addr) {
                warn!("Failed to delete bond: {e}");
            }
            if self
                .secure_attempt
                .compare_exchange(1, 2, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if let Err(e) = self.host.security_initiate(cn) {
                    warn!("Failed to retry security: {e}");
                }
            }
        } else {
            self.secure_attempt.store(0, Ordering::Release);
            self.callbacks().on_authentication_complete(&info, status);
        }
        self.release(Wait::Secure, status);
    }

    fn on_passkey_action(&self, cn: ConnHandle, action: PasskeyAction) {
        let Some(info) = self.host.conn_find(cn) else {
            return;
        };
        let cb = self.callbacks();
        let io = match action {
            PasskeyAction::Display => PasskeyIo::Display(self.passkey),
            PasskeyAction::Input => PasskeyIo::Input(cb.on_passkey_entry(&info)),
            PasskeyAction::NumericComparison(pin) => {
                PasskeyIo::NumericComparison(cb.on_confirm_passkey(&info, pin))
            }
            PasskeyAction::Oob => {
                debug!("Out-of-band pairing is not supported");
                return;
            }
        };
        if let Err(e) = self.host.sm_inject_io(cn, io) {
            warn!("Failed to inject passkey response: {e}");
        }
    }
}

impl GapHandler for Client {
    fn handle_gap_event(&self, e: &GapEvent) -> GapReply {
        debug!("{e:?}");
        if let (Some(cn), Some(own)) = (e.conn(), self.conn_handle()) {
            if cn != own {
                return GapReply::Ok;
            }
        }
        match *e {
            GapEvent::Connect { conn, status } => match (conn, status) {
                (Some(cn), Ok(())) => self.on_connect(cn),
                (_, status) => {
                    let reason = status.err().unwrap_or(Error::Host(HsError::Unknown));
                    warn!("Failed to connect to {}: {reason}", self.peer_address());
                    self.connect_failed(reason);
                }
            },
            GapEvent::Disconnect { reason, .. } => self.on_disconnect(reason),
            GapEvent::Mtu { mtu, .. } => {
                self.callbacks().on_mtu_change(self, mtu);
                self.established();
            }
            GapEvent::ConnUpdateReq { ref peer, .. } | GapEvent::L2capUpdateReq { ref peer, .. } => {
                return if self.callbacks().on_conn_params_update_request(self, peer) {
                    GapReply::Params(self.config().conn_params)
                } else {
                    GapReply::Reject(Error::Hci(Status::UnacceptableConnectionParameters))
                };
            }
            GapEvent::ConnUpdate { status, .. } => {
                if let Err(e) = status {
                    debug!("Connection parameter update failed: {e}");
                }
            }
            GapEvent::TermFailure { conn, status } => {
                error!("Connection termination failure: {status}, retrying");
                if self.term_fail_count.fetch_add(1, Ordering::AcqRel) >= 2 {
                    self.host.sched_reset(Error::Host(HsError::Controller));
                } else if let Err(e) =
                    (self.host).gap_terminate(conn, Status::RemoteUserTerminatedConnection)
                {
                    warn!("Failed to retry termination: {e}");
                }
            }
            GapEvent::EncChange { conn, status } => self.on_enc_change(conn, status),
            GapEvent::IdentityResolved { conn } => {
                if let Some(info) = self.host.conn_find(conn) {
                    self.callbacks().on_identity(&info);
                }
            }
            GapEvent::PhyUpdate { status, tx, rx, .. } => {
                if status.is_ok() {
                    self.callbacks().on_phy_update(self, tx, rx);
                }
            }
            GapEvent::PasskeyAction { conn, action } => self.on_passkey_action(conn, action),
            GapEvent::NotifyRx {
                attr,
                ref data,
                indication,
                ..
            } => match self.characteristic_by_handle(attr) {
                Some(c) => c.on_notify(data, !indication),
                None => debug!("Notification for unknown attribute {attr}"),
            },
            GapEvent::Subscribe { .. }
            | GapEvent::NotifyTx { .. }
            | GapEvent::AdvComplete { .. }
            | GapEvent::ScanReqRcvd { .. }
            | GapEvent::RepeatPairing { .. } => {}
        }
        GapReply::Ok
    }
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Client))
            .field("peer", &self.peer_address())
            .field("conn", &self.conn_handle())
            .finish_non_exhaustive()
    }
}
