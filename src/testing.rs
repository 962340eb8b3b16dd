//! Fake host used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use crate::att::{ErrorCode, Handle, HandleRange, DEFAULT_MTU, MAX_VAL_LEN};
use crate::gap::{Addr, ConnInfo, ConnParams, RawAddr, Role, Uuid, Uuid16};
use crate::gatts::Server;
use crate::hci::{ConnHandle, Phy, PhyMask, Status};
use crate::host::*;
use crate::SyncMutex;

/// Installs a test log subscriber.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Returns a 16-bit UUID.
pub(crate) fn uuid(v: u16) -> Uuid {
    Uuid::from_u16(v).unwrap()
}

/// Returns a handle.
pub(crate) fn hdl(v: u16) -> Handle {
    Handle::new(v).unwrap()
}

/// Returns a connection handle.
pub(crate) fn conn(v: u16) -> ConnHandle {
    ConnHandle::new(v).unwrap()
}

/// Returns a public peer address ending in `v`.
pub(crate) fn addr(v: u8) -> Addr {
    Addr::Public(RawAddr::from([v, 0, 0, 0, 0, 0xC0]))
}

/// Host call recorded by [`FakeHost`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Call {
    CountCfg(Vec<Uuid>),
    AddSvcs(Vec<Uuid>),
    GattsStart,
    GattsReset,
    SetVisibility(Handle, bool),
    ChrUpdated(Handle),
    Notify(ConnHandle, Handle, Option<Vec<u8>>),
    Indicate(ConnHandle, Handle, Option<Vec<u8>>),
    SvcChanged,
    Terminate(ConnHandle, Status),
    AdvStart,
    AdvStop,
    Connect(Addr),
    ConnCancel,
    DiscCancel,
    SecurityInitiate(ConnHandle),
    InjectIo(ConnHandle, PasskeyIo),
    DeletePeer(Addr),
    SchedReset,
    DiscDscs(HandleRange),
    Read(Handle),
    ReadLong(Handle),
    WriteNoRsp(Handle, Vec<u8>),
    Write(Handle, Vec<u8>),
    WriteLong(Handle, Vec<u8>),
}

/// Attribute registered by [`Host::gatts_start`].
#[derive(Clone, Copy, Debug)]
struct LocalAttr {
    svc: Uuid,
    chr: Uuid,
    dsc: Option<Uuid>,
    handle: Handle,
    arg: Option<AttrId>,
}

struct Conn {
    info: ConnInfo,
    handler: Arc<dyn GapHandler>,
}

/// Peer GATT database served to the client procedures.
#[derive(Debug, Default)]
pub(crate) struct PeerDb {
    pub svcs: Vec<SvcInfo>,
    pub chrs: Vec<ChrInfo>,
    pub dscs: Vec<DscInfo>,
    pub values: HashMap<Handle, Vec<u8>>,
    /// Errors returned by the next procedures on a handle.
    pub errors: HashMap<Handle, VecDeque<Error>>,
    /// Whether the peer supports long reads and writes.
    pub long: bool,
    pub mtu: u16,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    queued: Vec<SvcDef>,
    attrs: Vec<LocalAttr>,
    svcs: Vec<(Uuid, Handle)>,
    next: u16,
    conns: Vec<Conn>,
    adv: Option<Arc<dyn GapHandler>>,
    connect_errors: VecDeque<Error>,
    pending: Option<(Addr, Arc<dyn GapHandler>)>,
    next_conn: u16,
    enc_status: VecDeque<Result<()>>,
    preferred_mtu: u16,
}

/// Fake host that records calls, assigns handles in registration order, and
/// serves client procedures from a scripted [`PeerDb`]. Events are delivered
/// synchronously and never while the fake's own lock is held.
pub(crate) struct FakeHost {
    st: SyncMutex<State>,
    peer: SyncMutex<PeerDb>,
    auto_connect: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        init_tracing();
        let h = Self {
            st: SyncMutex::new(State {
                next: 1,
                next_conn: 1,
                preferred_mtu: 256,
                ..State::default()
            }),
            peer: SyncMutex::new(PeerDb {
                long: true,
                mtu: 185,
                ..PeerDb::default()
            }),
            auto_connect: AtomicBool::new(true),
        };
        h.gatts_init_builtin();
        Arc::new(h)
    }

    /// Returns all recorded calls.
    pub fn calls(&self) -> Vec<Call> {
        self.st.lock().calls.clone()
    }

    /// Returns the number of recorded calls matching `f`.
    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.st.lock().calls.iter().filter(|c| f(c)).count()
    }

    /// Clears recorded calls.
    pub fn clear_calls(&self) {
        self.st.lock().calls.clear();
    }

    /// Returns the handle registered for a characteristic value.
    pub fn chr_handle(&self, svc: Uuid, chr: Uuid) -> Option<Handle> {
        (self.st.lock().attrs.iter())
            .find(|a| a.svc == svc && a.chr == chr && a.dsc.is_none())
            .map(|a| a.handle)
    }

    /// Establishes a connection through the advertising handler.
    pub fn accept(&self, peer: Addr) -> ConnHandle {
        let mut st = self.st.lock();
        let handler = st.adv.take().expect("not advertising");
        let cn = conn(st.next_conn);
        st.next_conn += 1;
        st.conns.push(Conn {
            info: ConnInfo::new(cn, peer, Role::Peripheral),
            handler: Arc::clone(&handler),
        });
        drop(st);
        handler.handle_gap_event(&GapEvent::Connect {
            conn: Some(cn),
            status: Ok(()),
        });
        cn
    }

    /// Terminates a connection from the peer side.
    pub fn drop_conn(&self, cn: ConnHandle, reason: Error) {
        let mut st = self.st.lock();
        let Some(i) = st.conns.iter().position(|c| c.info.handle == cn) else {
            return;
        };
        let c = st.conns.remove(i);
        drop(st);
        (c.handler).handle_gap_event(&GapEvent::Disconnect {
            info: c.info,
            reason,
        });
    }

    /// Delivers an event to the handler of a connection.
    pub fn deliver(&self, cn: ConnHandle, e: &GapEvent) -> GapReply {
        let handler = (self.st.lock().conns.iter())
            .find(|c| c.info.handle == cn)
            .map(|c| Arc::clone(&c.handler))
            .expect("unknown connection");
        handler.handle_gap_event(e)
    }

    /// Updates the state of an open connection.
    pub fn update_conn(&self, cn: ConnHandle, f: impl FnOnce(&mut ConnInfo)) {
        if let Some(c) = self.st.lock().conns.iter_mut().find(|c| c.info.handle == cn) {
            f(&mut c.info);
        }
    }

    /// Reads a local attribute the way a peer would, one ATT_MTU-sized
    /// fragment at a time.
    pub fn peer_read(
        &self,
        srv: &Server,
        cn: ConnHandle,
        h: Handle,
    ) -> std::result::Result<Vec<u8>, ErrorCode> {
        let (arg, op) = self.local_attr(h, AccessOp::ReadChr, AccessOp::ReadDsc)?;
        let frag = usize::from(self.att_mtu(cn)).saturating_sub(1).max(1);
        let mut v = Vec::new();
        loop {
            let mut om = Mbuf::new(MAX_VAL_LEN);
            #[allow(clippy::cast_possible_truncation)]
            let mut ctxt = Access {
                op,
                offset: v.len() as u16,
                om: &mut om,
            };
            srv.handle_access(Some(cn), h, arg, &mut ctxt)?;
            let full = om.to_vec();
            let rem = full.get(v.len()..).unwrap_or_default();
            let n = rem.len().min(frag);
            v.extend_from_slice(&rem[..n]);
            if n < frag {
                return Ok(v);
            }
        }
    }

    /// Writes a local attribute the way a peer would, with the value
    /// reassembled from `segs`.
    pub fn peer_write(
        &self,
        srv: &Server,
        cn: ConnHandle,
        h: Handle,
        segs: &[&[u8]],
    ) -> std::result::Result<(), ErrorCode> {
        let (arg, op) = self.local_attr(h, AccessOp::WriteChr, AccessOp::WriteDsc)?;
        let mut om = Mbuf::from_segments(segs.iter().copied());
        srv.handle_access(
            Some(cn),
            h,
            arg,
            &mut Access {
                op,
                offset: 0,
                om: &mut om,
            },
        )
    }

    /// Modifies the peer database.
    pub fn peer_db(&self, f: impl FnOnce(&mut PeerDb)) {
        f(&mut self.peer.lock());
    }

    /// Scripts an error for the next procedure on `h`.
    pub fn fail_next(&self, h: Handle, e: Error) {
        self.peer.lock().errors.entry(h).or_default().push_back(e);
    }

    /// Scripts an error for the next connection attempt.
    pub fn fail_connect(&self, e: Error) {
        self.st.lock().connect_errors.push_back(e);
    }

    /// Scripts the status of the next encryption procedure.
    pub fn enc_status(&self, r: Result<()>) {
        self.st.lock().enc_status.push_back(r);
    }

    /// Sets whether connection attempts complete immediately.
    pub fn set_auto_connect(&self, enable: bool) {
        self.auto_connect.store(enable, Ordering::Relaxed);
    }

    /// Forgets a connection attempt that is still in progress, as if the
    /// controller completed it without reporting an event.
    pub fn forget_connect(&self) {
        self.st.lock().pending.take();
    }

    fn record(&self, c: Call) {
        self.st.lock().calls.push(c);
    }

    fn local_attr(
        &self,
        h: Handle,
        chr: AccessOp,
        dsc: AccessOp,
    ) -> std::result::Result<(AttrId, AccessOp), ErrorCode> {
        let st = self.st.lock();
        let a = (st.attrs.iter().find(|a| a.handle == h)).ok_or(ErrorCode::InvalidHandle)?;
        let arg = a.arg.ok_or(ErrorCode::InvalidHandle)?;
        Ok((arg, if a.dsc.is_some() { dsc } else { chr }))
    }

    fn alloc(st: &mut State) -> Handle {
        let h = hdl(st.next);
        st.next += 1;
        h
    }

    fn take_error(&self, h: Handle) -> Option<Error> {
        self.peer.lock().errors.get_mut(&h).and_then(VecDeque::pop_front)
    }

    fn handler(&self, cn: ConnHandle) -> Option<Arc<dyn GapHandler>> {
        (self.st.lock().conns.iter())
            .find(|c| c.info.handle == cn)
            .map(|c| Arc::clone(&c.handler))
    }

    fn frag_len(&self, cn: ConnHandle) -> usize {
        usize::from(self.att_mtu(cn)).saturating_sub(1).max(1)
    }
}

impl Debug for FakeHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeHost")
            .field("calls", &self.st.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl Host for FakeHost {
    fn gatts_count_cfg(&self, svcs: &[SvcDef]) -> Result<()> {
        self.record(Call::CountCfg(svcs.iter().map(|s| s.uuid).collect()));
        Ok(())
    }

    fn gatts_add_svcs(&self, svcs: &[SvcDef]) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::AddSvcs(svcs.iter().map(|s| s.uuid).collect()));
        st.queued.extend_from_slice(svcs);
        Ok(())
    }

    fn gatts_start(&self) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::GattsStart);
        for s in std::mem::take(&mut st.queued) {
            let sh = Self::alloc(&mut st);
            st.svcs.push((s.uuid, sh));
            for c in s.live_chrs() {
                let chr = c.uuid.unwrap_or_else(|| uuid(0xFFFF));
                let _decl = Self::alloc(&mut st);
                let vh = Self::alloc(&mut st);
                if let Some(ref cell) = c.val_handle {
                    cell.set(vh);
                }
                st.attrs.push(LocalAttr {
                    svc: s.uuid,
                    chr,
                    dsc: None,
                    handle: vh,
                    arg: c.arg,
                });
                if c.flags.intersects(ChrFlags::NOTIFY | ChrFlags::INDICATE) {
                    let h = Self::alloc(&mut st);
                    st.attrs.push(LocalAttr {
                        svc: s.uuid,
                        chr,
                        dsc: Some(Uuid16::CCCD.as_uuid()),
                        handle: h,
                        arg: None,
                    });
                }
                for d in c.live_dscs() {
                    let h = Self::alloc(&mut st);
                    st.attrs.push(LocalAttr {
                        svc: s.uuid,
                        chr,
                        dsc: d.uuid,
                        handle: h,
                        arg: d.arg,
                    });
                }
            }
        }
        Ok(())
    }

    fn gatts_reset(&self) -> Result<()> {
        let mut st = self.st.lock();
        if !st.conns.is_empty() {
            return Err(Error::Host(HsError::Busy));
        }
        st.calls.push(Call::GattsReset);
        st.queued.clear();
        st.attrs.clear();
        st.svcs.clear();
        st.next = 1;
        Ok(())
    }

    fn gatts_init_builtin(&self) {
        let mut st = self.st.lock();
        // GAP service with Device Name and Appearance, GATT service with
        // Service Changed and its CCCD.
        for (svc, n) in [(0x1800, 4), (0x1801, 3)] {
            let h = Self::alloc(&mut st);
            st.svcs.push((uuid(svc), h));
            for _ in 0..n {
                Self::alloc(&mut st);
            }
        }
    }

    fn gatts_find_svc(&self, svc: Uuid) -> Result<Handle> {
        (self.st.lock().svcs.iter())
            .find(|&&(u, _)| u == svc)
            .map(|&(_, h)| h)
            .ok_or(Error::Host(HsError::NotFound))
    }

    fn gatts_find_dsc(&self, svc: Uuid, chr: Uuid, dsc: Uuid) -> Result<Handle> {
        (self.st.lock().attrs.iter())
            .find(|a| a.svc == svc && a.chr == chr && a.dsc == Some(dsc))
            .map(|a| a.handle)
            .ok_or(Error::Host(HsError::NotFound))
    }

    fn gatts_svc_set_visibility(&self, svc: Handle, visible: bool) -> Result<()> {
        self.record(Call::SetVisibility(svc, visible));
        Ok(())
    }

    fn gatts_chr_updated(&self, chr_val: Handle) {
        self.record(Call::ChrUpdated(chr_val));
    }

    fn gatts_notify(&self, conn: ConnHandle, chr_val: Handle, om: Option<Mbuf>) -> Result<()> {
        self.record(Call::Notify(conn, chr_val, om.map(|m| m.to_vec())));
        Ok(())
    }

    fn gatts_indicate(
        &self,
        conn: ConnHandle,
        chr_val: Handle,
        om: Option<Mbuf>,
    ) -> Result<()> {
        self.record(Call::Indicate(conn, chr_val, om.map(|m| m.to_vec())));
        Ok(())
    }

    fn gatts_svc_changed(&self, _: HandleRange) {
        self.record(Call::SvcChanged);
    }

    fn conn_find(&self, conn: ConnHandle) -> Option<ConnInfo> {
        (self.st.lock().conns.iter())
            .find(|c| c.info.handle == conn)
            .map(|c| c.info)
    }

    fn conn_find_by_addr(&self, peer: Addr) -> Option<ConnHandle> {
        (self.st.lock().conns.iter())
            .find(|c| c.info.peer_id_addr == peer)
            .map(|c| c.info.handle)
    }

    fn att_mtu(&self, conn: ConnHandle) -> u16 {
        self.conn_find(conn).map_or(0, |c| c.mtu)
    }

    fn att_preferred_mtu(&self) -> u16 {
        self.st.lock().preferred_mtu
    }

    fn att_set_preferred_mtu(&self, mtu: u16) -> Result<()> {
        if !(DEFAULT_MTU..=527).contains(&mtu) {
            return Err(Error::Host(HsError::InvalidArgs));
        }
        self.st.lock().preferred_mtu = mtu;
        Ok(())
    }

    fn gap_terminate(&self, conn: ConnHandle, reason: Status) -> Result<()> {
        self.record(Call::Terminate(conn, reason));
        if self.conn_find(conn).is_none() {
            return Err(Error::Host(HsError::NotConnected));
        }
        self.drop_conn(conn, Error::Hci(Status::ConnectionTerminatedByLocalHost));
        Ok(())
    }

    fn gap_adv_start(
        &self,
        _: Option<Duration>,
        handler: Arc<dyn GapHandler>,
    ) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::AdvStart);
        if st.adv.is_some() {
            return Err(Error::Host(HsError::Already));
        }
        st.adv = Some(handler);
        Ok(())
    }

    fn gap_adv_stop(&self) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::AdvStop);
        st.adv.take().map(|_| ()).ok_or(Error::Host(HsError::Already))
    }

    fn gap_adv_active(&self) -> bool {
        self.st.lock().adv.is_some()
    }

    fn gap_connect(
        &self,
        peer: Addr,
        _: Duration,
        _: &ConnParams,
        handler: Arc<dyn GapHandler>,
    ) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::Connect(peer));
        if let Some(e) = st.connect_errors.pop_front() {
            return Err(e);
        }
        if !self.auto_connect.load(Ordering::Relaxed) {
            st.pending = Some((peer, handler));
            return Ok(());
        }
        let cn = conn(st.next_conn);
        st.next_conn += 1;
        st.conns.push(Conn {
            info: ConnInfo::new(cn, peer, Role::Central),
            handler: Arc::clone(&handler),
        });
        drop(st);
        handler.handle_gap_event(&GapEvent::Connect {
            conn: Some(cn),
            status: Ok(()),
        });
        Ok(())
    }

    fn gap_conn_cancel(&self) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::ConnCancel);
        st.pending.take().map(|_| ()).ok_or(Error::Host(HsError::Already))
    }

    fn gap_disc_cancel(&self) -> Result<()> {
        self.record(Call::DiscCancel);
        Ok(())
    }

    fn gap_update_params(&self, conn: ConnHandle, _: &ConnParams) -> Result<()> {
        self.conn_find(conn)
            .map(|_| ())
            .ok_or(Error::Host(HsError::NotConnected))
    }

    fn gap_set_data_len(&self, conn: ConnHandle, _: u16, _: u16) -> Result<()> {
        self.conn_find(conn)
            .map(|_| ())
            .ok_or(Error::Host(HsError::NotConnected))
    }

    fn gap_set_preferred_phy(&self, conn: ConnHandle, _: PhyMask, _: PhyMask) -> Result<()> {
        self.conn_find(conn)
            .map(|_| ())
            .ok_or(Error::Host(HsError::NotConnected))
    }

    fn gap_read_phy(&self, conn: ConnHandle) -> Result<(Phy, Phy)> {
        self.conn_find(conn)
            .map(|_| (Phy::Le1M, Phy::Le1M))
            .ok_or(Error::Host(HsError::NotConnected))
    }

    fn gap_conn_rssi(&self, conn: ConnHandle) -> Result<i8> {
        self.conn_find(conn)
            .map(|_| -40)
            .ok_or(Error::Host(HsError::NotConnected))
    }

    fn security_initiate(&self, conn: ConnHandle) -> Result<()> {
        let mut st = self.st.lock();
        st.calls.push(Call::SecurityInitiate(conn));
        let status = st.enc_status.pop_front().unwrap_or(Ok(()));
        drop(st);
        if status.is_ok() {
            self.update_conn(conn, |c| c.encrypted = true);
        }
        if let Some(h) = self.handler(conn) {
            h.handle_gap_event(&GapEvent::EncChange { conn, status });
        }
        Ok(())
    }

    fn sm_inject_io(&self, conn: ConnHandle, io: PasskeyIo) -> Result<()> {
        self.record(Call::InjectIo(conn, io));
        Ok(())
    }

    fn store_delete_peer(&self, peer: Addr) -> Result<()> {
        self.record(Call::DeletePeer(peer));
        Ok(())
    }

    fn sched_reset(&self, _: Error) {
        self.record(Call::SchedReset);
    }

    fn gattc_exchange_mtu(&self, conn: ConnHandle, cb: Oneshot<u16>) -> Result<()> {
        let mtu = (self.att_preferred_mtu()).min(self.peer.lock().mtu);
        self.update_conn(conn, |c| c.mtu = mtu);
        if let Some(h) = self.handler(conn) {
            h.handle_gap_event(&GapEvent::Mtu { conn, mtu });
        }
        cb(Ok(mtu));
        Ok(())
    }

    fn gattc_disc_svcs(
        &self,
        _: ConnHandle,
        uuid: Option<Uuid>,
        mut cb: Progress<SvcInfo>,
    ) -> Result<()> {
        let svcs: Vec<_> = (self.peer.lock().svcs.iter())
            .filter(|s| uuid.map_or(true, |u| s.uuid == u))
            .copied()
            .collect();
        if svcs.is_empty() {
            let _ = cb(Err(Error::Att(ErrorCode::AttributeNotFound)));
            return Ok(());
        }
        for s in svcs {
            if cb(Ok(Some(s))).is_err() {
                return Ok(());
            }
        }
        let _ = cb(Ok(None));
        Ok(())
    }

    fn gattc_disc_chrs(
        &self,
        _: ConnHandle,
        range: HandleRange,
        mut cb: Progress<ChrInfo>,
    ) -> Result<()> {
        let chrs: Vec<_> = (self.peer.lock().chrs.iter())
            .filter(|c| range.contains(&c.def_handle))
            .copied()
            .collect();
        for c in chrs {
            if cb(Ok(Some(c))).is_err() {
                return Ok(());
            }
        }
        let _ = cb(Ok(None));
        Ok(())
    }

    fn gattc_disc_dscs(
        &self,
        _: ConnHandle,
        range: HandleRange,
        mut cb: Progress<DscInfo>,
    ) -> Result<()> {
        self.record(Call::DiscDscs(range));
        let dscs: Vec<_> = (self.peer.lock().dscs.iter())
            .filter(|d| range.contains(&d.handle))
            .copied()
            .collect();
        for d in dscs {
            if cb(Ok(Some(d))).is_err() {
                return Ok(());
            }
        }
        let _ = cb(Ok(None));
        Ok(())
    }

    fn gattc_read(&self, conn: ConnHandle, attr: Handle, cb: Oneshot<Vec<u8>>) -> Result<()> {
        self.record(Call::Read(attr));
        if let Some(e) = self.take_error(attr) {
            cb(Err(e));
            return Ok(());
        }
        let v = self.peer.lock().values.get(&attr).cloned();
        let n = self.frag_len(conn);
        cb(v
            .map(|v| v[..v.len().min(n)].to_vec())
            .ok_or(Error::Att(ErrorCode::InvalidHandle)));
        Ok(())
    }

    fn gattc_read_long(
        &self,
        conn: ConnHandle,
        attr: Handle,
        offset: u16,
        mut cb: Progress<Vec<u8>>,
    ) -> Result<()> {
        self.record(Call::ReadLong(attr));
        if let Some(e) = self.take_error(attr) {
            let _ = cb(Err(e));
            return Ok(());
        }
        let (long, v) = {
            let p = self.peer.lock();
            (p.long, p.values.get(&attr).cloned())
        };
        if !long {
            let _ = cb(Err(Error::Att(ErrorCode::AttributeNotLong)));
            return Ok(());
        }
        let Some(v) = v else {
            let _ = cb(Err(Error::Att(ErrorCode::InvalidHandle)));
            return Ok(());
        };
        let n = self.frag_len(conn);
        for frag in v[usize::from(offset).min(v.len())..].chunks(n) {
            if cb(Ok(Some(frag.to_vec()))).is_err() {
                return Ok(());
            }
        }
        let _ = cb(Ok(None));
        Ok(())
    }

    fn gattc_write_no_rsp(&self, _: ConnHandle, attr: Handle, v: &[u8]) -> Result<()> {
        self.record(Call::WriteNoRsp(attr, v.to_vec()));
        self.peer.lock().values.insert(attr, v.to_vec());
        Ok(())
    }

    fn gattc_write(&self, conn: ConnHandle, attr: Handle, v: &[u8], cb: Oneshot<()>) -> Result<()> {
        self.record(Call::Write(attr, v.to_vec()));
        if let Some(e) = self.take_error(attr) {
            cb(Err(e));
            return Ok(());
        }
        if v.len() > usize::from(self.att_mtu(conn)).saturating_sub(3) {
            cb(Err(Error::Att(ErrorCode::InvalidAttributeValueLength)));
            return Ok(());
        }
        self.peer.lock().values.insert(attr, v.to_vec());
        cb(Ok(()));
        Ok(())
    }

    fn gattc_write_long(
        &self,
        _: ConnHandle,
        attr: Handle,
        _: u16,
        v: &[u8],
        cb: Oneshot<()>,
    ) -> Result<()> {
        self.record(Call::WriteLong(attr, v.to_vec()));
        if let Some(e) = self.take_error(attr) {
            cb(Err(e));
            return Ok(());
        }
        let mut p = self.peer.lock();
        if !p.long {
            drop(p);
            cb(Err(Error::Att(ErrorCode::AttributeNotLong)));
            return Ok(());
        }
        p.values.insert(attr, v.to_vec());
        drop(p);
        cb(Ok(()));
        Ok(())
    }
}
