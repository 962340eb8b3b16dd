use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::att::{AttValue, ErrorCode, Handle, HandleCell};
use crate::gap::{ConnInfo, Uuid, Uuid16};
use crate::hci::ConnHandle;
use crate::host::{Access, AttrId, ChrDef, DscDef, DscFlags, Mbuf, Result, TxStatus};
use crate::util::name_of;
use crate::{SyncMutex, SyncRwLock};

use super::*;

/// Local characteristic.
pub struct Characteristic {
    this: Weak<Self>,
    id: AttrId,
    uuid: Uuid,
    props: Props,
    handle: Arc<HandleCell>,
    value: SyncMutex<AttValue>,
    removed: RemovalCell,
    svc: SyncRwLock<Weak<Service>>,
    dscs: SyncRwLock<Vec<Arc<Descriptor>>>,
    subs: SyncMutex<SmallVec<[(ConnHandle, u16); 4]>>,
    cb: SyncRwLock<Arc<dyn CharacteristicCallbacks>>,
}

impl Characteristic {
    /// Creates a detached characteristic that can be added to a service with
    /// [`Service::add_characteristic`].
    #[must_use]
    pub fn new(uuid: Uuid, props: Props, max_len: usize) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            id: AttrId::next(),
            uuid,
            props,
            handle: Arc::new(HandleCell::new()),
            value: SyncMutex::new(AttValue::new(max_len)),
            removed: RemovalCell::default(),
            svc: SyncRwLock::new(Weak::new()),
            dscs: SyncRwLock::new(Vec::new()),
            subs: SyncMutex::new(SmallVec::new()),
            cb: SyncRwLock::new(Arc::new(Defaults)),
        })
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the value handle or `None` if the characteristic is not
    /// registered.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.handle.get()
    }

    /// Returns the characteristic properties.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> Props {
        self.props
    }

    /// Returns the removal state.
    #[inline]
    #[must_use]
    pub fn removal(&self) -> Removal {
        self.removed.get()
    }

    /// Returns the owning service.
    #[inline]
    #[must_use]
    pub fn service(&self) -> Option<Arc<Service>> {
        self.svc.read().upgrade()
    }

    /// Sets the event callbacks.
    #[inline]
    pub fn set_callbacks(&self, cb: Arc<dyn CharacteristicCallbacks>) {
        *self.cb.write() = cb;
    }

    /// Returns a snapshot of the value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> AttValue {
        self.value.lock().clone()
    }

    /// Returns a copy of the value bytes and the time of the last change,
    /// taken under one lock.
    #[must_use]
    pub fn value_with_timestamp(&self) -> (Vec<u8>, Option<SystemTime>) {
        let v = self.value.lock();
        (v.to_vec(), v.timestamp())
    }

    /// Returns the current value length.
    #[inline]
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.value.lock().len()
    }

    /// Replaces the value without notifying subscribers. Returns `false` if
    /// `v` exceeds the maximum length.
    #[inline]
    pub fn set_value(&self, v: &[u8]) -> bool {
        self.value.lock().set_value(v)
    }

    /// Creates a descriptor and adds it to the characteristic. The Client
    /// Characteristic Configuration descriptor is managed by the host, so a
    /// manually created one is hidden.
    pub fn create_descriptor(&self, uuid: Uuid, props: Props, max_len: usize) -> Arc<Descriptor> {
        let dsc = Descriptor::new(uuid, props, max_len);
        if uuid == Uuid16::CCCD {
            warn!("Manually created {uuid} descriptor has no effect");
            dsc.set_removal(Removal::Hidden);
        } else if self.descriptor_by_uuid(uuid, 0).is_some() {
            warn!("Creating a duplicate descriptor {uuid} in {}", self.uuid);
        }
        dsc.set_characteristic(Weak::clone(&self.this));
        self.dscs.write().push(Arc::clone(&dsc));
        self.structure_changed();
        dsc
    }

    /// Adds a detached or previously removed descriptor.
    pub fn add_descriptor(&self, dsc: &Arc<Descriptor>) {
        let mut dscs = self.dscs.write();
        if !dscs.iter().any(|d| Arc::ptr_eq(d, dsc)) {
            dscs.push(Arc::clone(dsc));
        }
        drop(dscs);
        dsc.set_removal(Removal::Live);
        dsc.set_characteristic(Weak::clone(&self.this));
        self.structure_changed();
    }

    /// Removes a descriptor. A descriptor of a service that was never
    /// registered is deleted immediately. Otherwise it stays in place, hidden
    /// or pending deletion, until the database is rebuilt.
    pub fn remove_descriptor(&self, dsc: &Arc<Descriptor>, delete: bool) {
        let mut dscs = self.dscs.write();
        let Some(i) = dscs.iter().position(|d| Arc::ptr_eq(d, dsc)) else {
            return;
        };
        if delete && !self.service().map_or(false, |s| s.is_started()) {
            dscs.remove(i);
            return;
        }
        let prev = dsc.removal();
        if prev == Removal::PendingDelete || (prev == Removal::Hidden && !delete) {
            return;
        }
        drop(dscs);
        dsc.set_removal(Removal::of(delete));
        if prev.is_live() {
            self.structure_changed();
        }
    }

    /// Returns the `i`th descriptor with the specified UUID.
    #[must_use]
    pub fn descriptor_by_uuid(&self, uuid: Uuid, i: usize) -> Option<Arc<Descriptor>> {
        (self.dscs.read().iter())
            .filter(|d| d.uuid() == uuid)
            .nth(i)
            .cloned()
    }

    /// Returns the descriptor with the specified handle.
    #[must_use]
    pub fn descriptor_by_handle(&self, hdl: Handle) -> Option<Arc<Descriptor>> {
        (self.dscs.read().iter())
            .find(|d| d.handle() == Some(hdl))
            .cloned()
    }

    /// Returns all descriptors, including removed ones that are still
    /// registered.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Arc<Descriptor>> {
        self.dscs.read().clone()
    }

    /// Returns the current subscribers and their subscription values.
    #[must_use]
    pub fn subscribers(&self) -> Vec<(ConnHandle, u16)> {
        self.subs.lock().to_vec()
    }

    /// Notifies all subscribers of the current value.
    #[inline]
    pub fn notify(&self) -> bool {
        self.send_value(None, false, None)
    }

    /// Notifies peers of `v`. Sends to all connected peers, or to `conn` only.
    #[inline]
    pub fn notify_value(&self, v: &[u8], conn: Option<ConnHandle>) -> bool {
        self.send_value(Some(v), false, conn)
    }

    /// Indicates the current value to all subscribers.
    #[inline]
    pub fn indicate(&self) -> bool {
        self.send_value(None, true, None)
    }

    /// Indicates `v` to peers. Sends to all connected peers, or to `conn`
    /// only.
    #[inline]
    pub fn indicate_value(&self, v: &[u8], conn: Option<ConnHandle>) -> bool {
        self.send_value(Some(v), true, conn)
    }

    /// Sends a notification or indication. An explicit value is sent to each
    /// matching connected peer in a separate buffer. Without a value, the
    /// host reads the current value through the access callback, either for
    /// one connection or for all subscribers.
    fn send_value(&self, v: Option<&[u8]>, indicate: bool, conn: Option<ConnHandle>) -> bool {
        let Some(srv) = self.service().and_then(|s| s.server()) else {
            debug!("Characteristic {} is not attached to a server", self.uuid);
            return false;
        };
        let Some(hdl) = self.handle() else {
            debug!("Characteristic {} is not registered", self.uuid);
            return false;
        };
        let host = srv.host();
        let send = |cn, om| {
            if indicate {
                host.gatts_indicate(cn, hdl, om)
            } else {
                host.gatts_notify(cn, hdl, om)
            }
        };
        let r: Result<()> = match (v, conn) {
            (Some(v), _) if !v.is_empty() => (srv.peers().into_iter())
                .filter(|&cn| conn.map_or(true, |c| c == cn))
                .try_for_each(|cn| {
                    let mut om = Mbuf::new(v.len());
                    om.append(v);
                    send(cn, Some(om))
                }),
            (_, Some(cn)) => send(cn, None),
            (_, None) => {
                host.gatts_chr_updated(hdl);
                Ok(())
            }
        };
        r.map_err(|e| debug!("Failed to send value of {}: {e}", self.uuid))
            .is_ok()
    }

    #[inline(always)]
    pub(super) const fn id(&self) -> AttrId {
        self.id
    }

    #[inline]
    pub(super) fn set_service(&self, svc: Weak<Service>) {
        *self.svc.write() = svc;
    }

    #[inline]
    pub(super) fn set_removal(&self, r: Removal) {
        self.removed.set(r);
    }

    /// Compiles the registration record for this characteristic and its live
    /// descriptors.
    pub(super) fn compile(&self, srv: &Server) -> ChrDef {
        let dscs = self.dscs.read();
        let mut defs = Vec::with_capacity(dscs.len() + 1);
        for d in dscs.iter().filter(|d| d.removal().is_live()) {
            defs.push(DscDef {
                uuid: Some(d.uuid()),
                flags: DscFlags::from(d.props()),
                arg: Some(d.id()),
            });
            srv.register(LocalAttr::Dsc(Arc::clone(d)));
        }
        defs.push(DscDef::end());
        if let Some(this) = self.this.upgrade() {
            srv.register(LocalAttr::Chr(this));
        }
        ChrDef {
            uuid: Some(self.uuid),
            flags: self.props.into(),
            arg: Some(self.id),
            val_handle: Some(Arc::clone(&self.handle)),
            dscs: defs,
        }
    }

    /// Drops descriptors that are pending deletion and clears all handles.
    /// Called only while the database is being rebuilt.
    pub(super) fn purge(&self) {
        self.handle.clear();
        self.subs.lock().clear();
        self.dscs.write().retain(|d| {
            d.set_handle(None);
            d.removal() != Removal::PendingDelete
        });
    }

    /// Records a subscription change and returns the subscription value.
    pub(super) fn subscribe(&self, cn: ConnHandle, notify: bool, indicate: bool) -> u16 {
        let v = u16::from(notify) | u16::from(indicate) << 1;
        let mut subs = self.subs.lock();
        match subs.iter().position(|&(c, _)| c == cn) {
            Some(i) if v == 0 => {
                subs.remove(i);
            }
            Some(i) => subs[i].1 = v,
            None if v != 0 => subs.push((cn, v)),
            None => {}
        }
        v
    }

    /// Serves a host access to the characteristic value.
    pub(super) fn serve(
        &self,
        info: Option<&ConnInfo>,
        ctxt: &mut Access<'_>,
    ) -> std::result::Result<(), ErrorCode> {
        let cb = Arc::clone(&self.cb.read());
        serve_access(
            &self.value,
            info,
            ctxt,
            |info| cb.on_read(self, info),
            |info| cb.on_write(self, info),
        )
    }

    /// Reports a transmit status. Indications that were sent but not yet
    /// acknowledged are not reported.
    pub(super) fn tx_status(&self, status: TxStatus, indication: bool) {
        if indication && status == TxStatus::Sent {
            return;
        }
        let cb = Arc::clone(&self.cb.read());
        cb.on_status(self, status);
    }

    /// Reports a subscription change to the callbacks.
    pub(super) fn on_subscribe(&self, info: &ConnInfo, sub_value: u16) {
        let cb = Arc::clone(&self.cb.read());
        cb.on_subscribe(self, info, sub_value);
    }

    /// Marks the server database as changed.
    fn structure_changed(&self) {
        if let Some(srv) = self.service().and_then(|s| s.server()) {
            srv.service_changed();
        }
    }
}

impl Debug for Characteristic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Characteristic))
            .field("uuid", &self.uuid)
            .field("handle", &self.handle())
            .field("props", &self.props)
            .field("removed", &self.removal())
            .finish_non_exhaustive()
    }
}
