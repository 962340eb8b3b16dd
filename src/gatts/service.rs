use std::fmt::{Debug, Formatter};
use std::slice;
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::att::{Handle, HandleCell};
use crate::gap::Uuid;
use crate::host::{ChrDef, SvcDef, SvcType};
use crate::util::name_of;
use crate::{SyncMutex, SyncRwLock};

use super::*;

/// Local primary service.
pub struct Service {
    this: Weak<Self>,
    uuid: Uuid,
    handle: HandleCell,
    removed: RemovalCell,
    srv: SyncRwLock<Weak<Server>>,
    chrs: SyncRwLock<Vec<Arc<Characteristic>>>,
    def: SyncMutex<Option<SvcDef>>,
}

impl Service {
    /// Creates a detached service that can be added to the server with
    /// [`Server::add_service`].
    #[must_use]
    pub fn new(uuid: Uuid) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            uuid,
            handle: HandleCell::new(),
            removed: RemovalCell::default(),
            srv: SyncRwLock::new(Weak::new()),
            chrs: SyncRwLock::new(Vec::new()),
            def: SyncMutex::new(None),
        })
    }

    /// Returns the service UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the service declaration handle or `None` if the server was not
    /// started with this service.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.handle.get()
    }

    /// Returns the removal state.
    #[inline]
    #[must_use]
    pub fn removal(&self) -> Removal {
        self.removed.get()
    }

    /// Returns the owning server.
    #[inline]
    #[must_use]
    pub fn server(&self) -> Option<Arc<Server>> {
        self.srv.read().upgrade()
    }

    /// Returns whether the service was registered with the host.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.def.lock().is_some()
    }

    /// Creates a characteristic and adds it to the service. Duplicate UUIDs
    /// are allowed and resolved by index in [`Self::characteristic_by_uuid`].
    pub fn create_characteristic(
        &self,
        uuid: Uuid,
        props: Props,
        max_len: usize,
    ) -> Arc<Characteristic> {
        if self.characteristic(uuid).is_some() {
            warn!("Creating a duplicate characteristic {uuid} in {}", self.uuid);
        }
        let chr = Characteristic::new(uuid, props, max_len);
        chr.set_service(Weak::clone(&self.this));
        self.chrs.write().push(Arc::clone(&chr));
        self.structure_changed();
        chr
    }

    /// Adds a detached or previously removed characteristic.
    pub fn add_characteristic(&self, chr: &Arc<Characteristic>) {
        let mut chrs = self.chrs.write();
        if chrs.iter().any(|c| Arc::ptr_eq(c, chr)) {
            if chr.removal().is_live() {
                debug!("Characteristic {} is already in {}", chr.uuid(), self.uuid);
                return;
            }
        } else {
            if chrs.iter().any(|c| c.uuid() == chr.uuid()) {
                warn!("Adding a duplicate characteristic {} to {}", chr.uuid(), self.uuid);
            }
            chrs.push(Arc::clone(chr));
        }
        drop(chrs);
        chr.set_removal(Removal::Live);
        chr.set_service(Weak::clone(&self.this));
        self.structure_changed();
    }

    /// Removes a characteristic. A characteristic of a service that was never
    /// registered is deleted immediately. Otherwise it stays in place, hidden
    /// or pending deletion, until the database is rebuilt.
    pub fn remove_characteristic(&self, chr: &Arc<Characteristic>, delete: bool) {
        let mut chrs = self.chrs.write();
        let Some(i) = chrs.iter().position(|c| Arc::ptr_eq(c, chr)) else {
            return;
        };
        if delete && !self.is_started() {
            chrs.remove(i);
            return;
        }
        let prev = chr.removal();
        if prev == Removal::PendingDelete || (prev == Removal::Hidden && !delete) {
            return;
        }
        drop(chrs);
        chr.set_removal(Removal::of(delete));
        self.structure_changed();
    }

    /// Returns the first characteristic with the specified UUID.
    #[inline]
    #[must_use]
    pub fn characteristic(&self, uuid: Uuid) -> Option<Arc<Characteristic>> {
        self.characteristic_by_uuid(uuid, 0)
    }

    /// Returns the `i`th characteristic with the specified UUID.
    #[must_use]
    pub fn characteristic_by_uuid(&self, uuid: Uuid, i: usize) -> Option<Arc<Characteristic>> {
        (self.chrs.read().iter())
            .filter(|c| c.uuid() == uuid)
            .nth(i)
            .cloned()
    }

    /// Returns the characteristic with the specified value handle.
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Arc<Characteristic>> {
        (self.chrs.read().iter())
            .find(|c| c.handle() == Some(hdl))
            .cloned()
    }

    /// Returns all characteristics, including removed ones that are still
    /// registered.
    #[must_use]
    pub fn characteristics(&self) -> Vec<Arc<Characteristic>> {
        self.chrs.read().clone()
    }

    /// Compiles the live characteristics and descriptors into a registration
    /// record and submits it to the host. Returns `true` without contacting
    /// the host if the service is already registered and the database has not
    /// changed since. On failure, the service remains unstarted.
    pub fn start(&self) -> bool {
        let Some(srv) = self.server() else {
            warn!("Service {} is not attached to a server", self.uuid);
            return false;
        };
        if self.is_started() && !srv.is_changed() {
            return true;
        }
        *self.def.lock() = None;
        let def = self.compile(&srv);
        debug!(
            "Registering service {} with {} characteristic(s)",
            self.uuid,
            def.chrs.len() - 1
        );
        let host = srv.host();
        let defs = slice::from_ref(&def);
        if let Err(e) = host.gatts_count_cfg(defs) {
            warn!("Failed to count service {} configuration: {e}", self.uuid);
            return false;
        }
        if let Err(e) = host.gatts_add_svcs(defs) {
            warn!("Failed to add service {}: {e}", self.uuid);
            return false;
        }
        *self.def.lock() = Some(def);
        true
    }

    #[inline]
    pub(super) fn set_server(&self, srv: Weak<Server>) {
        *self.srv.write() = srv;
    }

    #[inline]
    pub(super) fn set_removal(&self, r: Removal) {
        self.removed.set(r);
    }

    #[inline]
    pub(super) fn set_handle(&self, h: Handle) {
        self.handle.set(h);
    }

    /// Drops characteristics that are pending deletion, discards the
    /// registration record, and clears all handles. Called only while the
    /// database is being rebuilt.
    pub(super) fn purge(&self) {
        *self.def.lock() = None;
        self.handle.clear();
        self.chrs.write().retain(|c| {
            c.purge();
            c.removal() != Removal::PendingDelete
        });
    }

    /// Builds the registration record. Each live attribute is registered with
    /// the server under its context ID.
    fn compile(&self, srv: &Server) -> SvcDef {
        let chrs = self.chrs.read().clone();
        let mut defs = Vec::with_capacity(chrs.len() + 1);
        for c in chrs.iter().filter(|c| c.removal().is_live()) {
            defs.push(c.compile(srv));
        }
        defs.push(ChrDef::end());
        SvcDef {
            typ: SvcType::Primary,
            uuid: self.uuid,
            chrs: defs,
        }
    }

    fn structure_changed(&self) {
        if let Some(srv) = self.server() {
            srv.service_changed();
        }
    }
}

impl Debug for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Service))
            .field("uuid", &self.uuid)
            .field("handle", &self.handle())
            .field("removed", &self.removal())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}
