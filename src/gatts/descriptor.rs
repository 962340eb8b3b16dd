use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use crate::att::{AttValue, ErrorCode, Handle, HandleCell};
use crate::gap::{ConnInfo, Uuid};
use crate::host::{Access, AttrId};
use crate::util::name_of;
use crate::{SyncMutex, SyncRwLock};

use super::*;

/// Local characteristic descriptor.
pub struct Descriptor {
    id: AttrId,
    uuid: Uuid,
    props: Props,
    handle: HandleCell,
    value: SyncMutex<AttValue>,
    removed: RemovalCell,
    chr: SyncRwLock<Weak<Characteristic>>,
    cb: SyncRwLock<Arc<dyn DescriptorCallbacks>>,
}

impl Descriptor {
    /// Creates a detached descriptor that can be added to a characteristic
    /// with [`Characteristic::add_descriptor`].
    #[must_use]
    pub fn new(uuid: Uuid, props: Props, max_len: usize) -> Arc<Self> {
        Arc::new(Self {
            id: AttrId::next(),
            uuid,
            props,
            handle: HandleCell::new(),
            value: SyncMutex::new(AttValue::new(max_len)),
            removed: RemovalCell::default(),
            chr: SyncRwLock::new(Weak::new()),
            cb: SyncRwLock::new(Arc::new(Defaults)),
        })
    }

    /// Returns the descriptor UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the descriptor handle or `None` if the descriptor is not
    /// registered.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.handle.get()
    }

    /// Returns the descriptor properties.
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

    /// Returns the owning characteristic.
    #[inline]
    #[must_use]
    pub fn characteristic(&self) -> Option<Arc<Characteristic>> {
        self.chr.read().upgrade()
    }

    /// Sets the event callbacks.
    #[inline]
    pub fn set_callbacks(&self, cb: Arc<dyn DescriptorCallbacks>) {
        *self.cb.write() = cb;
    }

    /// Returns a snapshot of the value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> AttValue {
        self.value.lock().clone()
    }

    /// Returns the current value length.
    #[inline]
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.value.lock().len()
    }

    /// Replaces the value. Returns `false` if `v` exceeds the maximum length.
    #[inline]
    pub fn set_value(&self, v: &[u8]) -> bool {
        self.value.lock().set_value(v)
    }

    #[inline(always)]
    pub(super) const fn id(&self) -> AttrId {
        self.id
    }

    #[inline]
    pub(super) fn set_characteristic(&self, chr: Weak<Characteristic>) {
        *self.chr.write() = chr;
    }

    #[inline]
    pub(super) fn set_removal(&self, r: Removal) {
        self.removed.set(r);
    }

    #[inline]
    pub(super) fn set_handle(&self, h: Option<Handle>) {
        match h {
            Some(h) => self.handle.set(h),
            None => self.handle.clear(),
        }
    }

    /// Serves a host access to the descriptor value.
    pub(super) fn serve(
        &self,
        info: Option<&ConnInfo>,
        ctxt: &mut Access<'_>,
    ) -> Result<(), ErrorCode> {
        let cb = Arc::clone(&self.cb.read());
        serve_access(
            &self.value,
            info,
            ctxt,
            |info| cb.on_read(self, info),
            |info| cb.on_write(self, info),
        )
    }
}

impl Debug for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Descriptor))
            .field("uuid", &self.uuid)
            .field("handle", &self.handle())
            .field("props", &self.props)
            .field("removed", &self.removal())
            .finish_non_exhaustive()
    }
}
