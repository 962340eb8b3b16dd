use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::att::{AttValue, Handle, HandleRange, MAX_VAL_LEN};
use crate::gap::{Uuid, Uuid16};
use crate::host::{ChrInfo, DscInfo, Error, HsError, Result};
use crate::util::name_of;
use crate::{SyncMutex, SyncRwLock};

use super::*;

/// Characteristic of a peer database.
pub struct RemoteCharacteristic {
    this: Weak<Self>,
    svc: Weak<RemoteService>,
    uuid: Uuid,
    def_handle: Handle,
    handle: Handle,
    props: CharProps,
    value: SyncMutex<AttValue>,
    dscs: SyncRwLock<Vec<Arc<RemoteDescriptor>>>,
    notify_cb: SyncRwLock<Option<NotifyCallback>>,
}

impl RemoteCharacteristic {
    pub(super) fn new(svc: Weak<RemoteService>, info: ChrInfo) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            svc,
            uuid: info.uuid,
            def_handle: info.def_handle,
            handle: info.val_handle,
            props: CharProps::from_bits_truncate(info.props),
            value: SyncMutex::new(AttValue::new(MAX_VAL_LEN)),
            dscs: SyncRwLock::new(Vec::new()),
            notify_cb: SyncRwLock::new(None),
        })
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the characteristic value handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the characteristic declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn def_handle(&self) -> Handle {
        self.def_handle
    }

    /// Returns the characteristic properties.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> CharProps {
        self.props
    }

    #[inline]
    #[must_use]
    pub const fn can_broadcast(&self) -> bool {
        self.props.contains(CharProps::BROADCAST)
    }

    #[inline]
    #[must_use]
    pub const fn can_read(&self) -> bool {
        self.props.contains(CharProps::READ)
    }

    #[inline]
    #[must_use]
    pub const fn can_write_no_response(&self) -> bool {
        self.props.contains(CharProps::WRITE_WITHOUT_RESPONSE)
    }

    #[inline]
    #[must_use]
    pub const fn can_write(&self) -> bool {
        self.props.contains(CharProps::WRITE)
    }

    #[inline]
    #[must_use]
    pub const fn can_notify(&self) -> bool {
        self.props.contains(CharProps::NOTIFY)
    }

    #[inline]
    #[must_use]
    pub const fn can_indicate(&self) -> bool {
        self.props.contains(CharProps::INDICATE)
    }

    #[inline]
    #[must_use]
    pub const fn can_write_signed(&self) -> bool {
        self.props.contains(CharProps::AUTHENTICATED_SIGNED_WRITES)
    }

    /// Returns the owning service.
    #[inline]
    #[must_use]
    pub fn service(&self) -> Option<Arc<RemoteService>> {
        self.svc.upgrade()
    }

    /// Returns the owning client.
    #[must_use]
    pub fn client(&self) -> Option<Arc<Client>> {
        self.service().and_then(|s| s.client())
    }

    /// Returns the last value read, notified, or indicated.
    #[must_use]
    pub fn value(&self) -> AttValue {
        self.value.lock().clone()
    }

    /// Reads the value from the peer and updates the cached value.
    pub async fn read_value(&self) -> Result<AttValue> {
        let cl = self.client().ok_or(Error::Host(HsError::NotConnected))?;
        let v = cl.read_attr(self.handle).await?;
        *self.value.lock() = v.clone();
        Ok(v)
    }

    /// Writes the value to the peer.
    pub async fn write_value(&self, v: &[u8], response: bool) -> Result<()> {
        let cl = self.client().ok_or(Error::Host(HsError::NotConnected))?;
        cl.write_attr(self.handle, v, response).await
    }

    /// Returns the first descriptor with the specified UUID, discovering
    /// descriptors if it is not in the mirror.
    pub async fn descriptor(&self, uuid: Uuid) -> Option<Arc<RemoteDescriptor>> {
        if let Some(d) = self.cached_descriptor(uuid) {
            return Some(d);
        }
        if let Err(e) = self.discover_descriptors().await {
            debug!("Descriptor {uuid} not found: {e}");
            return None;
        }
        self.cached_descriptor(uuid)
    }

    /// Returns all descriptors, discovering them first if none are in the
    /// mirror or `refresh` is set.
    pub async fn descriptors(&self, refresh: bool) -> Result<Vec<Arc<RemoteDescriptor>>> {
        if refresh {
            self.delete_descriptors();
        }
        if self.dscs.read().is_empty() {
            self.discover_descriptors().await?;
        }
        Ok(self.dscs.read().clone())
    }

    /// Removes all descriptors from the mirror.
    pub fn delete_descriptors(&self) {
        self.dscs.write().clear();
    }

    /// Discovers the descriptors between the value handle and the next
    /// characteristic declaration or the end of the service.
    pub async fn discover_descriptors(&self) -> Result<()> {
        let svc = self.service().ok_or(Error::Host(HsError::NotConnected))?;
        let cl = svc.client().ok_or(Error::Host(HsError::NotConnected))?;
        let cn = cl.conn_handle().ok_or(Error::Host(HsError::NotConnected))?;
        let end = svc.dsc_end(self.def_handle);
        let Some(range) = HandleRange::new(self.handle, end).filter(|_| end > self.handle) else {
            return Ok(());
        };
        let this = Weak::clone(&self.this);
        let host = cl.host_ref();
        discover(
            |cb| host.gattc_disc_dscs(cn, range, cb),
            move |info: DscInfo| {
                if let Some(c) = this.upgrade() {
                    c.add_descriptor(info);
                }
            },
        )
        .await
        .map_err(|e| {
            warn!("Descriptor discovery for {} failed: {e}", self.uuid);
            e
        })
    }

    /// Subscribes to notifications or indications by writing the Client
    /// Characteristic Configuration descriptor. `cb` replaces the current
    /// notification handler when set.
    pub async fn subscribe(
        &self,
        notifications: bool,
        cb: Option<NotifyCallback>,
        response: bool,
    ) -> Result<()> {
        let (cccd, supported) = if notifications {
            (Cccd::NOTIFY, self.can_notify())
        } else {
            (Cccd::INDICATE, self.can_indicate())
        };
        if !supported {
            warn!("Characteristic {} does not support {cccd:?}", self.uuid);
            return Err(Error::Host(HsError::NotSupported));
        }
        if cb.is_some() {
            *self.notify_cb.write() = cb;
        }
        self.write_cccd(cccd, response).await
    }

    /// Disables notifications and indications.
    pub async fn unsubscribe(&self, response: bool) -> Result<()> {
        self.write_cccd(Cccd::empty(), response).await
    }

    /// Updates the cached value from a received notification or indication
    /// and calls the notification handler.
    pub(super) fn on_notify(&self, data: &[u8], is_notify: bool) {
        {
            let mut v = self.value.lock();
            if !v.set_value(data) {
                debug!("Notification of {} bytes truncated", data.len());
                *v = AttValue::with_value(data, MAX_VAL_LEN);
            }
            v.set_timestamp(SystemTime::now());
        }
        let cb = self.notify_cb.read().clone();
        if let Some(cb) = cb {
            cb(self, data, is_notify);
        }
    }

    async fn write_cccd(&self, v: Cccd, response: bool) -> Result<()> {
        let Some(d) = self.descriptor(Uuid16::CCCD.as_uuid()).await else {
            warn!("Characteristic {} has no CCCD", self.uuid);
            return Ok(());
        };
        d.write_value(&v.to_le_bytes(), response).await
    }

    fn cached_descriptor(&self, uuid: Uuid) -> Option<Arc<RemoteDescriptor>> {
        self.dscs.read().iter().find(|d| d.uuid() == uuid).cloned()
    }

    fn add_descriptor(&self, info: DscInfo) {
        let mut dscs = self.dscs.write();
        if !dscs.iter().any(|d| d.handle() == info.handle) {
            debug!("Found descriptor {} at {}", info.uuid, info.handle);
            dscs.push(RemoteDescriptor::new(Weak::clone(&self.this), info));
        }
    }
}

impl Debug for RemoteCharacteristic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(RemoteCharacteristic))
            .field("uuid", &self.uuid)
            .field("handle", &self.handle)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}
