use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use crate::att::{AttValue, Handle, MAX_VAL_LEN};
use crate::gap::Uuid;
use crate::host::{DscInfo, Error, HsError, Result};
use crate::util::name_of;
use crate::SyncMutex;

use super::*;

/// Descriptor of a peer database.
pub struct RemoteDescriptor {
    chr: Weak<RemoteCharacteristic>,
    uuid: Uuid,
    handle: Handle,
    value: SyncMutex<AttValue>,
}

impl RemoteDescriptor {
    pub(super) fn new(chr: Weak<RemoteCharacteristic>, info: DscInfo) -> Arc<Self> {
        Arc::new(Self {
            chr,
            uuid: info.uuid,
            handle: info.handle,
            value: SyncMutex::new(AttValue::new(MAX_VAL_LEN)),
        })
    }

    /// Returns the descriptor UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the descriptor handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the owning characteristic.
    #[inline]
    #[must_use]
    pub fn characteristic(&self) -> Option<Arc<RemoteCharacteristic>> {
        self.chr.upgrade()
    }

    /// Returns the owning client.
    #[must_use]
    pub fn client(&self) -> Option<Arc<Client>> {
        self.characteristic().and_then(|c| c.client())
    }

    /// Returns the last value read.
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
}

impl Debug for RemoteDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(RemoteDescriptor))
            .field("uuid", &self.uuid)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
