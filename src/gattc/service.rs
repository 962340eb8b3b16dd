use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::att::{AttValue, ErrorCode, Handle, HandleRange};
use crate::gap::Uuid;
use crate::host::{ChrInfo, Error, HsError, Result, SvcInfo};
use crate::util::name_of;
use crate::SyncRwLock;

use super::*;

/// Service of a peer database.
pub struct RemoteService {
    this: Weak<Self>,
    client: Weak<Client>,
    uuid: Uuid,
    range: HandleRange,
    chrs: SyncRwLock<Vec<Arc<RemoteCharacteristic>>>,
}

impl RemoteService {
    pub(super) fn new(client: Weak<Client>, info: SvcInfo) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            client,
            uuid: info.uuid,
            range: info.range,
            chrs: SyncRwLock::new(Vec::new()),
        })
    }

    /// Returns the service UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the service declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.range.start()
    }

    /// Returns the last handle of the service.
    #[inline(always)]
    #[must_use]
    pub const fn end_handle(&self) -> Handle {
        self.range.end()
    }

    /// Returns the owning client.
    #[inline]
    #[must_use]
    pub fn client(&self) -> Option<Arc<Client>> {
        self.client.upgrade()
    }

    /// Returns the first characteristic with the specified UUID, discovering
    /// characteristics if it is not in the mirror.
    pub async fn characteristic(&self, uuid: Uuid) -> Option<Arc<RemoteCharacteristic>> {
        if let Some(c) = self.cached_characteristic(uuid) {
            return Some(c);
        }
        if let Err(e) = self.discover_characteristics().await {
            debug!("Characteristic {uuid} not found: {e}");
            return None;
        }
        self.cached_characteristic(uuid)
    }

    /// Returns all characteristics, discovering them first if none are in the
    /// mirror or `refresh` is set.
    pub async fn characteristics(&self, refresh: bool) -> Result<Vec<Arc<RemoteCharacteristic>>> {
        if refresh {
            self.delete_characteristics();
        }
        if self.chrs.read().is_empty() {
            self.discover_characteristics().await?;
        }
        Ok(self.cached_characteristics())
    }

    /// Returns the mirrored characteristics without contacting the peer.
    #[must_use]
    pub fn cached_characteristics(&self) -> Vec<Arc<RemoteCharacteristic>> {
        self.chrs.read().clone()
    }

    /// Returns the mirrored characteristic with the specified value handle.
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Arc<RemoteCharacteristic>> {
        (self.chrs.read().iter())
            .find(|c| c.handle() == hdl)
            .cloned()
    }

    /// Removes all characteristics from the mirror.
    pub fn delete_characteristics(&self) {
        self.chrs.write().clear();
    }

    /// Reads the value of the first characteristic with the specified UUID.
    pub async fn get_value(&self, chr: Uuid) -> Result<AttValue> {
        match self.characteristic(chr).await {
            Some(c) => c.read_value().await,
            None => Err(ErrorCode::AttributeNotFound.into()),
        }
    }

    /// Writes the value of the first characteristic with the specified UUID.
    pub async fn set_value(&self, chr: Uuid, v: &[u8], response: bool) -> Result<()> {
        match self.characteristic(chr).await {
            Some(c) => c.write_value(v, response).await,
            None => Err(ErrorCode::AttributeNotFound.into()),
        }
    }

    /// Discovers the characteristics of this service. Characteristics that
    /// are already mirrored are kept.
    pub async fn discover_characteristics(&self) -> Result<()> {
        let cl = self.client().ok_or(Error::Host(HsError::NotConnected))?;
        let cn = cl.conn_handle().ok_or(Error::Host(HsError::NotConnected))?;
        let this = Weak::clone(&self.this);
        let host = cl.host_ref();
        let r = discover(
            |cb| host.gattc_disc_chrs(cn, self.range, cb),
            move |info: ChrInfo| {
                if let Some(s) = this.upgrade() {
                    s.add_characteristic(info);
                }
            },
        )
        .await;
        r.map_err(|e| {
            warn!("Characteristic discovery in {} failed: {e}", self.uuid);
            e
        })
    }

    /// Returns the end of the descriptor range of the characteristic whose
    /// declaration is at `def`: the handle before the next characteristic
    /// declaration or the end of the service.
    pub(super) fn dsc_end(&self, def: Handle) -> Handle {
        (self.chrs.read().iter())
            .map(|c| c.def_handle())
            .filter(|&h| h > def)
            .min()
            .and_then(Handle::prev)
            .unwrap_or_else(|| self.end_handle())
    }

    fn cached_characteristic(&self, uuid: Uuid) -> Option<Arc<RemoteCharacteristic>> {
        (self.chrs.read().iter())
            .find(|c| c.uuid() == uuid)
            .cloned()
    }

    fn add_characteristic(&self, info: ChrInfo) {
        let mut chrs = self.chrs.write();
        if !chrs.iter().any(|c| c.handle() == info.val_handle) {
            debug!("Found characteristic {} at {}", info.uuid, info.val_handle);
            chrs.push(RemoteCharacteristic::new(Weak::clone(&self.this), info));
        }
    }
}

impl Debug for RemoteService {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(RemoteService))
            .field("uuid", &self.uuid)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}
