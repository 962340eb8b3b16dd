//! GATT server ([Vol 3] Part G) over the host's attribute database.
//!
//! The application builds a tree of [`Service`]s, [`Characteristic`]s, and
//! [`Descriptor`]s owned by the [`Server`]. Starting a service compiles the
//! live part of its subtree into native registration records. Every record
//! carries an [`AttrId`] that the server maps back to the attribute object
//! when the host delivers an access callback.
//!
//! Structural changes after the server is started are deferred. Removed
//! attributes stay registered (hidden or pending deletion) until all peers
//! disconnect, at which point the server resets the host database and
//! registers the current tree again.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, trace};

pub use {callbacks::*, characteristic::*, descriptor::*, props::*, server::*, service::*};

use crate::att::{AttValue, ErrorCode};
use crate::gap::ConnInfo;
use crate::host::{Access, AccessOp};
use crate::SyncMutex;

mod callbacks;
mod characteristic;
mod descriptor;
mod props;
mod server;
mod service;

#[cfg(test)]
mod tests;

/// Removal state of a local attribute.
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum Removal {
    /// Registered (or to be registered) and visible.
    Live,
    /// Excluded from the next rebuild but kept for re-adding.
    Hidden,
    /// Deleted when the database is rebuilt.
    PendingDelete,
}

impl Default for Removal {
    #[inline]
    fn default() -> Self {
        Self::Live
    }
}

impl Removal {
    /// Returns the removal state for a remove operation.
    #[inline]
    #[must_use]
    pub const fn of(delete: bool) -> Self {
        if delete {
            Self::PendingDelete
        } else {
            Self::Hidden
        }
    }

    /// Returns whether the attribute is live.
    #[inline(always)]
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Removal state that can be changed from the host task.
#[derive(Debug, Default)]
struct RemovalCell(AtomicU8);

impl RemovalCell {
    #[inline]
    fn get(&self) -> Removal {
        use num_enum::TryFromPrimitive;
        Removal::try_from_primitive(self.0.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[inline]
    fn set(&self, r: Removal) {
        self.0.store(r as u8, Ordering::Release);
    }
}

/// Serves a read or write access to a local attribute value. `on_read` is
/// called before the value is copied for the first fragment of a peer read.
/// `on_write` is called once the complete written value is committed.
fn serve_access(
    value: &SyncMutex<AttValue>,
    info: Option<&ConnInfo>,
    ctxt: &mut Access<'_>,
    on_read: impl FnOnce(&ConnInfo),
    on_write: impl FnOnce(&ConnInfo),
) -> Result<(), ErrorCode> {
    match ctxt.op {
        AccessOp::ReadChr | AccessOp::ReadDsc => {
            if let Some(info) = info.filter(|_| ctxt.offset == 0) {
                on_read(info);
            }
            let v = value.lock();
            trace!("Read {} bytes at offset {}", v.len(), ctxt.offset);
            if ctxt.om.append(&v) {
                Ok(())
            } else {
                Err(ErrorCode::InsufficientResources)
            }
        }
        AccessOp::WriteChr | AccessOp::WriteDsc => {
            let max = value.lock().max_len();
            let mut buf = Vec::with_capacity(ctxt.om.len().min(max));
            for seg in ctxt.om.segments() {
                if buf.len() + seg.len() > max {
                    debug!("Write exceeds maximum value length {max}");
                    return Err(ErrorCode::InvalidAttributeValueLength);
                }
                buf.extend_from_slice(seg);
            }
            if !value.lock().set_value(&buf) {
                return Err(ErrorCode::InvalidAttributeValueLength);
            }
            match info {
                Some(info) => on_write(info),
                None => debug!("Write from an unknown connection"),
            }
            Ok(())
        }
    }
}
