use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;

use crate::att::HandleCell;
use crate::gap::Uuid;
use crate::util::name_of;

/// Opaque attribute context registered with the host and passed back with
/// every access to that attribute. It indexes the server's attribute map
/// instead of pointing at the attribute object.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct AttrId(u32);

impl AttrId {
    /// Allocates a process-unique attribute context.
    #[inline]
    #[must_use]
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Debug for AttrId {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", name_of!(AttrId), self.0)
    }
}

/// Service declaration type.
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SvcType {
    #[default]
    Primary,
    Secondary,
}

/// Native service registration record.
#[derive(Clone, Debug)]
pub struct SvcDef {
    pub typ: SvcType,
    pub uuid: Uuid,
    /// Characteristic definitions terminated by [`ChrDef::end()`].
    pub chrs: Vec<ChrDef>,
}

impl SvcDef {
    /// Returns the characteristic definitions without the terminator.
    #[inline]
    pub fn live_chrs(&self) -> impl Iterator<Item = &ChrDef> {
        self.chrs.iter().take_while(|c| !c.is_end())
    }
}

/// Native characteristic registration record.
#[derive(Clone, Debug)]
pub struct ChrDef {
    /// Characteristic UUID or `None` for the terminating entry.
    pub uuid: Option<Uuid>,
    pub flags: ChrFlags,
    /// Context passed back to the server's access callback.
    pub arg: Option<AttrId>,
    /// Storage where the host writes the assigned value handle.
    pub val_handle: Option<Arc<HandleCell>>,
    /// Descriptor definitions terminated by [`DscDef::end()`].
    pub dscs: Vec<DscDef>,
}

impl ChrDef {
    /// Returns the entry that terminates a characteristic list.
    #[inline]
    #[must_use]
    pub const fn end() -> Self {
        Self {
            uuid: None,
            flags: ChrFlags::empty(),
            arg: None,
            val_handle: None,
            dscs: Vec::new(),
        }
    }

    /// Returns whether this entry terminates the list.
    #[inline(always)]
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.uuid.is_none()
    }

    /// Returns the descriptor definitions without the terminator.
    #[inline]
    pub fn live_dscs(&self) -> impl Iterator<Item = &DscDef> {
        self.dscs.iter().take_while(|d| !d.is_end())
    }
}

/// Native descriptor registration record.
#[derive(Clone, Copy, Debug)]
pub struct DscDef {
    /// Descriptor UUID or `None` for the terminating entry.
    pub uuid: Option<Uuid>,
    pub flags: DscFlags,
    /// Context passed back to the server's access callback.
    pub arg: Option<AttrId>,
}

impl DscDef {
    /// Returns the entry that terminates a descriptor list.
    #[inline]
    #[must_use]
    pub const fn end() -> Self {
        Self {
            uuid: None,
            flags: DscFlags::empty(),
            arg: None,
        }
    }

    /// Returns whether this entry terminates the list.
    #[inline(always)]
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.uuid.is_none()
    }
}

bitflags! {
    /// Native characteristic flags.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct ChrFlags: u16 {
        const BROADCAST = 0x0001;
        const READ = 0x0002;
        const WRITE_NO_RSP = 0x0004;
        const WRITE = 0x0008;
        const NOTIFY = 0x0010;
        const INDICATE = 0x0020;
        const AUTH_SIGN_WRITE = 0x0040;
        const RELIABLE_WRITE = 0x0080;
        const AUX_WRITE = 0x0100;
        const READ_ENC = 0x0200;
        const READ_AUTHEN = 0x0400;
        const READ_AUTHOR = 0x0800;
        const WRITE_ENC = 0x1000;
        const WRITE_AUTHEN = 0x2000;
        const WRITE_AUTHOR = 0x4000;
    }
}

bitflags! {
    /// Native descriptor access flags.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct DscFlags: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
        const READ_ENC = 0x04;
        const READ_AUTHEN = 0x08;
        const READ_AUTHOR = 0x10;
        const WRITE_ENC = 0x20;
        const WRITE_AUTHEN = 0x40;
        const WRITE_AUTHOR = 0x80;
    }
}
