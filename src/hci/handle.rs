use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

use crate::util::name_of;

/// Connection handle ([Vol 4] Part E, Section 5.4.2). The host uses the
/// out-of-range value `0xFFFF` to mean "no connection", which is represented
/// here as `Option::<ConnHandle>::None`.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct ConnHandle(NonZeroU16);

impl ConnHandle {
    /// Number of meaningful bits.
    const BITS: u16 = 12;
    /// Maximum valid connection handle.
    const MAX: u16 = 0xEFF;

    /// Wraps a raw connection handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub fn new(v: u16) -> Option<Self> {
        // SAFETY: v can't be 0xFFFF, so !v is never 0
        (v <= Self::MAX).then_some(Self(unsafe { NonZeroU16::new_unchecked(!v) }))
    }

    /// Converts an optional handle into the host's raw representation.
    #[inline]
    #[must_use]
    pub fn raw(cn: Option<Self>) -> u16 {
        cn.map_or(u16::MAX, u16::from)
    }
}

impl From<ConnHandle> for u16 {
    #[inline]
    fn from(cn: ConnHandle) -> Self {
        !cn.0.get() & ((1 << ConnHandle::BITS) - 1)
    }
}

impl Debug for ConnHandle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#05X})", name_of!(ConnHandle), u16::from(*self))
    }
}

impl Display for ConnHandle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}
