use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;
use std::ops::{Bound, RangeBounds};
use std::sync::atomic::{AtomicU16, Ordering};

use crate::util::name_of;

/// Attribute handle ([Vol 3] Part F, Section 3.2.2). Handles are assigned by
/// the host when the database is started and reassigned when it is rebuilt.
#[allow(clippy::unsafe_derive_deserialize)]
#[derive(
    Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Handle(NonZeroU16);

impl Handle {
    pub const MIN: Self = Self(
        // SAFETY: Non-zero
        unsafe { NonZeroU16::new_unchecked(0x0001) },
    );
    pub const MAX: Self = Self(
        // SAFETY: Non-zero
        unsafe { NonZeroU16::new_unchecked(0xFFFF) },
    );

    /// Wraps a raw handle. Returns `None` for the unassigned handle `0`.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Option<Self> {
        match NonZeroU16::new(h) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Returns the next handle or `None` if the maximum handle was reached.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0.get().wrapping_add(1))
    }

    /// Returns the previous handle or `None` if `self` is the minimum handle.
    #[inline]
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        Self::new(self.0.get() - 1)
    }
}

impl Debug for Handle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", name_of!(Handle), self.0.get())
    }
}

impl Display for Handle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<Handle> for u16 {
    #[inline]
    fn from(h: Handle) -> Self {
        h.0.get()
    }
}

/// Inclusive range of attribute handles.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[must_use]
pub struct HandleRange {
    start: Handle,
    end: Handle,
}

impl HandleRange {
    /// Handle range that includes all possible handles.
    pub const ALL: Self = Self {
        start: Handle::MIN,
        end: Handle::MAX,
    };

    /// Creates a new handle range `start..=end`. Returns `None` if the range
    /// is empty.
    #[inline]
    pub const fn new(start: Handle, end: Handle) -> Option<Self> {
        if start.0.get() <= end.0.get() {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Returns the starting handle.
    #[inline(always)]
    #[must_use]
    pub const fn start(self) -> Handle {
        self.start
    }

    /// Returns the ending handle.
    #[inline(always)]
    #[must_use]
    pub const fn end(self) -> Handle {
        self.end
    }

    /// Returns whether `h` is within the range.
    #[inline]
    #[must_use]
    pub const fn contains(&self, h: &Handle) -> bool {
        self.start.0.get() <= h.0.get() && h.0.get() <= self.end.0.get()
    }
}

impl RangeBounds<Handle> for HandleRange {
    #[inline]
    fn start_bound(&self) -> Bound<&Handle> {
        Bound::Included(&self.start)
    }

    #[inline]
    fn end_bound(&self) -> Bound<&Handle> {
        Bound::Included(&self.end)
    }
}

impl Default for HandleRange {
    #[inline(always)]
    fn default() -> Self {
        Self::ALL
    }
}

/// Handle storage shared between an attribute and its registration record.
/// The host writes the assigned handle here when the database is started.
#[derive(Debug, Default)]
pub struct HandleCell(AtomicU16);

impl HandleCell {
    /// Creates an unassigned handle cell.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    /// Returns the assigned handle or `None` if the attribute is not
    /// registered.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<Handle> {
        Handle::new(self.0.load(Ordering::Acquire))
    }

    /// Stores the assigned handle.
    #[inline]
    pub fn set(&self, h: Handle) {
        self.0.store(u16::from(h), Ordering::Release);
    }

    /// Resets the cell to the unassigned state.
    #[inline]
    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }
}
