use std::ops::Deref;
use std::time::SystemTime;

use tracing::error;

use super::MAX_VAL_LEN;

/// Length-bounded attribute value with an optional last-write timestamp. The
/// relationship `len <= max_len <= MAX_VAL_LEN` always holds. Mutations that
/// would exceed `max_len` are rejected without changing the value.
///
/// Values shared between the application and the host task live behind a
/// short mutex in their owning attribute, so `AttValue` itself is a plain
/// owned buffer. `Clone` is a deep copy and [`std::mem::take`] is a move that
/// leaves an empty value with the default limit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttValue {
    buf: Vec<u8>,
    max: u16,
    ts: Option<SystemTime>,
}

impl AttValue {
    /// Creates an empty value limited to `max_len` bytes. Limits above
    /// [`MAX_VAL_LEN`] are clamped.
    #[inline]
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self {
            buf: Vec::new(),
            max: max_len.min(MAX_VAL_LEN) as u16,
            ts: None,
        }
    }

    /// Creates a value limited to `max_len` bytes, initialized with `v`. The
    /// initial content is truncated if it exceeds the limit.
    #[must_use]
    pub fn with_value(v: &[u8], max_len: usize) -> Self {
        let mut this = Self::new(max_len);
        let n = v.len().min(this.max_len());
        this.buf.extend_from_slice(&v[..n]);
        this
    }

    /// Returns the value length.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether the value is empty.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the maximum value length.
    #[inline(always)]
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max as usize
    }

    /// Returns the allocated capacity, which may exceed the length after
    /// repeated appends.
    #[inline(always)]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns the time of the last successful mutation.
    #[inline(always)]
    #[must_use]
    pub const fn timestamp(&self) -> Option<SystemTime> {
        self.ts
    }

    /// Overrides the timestamp.
    #[inline(always)]
    pub fn set_timestamp(&mut self, ts: SystemTime) {
        self.ts = Some(ts);
    }

    /// Replaces the value. Returns `false` without modifying the value if `v`
    /// exceeds the maximum length.
    pub fn set_value(&mut self, v: &[u8]) -> bool {
        if v.len() > self.max_len() {
            return false;
        }
        self.buf.clear();
        self.buf.extend_from_slice(v);
        self.ts = Some(SystemTime::now());
        true
    }

    /// Appends `v` to the value. Appending nothing is a successful no-op.
    /// Returns `false` without modifying the value if the result would exceed
    /// the maximum length.
    pub fn append(&mut self, v: &[u8]) -> bool {
        if v.is_empty() {
            return true;
        }
        if self.buf.len() + v.len() > self.max_len() {
            return false;
        }
        self.buf.extend_from_slice(v);
        self.ts = Some(SystemTime::now());
        true
    }

    /// Returns the byte at index `i` or 0 if the index is out of range.
    #[must_use]
    pub fn get(&self, i: usize) -> u8 {
        self.buf.get(i).copied().unwrap_or_else(|| {
            error!("Index {i} out of range for value of length {}", self.len());
            0
        })
    }

    /// Clears the value without changing the limit.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
        self.ts = Some(SystemTime::now());
    }

    /// Returns the value as a UTF-8 string, replacing invalid sequences.
    #[inline]
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

impl Default for AttValue {
    #[inline]
    fn default() -> Self {
        Self::new(MAX_VAL_LEN)
    }
}

impl Deref for AttValue {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl AsRef<[u8]> for AttValue {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl PartialEq<[u8]> for AttValue {
    #[inline]
    fn eq(&self, other: &[u8]) -> bool {
        self.buf == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for AttValue {
    #[inline]
    fn eq(&self, other: &[u8; N]) -> bool {
        self.buf == other
    }
}
