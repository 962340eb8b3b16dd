use smallvec::SmallVec;

use crate::att::MAX_VAL_LEN;

/// Attribute access operation.
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum AccessOp {
    ReadChr,
    WriteChr,
    ReadDsc,
    WriteDsc,
}

impl AccessOp {
    /// Returns whether the operation is a read.
    #[inline(always)]
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::ReadChr | Self::ReadDsc)
    }
}

/// Attribute access request delivered by the host.
#[derive(Debug)]
pub struct Access<'a> {
    pub op: AccessOp,
    /// Value offset of a read. Reads of long values arrive once per
    /// fragment, and only the first fragment has offset 0.
    pub offset: u16,
    /// Reply buffer for reads or the received value chain for writes.
    pub om: &'a mut Mbuf,
}

/// Capacity-limited packet buffer chain. Incoming writes may arrive as
/// several segments (prepared writes reassembled by the host). Outgoing
/// replies are appended up to the limit, and an append that would exceed it
/// fails without modifying the buffer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Mbuf {
    lim: usize,
    segs: SmallVec<[Vec<u8>; 2]>,
}

impl Mbuf {
    /// Creates an empty buffer limited to `lim` bytes.
    #[inline]
    pub const fn new(lim: usize) -> Self {
        Self {
            lim,
            segs: SmallVec::new_const(),
        }
    }

    /// Creates a buffer from received segments.
    pub fn from_segments<'a>(segs: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let segs: SmallVec<_> = segs.into_iter().map(<[u8]>::to_vec).collect();
        let n = segs.iter().map(Vec::len).sum::<usize>();
        Self {
            lim: n.max(MAX_VAL_LEN),
            segs,
        }
    }

    /// Returns the total number of bytes in all segments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segs.iter().map(Vec::len).sum()
    }

    /// Returns whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segs.iter().all(Vec::is_empty)
    }

    /// Returns the buffer capacity limit.
    #[inline(always)]
    #[must_use]
    pub const fn lim(&self) -> usize {
        self.lim
    }

    /// Returns an iterator over the segments.
    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segs.iter().map(Vec::as_slice)
    }

    /// Appends `v` as a new segment. Returns `false` if the limit would be
    /// exceeded.
    pub fn append(&mut self, v: &[u8]) -> bool {
        if self.len() + v.len() > self.lim {
            return false;
        }
        if !v.is_empty() {
            self.segs.push(v.to_vec());
        }
        true
    }

    /// Returns the contents as one contiguous byte vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.segs.concat()
    }
}
