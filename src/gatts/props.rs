use bitflags::bitflags;

use crate::host::{ChrFlags, DscFlags};

bitflags! {
    /// Local attribute properties and access requirements.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Props: u16 {
        const READ = 1 << 0;
        const READ_ENC = 1 << 1;
        const READ_AUTHEN = 1 << 2;
        const READ_AUTHOR = 1 << 3;
        const WRITE = 1 << 4;
        const WRITE_NR = 1 << 5;
        const WRITE_ENC = 1 << 6;
        const WRITE_AUTHEN = 1 << 7;
        const WRITE_AUTHOR = 1 << 8;
        const BROADCAST = 1 << 9;
        const NOTIFY = 1 << 10;
        const INDICATE = 1 << 11;

        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl Props {
    /// Returns whether reading the value requires a secured link.
    #[inline]
    #[must_use]
    pub const fn read_secured(self) -> bool {
        self.intersects(
            Self::READ_ENC
                .union(Self::READ_AUTHEN)
                .union(Self::READ_AUTHOR),
        )
    }
}

impl From<Props> for ChrFlags {
    fn from(p: Props) -> Self {
        const MAP: [(Props, ChrFlags); 12] = [
            (Props::READ, ChrFlags::READ),
            (Props::READ_ENC, ChrFlags::READ_ENC),
            (Props::READ_AUTHEN, ChrFlags::READ_AUTHEN),
            (Props::READ_AUTHOR, ChrFlags::READ_AUTHOR),
            (Props::WRITE, ChrFlags::WRITE),
            (Props::WRITE_NR, ChrFlags::WRITE_NO_RSP),
            (Props::WRITE_ENC, ChrFlags::WRITE_ENC),
            (Props::WRITE_AUTHEN, ChrFlags::WRITE_AUTHEN),
            (Props::WRITE_AUTHOR, ChrFlags::WRITE_AUTHOR),
            (Props::BROADCAST, ChrFlags::BROADCAST),
            (Props::NOTIFY, ChrFlags::NOTIFY),
            (Props::INDICATE, ChrFlags::INDICATE),
        ];
        (MAP.iter())
            .filter(|&&(from, _)| p.contains(from))
            .fold(Self::empty(), |f, &(_, to)| f | to)
    }
}

impl From<Props> for DscFlags {
    /// Descriptors have no notion of unacknowledged writes, so `WRITE_NR`
    /// grants the same access as `WRITE`.
    fn from(p: Props) -> Self {
        const MAP: [(Props, DscFlags); 9] = [
            (Props::READ, DscFlags::READ),
            (Props::READ_ENC, DscFlags::READ_ENC),
            (Props::READ_AUTHEN, DscFlags::READ_AUTHEN),
            (Props::READ_AUTHOR, DscFlags::READ_AUTHOR),
            (Props::WRITE, DscFlags::WRITE),
            (Props::WRITE_NR, DscFlags::WRITE),
            (Props::WRITE_ENC, DscFlags::WRITE_ENC),
            (Props::WRITE_AUTHEN, DscFlags::WRITE_AUTHEN),
            (Props::WRITE_AUTHOR, DscFlags::WRITE_AUTHOR),
        ];
        (MAP.iter())
            .filter(|&&(from, _)| p.contains(from))
            .fold(Self::empty(), |f, &(_, to)| f | to)
    }
}
