use crate::att::ErrorCode;
use crate::hci;

/// Return code of a host operation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HsError),
    #[error("ATT error: {0}")]
    Att(#[from] ErrorCode),
    #[error("HCI error: {0}")]
    Hci(hci::Status),
    #[error("security manager error: {0:#04X}")]
    Sm(u8),
    #[error("peer security manager error: {0:#04X}")]
    SmPeer(u8),
    #[error("unknown return code {0:#06X}")]
    Unknown(i32),
}

/// Common host result type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    const ATT_BASE: i32 = 0x100;
    const HCI_BASE: i32 = 0x200;
    const SM_BASE: i32 = 0x400;
    const SM_PEER_BASE: i32 = 0x500;

    /// Converts a raw host return code. Returns `None` for `0` (success).
    #[must_use]
    pub fn from_code(rc: i32) -> Option<Self> {
        use num_enum::TryFromPrimitive;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let low = (rc & 0xFF) as u8;
        let e = match rc {
            0 => return None,
            1..=0xFF => HsError::try_from_primitive(low).map_or(Self::Unknown(rc), Self::Host),
            0x100..=0x1FF => ErrorCode::try_from_primitive(low).map_or(Self::Unknown(rc), Self::Att),
            0x200..=0x2FF => Self::Hci(hci::Status::from(low)),
            0x400..=0x4FF => Self::Sm(low),
            0x500..=0x5FF => Self::SmPeer(low),
            _ => Self::Unknown(rc),
        };
        Some(e)
    }

    /// Returns the raw host return code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Host(e) => i32::from(u8::from(e)),
            Self::Att(e) => Self::ATT_BASE + i32::from(u8::from(e)),
            Self::Hci(st) => Self::HCI_BASE + i32::from(u8::from(st)),
            Self::Sm(v) => Self::SM_BASE + i32::from(v),
            Self::SmPeer(v) => Self::SM_PEER_BASE + i32::from(v),
            Self::Unknown(rc) => rc,
        }
    }

    /// Returns whether the error means that the host was reset or lost
    /// synchronization with the controller. All host state must be considered
    /// invalid until the host is synced again.
    #[inline]
    #[must_use]
    pub const fn is_host_reset(self) -> bool {
        matches!(
            self,
            Self::Host(HsError::HciTimeout | HsError::Os | HsError::Controller | HsError::NotSynced)
        )
    }

    /// Returns whether the error can be resolved by pairing with the peer.
    #[inline]
    #[must_use]
    pub const fn is_insufficient_security(self) -> bool {
        match self {
            Self::Att(e) => e.is_security(),
            _ => false,
        }
    }
}

impl From<hci::Status> for Error {
    #[inline]
    fn from(st: hci::Status) -> Self {
        Self::Hci(st)
    }
}

/// Host-level error codes.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
    thiserror::Error,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum HsError {
    #[error("temporary failure, try again")]
    Again = 1,
    #[error("operation already in progress or completed")]
    Already = 2,
    #[error("one or more arguments are invalid")]
    InvalidArgs = 3,
    #[error("the provided buffer is too small")]
    MsgSize = 4,
    #[error("no entry matching the specified criteria")]
    NotFound = 5,
    #[error("operation failed due to resource exhaustion")]
    NoMem = 6,
    #[error("no open connection with the specified handle")]
    NotConnected = 7,
    #[error("operation disabled at compile time")]
    NotSupported = 8,
    #[error("application callback behaved unexpectedly")]
    App = 9,
    #[error("command from peer is invalid")]
    BadData = 10,
    #[error("operating system error")]
    Os = 11,
    #[error("event from controller is invalid")]
    Controller = 12,
    #[error("operation timed out")]
    Timeout = 13,
    #[error("operation completed successfully")]
    Done = 14,
    #[error("operation cannot be performed until procedure completes")]
    Busy = 15,
    #[error("peer rejected a connection parameter update request")]
    Reject = 16,
    #[error("unexpected failure; catch all")]
    Unknown = 17,
    #[error("operation requires a different role")]
    Role = 18,
    #[error("HCI request timed out; controller unresponsive")]
    HciTimeout = 19,
    #[error("controller failed to send event due to memory exhaustion")]
    NoMemEvt = 20,
    #[error("operation requires an identity address but none configured")]
    NoAddr = 21,
    #[error("attempt to use the host before it is synced with the controller")]
    NotSynced = 22,
    #[error("insufficient authentication")]
    Authen = 23,
    #[error("insufficient authorization")]
    Author = 24,
    #[error("insufficient encryption level")]
    Encrypt = 25,
    #[error("insufficient key size")]
    EncryptKeySize = 26,
    #[error("storage at capacity")]
    StoreCap = 27,
    #[error("storage I/O error")]
    StoreFail = 28,
    #[error("operation was preempted")]
    Preempted = 29,
    #[error("feature disabled")]
    Disabled = 30,
    #[error("operation stalled")]
    Stalled = 31,
}
