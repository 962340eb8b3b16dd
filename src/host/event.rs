use smallvec::SmallVec;

use crate::att::Handle;
use crate::gap::{ConnInfo, ConnParams};
use crate::hci::{ConnHandle, Phy};

use super::Error;

/// GAP event delivered by the host to the handler registered with the
/// advertising or connect procedure that produced the connection.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum GapEvent {
    /// Connection established or failed to establish.
    Connect {
        conn: Option<ConnHandle>,
        status: Result<(), Error>,
    },
    /// Connection terminated. `info` is the last known connection state.
    Disconnect { info: ConnInfo, reason: Error },
    /// Peer changed its Client Characteristic Configuration for `attr`.
    Subscribe {
        conn: ConnHandle,
        attr: Handle,
        prev_notify: bool,
        cur_notify: bool,
        prev_indicate: bool,
        cur_indicate: bool,
    },
    /// ATT_MTU exchange completed.
    Mtu { conn: ConnHandle, mtu: u16 },
    /// Notification sent or indication sent/acknowledged/failed.
    NotifyTx {
        conn: ConnHandle,
        attr: Handle,
        status: TxStatus,
        indication: bool,
    },
    /// Notification or indication received from a peer server.
    NotifyRx {
        conn: ConnHandle,
        attr: Handle,
        data: SmallVec<[u8; 32]>,
        indication: bool,
    },
    /// Advertising procedure ended.
    AdvComplete { reason: Option<Error> },
    /// Scan request received while advertising.
    ScanReqRcvd { instance: u8 },
    /// Pairing requires action from the application.
    PasskeyAction { conn: ConnHandle, action: PasskeyAction },
    /// Peer identity address was resolved.
    IdentityResolved { conn: ConnHandle },
    /// Link encryption changed.
    EncChange {
        conn: ConnHandle,
        status: Result<(), Error>,
    },
    /// Connection parameters were updated.
    ConnUpdate {
        conn: ConnHandle,
        status: Result<(), Error>,
    },
    /// Peer requested new connection parameters.
    ConnUpdateReq { conn: ConnHandle, peer: ConnParams },
    /// Peer requested new connection parameters over L2CAP.
    L2capUpdateReq { conn: ConnHandle, peer: ConnParams },
    /// Already bonded peer is attempting to pair again.
    RepeatPairing { conn: ConnHandle },
    /// PHY update completed.
    PhyUpdate {
        conn: ConnHandle,
        status: Result<(), Error>,
        tx: Phy,
        rx: Phy,
    },
    /// Connection termination procedure failed.
    TermFailure { conn: ConnHandle, status: Error },
}

impl GapEvent {
    /// Returns the connection handle that the event refers to.
    #[must_use]
    pub fn conn(&self) -> Option<ConnHandle> {
        use GapEvent::*;
        match *self {
            Connect { conn, .. } => conn,
            Disconnect { ref info, .. } => Some(info.handle),
            Subscribe { conn, .. }
            | Mtu { conn, .. }
            | NotifyTx { conn, .. }
            | NotifyRx { conn, .. }
            | PasskeyAction { conn, .. }
            | IdentityResolved { conn }
            | EncChange { conn, .. }
            | ConnUpdate { conn, .. }
            | ConnUpdateReq { conn, .. }
            | L2capUpdateReq { conn, .. }
            | RepeatPairing { conn }
            | PhyUpdate { conn, .. }
            | TermFailure { conn, .. } => Some(conn),
            AdvComplete { .. } | ScanReqRcvd { .. } => None,
        }
    }
}

/// Handler reply to a GAP event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum GapReply {
    /// Event handled.
    Ok,
    /// Request rejected with the specified reason.
    Reject(Error),
    /// Connection parameter request accepted with these local parameters.
    Params(ConnParams),
    /// Retry pairing after deleting the previous bond.
    RetryPairing,
    /// Ignore the repeated pairing attempt.
    IgnorePairing,
}

/// Receiver of GAP events.
pub trait GapHandler: Send + Sync {
    /// Handles a GAP event. Called from the host task.
    fn handle_gap_event(&self, e: &GapEvent) -> GapReply;
}

/// Notification or indication transmit status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum TxStatus {
    /// Sent over the air. For indications, the acknowledgment is still
    /// pending.
    Sent,
    /// Indication acknowledged by the peer.
    Acked,
    /// Transmission or acknowledgment failed.
    Failed(Error),
}

/// Pairing action requested by the security manager.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PasskeyAction {
    /// Display a passkey for the peer to enter.
    Display,
    /// Confirm that the peer displays the same value.
    NumericComparison(u32),
    /// Enter the passkey displayed by the peer.
    Input,
    /// Provide out-of-band data.
    Oob,
}

/// Application response to a [`PasskeyAction`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PasskeyIo {
    Display(u32),
    Input(u32),
    NumericComparison(bool),
}
