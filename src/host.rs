//! Native host stack boundary.
//!
//! The host owns the radio, the link layer, and all protocol procedures. It
//! runs callbacks and GAP events on its own task, one at a time. Methods of
//! [`Host`] are called from application tasks and must not block on host
//! callbacks.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

pub use {access::*, def::*, error::*, event::*, proc::*};

use crate::att::{Handle, HandleRange};
use crate::gap::{Addr, ConnInfo, ConnParams, Uuid};
use crate::hci::{ConnHandle, Phy, PhyMask, Status};

mod access;
mod def;
mod error;
mod event;
mod proc;

/// Native BLE host interface.
pub trait Host: Debug + Send + Sync {
    // GATT server registration

    /// Validates service definitions and reserves resources for them.
    fn gatts_count_cfg(&self, svcs: &[SvcDef]) -> Result<()>;

    /// Queues service definitions for registration on the next
    /// [`Host::gatts_start`].
    fn gatts_add_svcs(&self, svcs: &[SvcDef]) -> Result<()>;

    /// Registers all queued services, assigns attribute handles, and writes
    /// characteristic value handles to their [`ChrDef::val_handle`] cells.
    fn gatts_start(&self) -> Result<()>;

    /// Removes all registered services. Fails with [`HsError::Busy`] if any
    /// connection is open.
    fn gatts_reset(&self) -> Result<()>;

    /// Re-registers the mandatory GAP and GATT services after a reset.
    fn gatts_init_builtin(&self);

    /// Returns the handle of the first registered service with `svc` UUID.
    fn gatts_find_svc(&self, svc: Uuid) -> Result<Handle>;

    /// Returns the handle of a registered descriptor.
    fn gatts_find_dsc(&self, svc: Uuid, chr: Uuid, dsc: Uuid) -> Result<Handle>;

    /// Shows or hides a registered service without changing handles.
    fn gatts_svc_set_visibility(&self, svc: Handle, visible: bool) -> Result<()>;

    /// Notifies or indicates the current value of a characteristic to all
    /// subscribed peers, reading it through the access callback.
    fn gatts_chr_updated(&self, chr_val: Handle);

    /// Sends a notification. The value is read through the access callback
    /// if `om` is `None`.
    fn gatts_notify(&self, conn: ConnHandle, chr_val: Handle, om: Option<Mbuf>) -> Result<()>;

    /// Sends an indication. The value is read through the access callback if
    /// `om` is `None`.
    fn gatts_indicate(&self, conn: ConnHandle, chr_val: Handle, om: Option<Mbuf>)
        -> Result<()>;

    /// Queues a Service Changed indication for bonded peers.
    fn gatts_svc_changed(&self, range: HandleRange);

    // GAP

    /// Returns the state of an open connection.
    fn conn_find(&self, conn: ConnHandle) -> Option<ConnInfo>;

    /// Returns the handle of an open connection with the specified peer.
    fn conn_find_by_addr(&self, peer: Addr) -> Option<ConnHandle>;

    /// Returns the negotiated ATT_MTU or 0 if the connection is not open.
    fn att_mtu(&self, conn: ConnHandle) -> u16;

    /// Returns the preferred ATT_MTU.
    fn att_preferred_mtu(&self) -> u16;

    /// Sets the preferred ATT_MTU used in future exchanges.
    fn att_set_preferred_mtu(&self, mtu: u16) -> Result<()>;

    /// Terminates a connection.
    fn gap_terminate(&self, conn: ConnHandle, reason: Status) -> Result<()>;

    /// Starts advertising. Events for connections established by advertising
    /// are delivered to `handler`.
    fn gap_adv_start(&self, duration: Option<Duration>, handler: Arc<dyn GapHandler>)
        -> Result<()>;

    /// Stops advertising.
    fn gap_adv_stop(&self) -> Result<()>;

    /// Returns whether advertising is active.
    fn gap_adv_active(&self) -> bool;

    /// Initiates a connection. Events for the connection are delivered to
    /// `handler`.
    fn gap_connect(
        &self,
        peer: Addr,
        timeout: Duration,
        params: &ConnParams,
        handler: Arc<dyn GapHandler>,
    ) -> Result<()>;

    /// Cancels a pending connection attempt.
    fn gap_conn_cancel(&self) -> Result<()>;

    /// Stops scanning.
    fn gap_disc_cancel(&self) -> Result<()>;

    /// Requests new connection parameters.
    fn gap_update_params(&self, conn: ConnHandle, params: &ConnParams) -> Result<()>;

    /// Sets the preferred data length for a connection.
    fn gap_set_data_len(&self, conn: ConnHandle, tx_octets: u16, tx_time: u16) -> Result<()>;

    /// Sets the preferred PHYs for a connection.
    fn gap_set_preferred_phy(&self, conn: ConnHandle, tx: PhyMask, rx: PhyMask) -> Result<()>;

    /// Returns the current transmit and receive PHYs.
    fn gap_read_phy(&self, conn: ConnHandle) -> Result<(Phy, Phy)>;

    /// Returns the RSSI of a connection in dBm.
    fn gap_conn_rssi(&self, conn: ConnHandle) -> Result<i8>;

    /// Initiates pairing or encryption.
    fn security_initiate(&self, conn: ConnHandle) -> Result<()>;

    /// Provides the application response to a passkey action.
    fn sm_inject_io(&self, conn: ConnHandle, io: PasskeyIo) -> Result<()>;

    /// Deletes bonding information for a peer.
    fn store_delete_peer(&self, peer: Addr) -> Result<()>;

    /// Schedules a full host reset.
    fn sched_reset(&self, reason: Error);

    // GATT client

    /// Exchanges ATT_MTU with the peer.
    fn gattc_exchange_mtu(&self, conn: ConnHandle, cb: Oneshot<u16>) -> Result<()>;

    /// Discovers all primary services or only those with `uuid`.
    fn gattc_disc_svcs(
        &self,
        conn: ConnHandle,
        uuid: Option<Uuid>,
        cb: Progress<SvcInfo>,
    ) -> Result<()>;

    /// Discovers characteristics within a service handle range.
    fn gattc_disc_chrs(
        &self,
        conn: ConnHandle,
        range: HandleRange,
        cb: Progress<ChrInfo>,
    ) -> Result<()>;

    /// Discovers descriptors within a handle range, which starts at the
    /// characteristic value handle.
    fn gattc_disc_dscs(
        &self,
        conn: ConnHandle,
        range: HandleRange,
        cb: Progress<DscInfo>,
    ) -> Result<()>;

    /// Reads an attribute with a single request.
    fn gattc_read(&self, conn: ConnHandle, attr: Handle, cb: Oneshot<Vec<u8>>) -> Result<()>;

    /// Reads a long attribute, reporting one fragment at a time.
    fn gattc_read_long(
        &self,
        conn: ConnHandle,
        attr: Handle,
        offset: u16,
        cb: Progress<Vec<u8>>,
    ) -> Result<()>;

    /// Writes an attribute without response.
    fn gattc_write_no_rsp(&self, conn: ConnHandle, attr: Handle, v: &[u8]) -> Result<()>;

    /// Writes an attribute with a single request.
    fn gattc_write(&self, conn: ConnHandle, attr: Handle, v: &[u8], cb: Oneshot<()>)
        -> Result<()>;

    /// Writes a long attribute using prepared writes.
    fn gattc_write_long(
        &self,
        conn: ConnHandle,
        attr: Handle,
        offset: u16,
        v: &[u8],
        cb: Oneshot<()>,
    ) -> Result<()>;
}
