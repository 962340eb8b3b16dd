use crate::att::{Handle, HandleRange};
use crate::gap::Uuid;

use super::Result;

/// Completion callback of a GATT client procedure that reports one result.
pub type Oneshot<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Callback of a GATT client procedure that reports zero or more items. It
/// receives `Ok(Some(item))` for each item, followed by either `Ok(None)`
/// when the procedure is done or `Err` on failure. Returning `Err` from an
/// item aborts the procedure, and the callback is not called again.
pub type Progress<T> = Box<dyn FnMut(Result<Option<T>>) -> Result<()> + Send>;

/// Service found by service discovery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SvcInfo {
    pub uuid: Uuid,
    pub range: HandleRange,
}

/// Characteristic found by characteristic discovery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChrInfo {
    pub uuid: Uuid,
    /// Characteristic declaration handle.
    pub def_handle: Handle,
    /// Characteristic value handle.
    pub val_handle: Handle,
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    pub props: u8,
}

/// Descriptor found by descriptor discovery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DscInfo {
    pub uuid: Uuid,
    pub handle: Handle,
}
