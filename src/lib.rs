//! Bluetooth LE GATT object model over a native host stack.
//!
//! The native host (controller, link layer, L2CAP, ATT, SM, and GATT
//! procedures) runs on its own task and is reached through the [`host::Host`]
//! trait. This crate owns the attribute database built by the application,
//! compiles it into the host's registration records, and routes the host's
//! access callbacks and GAP events back to the owning [`gatts::Service`],
//! [`gatts::Characteristic`], and [`gatts::Descriptor`] objects. The client
//! side mirrors a peer's database on demand through [`gattc::Client`].

pub use device::*;

pub mod att;
pub mod gap;
pub mod gattc;
pub mod gatts;
pub mod hci;
pub mod host;

mod device;
mod util;

#[cfg(test)]
mod testing;

type SyncMutex<T> = parking_lot::Mutex<T>;
type SyncRwLock<T> = parking_lot::RwLock<T>;
