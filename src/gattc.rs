//! GATT client ([Vol 3] Part G, Section 4).
//!
//! A [`Client`] owns one connection to a peer server and a lazily populated
//! mirror of the peer's database: [`RemoteService`]s, their
//! [`RemoteCharacteristic`]s, and their [`RemoteDescriptor`]s. Discovery and
//! value procedures are asynchronous. Each one submits a request to the host
//! and awaits the host's completion callback.

pub use {callbacks::*, characteristic::*, client::*, consts::*, descriptor::*, service::*};

use crate::host::{Progress, Result};
use crate::util::waiter;

mod callbacks;
mod characteristic;
mod client;
mod consts;
mod descriptor;
mod service;


/// Runs a discovery procedure started by `start`, passing each found item to
/// `found` as soon as the host reports it. Returns when the host reports that
/// the procedure is done or failed.
async fn discover<T: Send + 'static>(
    start: impl FnOnce(Progress<T>) -> Result<()>,
    mut found: impl FnMut(T) + Send + 'static,
) -> Result<()> {
    let (mut tx, rx) = waiter();
    start(Box::new(move |r| match r {
        Ok(Some(v)) => {
            found(v);
            Ok(())
        }
        Ok(None) => {
            tx.release(Ok(()));
            Ok(())
        }
        Err(e) => {
            tx.release(Err(e));
            Err(e)
        }
    }))?;
    rx.wait().await
}
