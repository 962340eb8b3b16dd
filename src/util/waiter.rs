use std::time::Duration;

use tokio::sync::oneshot;

use crate::host::{Error, HsError, Result};

/// Creates a single-use rendezvous between a stack callback that produces a
/// result and the task waiting for it.
#[inline]
pub(crate) fn waiter<T>() -> (Release<T>, Waiter<T>) {
    let (tx, rx) = oneshot::channel();
    (Release(Some(tx)), Waiter(rx))
}

/// Sending half of a rendezvous. Only the first release is delivered.
#[derive(Debug)]
pub(crate) struct Release<T>(Option<oneshot::Sender<Result<T>>>);

impl<T> Release<T> {
    /// Releases the waiting task with the operation result. Returns `false` if
    /// the result was already delivered or the waiter was dropped.
    #[inline]
    pub fn release(&mut self, r: Result<T>) -> bool {
        self.0.take().map_or(false, |tx| tx.send(r).is_ok())
    }

    /// Returns whether the waiting side is still interested in the result.
    #[cfg(test)]
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0.as_ref().map_or(false, |tx| !tx.is_closed())
    }
}

/// Receiving half of a rendezvous.
#[derive(Debug)]
#[must_use]
pub(crate) struct Waiter<T>(oneshot::Receiver<Result<T>>);

impl<T> Waiter<T> {
    /// Waits for the result without a deadline. A release half that is dropped
    /// without delivering a result means that the host abandoned the
    /// operation.
    pub async fn wait(self) -> Result<T> {
        (self.0.await).unwrap_or(Err(Error::Host(HsError::Unknown)))
    }

    /// Waits for the result for at most `d`. Returns `None` on timeout.
    pub async fn wait_timeout(self, d: Duration) -> Option<Result<T>> {
        match tokio::time::timeout(d, self.0).await {
            Ok(r) => Some(r.unwrap_or(Err(Error::Host(HsError::Unknown)))),
            Err(_) => None,
        }
    }
}
