//! Shutdown signaling for pipeline tasks.
//!
//! Abstracts tokio's watch channels into a simple shutdown signal that many
//! tasks can subscribe to. The signal carries no payload; it only notifies
//! that shutdown has been requested.

use tokio::sync::watch;

use crate::error::{ErrorKind, FlowResult};
use crate::flow_error;

/// Transmitter side of the shutdown channel.
///
/// Cloning is cheap; every clone signals the same channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Requests shutdown of every subscribed task.
    pub fn shutdown(&self) -> FlowResult<()> {
        self.0.send(true).map_err(|_| {
            flow_error!(
                ErrorKind::InvalidState,
                "Shutdown signal has no remaining receivers"
            )
        })
    }

    /// Creates a new receiver observing this channel.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Completes when shutdown has been requested.
    ///
    /// Also completes when the transmitter is dropped, which counts as an
    /// implicit shutdown request.
    pub async fn signaled(&mut self) {
        let _ = self.0.wait_for(|requested| *requested).await;
    }

    /// Returns true when shutdown has already been requested.
    pub fn is_signaled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Creates a new shutdown channel.
///
/// The channel starts unsignaled; receivers created later via
/// [`ShutdownTx::subscribe`] observe the same state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}
