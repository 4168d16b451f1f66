//! Cancellable waiting for poll loops.
//!
//! A [`CancelHandle`] trips every [`CancelSignal`] cloned from it. The run
//! locator and workflow watcher wait between polls with [`sleep_or_cancel`],
//! so a user interrupt or an overall deadline aborts a loop mid-wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::{Result, ShipwrightError};

/// Owner side of a cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Observer side of a cancellation channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trip the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is tripped. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sleep for `duration` unless `signal` fires first.
pub async fn sleep_or_cancel(duration: Duration, signal: &CancelSignal) -> Result<()> {
    if signal.is_cancelled() {
        return Err(ShipwrightError::Cancelled);
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = signal.cancelled() => Err(ShipwrightError::Cancelled),
    }
}
