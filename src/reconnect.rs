// Reconnection supervisor for intermittently available peripherals
//
// A probe runs on a fixed interval in the background until it succeeds.
// Whatever it reconnects is handed back to the control loop over a channel,
// which the loop drains at its own pace, so a tick never waits on recovery.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run `probe` every `interval`, forever, until it returns true
///
/// The first attempt happens one interval after the call. The handle
/// resolves to the number of attempts it took.
pub fn retry<F>(interval: Duration, mut probe: F) -> JoinHandle<u32>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut attempts = 0u32;
        loop {
            tokio::time::sleep(interval).await;
            attempts += 1;

            if probe() {
                info!("Reconnected after {} attempt(s)", attempts);
                return attempts;
            }
            debug!("Reconnect attempt {} failed, next in {:?}", attempts, interval);
        }
    })
}

/// Retry queue with a drain-side handoff for the reconnected resource
pub struct Reconnector<T> {
    interval: Duration,
    tx: mpsc::UnboundedSender<T>,
    rx: mpsc::UnboundedReceiver<T>,
    pending: bool,
}

impl<T: Send + 'static> Reconnector<T> {
    pub fn new(interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            interval,
            tx,
            rx,
            pending: false,
        }
    }

    /// Start retrying `connect` in the background
    ///
    /// Only one retry loop runs at a time; scheduling again while one is
    /// pending is a no-op.
    pub fn schedule<F>(&mut self, mut connect: F)
    where
        F: FnMut() -> Option<T> + Send + 'static,
    {
        if self.pending {
            debug!("Reconnect already scheduled");
            return;
        }
        self.pending = true;

        let tx = self.tx.clone();
        retry(self.interval, move || match connect() {
            // Receiver gone means the owner shut down; stop retrying either way
            Some(resource) => {
                let _ = tx.send(resource);
                true
            }
            None => false,
        });
    }

    /// Take the reconnected resource, if one has arrived
    pub fn take(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(resource) => {
                self.pending = false;
                Some(resource)
            }
            Err(_) => None,
        }
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
