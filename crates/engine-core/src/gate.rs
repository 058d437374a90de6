use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Per-row delivery gate. While paused, the poll loop parks in [`PauseGate::pass`]
/// until resumed or cancelled. Clones share the same flag.
#[derive(Clone)]
pub struct PauseGate {
    paused: Arc<watch::Sender<bool>>,
}

impl PauseGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        PauseGate {
            paused: Arc::new(tx),
        }
    }

    /// Returns `true` if the gate was open before the call.
    pub fn pause(&self) -> bool {
        !self.paused.send_replace(true)
    }

    /// Returns `true` if the gate was closed before the call. Resuming an
    /// open gate is a no-op.
    pub fn resume(&self) -> bool {
        self.paused.send_replace(false)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Waits for the gate to open. Returns `false` when `cancel` fires first.
    pub async fn pass(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.paused.subscribe();
        let mut held = false;

        loop {
            if !*rx.borrow_and_update() {
                if held {
                    info!("Pause gate released.");
                }
                return true;
            }

            if !held {
                info!("Delivery held at pause gate.");
                held = true;
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = rx.changed() => {
                    // The sender lives in `self`, so this cannot fail while we wait.
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
