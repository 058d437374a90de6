use tokio::sync::watch;
use tracing::debug;

/// Watermark over the polling column. Written only by the poll loop;
/// any number of [`OffsetHandle`]s can observe it.
pub struct OffsetCursor {
    tx: watch::Sender<Option<String>>,
}

impl OffsetCursor {
    pub fn new(initial: Option<String>) -> Self {
        let (tx, _) = watch::channel(initial);
        OffsetCursor { tx }
    }

    pub fn handle(&self) -> OffsetHandle {
        OffsetHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_seeded(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn seed(&self, offset: String) {
        debug!(%offset, "Seeding offset cursor");
        self.tx.send_replace(Some(offset));
    }

    /// Moves the watermark to the polling-column value of the row just read.
    ///
    /// Offsets are opaque strings, so no ordering is checked here: the value
    /// follows row order. The polling column must increase with insertion
    /// order and the fetch must return rows ascending, otherwise a smaller
    /// value can land last in a batch and rows above it are fetched again.
    pub fn advance(&self, offset: &str) {
        self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(offset) {
                return false;
            }
            *current = Some(offset.to_string());
            true
        });
    }
}

/// Read-only view of a session's watermark.
#[derive(Clone)]
pub struct OffsetHandle {
    rx: watch::Receiver<Option<String>>,
}

impl OffsetHandle {
    pub fn current(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Waits until the watermark satisfies `pred`. Returns the last known
    /// value if the poll loop is gone before that happens.
    pub async fn wait_until<F>(&mut self, mut pred: F) -> Option<String>
    where
        F: FnMut(Option<&str>) -> bool,
    {
        let result = self
            .rx
            .wait_for(|offset| pred(offset.as_deref()))
            .await
            .map(|offset| offset.clone());
        result.unwrap_or_else(|_| self.current())
    }
}
