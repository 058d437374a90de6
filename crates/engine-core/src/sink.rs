use crate::error::{PollingFailure, SinkError};
use async_trait::async_trait;
use model::records::event::RowEvent;
use tokio::sync::mpsc;

/// Downstream consumer of detected rows. May apply backpressure by not
/// returning until it has room.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event(&self, event: RowEvent) -> Result<(), SinkError>;
}

/// Sink feeding a bounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<RowEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RowEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn on_event(&self, event: RowEvent) -> Result<(), SinkError> {
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }
}

/// Receives the terminal error of a session. Called at most once, and only
/// when the session dies on its own.
pub trait CompletionReporter: Send + Sync {
    fn on_failure(&self, failure: PollingFailure);
}

impl<F> CompletionReporter for F
where
    F: Fn(PollingFailure) + Send + Sync,
{
    fn on_failure(&self, failure: PollingFailure) {
        self(failure)
    }
}
