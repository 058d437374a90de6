use async_trait::async_trait;
use engine_core::{error::SinkError, sink::EventSink};
use model::records::event::{RowEvent, fields_as_map};
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

/// A row event labelled with the session that produced it. Serializes as
/// `{"session", "table", "event": {<column>: <value>, ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub session: String,
    pub table: String,
    #[serde(serialize_with = "event_fields")]
    pub event: RowEvent,
}

fn event_fields<S: Serializer>(event: &RowEvent, serializer: S) -> Result<S::Ok, S::Error> {
    fields_as_map(&event.fields, serializer)
}

/// Forwards a session's events into a channel shared by all sessions.
pub struct TaggedSink {
    session: String,
    tx: mpsc::Sender<SessionEvent>,
}

impl TaggedSink {
    pub fn new(session: &str, tx: mpsc::Sender<SessionEvent>) -> Self {
        TaggedSink {
            session: session.to_string(),
            tx,
        }
    }
}

#[async_trait]
impl EventSink for TaggedSink {
    async fn on_event(&self, event: RowEvent) -> Result<(), SinkError> {
        let tagged = SessionEvent {
            session: self.session.clone(),
            table: event.table.clone(),
            event,
        };
        self.tx.send(tagged).await.map_err(|_| SinkError::Closed)
    }
}
