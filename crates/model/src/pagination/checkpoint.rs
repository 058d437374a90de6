use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted watermark of one polling session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OffsetCheckpoint {
    pub session: String,
    pub table: String,
    pub polling_column: String,
    pub offset: String,
    pub updated_at: DateTime<Utc>,
}

impl OffsetCheckpoint {
    pub fn new(session: &str, table: &str, polling_column: &str, offset: &str) -> Self {
        OffsetCheckpoint {
            session: session.to_string(),
            table: table.to_string(),
            polling_column: polling_column.to_string(),
            offset: offset.to_string(),
            updated_at: Utc::now(),
        }
    }
}
