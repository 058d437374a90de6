use crate::error::StateError;
use async_trait::async_trait;
use model::pagination::checkpoint::OffsetCheckpoint;

pub mod sled_store;

/// Durable watermark per session, keyed by session name.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    async fn save(&self, checkpoint: &OffsetCheckpoint) -> Result<(), StateError>;
    async fn load(&self, session: &str) -> Result<Option<OffsetCheckpoint>, StateError>;
    async fn list(&self) -> Result<Vec<OffsetCheckpoint>, StateError>;
}
