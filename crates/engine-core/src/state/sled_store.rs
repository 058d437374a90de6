use crate::{error::StateError, state::OffsetStore};
use async_trait::async_trait;
use model::pagination::checkpoint::OffsetCheckpoint;
use std::path::Path;

const OFFSET_PREFIX: &str = "offset:";

pub struct SledOffsetStore {
    db: sled::Db,
}

impl SledOffsetStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn key(session: &str) -> String {
        format!("{OFFSET_PREFIX}{session}")
    }
}

#[async_trait]
impl OffsetStore for SledOffsetStore {
    async fn save(&self, checkpoint: &OffsetCheckpoint) -> Result<(), StateError> {
        let bytes = bincode::serialize(checkpoint)?;
        self.db.insert(Self::key(&checkpoint.session), bytes)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn load(&self, session: &str) -> Result<Option<OffsetCheckpoint>, StateError> {
        match self.db.get(Self::key(session))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<OffsetCheckpoint>, StateError> {
        let mut checkpoints = Vec::new();
        for item in self.db.scan_prefix(OFFSET_PREFIX) {
            let (_key, value) = item?;
            checkpoints.push(bincode::deserialize(&value)?);
        }
        Ok(checkpoints)
    }
}
