//! In-memory checkpoint store (single process, tests and dry runs)

use super::{Checkpoint, CheckpointStore, CheckpointSummary};
use crate::error::CheckpointError;
use crate::workflow::state::Stage;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: RwLock<Vec<Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all runs
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn append(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.records.write().await.push(checkpoint.clone());
        Ok(())
    }

    async fn latest(
        &self,
        run_id: &str,
        stage: Stage,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .find(|c| c.run_id == run_id && c.stage == stage)
            .cloned())
    }

    async fn list(&self, run_id: &str) -> Result<Vec<CheckpointSummary>, CheckpointError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|c| c.run_id == run_id)
            .map(CheckpointSummary::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_returns_last_append() {
        let store = MemoryCheckpointStore::new();
        let first = Checkpoint::new("run-1", Stage::Deconstruction, &1).unwrap();
        let second = Checkpoint::new("run-1", Stage::Deconstruction, &2).unwrap();

        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let latest = store.latest("run-1", Stage::Deconstruction).await.unwrap().unwrap();
        assert_eq!(latest.decode::<i32>().unwrap(), 2);
        // append-only: both records retained
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let store = MemoryCheckpointStore::new();
        store
            .append(&Checkpoint::new("run-a", Stage::Patterns, &"a").unwrap())
            .await
            .unwrap();

        assert!(store.latest("run-b", Stage::Patterns).await.unwrap().is_none());
        assert_eq!(store.list("run-a").await.unwrap().len(), 1);
        assert!(store.list("run-b").await.unwrap().is_empty());
    }
}
