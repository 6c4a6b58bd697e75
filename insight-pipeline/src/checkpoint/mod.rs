//! Append-only checkpoint storage
//!
//! One record per stage output, keyed by `(run_id, stage)`. Writes only ever
//! append; the orchestrator reads the latest record per key on resume.
//!
//! # Persisted layout
//! - `run_id`, `stage`
//! - `schema_version` (cross-version resume is refused)
//! - `created_at` (RFC 3339)
//! - `payload` (JSON text of the stage output)
//! - `payload_digest` (SHA-256 hex of `payload`)

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

use crate::error::CheckpointError;
use crate::workflow::state::Stage;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version of the stage payload schema written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Durable snapshot of one stage's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub stage: Stage,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub payload: String,
    pub payload_digest: String,
}

impl Checkpoint {
    /// Serialize a stage output into a new checkpoint
    pub fn new<T: Serialize>(
        run_id: &str,
        stage: Stage,
        output: &T,
    ) -> Result<Self, CheckpointError> {
        let payload = serde_json::to_string(output)?;
        let payload_digest = digest(&payload);
        Ok(Self {
            run_id: run_id.to_string(),
            stage,
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            payload,
            payload_digest,
        })
    }

    /// Payload still matches the digest recorded at write time
    pub fn digest_matches(&self) -> bool {
        digest(&self.payload) == self.payload_digest
    }

    /// Decode the payload into a stage output
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CheckpointError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// SHA-256 hex digest of a payload
pub fn digest(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary row for listings (no payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub run_id: String,
    pub stage: Stage,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub payload_bytes: usize,
    pub payload_digest: String,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(c: &Checkpoint) -> Self {
        Self {
            run_id: c.run_id.clone(),
            stage: c.stage,
            schema_version: c.schema_version,
            created_at: c.created_at,
            payload_bytes: c.payload.len(),
            payload_digest: c.payload_digest.clone(),
        }
    }
}

/// Durable append-only checkpoint store
///
/// Implementations must never update or delete a stored record; appending a
/// second checkpoint for the same key leaves the first in place.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a checkpoint
    async fn append(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Most recently appended checkpoint for `(run_id, stage)`
    async fn latest(&self, run_id: &str, stage: Stage)
        -> Result<Option<Checkpoint>, CheckpointError>;

    /// Every checkpoint of a run in append order
    async fn list(&self, run_id: &str) -> Result<Vec<CheckpointSummary>, CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_hex() {
        // sha256("")
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_new_checkpoint_round_trips_payload() {
        let output = vec!["doc_000".to_string(), "doc_001".to_string()];
        let checkpoint = Checkpoint::new("run-1", Stage::Deconstruction, &output).unwrap();

        assert_eq!(checkpoint.schema_version, SCHEMA_VERSION);
        assert!(checkpoint.digest_matches());
        let decoded: Vec<String> = checkpoint.decode().unwrap();
        assert_eq!(decoded, output);
    }

    #[test]
    fn test_tampered_payload_fails_digest() {
        let mut checkpoint = Checkpoint::new("run-1", Stage::Patterns, &vec![1, 2, 3]).unwrap();
        checkpoint.payload = "[1,2,4]".to_string();
        assert!(!checkpoint.digest_matches());
    }
}
