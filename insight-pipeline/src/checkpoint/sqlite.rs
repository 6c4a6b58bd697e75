//! SQLite checkpoint store
//!
//! Readable by any process holding the database path, so a run can resume
//! from a different process than the one that wrote it. Update and delete
//! are blocked by triggers.

use super::{Checkpoint, CheckpointStore, CheckpointSummary};
use crate::error::CheckpointError;
use crate::utils::LockBackoff;
use crate::workflow::state::Stage;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    lock_backoff: LockBackoff,
}

impl SqliteCheckpointStore {
    /// Open (creating if missing) the checkpoint database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(insight_common::Error::from)?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to checkpoint database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database (one connection, lost on drop)
    pub async fn in_memory() -> Result<Self, CheckpointError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, CheckpointError> {
        init_tables(&pool).await?;
        Ok(Self {
            pool,
            lock_backoff: LockBackoff::default(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Create the checkpoints table and its append-only guards
async fn init_tables(pool: &SqlitePool) -> Result<(), CheckpointError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            stage TEXT NOT NULL,
            schema_version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            payload TEXT NOT NULL,
            payload_digest TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_checkpoints_run_stage \
         ON checkpoints (run_id, stage, seq)",
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS checkpoints_no_update
        BEFORE UPDATE ON checkpoints
        BEGIN
            SELECT RAISE(ABORT, 'checkpoints are append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS checkpoints_no_delete
        BEFORE DELETE ON checkpoints
        BEGIN
            SELECT RAISE(ABORT, 'checkpoints are append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Checkpoint tables initialized");
    Ok(())
}

fn parse_stage(raw: &str) -> Result<Stage, CheckpointError> {
    raw.parse::<Stage>().map_err(CheckpointError::Corrupted)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CheckpointError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CheckpointError::Corrupted(format!("bad created_at {}: {}", raw, e)))
}

fn parse_version(raw: i64) -> Result<u32, CheckpointError> {
    u32::try_from(raw)
        .map_err(|_| CheckpointError::Corrupted(format!("bad schema_version {}", raw)))
}

fn row_to_checkpoint(row: &SqliteRow) -> Result<Checkpoint, CheckpointError> {
    let stage: String = row.try_get("stage")?;
    let created_at: String = row.try_get("created_at")?;
    let schema_version: i64 = row.try_get("schema_version")?;

    Ok(Checkpoint {
        run_id: row.try_get("run_id")?,
        stage: parse_stage(&stage)?,
        schema_version: parse_version(schema_version)?,
        created_at: parse_timestamp(&created_at)?,
        payload: row.try_get("payload")?,
        payload_digest: row.try_get("payload_digest")?,
    })
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn append(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let created_at = checkpoint.created_at.to_rfc3339();
        let stage = checkpoint.stage.as_str();
        let schema_version = i64::from(checkpoint.schema_version);

        self.lock_backoff.run("append_checkpoint", || async {
            sqlx::query(
                r#"
                INSERT INTO checkpoints (
                    run_id, stage, schema_version, created_at, payload, payload_digest
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&checkpoint.run_id)
            .bind(stage)
            .bind(schema_version)
            .bind(&created_at)
            .bind(&checkpoint.payload)
            .bind(&checkpoint.payload_digest)
            .execute(&self.pool)
            .await
            .map_err(insight_common::Error::Database)?;

            Ok(())
        })
        .await?;

        tracing::debug!(
            run_id = %checkpoint.run_id,
            stage = %checkpoint.stage,
            bytes = checkpoint.payload.len(),
            "Checkpoint appended"
        );
        Ok(())
    }

    async fn latest(
        &self,
        run_id: &str,
        stage: Stage,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let row = sqlx::query(
            r#"
            SELECT run_id, stage, schema_version, created_at, payload, payload_digest
            FROM checkpoints
            WHERE run_id = ? AND stage = ?
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(run_id)
        .bind(stage.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn list(&self, run_id: &str) -> Result<Vec<CheckpointSummary>, CheckpointError> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, stage, schema_version, created_at, payload, payload_digest
            FROM checkpoints
            WHERE run_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_checkpoint(row).map(|c| CheckpointSummary::from(&c)))
            .collect()
    }
}
