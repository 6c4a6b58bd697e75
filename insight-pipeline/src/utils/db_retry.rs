//! Lock backoff for checkpoint writes
//!
//! SQLite allows one writer at a time. A second process resuming the same
//! database can hit `SQLITE_BUSY` while the first is appending; those
//! writes are retried with doubling sleeps until a wall-clock limit.
//! Any other error is returned on the first attempt.

use insight_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// SQLite primary result codes for a busy or locked database
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockBackoff {
    /// First sleep after a lock error
    pub initial: Duration,
    /// Ceiling for a single sleep
    pub max_step: Duration,
    /// Total time allowed before giving up
    pub max_wait: Duration,
}

impl Default for LockBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max_step: Duration::from_secs(1),
            max_wait: Duration::from_secs(5),
        }
    }
}

impl LockBackoff {
    /// Run `operation`, retrying while the database reports a lock
    pub async fn run<F, Fut, T>(&self, operation: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut sleep = self.initial;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match attempt_fn().await {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::debug!(operation, attempts, "Lock cleared");
                    }
                    return Ok(value);
                }
                Err(err) if is_lock_error(&err) => err,
                Err(err) => return Err(err),
            };

            let waited = started.elapsed();
            if waited >= self.max_wait {
                tracing::error!(
                    operation,
                    attempts,
                    waited_ms = waited.as_millis() as u64,
                    error = %err,
                    "Giving up on locked checkpoint database"
                );
                return Err(Error::LockTimeout {
                    operation: operation.to_string(),
                    attempts,
                    waited_ms: waited.as_millis() as u64,
                });
            }

            tracing::warn!(
                operation,
                attempts,
                sleep_ms = sleep.as_millis() as u64,
                "Checkpoint database locked, backing off"
            );
            tokio::time::sleep(sleep).await;
            sleep = (sleep * 2).min(self.max_step);
        }
    }
}

fn is_lock_error(err: &Error) -> bool {
    let Error::Database(db_err) = err else {
        return false;
    };
    if let sqlx::Error::Database(inner) = db_err {
        if matches!(inner.code().as_deref(), Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
            return true;
        }
    }
    db_err.to_string().contains("database is locked")
}
