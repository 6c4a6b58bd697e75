//! Bounded task fan-out
//!
//! Each item's future runs on its own tokio task, at most `workers` at a
//! time. A panicking item surfaces as a [`JoinError`] paired with its key
//! instead of unwinding into the caller, so the caller decides how that one
//! item degrades.

use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio::task::JoinError;

/// Spawn every `(key, future)` pair, `workers` at a time
///
/// Results come back in completion order; callers sort as needed.
pub async fn spawn_bounded<K, Fut, T>(
    jobs: Vec<(K, Fut)>,
    workers: usize,
) -> Vec<(K, Result<T, JoinError>)>
where
    K: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    stream::iter(jobs)
        .map(|(key, job)| async move { (key, tokio::spawn(job).await) })
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

/// Readable reason for a task that did not return
pub fn join_failure(error: JoinError) -> String {
    if !error.is_panic() {
        return "task cancelled".to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", message)
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_panic_is_returned_with_its_key() {
        let jobs: Vec<(&str, _)> = ["ok", "boom"]
            .into_iter()
            .map(|key| {
                (key, async move {
                    if key == "boom" {
                        panic!("bad item");
                    }
                    7
                })
            })
            .collect();

        let mut results = spawn_bounded(jobs, 2).await;
        results.sort_by_key(|(key, _)| *key);

        let (key, boom) = results.remove(0);
        assert_eq!(key, "boom");
        assert_eq!(join_failure(boom.unwrap_err()), "task panicked: bad item");
        assert_eq!(results[0].1.as_ref().unwrap(), &7);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_workers() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<(usize, _)> = (0..8)
            .map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                (i, async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        let results = spawn_bounded(jobs, 3).await;
        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
