//! Utility modules for insight-pipeline

pub mod db_retry;
pub mod fanout;
pub mod retry;

pub use db_retry::LockBackoff;
pub use fanout::{join_failure, spawn_bounded};
pub use retry::{call_with_retry, RetryExhausted, RetryPolicy};
