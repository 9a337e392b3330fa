//! 重试策略模块

pub mod fixed;

pub use fixed::FixedRetryPolicy;

use crate::error::ResolverError;
use std::time::Duration;

/// 重试策略 trait
///
/// `attempt` 从 1 开始计数，表示连续失败的次数。
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: usize, error: &ResolverError) -> bool;
    fn backoff_duration(&self, attempt: usize) -> Duration;
    /// `None` 表示不限次数
    fn max_attempts(&self) -> Option<usize>;
}
