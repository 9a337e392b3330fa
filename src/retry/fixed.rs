use super::RetryPolicy;
use crate::error::ResolverError;
use std::time::Duration;

/// watch 流默认重连间隔
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// 固定延迟重试策略
#[derive(Debug, Clone)]
pub struct FixedRetryPolicy {
    max_attempts: Option<usize>,
    delay: Duration,
}

impl FixedRetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// 无限重试，没有上限也没有放弃条件
    pub fn forever(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }
}

impl Default for FixedRetryPolicy {
    fn default() -> Self {
        Self::forever(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy for FixedRetryPolicy {
    /// 只有次数上限会让策略放弃，错误类别不参与判断
    fn should_retry(&self, attempt: usize, _error: &ResolverError) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    fn backoff_duration(&self, _attempt: usize) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}
