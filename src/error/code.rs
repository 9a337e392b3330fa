//! 错误类别定义
//!
//! 解析器内部的每个错误都归属于一个类别，类别决定处理方式：
//! - Configuration: 构造阶段立即失败，不重试
//! - TransientStream: watch 流打开失败或中断，固定延迟后重试
//! - MalformedEvent: 事件无法解码，记录日志并触发 resync

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// 配置错误（选择器、命名空间、目标地址、配置文件）
    Configuration,
    /// 瞬时流错误（打开失败、服务端关闭、ERROR 事件）
    TransientStream,
    /// 事件载荷无法解码
    MalformedEvent,
}

impl ErrorCategory {
    /// 获取类别字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "CONFIGURATION",
            ErrorCategory::TransientStream => "TRANSIENT_STREAM",
            ErrorCategory::MalformedEvent => "MALFORMED_EVENT",
        }
    }

    /// 是否应在 watcher 内部恢复（重试或 resync）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::TransientStream | ErrorCategory::MalformedEvent
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
