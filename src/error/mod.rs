//! 解析器错误处理模块
//!
//! 所有对外暴露的函数都返回 [`Result`]，错误按 [`ErrorCategory`] 分类。
//! 只有配置错误会传播到 gRPC 客户端层，其余错误都在 watcher 内部消化。

pub mod code;

pub use code::ErrorCategory;

use thiserror::Error;

/// 解析器统一错误类型
#[derive(Error, Debug)]
pub enum ResolverError {
    /// 标签选择器非法
    #[error("invalid label selector {key}={value}: {reason}")]
    InvalidSelector {
        key: String,
        value: String,
        reason: String,
    },

    /// 解析目标非法（期望 `scheme:///endpoint`）
    #[error("invalid resolver target {0:?}")]
    InvalidTarget(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),

    /// 配置文件读取失败
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件解析失败
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// watch 流打开失败
    #[error("failed to open watch stream: {0}")]
    WatchOpen(String),

    /// watch 流中途出错（传输错误或 ERROR 事件）
    #[error("watch stream error: {0}")]
    Stream(String),

    /// 事件载荷无法解码为后端记录
    #[error("malformed watch event: {0}")]
    MalformedEvent(String),
}

impl ResolverError {
    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        ResolverError::Config(msg.into())
    }

    /// 创建 watch 打开错误
    pub fn watch_open(msg: impl Into<String>) -> Self {
        ResolverError::WatchOpen(msg.into())
    }

    /// 创建流错误
    pub fn stream(msg: impl Into<String>) -> Self {
        ResolverError::Stream(msg.into())
    }

    /// 创建事件解码错误
    pub fn malformed(msg: impl Into<String>) -> Self {
        ResolverError::MalformedEvent(msg.into())
    }

    /// 错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolverError::InvalidSelector { .. }
            | ResolverError::InvalidTarget(_)
            | ResolverError::Config(_)
            | ResolverError::Io(_)
            | ResolverError::Toml(_) => ErrorCategory::Configuration,
            ResolverError::WatchOpen(_)
            | ResolverError::Stream(_) => ErrorCategory::TransientStream,
            ResolverError::MalformedEvent(_) => ErrorCategory::MalformedEvent,
        }
    }

    /// 是否可在 watcher 内部恢复
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// 解析器结果类型
pub type Result<T> = std::result::Result<T, ResolverError>;
