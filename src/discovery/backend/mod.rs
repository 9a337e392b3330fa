//! watch 事件源抽象和实现

pub mod channel;
#[cfg(feature = "kubernetes")]
pub mod kubernetes;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::discovery::instance::BackendRecord;
use crate::error::Result;

/// watch 请求的默认服务端超时
///
/// kube-rs 要求 watch 超时小于 295 秒，到期后服务端关闭流，由 watcher 重新打开。
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(290);

/// 一次 watch 请求的范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    pub namespace: String,
    /// 等值标签选择器表达式，空字符串匹配全部
    pub label_selector: String,
    /// 服务端超时
    pub timeout: Duration,
}

/// 解码后的生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// 新流开始时的完整快照（list-then-watch 的 list 部分）
    Snapshot(Vec<BackendRecord>),
    Added(BackendRecord),
    Modified(BackendRecord),
    /// 携带被删除实例最后的记录和删除时的版本
    Deleted(BackendRecord),
    /// 进度标记，不影响状态
    Bookmark,
    /// 事件源报告 watch 不再一致，必须 resync
    Error(String),
}

/// 事件流：每一项是解码后的事件或解码/传输错误
pub type EventStream = BoxStream<'static, Result<WatchEvent>>;

/// watch 事件源 trait
///
/// 每次调用 `watch` 打开一条新的流。流结束（服务端超时）或返回错误后，
/// 调用方会重新调用 `watch`，事件源需要重新投递完整状态。
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// 打开 watch 流
    async fn watch(&self, request: &WatchRequest) -> Result<EventStream>;
}
