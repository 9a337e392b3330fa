//! watch 流生命周期管理
//!
//! 状态机：`Connecting -> Streaming -> (关闭/错误) -> Connecting`，
//! 任意状态下收到取消信号都进入终止状态。
//!
//! 事件的应用（状态存储）和重新计算（地址投影）都在同一个任务中顺序执行，
//! 状态存储不需要加锁。跨任务的只有两样：发布给消费者的状态和取消令牌。

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::discovery::backend::{EventStream, WatchEvent, WatchRequest, WatchSource};
use crate::discovery::projector::AddressProjector;
use crate::discovery::publisher::{ResolverState, StatePublisher};
use crate::discovery::store::{ApplyOutcome, StateStore};
use crate::error::{ResolverError, Result};
use crate::retry::{FixedRetryPolicy, RetryPolicy};

/// 一条流结束的原因
enum StreamEnd {
    Cancelled,
    /// 服务端结束（例如超时到期），视为瞬时情况
    Closed,
    /// ERROR 事件或解码失败，需要 resync
    Resync(ResolverError),
}

/// watch 流管理器
pub struct StreamWatcher {
    source: Arc<dyn WatchSource>,
    request: WatchRequest,
    retry: Arc<dyn RetryPolicy>,
    projector: AddressProjector,
    publisher: StatePublisher,
    token: CancellationToken,
    store: StateStore,
}

impl StreamWatcher {
    pub fn new(
        source: Arc<dyn WatchSource>,
        request: WatchRequest,
        publisher: StatePublisher,
        token: CancellationToken,
    ) -> Self {
        Self {
            source,
            request,
            retry: Arc::new(FixedRetryPolicy::default()),
            projector: AddressProjector::default(),
            publisher,
            token,
            store: StateStore::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_projector(mut self, projector: AddressProjector) -> Self {
        self.projector = projector;
        self
    }

    /// 运行直到被取消（或重试策略放弃）
    pub async fn run(mut self) {
        info!(
            namespace = %self.request.namespace,
            selector = %self.request.label_selector,
            "pod watcher started"
        );

        let mut attempt = 0usize;
        loop {
            if self.token.is_cancelled() {
                break;
            }

            // Connecting
            let opened = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                opened = self.source.watch(&self.request) => opened,
            };

            let mut stream = match opened {
                Ok(stream) => {
                    attempt = 0;
                    stream
                }
                Err(err) => {
                    attempt += 1;
                    if !self.retry.should_retry(attempt, &err) {
                        error!(
                            namespace = %self.request.namespace,
                            attempt,
                            error = %err,
                            "giving up on watch stream"
                        );
                        break;
                    }
                    let delay = self.retry.backoff_duration(attempt);
                    warn!(
                        namespace = %self.request.namespace,
                        selector = %self.request.label_selector,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "failed to open watch stream, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            debug!(namespace = %self.request.namespace, "watch stream opened");

            // Streaming
            match self.stream_events(&mut stream).await {
                StreamEnd::Cancelled => break,
                StreamEnd::Closed => {
                    debug!(namespace = %self.request.namespace, "watch stream closed, reconnecting");
                }
                StreamEnd::Resync(err) => {
                    warn!(
                        namespace = %self.request.namespace,
                        selector = %self.request.label_selector,
                        category = %err.category(),
                        error = %err,
                        "watch stream inconsistent, resyncing"
                    );
                }
            }
        }

        info!(namespace = %self.request.namespace, "pod watcher stopped");
    }

    /// 逐个处理事件直到流结束
    ///
    /// 新流的第一个有状态事件会先重置状态存储：`Snapshot` 整体替换，
    /// 其他事件先清空再应用。旧流遗留的实例因此不会进入之后发布的列表。
    async fn stream_events(&mut self, stream: &mut EventStream) -> StreamEnd {
        let mut reset_pending = true;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return StreamEnd::Cancelled,
                next = stream.next() => next,
            };

            let event = match next {
                None => return StreamEnd::Closed,
                Some(Err(err)) => return StreamEnd::Resync(err),
                Some(Ok(event)) => event,
            };

            match self.apply_event(event, &mut reset_pending) {
                Ok(true) => {
                    if self.token.is_cancelled() {
                        return StreamEnd::Cancelled;
                    }
                    self.publish();
                }
                Ok(false) => {}
                Err(err) => return StreamEnd::Resync(err),
            }
        }
    }

    /// 应用一个事件，返回是否需要重新发布
    fn apply_event(&mut self, event: WatchEvent, reset_pending: &mut bool) -> Result<bool> {
        let reset = match event {
            WatchEvent::Bookmark | WatchEvent::Error(_) => false,
            _ => std::mem::take(reset_pending),
        };

        match event {
            WatchEvent::Snapshot(records) => {
                self.store.replace_all(records);
                Ok(true)
            }
            WatchEvent::Added(record) | WatchEvent::Modified(record) => {
                if reset {
                    self.store.clear();
                }
                let identity = record.identity.clone();
                let version = record.version.clone();
                let outcome = self.store.upsert(record);
                if outcome == ApplyOutcome::Stale {
                    trace!(%identity, %version, "discarding stale upsert");
                }
                Ok(reset || outcome.changed())
            }
            WatchEvent::Deleted(record) => {
                if reset {
                    self.store.clear();
                }
                let outcome = self.store.remove(&record.identity, &record.version);
                if outcome == ApplyOutcome::Stale {
                    trace!(identity = %record.identity, version = %record.version, "discarding stale delete");
                }
                Ok(reset || outcome.changed())
            }
            WatchEvent::Bookmark => Ok(false),
            WatchEvent::Error(message) => Err(ResolverError::stream(message)),
        }
    }

    fn publish(&self) {
        let addresses = self.projector.project(&self.store);
        self.publisher.publish(ResolverState::new(addresses));
    }
}
