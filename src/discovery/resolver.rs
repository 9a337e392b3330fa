//! 解析器生命周期
//!
//! gRPC 客户端层通过 [`ResolverBuilder`] 直接拿到解析器实例（依赖注入），
//! 不存在按 scheme 查找的全局注册表。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::discovery::backend::{DEFAULT_WATCH_TIMEOUT, WatchRequest, WatchSource};
use crate::discovery::projector::{AddressProjector, SERVICE_NAME};
use crate::discovery::publisher::StatePublisher;
use crate::discovery::selector::LabelSelector;
use crate::discovery::watcher::StreamWatcher;
use crate::error::{ResolverError, Result};
use crate::retry::{FixedRetryPolicy, RetryPolicy, fixed::DEFAULT_RETRY_DELAY};

/// Kubernetes 解析器的 scheme
pub const SCHEME: &str = "kubernetes";

/// 解析目标，形如 `kubernetes:///api.kubernetes.grpc.io`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    pub authority: String,
    pub endpoint: String,
}

impl Target {
    pub fn new(scheme: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            authority: String::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl FromStr for Target {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| ResolverError::InvalidTarget(s.to_string()))?;
        let (authority, endpoint) = rest.split_once('/').unwrap_or((rest, ""));
        if scheme.is_empty() || endpoint.is_empty() {
            return Err(ResolverError::InvalidTarget(s.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            endpoint: endpoint.to_string(),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.authority, self.endpoint)
    }
}

/// 解析器句柄
pub trait Resolver: Send + Sync {
    /// 立即重新解析的提示，watch 模式下无需处理
    fn resolve_now(&self);

    /// 关闭解析器，可重复调用
    fn close(&self);
}

/// 解析器构建器
pub trait ResolverBuilder: Send + Sync {
    /// 支持的 scheme
    fn scheme(&self) -> &str;

    /// 该构建器对应的默认解析目标
    fn target(&self) -> Target;

    /// 构建解析器，地址变化通过 `publisher` 推送给消费者
    fn build(&self, target: &Target, publisher: StatePublisher) -> Result<Box<dyn Resolver>>;
}

/// 动态（watch）解析器参数
#[derive(Debug, Clone)]
pub struct DynamicOptions {
    /// 命名空间，必填
    pub namespace: String,
    /// 实例必须携带的标签
    pub labels: HashMap<String, String>,
    /// 打开 watch 失败后的重试间隔
    pub retry_delay: Duration,
    /// watch 请求的服务端超时
    pub watch_timeout: Duration,
}

impl DynamicOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            labels: HashMap::new(),
            retry_delay: DEFAULT_RETRY_DELAY,
            watch_timeout: DEFAULT_WATCH_TIMEOUT,
        }
    }

    /// 添加标签条件
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_watch_timeout(mut self, timeout: Duration) -> Self {
        self.watch_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(ResolverError::config("namespace must be specified and not empty"));
        }
        Ok(())
    }
}

/// 动态解析器构建器
pub struct DynamicResolverBuilder {
    source: Arc<dyn WatchSource>,
    options: DynamicOptions,
    retry: Option<Arc<dyn RetryPolicy>>,
    projector: AddressProjector,
}

impl DynamicResolverBuilder {
    pub fn new(source: Arc<dyn WatchSource>, options: DynamicOptions) -> Self {
        Self {
            source,
            options,
            retry: None,
            projector: AddressProjector::default(),
        }
    }

    /// 覆盖默认的固定间隔无限重试策略
    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_projector(mut self, projector: AddressProjector) -> Self {
        self.projector = projector;
        self
    }

    pub fn options(&self) -> &DynamicOptions {
        &self.options
    }

    /// 校验参数并启动后台 watch 任务
    ///
    /// 标签非法或命名空间为空时立即失败；必须在 tokio 运行时内调用。
    pub fn spawn(&self, publisher: StatePublisher) -> Result<DynamicResolver> {
        self.options.validate()?;
        let selector = LabelSelector::from_labels(&self.options.labels)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ResolverError::config(format!("resolver requires a tokio runtime: {e}")))?;

        let request = WatchRequest {
            namespace: self.options.namespace.clone(),
            label_selector: selector.to_string(),
            timeout: self.options.watch_timeout,
        };
        let retry = self
            .retry
            .clone()
            .unwrap_or_else(|| Arc::new(FixedRetryPolicy::forever(self.options.retry_delay)));

        let token = CancellationToken::new();
        let watcher = StreamWatcher::new(self.source.clone(), request, publisher, token.clone())
            .with_retry_policy(retry)
            .with_projector(self.projector.clone());
        let task = runtime.spawn(watcher.run());

        Ok(DynamicResolver {
            token,
            task: Mutex::new(Some(task)),
        })
    }
}

impl ResolverBuilder for DynamicResolverBuilder {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn target(&self) -> Target {
        Target::new(SCHEME, self.projector.server_name())
    }

    fn build(&self, target: &Target, publisher: StatePublisher) -> Result<Box<dyn Resolver>> {
        if target.scheme != SCHEME {
            return Err(ResolverError::InvalidTarget(target.to_string()));
        }
        Ok(Box::new(self.spawn(publisher)?))
    }
}

/// 动态解析器
///
/// 持有后台 watch 任务的取消令牌。drop 时同样会取消任务。
pub struct DynamicResolver {
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DynamicResolver {
    /// 取消并等待后台任务结束
    pub async fn shutdown(&self) {
        self.token.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "pod watcher task failed");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Resolver for DynamicResolver {
    fn resolve_now(&self) {}

    fn close(&self) {
        if !self.token.is_cancelled() {
            tracing::info!(service = SERVICE_NAME, "closing kubernetes resolver");
        }
        self.token.cancel();
    }
}

impl Drop for DynamicResolver {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
