//! gRPC 客户端模块
//!
//! 把解析器接入 tonic balance channel：解析器发布地址快照，
//! 转发任务把差分推送给 channel，负载均衡由 tonic 完成。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tonic::transport::Channel;

use crate::config::ResolverConfig;
use crate::discovery::discover::{
    EndpointFactory, default_endpoint, spawn_balance_updater, tls_endpoint_factory,
};
use crate::discovery::projector::AddressEntry;
use crate::discovery::publisher::{ResolverState, StatePublisher, StateReceiver};
use crate::discovery::resolver::{Resolver, ResolverBuilder, Target};
use crate::discovery::static_resolver::StaticResolverBuilder;
use crate::env;
use crate::error::{ResolverError, Result};

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// balance channel 的变更缓冲区大小
    pub buffer: usize,
    pub connect_timeout: Duration,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            buffer: 1024,
            connect_timeout: Duration::from_secs(5),
            timeout: None,
        }
    }
}

/// 客户端构建器
pub struct ClientBuilder {
    resolver: Arc<dyn ResolverBuilder>,
    target: Option<Target>,
    config: ClientConfig,
    make_endpoint: EndpointFactory,
    host_name: Option<String>,
}

impl ClientBuilder {
    pub fn new(resolver: Arc<dyn ResolverBuilder>) -> Self {
        Self {
            resolver,
            target: None,
            config: ClientConfig::default(),
            make_endpoint: Arc::new(default_endpoint),
            host_name: None,
        }
    }

    /// 按配置选择静态或 Kubernetes 解析器
    pub async fn from_config(config: &ResolverConfig) -> Result<Self> {
        config.validate()?;
        if !config.static_address.is_empty() {
            let builder = StaticResolverBuilder::new(config.static_address.iter().cloned());
            return Ok(Self::new(Arc::new(builder)));
        }
        match &config.kubernetes {
            #[cfg(feature = "kubernetes")]
            Some(kubernetes) => {
                use crate::discovery::backend::kubernetes::KubernetesSource;
                use crate::discovery::resolver::DynamicResolverBuilder;

                let source = KubernetesSource::try_default().await?;
                let builder = DynamicResolverBuilder::new(Arc::new(source), kubernetes.to_options());
                Ok(Self::new(Arc::new(builder)))
            }
            #[cfg(not(feature = "kubernetes"))]
            Some(_) => Err(ResolverError::config(
                "kubernetes resolver requires the `kubernetes` feature",
            )),
            None => Err(ResolverError::config(
                "resolver static_address or kubernetes must be specified",
            )),
        }
    }

    /// 覆盖构建器的默认解析目标
    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn buffer(mut self, buffer: usize) -> Self {
        self.config.buffer = buffer;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// 自定义每个后端的 Endpoint（TLS、keepalive 等）
    pub fn endpoint_factory(mut self, make_endpoint: EndpointFactory) -> Self {
        self.make_endpoint = make_endpoint;
        self
    }

    /// 使用 `TLS_OPTION_CA_FILE` / `TLS_OPTION_SERVER_NAME` 配置的 TLS 连接后端
    pub fn static_tls(self) -> Result<Self> {
        let (ca_file, server_name) = env::static_client_certs()?;
        let ca_pem = std::fs::read(&ca_file)
            .map_err(|e| ResolverError::config(format!("unable to read tls ca file {ca_file}: {e}")))?;
        Ok(self.endpoint_factory(tls_endpoint_factory(ca_pem, server_name)))
    }

    /// 指定本机主机名，不设置时由 [`env::host_name`] 获取
    pub fn host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    /// 构建解析器和 balance channel，必须在 tokio 运行时内调用
    pub fn build(self) -> Result<ResolvedClient> {
        let host_name = match self.host_name {
            Some(host_name) => host_name,
            None => env::host_name()?,
        };
        let target = self.target.unwrap_or_else(|| self.resolver.target());
        let (publisher, receiver) = StatePublisher::channel();
        let resolver = self.resolver.build(&target, publisher)?;

        let (channel, tx) = Channel::balance_channel::<String>(self.config.buffer);
        let connect_timeout = self.config.connect_timeout;
        let timeout = self.config.timeout;
        let make_endpoint = self.make_endpoint;
        let configured: EndpointFactory = Arc::new(move |entry: &AddressEntry| {
            let mut endpoint = make_endpoint(entry)?.connect_timeout(connect_timeout);
            if let Some(timeout) = timeout {
                endpoint = endpoint.timeout(timeout);
            }
            Ok(endpoint)
        });
        let updater = spawn_balance_updater(receiver.clone(), tx, configured);

        tracing::info!(%target, %host_name, "resolved client created");
        Ok(ResolvedClient {
            target,
            host_name,
            channel,
            resolver,
            receiver,
            updater,
        })
    }
}

/// 带解析器的 gRPC 客户端
pub struct ResolvedClient {
    target: Target,
    host_name: String,
    channel: Channel,
    resolver: Box<dyn Resolver>,
    receiver: StateReceiver,
    updater: JoinHandle<()>,
}

impl ResolvedClient {
    /// 负载均衡后的 Channel，可直接用于生成的 gRPC 客户端
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// 本机主机名
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// 订阅地址状态
    pub fn state(&self) -> StateReceiver {
        self.receiver.clone()
    }

    /// 等待至少一个可用后端
    pub async fn wait_ready(&self, timeout: Duration) -> Result<ResolverState> {
        let mut receiver = self.receiver.clone();
        tokio::time::timeout(timeout, receiver.wait_for(|state| !state.is_empty()))
            .await
            .map_err(|_| ResolverError::stream(format!("no backend for {} within {timeout:?}", self.target)))?
            .ok_or_else(|| ResolverError::stream(format!("resolver for {} closed", self.target)))
    }

    pub fn resolve_now(&self) {
        self.resolver.resolve_now();
    }

    /// 关闭解析器和转发任务，可重复调用
    pub fn close(&self) {
        self.resolver.close();
        self.updater.abort();
    }
}

impl Drop for ResolvedClient {
    fn drop(&mut self) {
        self.close();
    }
}
