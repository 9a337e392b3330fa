//! 静态解析器
//!
//! 构建时把固定的地址列表发布一次，之后不再更新。

use crate::discovery::projector::AddressEntry;
use crate::discovery::publisher::{ResolverState, StatePublisher};
use crate::discovery::resolver::{Resolver, ResolverBuilder, Target};
use crate::error::Result;

/// 静态解析器的 scheme
pub const LOCAL_SCHEME: &str = "local";

/// 静态解析器的逻辑服务名
pub const LOCAL_SERVICE_NAME: &str = "api.localhost.grpc.io";

/// 静态解析器构建器
#[derive(Debug, Clone)]
pub struct StaticResolverBuilder {
    addrs: Vec<String>,
}

impl StaticResolverBuilder {
    pub fn new<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addrs: addrs.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResolverBuilder for StaticResolverBuilder {
    fn scheme(&self) -> &str {
        LOCAL_SCHEME
    }

    fn target(&self) -> Target {
        Target::new(LOCAL_SCHEME, LOCAL_SERVICE_NAME)
    }

    /// 只有目标是 [`LOCAL_SERVICE_NAME`] 时才发布配置的地址，其他目标得到空列表
    fn build(&self, target: &Target, publisher: StatePublisher) -> Result<Box<dyn Resolver>> {
        let addresses = if target.endpoint == LOCAL_SERVICE_NAME {
            self.addrs
                .iter()
                .map(|addr| AddressEntry::new(addr.clone(), LOCAL_SERVICE_NAME))
                .collect()
        } else {
            Vec::new()
        };
        publisher.publish(ResolverState::new(addresses));
        Ok(Box::new(StaticResolver))
    }
}

/// 静态解析器，没有后台任务
#[derive(Debug)]
pub struct StaticResolver;

impl Resolver for StaticResolver {
    fn resolve_now(&self) {}

    fn close(&self) {}
}
