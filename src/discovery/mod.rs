//! Kubernetes 服务发现与地址解析
//!
//! watch pod 生命周期事件，维护一致的后端视图，
//! 在视图变化时把有序地址列表发布给负载均衡层。

pub mod backend;
pub mod discover;
pub mod instance;
pub mod projector;
pub mod publisher;
pub mod resolver;
pub mod selector;
pub mod static_resolver;
pub mod store;
pub mod watcher;

pub use backend::channel::{ChannelSource, SessionHandle};
#[cfg(feature = "kubernetes")]
pub use backend::kubernetes::{KubernetesSource, decode_event, pod_to_record};
pub use backend::{EventStream, WatchEvent, WatchRequest, WatchSource};
pub use discover::{
    AddressDiff, EndpointFactory, default_endpoint, spawn_balance_updater, tls_endpoint_factory,
};
pub use instance::{BackendIdentity, BackendPhase, BackendRecord, ContainerSpec, VersionToken};
pub use projector::{AddressEntry, AddressProjector, PORT_NAME, SERVICE_NAME};
pub use publisher::{ResolverState, StatePublisher, StateReceiver};
pub use resolver::{
    DynamicOptions, DynamicResolver, DynamicResolverBuilder, Resolver, ResolverBuilder, SCHEME,
    Target,
};
pub use selector::LabelSelector;
pub use static_resolver::{LOCAL_SCHEME, LOCAL_SERVICE_NAME, StaticResolver, StaticResolverBuilder};
pub use store::{ApplyOutcome, StateStore};
pub use watcher::StreamWatcher;
