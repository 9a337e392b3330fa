//! Flare gRPC Resolver
//!
//! Client-side service discovery for tonic: watches Kubernetes pods, keeps a
//! version-consistent view of eligible backends and feeds the ordered address
//! list to a balanced channel.

pub mod client;
pub mod config;
pub mod discovery;
pub mod env;
pub mod error;
pub mod logging;
pub mod retry;

// Re-exports
pub use client::{ClientBuilder, ClientConfig, ResolvedClient};
pub use config::{Config, KubernetesConfig, LogConfig, ResolverConfig};
pub use discovery::{
    AddressEntry, AddressProjector, BackendIdentity, BackendPhase, BackendRecord, ContainerSpec,
    DynamicOptions, DynamicResolver, DynamicResolverBuilder, LabelSelector, Resolver,
    ResolverBuilder, ResolverState, StatePublisher, StateReceiver, StateStore,
    StaticResolverBuilder, Target, VersionToken, WatchEvent, WatchRequest, WatchSource,
};
pub use error::{ErrorCategory, ResolverError, Result};
pub use retry::{FixedRetryPolicy, RetryPolicy};
