//! 地址投影
//!
//! 纯函数：状态存储快照 -> 有序地址列表。

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::discovery::instance::{BackendPhase, BackendRecord};
use crate::discovery::store::StateStore;

/// 后端容器必须暴露的命名端口
pub const PORT_NAME: &str = "apigrpc";

/// Kubernetes 解析器发布地址时使用的逻辑服务名
pub const SERVICE_NAME: &str = "api.kubernetes.grpc.io";

/// 一个可连接的地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressEntry {
    /// `ip:port`，IPv6 带方括号
    pub addr: String,
    pub server_name: String,
}

impl AddressEntry {
    pub fn new(addr: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            server_name: server_name.into(),
        }
    }
}

/// 地址投影器
///
/// 资格条件固定：Running 阶段、恰好一个容器、该容器暴露 `port_name`，
/// 且已分配地址。不满足条件的记录直接跳过，这在实例启动和下线期间是常态。
#[derive(Debug, Clone)]
pub struct AddressProjector {
    port_name: String,
    server_name: String,
}

impl Default for AddressProjector {
    fn default() -> Self {
        Self::new(PORT_NAME, SERVICE_NAME)
    }
}

impl AddressProjector {
    pub fn new(port_name: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            server_name: server_name.into(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// 记录满足资格条件时返回其可连接地址
    pub fn endpoint_of(&self, record: &BackendRecord) -> Option<SocketAddr> {
        if record.phase != BackendPhase::Running {
            return None;
        }
        let port = record.single_container()?.port(&self.port_name)?;
        let ip = record.address?;
        Some(SocketAddr::new(ip, port))
    }

    /// 计算地址列表
    ///
    /// 按创建时间升序，创建时间相同则按标识排序，同一快照重复计算结果完全一致。
    pub fn project(&self, store: &StateStore) -> Vec<AddressEntry> {
        let mut eligible: Vec<(&BackendRecord, SocketAddr)> = store
            .records()
            .filter_map(|record| self.endpoint_of(record).map(|addr| (record, addr)))
            .collect();

        eligible.sort_by(|(a, _), (b, _)| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.identity.cmp(&b.identity))
        });

        eligible
            .into_iter()
            .map(|(_, addr)| AddressEntry::new(addr.to_string(), self.server_name.clone()))
            .collect()
    }
}
