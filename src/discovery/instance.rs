//! 后端实例定义
//!
//! 一个 [`BackendRecord`] 对应 watch 流中的一个 pod。记录由状态存储独占，
//! 每次接受事件时整体替换，不做原地修改。

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 后端实例标识（pod 名称），在实例生命周期内不变
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendIdentity(String);

impl BackendIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BackendIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 版本令牌（Kubernetes `resourceVersion`）
///
/// 令牌对外是不透明的，只在同一个标识的两个令牌之间比较。
/// 排序规则：长度短的更小，长度相同按字典序。对于 Kubernetes 下发的
/// 十进制计数器，这与数值顺序一致，且无需解析。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for VersionToken {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VersionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 实例阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPhase {
    Pending,
    Running,
    /// 已结束（Kubernetes 的 Succeeded / Failed）
    Terminated,
    Other,
}

impl BackendPhase {
    /// 从 Kubernetes pod phase 字符串转换
    pub fn from_pod_phase(phase: &str) -> Self {
        match phase {
            "Pending" => BackendPhase::Pending,
            "Running" => BackendPhase::Running,
            "Succeeded" | "Failed" => BackendPhase::Terminated,
            _ => BackendPhase::Other,
        }
    }
}

/// 容器描述：容器名与命名端口
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    /// 端口名 -> 端口号
    pub named_ports: BTreeMap<String, u16>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            named_ports: BTreeMap::new(),
        }
    }

    /// 添加命名端口
    pub fn with_port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.named_ports.insert(name.into(), port);
        self
    }

    pub fn port(&self, name: &str) -> Option<u16> {
        self.named_ports.get(name).copied()
    }
}

/// 后端实例记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRecord {
    pub identity: BackendIdentity,
    pub version: VersionToken,
    pub phase: BackendPhase,
    pub created_at: DateTime<Utc>,
    /// 主网络地址，调度前为空
    pub address: Option<IpAddr>,
    pub containers: Vec<ContainerSpec>,
}

impl BackendRecord {
    /// 创建新的记录，默认处于 Pending 阶段、无地址、无容器
    pub fn new(
        identity: impl Into<BackendIdentity>,
        version: impl Into<VersionToken>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.into(),
            version: version.into(),
            phase: BackendPhase::Pending,
            created_at,
            address: None,
            containers: Vec::new(),
        }
    }

    /// 设置阶段
    pub fn with_phase(mut self, phase: BackendPhase) -> Self {
        self.phase = phase;
        self
    }

    /// 设置地址
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// 添加容器
    pub fn with_container(mut self, container: ContainerSpec) -> Self {
        self.containers.push(container);
        self
    }

    /// 只有一个容器时返回该容器
    pub fn single_container(&self) -> Option<&ContainerSpec> {
        match self.containers.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}
