//! 地址快照 -> balance channel `Change` 事件
//!
//! tonic 的 balance channel 接收 `Change` 增量事件，
//! 而解析器发布的是完整地址快照。这里对相邻两次快照做差分，
//! 以地址字符串为 key 转发 Insert / Remove。

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tonic::transport::{Certificate, ClientTlsConfig, Endpoint};
use tonic::transport::channel::Change;

use crate::discovery::projector::AddressEntry;
use crate::discovery::publisher::{ResolverState, StateReceiver};
use crate::error::{ResolverError, Result};

/// 为一个地址创建 tonic Endpoint
pub type EndpointFactory = Arc<dyn Fn(&AddressEntry) -> Result<Endpoint> + Send + Sync>;

/// 默认的 Endpoint：`http://{addr}`
pub fn default_endpoint(entry: &AddressEntry) -> Result<Endpoint> {
    let uri: http::Uri = format!("http://{}", entry.addr)
        .parse()
        .map_err(|e| ResolverError::config(format!("invalid backend address {}: {e}", entry.addr)))?;
    Ok(Endpoint::from(uri))
}

/// TLS Endpoint：`https://{addr}`，用给定 CA 校验服务端证书
///
/// 后端以 pod IP 连接，证书中不会有这个地址，所以 `domain`
/// 同时作为 SNI 和证书校验使用的名称。
pub fn tls_endpoint_factory(ca_pem: impl AsRef<[u8]>, domain: impl Into<String>) -> EndpointFactory {
    let tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(ca_pem))
        .domain_name(domain);
    Arc::new(move |entry: &AddressEntry| {
        let uri: http::Uri = format!("https://{}", entry.addr)
            .parse()
            .map_err(|e| ResolverError::config(format!("invalid backend address {}: {e}", entry.addr)))?;
        Endpoint::from(uri)
            .tls_config(tls.clone())
            .map_err(|e| ResolverError::config(format!("invalid tls configuration for {}: {e}", entry.addr)))
    })
}

/// 两次快照之间的差异
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDiff {
    /// 新出现的地址，保持在新快照中的顺序
    pub inserted: Vec<AddressEntry>,
    /// 消失的地址
    pub removed: Vec<String>,
}

impl AddressDiff {
    pub fn between(previous: &ResolverState, next: &ResolverState) -> Self {
        let before: BTreeMap<&str, &AddressEntry> = previous
            .addresses
            .iter()
            .map(|entry| (entry.addr.as_str(), entry))
            .collect();
        let after: BTreeMap<&str, &AddressEntry> = next
            .addresses
            .iter()
            .map(|entry| (entry.addr.as_str(), entry))
            .collect();

        let removed = before
            .iter()
            .filter(|(addr, entry)| after.get(*addr) != Some(*entry))
            .map(|(addr, _)| addr.to_string())
            .collect();
        let mut inserted = Vec::new();
        for entry in &next.addresses {
            let unchanged = before.get(entry.addr.as_str()) == Some(&entry);
            if !unchanged && !inserted.contains(entry) {
                inserted.push(entry.clone());
            }
        }

        Self { inserted, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// 启动转发任务：监听解析器状态，把差分推送给 balance channel
///
/// 解析器关闭（发布端全部 drop）或 balance channel 关闭时任务退出。
pub fn spawn_balance_updater(
    mut receiver: StateReceiver,
    tx: mpsc::Sender<Change<String, Endpoint>>,
    make_endpoint: EndpointFactory,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut current = ResolverState::default();

        let mut next = receiver.current();
        loop {
            if let Some(state) = next.take() {
                let diff = AddressDiff::between(&current, &state);
                if !forward(&tx, diff, &make_endpoint).await {
                    tracing::debug!("balance channel closed, stopping updater");
                    return;
                }
                current = state;
            }

            match receiver.changed().await {
                Some(state) => next = Some(state),
                None => break,
            }
        }
        tracing::debug!("resolver closed, stopping balance updater");
    })
}

async fn forward(
    tx: &mpsc::Sender<Change<String, Endpoint>>,
    diff: AddressDiff,
    make_endpoint: &EndpointFactory,
) -> bool {
    for addr in diff.removed {
        tracing::debug!(%addr, "removing backend");
        if tx.send(Change::Remove(addr)).await.is_err() {
            return false;
        }
    }
    for entry in diff.inserted {
        let endpoint = match make_endpoint(&entry) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!(addr = %entry.addr, error = %e, "skipping backend with invalid endpoint");
                continue;
            }
        };
        tracing::debug!(addr = %entry.addr, "inserting backend");
        if tx.send(Change::Insert(entry.addr, endpoint)).await.is_err() {
            return false;
        }
    }
    true
}
