//! Kubernetes pod watch 后端
//!
//! 采用 list-then-watch：先 LIST 得到完整快照（作为一个 `Snapshot` 事件投递），
//! 再从 LIST 返回的 resourceVersion 开始 WATCH。这样每次重新打开流时，
//! 状态存储都能一次性替换为最新快照，不会残留旧实例，也不会先清空再逐个恢复。

use std::net::IpAddr;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Container, Pod};
use kube::api::{Api, ListParams, WatchEvent as PodEvent, WatchParams};
use kube::Client;

use super::{EventStream, WatchEvent, WatchRequest, WatchSource};
use crate::discovery::instance::{BackendPhase, BackendRecord, ContainerSpec};
use crate::error::{ResolverError, Result};

/// kube-rs 拒绝大于等于 295 秒的 watch 超时
const MAX_WATCH_TIMEOUT_SECS: u64 = 290;

/// Kubernetes pod 事件源
#[derive(Clone)]
pub struct KubernetesSource {
    client: Client,
}

impl KubernetesSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 使用集群内配置或本地 kubeconfig 创建
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| ResolverError::config(format!("failed to create kubernetes client: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl WatchSource for KubernetesSource {
    async fn watch(&self, request: &WatchRequest) -> Result<EventStream> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);

        let mut list_params = ListParams::default();
        let mut watch_params = WatchParams::default()
            .timeout(request.timeout.as_secs().clamp(1, MAX_WATCH_TIMEOUT_SECS) as u32);
        if !request.label_selector.is_empty() {
            list_params = list_params.labels(&request.label_selector);
            watch_params = watch_params.labels(&request.label_selector);
        }

        let list = api
            .list(&list_params)
            .await
            .map_err(|e| ResolverError::watch_open(format!("failed to list pods: {e}")))?;
        let version = list.metadata.resource_version.clone().unwrap_or_default();
        let records = list
            .items
            .into_iter()
            .map(pod_to_record)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            namespace = %request.namespace,
            selector = %request.label_selector,
            resource_version = %version,
            pods = records.len(),
            "listed pods, starting watch"
        );

        let events = api
            .watch(&watch_params, &version)
            .await
            .map_err(|e| ResolverError::watch_open(format!("failed to watch pods: {e}")))?;

        let snapshot = futures::stream::once(async move { Ok(WatchEvent::Snapshot(records)) });
        Ok(snapshot.chain(events.map(decode_event)).boxed())
    }
}

/// 把 kube watch 流中的一项转换为生命周期事件
///
/// ERROR 事件转换为 [`WatchEvent::Error`]，由 watcher 触发 resync；
/// 反序列化失败是 `MalformedEvent`，其余传输错误是 `Stream`。
pub fn decode_event(item: kube::Result<PodEvent<Pod>>) -> Result<WatchEvent> {
    match item {
        Ok(PodEvent::Added(pod)) => pod_to_record(pod).map(WatchEvent::Added),
        Ok(PodEvent::Modified(pod)) => pod_to_record(pod).map(WatchEvent::Modified),
        Ok(PodEvent::Deleted(pod)) => pod_to_record(pod).map(WatchEvent::Deleted),
        Ok(PodEvent::Bookmark(_)) => Ok(WatchEvent::Bookmark),
        Ok(PodEvent::Error(err)) => Ok(WatchEvent::Error(format!(
            "{} (code {})",
            err.message, err.code
        ))),
        Err(kube::Error::SerdeError(e)) => Err(ResolverError::malformed(e.to_string())),
        Err(e) => Err(ResolverError::stream(e.to_string())),
    }
}

/// 把 pod 解码为后端记录
///
/// 缺少名称、resourceVersion 或创建时间，pod IP 无法解析，端口超出范围时
/// 返回 `MalformedEvent`。
pub fn pod_to_record(pod: Pod) -> Result<BackendRecord> {
    let meta = pod.metadata;
    let name = meta
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ResolverError::malformed("pod without metadata.name"))?;
    let version = meta
        .resource_version
        .filter(|version| !version.is_empty())
        .ok_or_else(|| ResolverError::malformed(format!("pod {name} without resourceVersion")))?;
    let created_at = meta
        .creation_timestamp
        .map(|time| time.0)
        .ok_or_else(|| ResolverError::malformed(format!("pod {name} without creationTimestamp")))?;

    let status = pod.status.unwrap_or_default();
    let phase = status
        .phase
        .as_deref()
        .map(BackendPhase::from_pod_phase)
        .unwrap_or(BackendPhase::Pending);
    let address = match status.pod_ip.as_deref() {
        None | Some("") => None,
        Some(ip) => Some(ip.parse::<IpAddr>().map_err(|e| {
            ResolverError::malformed(format!("pod {name} has invalid podIP {ip:?}: {e}"))
        })?),
    };

    let containers = pod
        .spec
        .map(|spec| spec.containers)
        .unwrap_or_default()
        .into_iter()
        .map(|container| container_spec(&name, container))
        .collect::<Result<Vec<_>>>()?;

    let mut record = BackendRecord::new(name, version, created_at).with_phase(phase);
    record.address = address;
    record.containers = containers;
    Ok(record)
}

fn container_spec(pod: &str, container: Container) -> Result<ContainerSpec> {
    let mut spec = ContainerSpec::new(container.name);
    for port in container.ports.unwrap_or_default() {
        let Some(port_name) = port.name else {
            continue;
        };
        let number = u16::try_from(port.container_port).map_err(|_| {
            ResolverError::malformed(format!(
                "pod {pod} port {port_name} out of range: {}",
                port.container_port
            ))
        })?;
        spec.named_ports.insert(port_name, number);
    }
    Ok(spec)
}
