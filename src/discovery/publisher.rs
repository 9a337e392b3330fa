//! 地址状态发布
//!
//! watcher 任务与消费者（负载均衡层）之间唯一的跨任务通道。
//! 底层是 `tokio::sync::watch`：发布永不阻塞，慢消费者只会看到最新状态。

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::discovery::projector::AddressEntry;

/// 发布给消费者的地址快照
///
/// `addresses` 为空表示当前没有可用后端。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverState {
    pub addresses: Vec<AddressEntry>,
}

impl ResolverState {
    pub fn new(addresses: Vec<AddressEntry>) -> Self {
        Self { addresses }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// 所有地址字符串
    pub fn addrs(&self) -> Vec<&str> {
        self.addresses.iter().map(|a| a.addr.as_str()).collect()
    }
}

/// 状态发布端
#[derive(Debug, Clone)]
pub struct StatePublisher {
    tx: watch::Sender<Option<ResolverState>>,
}

/// 状态接收端
///
/// 初始值为 `None`，表示解析器尚未发布过任何状态。
#[derive(Debug, Clone)]
pub struct StateReceiver {
    rx: watch::Receiver<Option<ResolverState>>,
}

impl StatePublisher {
    /// 创建一对发布端 / 接收端
    pub fn channel() -> (Self, StateReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, StateReceiver { rx })
    }

    /// 发布新状态，没有接收端时也不会失败
    pub fn publish(&self, state: ResolverState) {
        tracing::debug!(addresses = ?state.addrs(), "publishing resolver state");
        self.tx.send_replace(Some(state));
    }

    pub fn subscribe(&self) -> StateReceiver {
        StateReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// 所有接收端都已关闭
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl StateReceiver {
    /// 最近一次发布的状态
    pub fn current(&self) -> Option<ResolverState> {
        self.rx.borrow().clone()
    }

    /// 等待下一次发布，发布端全部关闭时返回 `None`
    pub async fn changed(&mut self) -> Option<ResolverState> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(state) = self.rx.borrow_and_update().clone() {
                return Some(state);
            }
        }
    }

    /// 等待满足条件的状态（包括当前值）
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ResolverState) -> bool,
    ) -> Option<ResolverState> {
        let state = self
            .rx
            .wait_for(|state| state.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        state.clone()
    }
}
