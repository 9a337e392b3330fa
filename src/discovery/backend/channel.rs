//! 内存事件源
//!
//! 事件由调用方手动投递。每次 `watch` 取出队列中的下一个会话：
//! 会话要么是一条事件流，要么是一次打开失败。队列为空时打开失败。
//! 适用于测试，以及自行获取事件、只需要解析引擎的嵌入场景。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{EventStream, WatchEvent, WatchRequest, WatchSource};
use crate::error::{ResolverError, Result};

enum Session {
    Stream(mpsc::UnboundedReceiver<Result<WatchEvent>>),
    Fail(ResolverError),
}

/// 一条已排队 watch 流的投递端
///
/// drop 或调用 [`SessionHandle::close`] 即模拟服务端关闭流。
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Result<WatchEvent>>,
}

impl SessionHandle {
    /// 投递事件，流已被消费端丢弃时返回 false
    pub fn send(&self, event: WatchEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// 投递一个解码/传输错误
    pub fn send_error(&self, error: ResolverError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// 消费端是否已丢弃这条流
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn close(self) {}
}

/// 内存事件源
pub struct ChannelSource {
    sessions: Mutex<VecDeque<Session>>,
    requests: Mutex<Vec<WatchRequest>>,
    opens: watch::Sender<usize>,
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSource {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            opens: watch::Sender::new(0),
        }
    }

    /// 排队一条事件流
    pub fn push_session(&self) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.sessions).push_back(Session::Stream(rx));
        SessionHandle { tx }
    }

    /// 排队一次打开失败
    pub fn push_failure(&self, error: ResolverError) {
        lock(&self.sessions).push_back(Session::Fail(error));
    }

    /// `watch` 被调用的次数（包括失败的）
    pub fn open_count(&self) -> usize {
        *self.opens.borrow()
    }

    /// 等待 `watch` 至少被调用 `count` 次
    pub async fn wait_for_opens(&self, count: usize) {
        let mut rx = self.opens.subscribe();
        // 发送端由 self 持有，不会关闭
        let _ = rx.wait_for(|opened| *opened >= count).await;
    }

    /// 收到过的所有 watch 请求
    pub fn requests(&self) -> Vec<WatchRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl WatchSource for ChannelSource {
    async fn watch(&self, request: &WatchRequest) -> Result<EventStream> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.sessions).pop_front();
        self.opens.send_modify(|opened| *opened += 1);

        match next {
            Some(Session::Stream(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(Session::Fail(error)) => Err(error),
            None => Err(ResolverError::watch_open("no watch session queued")),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
