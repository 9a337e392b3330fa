//! watch 流生命周期测试
//!
//! 使用内存事件源驱动动态解析器，覆盖重连、resync 和取消。

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{pending, running};
use flare_grpc_resolver::discovery::{
    AddressEntry, AddressProjector, ChannelSource, DynamicOptions, DynamicResolver,
    DynamicResolverBuilder, EventStream, Resolver, ResolverState, SERVICE_NAME, StatePublisher,
    StateReceiver, WatchEvent, WatchRequest, WatchSource,
};
use flare_grpc_resolver::{FixedRetryPolicy, ResolverError, Result};
use tokio::sync::Notify;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn options() -> DynamicOptions {
    DynamicOptions::new("default")
        .with_label("app", "api")
        .with_retry_delay(Duration::from_millis(10))
}

fn spawn(source: &Arc<ChannelSource>, options: DynamicOptions) -> (DynamicResolver, StateReceiver) {
    let (publisher, receiver) = StatePublisher::channel();
    let resolver = DynamicResolverBuilder::new(source.clone(), options)
        .spawn(publisher)
        .expect("spawn resolver");
    (resolver, receiver)
}

async fn wait_addrs(receiver: &mut StateReceiver, expected: &[&str]) -> ResolverState {
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    timeout(
        WAIT,
        receiver.wait_for(|state| {
            state.addresses.iter().map(|a| a.addr.clone()).collect::<Vec<_>>() == expected
        }),
    )
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {expected:?}"))
    .expect("publisher closed")
}

/// 测试：Pending -> Running -> 重复旧版本 -> 删除
#[tokio::test]
async fn test_lifecycle_scenario() {
    let source = Arc::new(ChannelSource::new());
    let session = source.push_session();
    let (publisher, mut receiver) = StatePublisher::channel();
    let resolver = DynamicResolverBuilder::new(source.clone(), options())
        .with_projector(AddressProjector::new(common::PORT, "svc-name"))
        .spawn(publisher)
        .unwrap();

    session.send(WatchEvent::Added(pending("a", 1, 0)));
    let state = wait_addrs(&mut receiver, &[]).await;
    assert!(state.is_empty());

    session.send(WatchEvent::Modified(common::running_on(
        "a", 2, "10.0.0.5", common::PORT, 8080, 0,
    )));
    let state = wait_addrs(&mut receiver, &["10.0.0.5:8080"]).await;
    assert_eq!(
        state.addresses,
        vec![AddressEntry::new("10.0.0.5:8080", "svc-name")]
    );

    // 重复的旧版本被丢弃；随后的新实例证明事件已被处理
    session.send(WatchEvent::Modified(pending("a", 1, 0)));
    session.send(WatchEvent::Added(common::running_on(
        "b", 4, "10.0.0.6", common::PORT, 8080, 1,
    )));
    wait_addrs(&mut receiver, &["10.0.0.5:8080", "10.0.0.6:8080"]).await;

    session.send(WatchEvent::Deleted(pending("a", 3, 0)));
    wait_addrs(&mut receiver, &["10.0.0.6:8080"]).await;

    session.send(WatchEvent::Deleted(pending("b", 5, 1)));
    let state = wait_addrs(&mut receiver, &[]).await;
    assert!(state.is_empty());

    resolver.shutdown().await;
}

/// 测试：watch 请求携带命名空间、选择器和超时
#[tokio::test]
async fn test_watch_request_parameters() {
    let source = Arc::new(ChannelSource::new());
    let _session = source.push_session();
    let (resolver, _receiver) = spawn(
        &source,
        options()
            .with_label("tier", "backend")
            .with_watch_timeout(Duration::from_secs(30)),
    );

    timeout(WAIT, source.wait_for_opens(1)).await.unwrap();
    let requests = source.requests();
    assert_eq!(requests[0].namespace, "default");
    assert_eq!(requests[0].label_selector, "app=api,tier=backend");
    assert_eq!(requests[0].timeout, Duration::from_secs(30));

    resolver.shutdown().await;
}

/// 测试：打开失败后按间隔重试
#[tokio::test]
async fn test_open_failure_is_retried() {
    let source = Arc::new(ChannelSource::new());
    source.push_failure(ResolverError::watch_open("connection refused"));
    source.push_failure(ResolverError::watch_open("connection refused"));
    let session = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    session.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;
    assert_eq!(source.open_count(), 3);

    resolver.shutdown().await;
}

/// 测试：配置类的打开失败（如权限不足）同样按间隔重试
#[tokio::test]
async fn test_configuration_open_failure_is_retried() {
    let source = Arc::new(ChannelSource::new());
    source.push_failure(ResolverError::config("pods is forbidden"));
    let session = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    timeout(WAIT, source.wait_for_opens(2))
        .await
        .expect("watcher stopped after a configuration open failure");
    session.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;
    assert_eq!(source.open_count(), 2);

    resolver.shutdown().await;
}

/// 测试：服务端关闭流后重新打开，旧实例不会残留
#[tokio::test]
async fn test_stream_closure_resyncs_without_leftovers() {
    let source = Arc::new(ChannelSource::new());
    let first = source.push_session();
    let second = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    first.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    first.send(WatchEvent::Added(running("b", 2, "10.0.0.2", 8080, 1)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080", "10.0.0.2:8080"]).await;

    // b 在断开期间被删除，新流只重新投递 a
    first.close();
    timeout(WAIT, source.wait_for_opens(2)).await.unwrap();
    second.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;

    resolver.shutdown().await;
}

/// 测试：ERROR 事件触发 resync，快照整体替换状态
#[tokio::test]
async fn test_error_event_triggers_resync() {
    let source = Arc::new(ChannelSource::new());
    let first = source.push_session();
    let second = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    first.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;

    first.send(WatchEvent::Error("too old resource version".into()));
    timeout(WAIT, source.wait_for_opens(2)).await.unwrap();
    assert!(first.is_closed());

    second.send(WatchEvent::Snapshot(vec![
        running("c", 5, "10.0.0.3", 8080, 2),
        running("d", 6, "10.0.0.4", 8080, 3),
    ]));
    wait_addrs(&mut receiver, &["10.0.0.3:8080", "10.0.0.4:8080"]).await;

    resolver.shutdown().await;
}

/// 测试：解码失败同样触发 resync，不会静默丢弃事件
#[tokio::test]
async fn test_malformed_event_triggers_resync() {
    let source = Arc::new(ChannelSource::new());
    let first = source.push_session();
    let second = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    first.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;

    first.send_error(ResolverError::malformed("pod without metadata.name"));
    timeout(WAIT, source.wait_for_opens(2)).await.unwrap();

    second.send(WatchEvent::Snapshot(vec![running("a", 3, "10.0.0.9", 8080, 0)]));
    wait_addrs(&mut receiver, &["10.0.0.9:8080"]).await;

    resolver.shutdown().await;
}

/// 测试：BOOKMARK 不产生发布
#[tokio::test]
async fn test_bookmark_does_not_publish() {
    let source = Arc::new(ChannelSource::new());
    let session = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    session.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;

    session.send(WatchEvent::Bookmark);
    assert!(
        timeout(Duration::from_millis(100), receiver.changed())
            .await
            .is_err()
    );

    resolver.shutdown().await;
}

/// 测试：重试等待期间取消，任务及时退出
#[tokio::test]
async fn test_cancel_during_retry_delay() {
    let source = Arc::new(ChannelSource::new());
    let (resolver, receiver) = spawn(&source, options().with_retry_delay(Duration::from_secs(60)));

    timeout(WAIT, source.wait_for_opens(1)).await.unwrap();
    resolver.close();
    timeout(WAIT, resolver.shutdown())
        .await
        .expect("watcher did not stop during retry delay");

    assert!(resolver.is_closed());
    assert_eq!(source.open_count(), 1);
    assert!(receiver.current().is_none());
}

/// 测试：关闭后不再发布
#[tokio::test]
async fn test_no_publish_after_close() {
    let source = Arc::new(ChannelSource::new());
    let session = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    session.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    let before = wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;

    resolver.close();
    session.send(WatchEvent::Added(running("b", 2, "10.0.0.2", 8080, 1)));
    timeout(WAIT, resolver.shutdown()).await.unwrap();

    assert_eq!(receiver.current(), Some(before));
    assert!(session.is_closed());
}

/// 测试：close 可重复调用
#[tokio::test]
async fn test_close_is_idempotent() {
    let source = Arc::new(ChannelSource::new());
    let _session = source.push_session();
    let (resolver, _receiver) = spawn(&source, options());

    resolver.close();
    resolver.close();
    resolver.shutdown().await;
    resolver.shutdown().await;
    resolver.close();
    assert!(resolver.is_closed());
}

/// 测试：drop 解析器会停止后台任务
#[tokio::test]
async fn test_drop_cancels_watcher() {
    let source = Arc::new(ChannelSource::new());
    let session = source.push_session();
    let (resolver, _receiver) = spawn(&source, options());
    timeout(WAIT, source.wait_for_opens(1)).await.unwrap();

    drop(resolver);
    for _ in 0..50 {
        if session.is_closed() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(session.is_closed());
}

/// 测试：有限重试策略用尽后停止打开
#[tokio::test]
async fn test_bounded_retry_policy_gives_up() {
    let source = Arc::new(ChannelSource::new());
    let (publisher, _receiver) = StatePublisher::channel();
    let resolver = DynamicResolverBuilder::new(source.clone(), options())
        .with_retry_policy(Arc::new(FixedRetryPolicy::new(2, Duration::from_millis(5))))
        .spawn(publisher)
        .unwrap();

    timeout(WAIT, source.wait_for_opens(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.open_count(), 2);

    resolver.shutdown().await;
}

/// 测试：已发布地址使用默认服务名
#[tokio::test]
async fn test_default_server_name() {
    let source = Arc::new(ChannelSource::new());
    let session = source.push_session();
    let (resolver, mut receiver) = spawn(&source, options());

    session.send(WatchEvent::Added(running("a", 1, "10.0.0.1", 8080, 0)));
    let state = wait_addrs(&mut receiver, &["10.0.0.1:8080"]).await;
    assert_eq!(state.addresses[0].server_name, SERVICE_NAME);

    resolver.shutdown().await;
}

/// 打开后永远挂起的事件源
struct HangingSource {
    entered: Notify,
}

#[async_trait]
impl WatchSource for HangingSource {
    async fn watch(&self, _request: &WatchRequest) -> Result<EventStream> {
        self.entered.notify_one();
        futures::future::pending().await
    }
}

/// 测试：打开 watch 挂起时取消，任务及时退出且不发布
#[tokio::test]
async fn test_cancel_while_opening() {
    let source = Arc::new(HangingSource {
        entered: Notify::new(),
    });
    let (publisher, receiver) = StatePublisher::channel();
    let resolver = DynamicResolverBuilder::new(source.clone(), options())
        .spawn(publisher)
        .unwrap();

    timeout(WAIT, source.entered.notified()).await.unwrap();
    resolver.close();
    timeout(WAIT, resolver.shutdown())
        .await
        .expect("watcher did not stop while opening");
    assert!(receiver.current().is_none());
}
