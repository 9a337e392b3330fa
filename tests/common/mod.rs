//! 测试公共工具

#![allow(dead_code)]

use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};
use flare_grpc_resolver::discovery::{
    BackendPhase, BackendRecord, ContainerSpec, PORT_NAME,
};

/// 固定的创建时间：2024-01-01 00:00:00 + offset 秒
pub fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
}

/// 自定义投影器使用的端口名
pub const PORT: &str = "svc";

/// 创建一个满足资格条件的记录
pub fn running(id: &str, version: u64, ip: &str, port: u16, created: i64) -> BackendRecord {
    running_on(id, version, ip, PORT_NAME, port, created)
}

/// 创建一个在指定命名端口上提供服务的 Running 记录
pub fn running_on(
    id: &str,
    version: u64,
    ip: &str,
    port_name: &str,
    port: u16,
    created: i64,
) -> BackendRecord {
    BackendRecord::new(id, version, at(created))
        .with_phase(BackendPhase::Running)
        .with_address(ip.parse::<IpAddr>().unwrap())
        .with_container(ContainerSpec::new("app").with_port(port_name, port))
}

/// 创建一个 Pending 阶段的记录
pub fn pending(id: &str, version: u64, created: i64) -> BackendRecord {
    BackendRecord::new(id, version, at(created))
        .with_container(ContainerSpec::new("app").with_port(PORT_NAME, 8080))
}
