//! 运行环境信息

use std::process::Command;

use crate::error::{ResolverError, Result};

/// 主机名环境变量
pub const HOST_NAME_ENV: &str = "HOST_NAME";

/// 静态 TLS 配置：CA 证书文件路径
pub const STATIC_CA_FILE_ENV: &str = "TLS_OPTION_CA_FILE";

/// 静态 TLS 配置：校验服务端证书使用的名称
pub const STATIC_SERVER_NAME_ENV: &str = "TLS_OPTION_SERVER_NAME";

/// 获取主机名
///
/// 优先读取 `HOST_NAME`；未设置时执行 `hostname` 命令
/// （容器以 `--net=host` 启动时得到宿主机名）。
pub fn host_name() -> Result<String> {
    if let Ok(name) = std::env::var(HOST_NAME_ENV) {
        let name = name.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
    }
    tracing::info!("{HOST_NAME_ENV} is not set, falling back to the hostname command");

    let output = Command::new("hostname").output()?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        return Err(ResolverError::config("no hostname returned by the hostname command"));
    }
    Ok(name)
}

/// 读取静态 TLS 配置，返回 `(CA 文件路径, 服务端名称)`
///
/// 两个变量缺一不可，缺失或为空时返回配置错误。
pub fn static_client_certs() -> Result<(String, String)> {
    let read = |key: &str| {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    match (read(STATIC_CA_FILE_ENV), read(STATIC_SERVER_NAME_ENV)) {
        (Some(ca_file), Some(server_name)) => Ok((ca_file, server_name)),
        _ => Err(ResolverError::config(format!(
            "unable to load tls configuration, {STATIC_CA_FILE_ENV} or {STATIC_SERVER_NAME_ENV} must be defined"
        ))),
    }
}
