//! 日志初始化

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// 安装全局 tracing subscriber
///
/// 设置了 `RUST_LOG` 时以环境变量为准，否则使用配置中的级别。
/// 重复调用返回错误。
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level {:?}", config.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
