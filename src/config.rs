use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::resolver::DynamicOptions;
use crate::discovery::selector::LabelSelector;
use crate::error::{ResolverError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// 静态地址与 Kubernetes 只能二选一
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub static_address: Vec<String>,
    pub kubernetes: Option<KubernetesConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KubernetesConfig {
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_watch_timeout_secs")]
    pub watch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_watch_timeout_secs() -> u64 {
    290
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.resolver.validate()?;
        Ok(config)
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        match (&self.kubernetes, self.static_address.is_empty()) {
            (Some(_), false) => Err(ResolverError::config(
                "resolver static_address and kubernetes cannot both be specified",
            )),
            (None, true) => Err(ResolverError::config(
                "resolver static_address or kubernetes must be specified",
            )),
            (Some(kubernetes), true) => kubernetes.validate(),
            (None, false) => {
                if self.static_address.iter().any(|addr| addr.trim().is_empty()) {
                    return Err(ResolverError::config("static_address contains an empty entry"));
                }
                Ok(())
            }
        }
    }
}

impl KubernetesConfig {
    pub fn validate(&self) -> Result<()> {
        self.to_options().validate()?;
        LabelSelector::from_labels(&self.labels)?;
        Ok(())
    }

    pub fn to_options(&self) -> DynamicOptions {
        let mut options = DynamicOptions::new(self.namespace.clone())
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_watch_timeout(Duration::from_secs(self.watch_timeout_secs));
        options.labels = self.labels.clone();
        options
    }
}
