//! 标签选择器构建
//!
//! 把 `标签键 -> 期望值` 映射转换为只包含等值条件的选择器表达式，
//! 用来限定 watch 请求的范围。

use std::collections::HashMap;
use std::fmt;

use crate::error::{ResolverError, Result};

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// 等值标签选择器，形如 `app=api,tier=backend`
///
/// 条件按键排序，相同输入总是得到相同的表达式。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<(String, String)>,
}

impl LabelSelector {
    /// 从标签映射构建选择器
    ///
    /// 任何键或值不符合 Kubernetes 标签语法都会返回配置错误。
    pub fn from_labels(labels: &HashMap<String, String>) -> Result<Self> {
        let mut requirements = Vec::with_capacity(labels.len());
        for (key, value) in labels {
            validate_key(key).map_err(|reason| invalid(key, value, reason))?;
            validate_value(value).map_err(|reason| invalid(key, value, reason))?;
            requirements.push((key.clone(), value.clone()));
        }
        requirements.sort();
        Ok(Self { requirements })
    }

    /// 空选择器匹配所有实例
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[(String, String)] {
        &self.requirements
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: String) -> ResolverError {
    ResolverError::InvalidSelector {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

/// 键：可选的 DNS 子域名前缀 + `/` + 名称
fn validate_key(key: &str) -> std::result::Result<(), String> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            validate_prefix(prefix)?;
            name
        }
        None => key,
    };
    validate_name(name).map_err(|reason| format!("key name {reason}"))
}

fn validate_value(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name(value).map_err(|reason| format!("value {reason}"))
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("must be no more than {MAX_NAME_LEN} characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("may only contain alphanumerics, '-', '_' or '.'".to_string());
    }
    if !starts_and_ends_alphanumeric(name) {
        return Err("must start and end with an alphanumeric character".to_string());
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> std::result::Result<(), String> {
    if prefix.is_empty() {
        return Err("key prefix must not be empty".to_string());
    }
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(format!(
            "key prefix must be no more than {MAX_PREFIX_LEN} characters"
        ));
    }
    for label in prefix.split('.') {
        let valid = !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && starts_and_ends_alphanumeric(label);
        if !valid {
            return Err(format!("key prefix {prefix:?} is not a valid DNS subdomain"));
        }
    }
    Ok(())
}

fn starts_and_ends_alphanumeric(s: &str) -> bool {
    let first = s.chars().next();
    let last = s.chars().next_back();
    matches!((first, last), (Some(a), Some(b)) if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric())
}
