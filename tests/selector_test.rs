//! 标签选择器测试

use std::collections::HashMap;

use flare_grpc_resolver::discovery::LabelSelector;
use flare_grpc_resolver::{ErrorCategory, ResolverError};

fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 测试：多个标签按键排序并用逗号连接
#[test]
fn test_selector_joins_sorted_requirements() {
    let selector =
        LabelSelector::from_labels(&labels(&[("tier", "backend"), ("app", "api")])).unwrap();
    assert_eq!(selector.to_string(), "app=api,tier=backend");

    // 相同输入总是得到相同输出
    let again =
        LabelSelector::from_labels(&labels(&[("app", "api"), ("tier", "backend")])).unwrap();
    assert_eq!(selector, again);
}

/// 测试：空映射得到空选择器
#[test]
fn test_empty_selector_matches_everything() {
    let selector = LabelSelector::from_labels(&HashMap::new()).unwrap();
    assert!(selector.is_empty());
    assert_eq!(selector.to_string(), "");
}

/// 测试：带前缀的键和空值是合法的
#[test]
fn test_prefixed_key_and_empty_value() {
    let selector = LabelSelector::from_labels(&labels(&[
        ("app.kubernetes.io/name", "grpc-api"),
        ("canary", ""),
    ]))
    .unwrap();
    assert_eq!(selector.to_string(), "app.kubernetes.io/name=grpc-api,canary=");
}

/// 测试：非法的键或值是配置错误
#[test]
fn test_malformed_labels_are_configuration_errors() {
    let long = "v".repeat(64);
    let cases = [
        ("", "api"),
        ("-app", "api"),
        ("app", "bad value"),
        ("app", "ends-with-dash-"),
        ("Upper.Case/app", "api"),
        ("/app", "api"),
        ("app", long.as_str()),
    ];

    for (key, value) in cases {
        let err = LabelSelector::from_labels(&labels(&[(key, value)]))
            .expect_err(&format!("{key}={value} should be rejected"));
        assert!(matches!(err, ResolverError::InvalidSelector { .. }));
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.is_retryable());
    }
}

/// 测试：63 个字符的名称刚好合法
#[test]
fn test_name_length_limit() {
    let name = "a".repeat(63);
    assert!(LabelSelector::from_labels(&labels(&[(name.as_str(), "x")])).is_ok());
}
