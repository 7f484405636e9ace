// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fixed_instance_count_resolves_to_itself() {
    assert_eq!(InstanceCount::Fixed(4).resolve(16), 4);
}

#[test]
fn max_instance_count_resolves_to_cpu_count() {
    assert_eq!(InstanceCount::Max.resolve(8), 8);
}

#[test]
fn instance_count_never_resolves_to_zero() {
    assert_eq!(InstanceCount::Fixed(0).resolve(8), 1);
    assert_eq!(InstanceCount::Max.resolve(0), 1);
}

#[test]
fn wants_proxy_requires_multi_instance_port_and_proxy_strategy() {
    let cfg = AppConfig::builder()
        .port(8080_u16)
        .cluster_strategy(Some(ClusterStrategy::Proxy))
        .build();
    assert!(cfg.wants_proxy(2));
    assert!(!cfg.wants_proxy(1), "single instance must not get a proxy");
}

#[test]
fn wants_proxy_false_without_port() {
    let cfg = AppConfig::builder().cluster_strategy(Some(ClusterStrategy::Proxy)).build();
    assert!(!cfg.wants_proxy(4));
}

#[test]
fn wants_proxy_false_under_port_reuse_strategy() {
    let cfg = AppConfig::builder()
        .port(8080_u16)
        .cluster_strategy(Some(ClusterStrategy::PortReuse))
        .build();
    assert!(!cfg.wants_proxy(4));
}

#[test]
fn instance_count_untagged_serde() {
    let fixed: InstanceCount = serde_json::from_str("3").expect("parse fixed");
    assert_eq!(fixed, InstanceCount::Fixed(3));
    let max: InstanceCount = serde_json::from_str("\"max\"").expect("parse max");
    assert_eq!(max, InstanceCount::Max);
}

#[test]
fn app_config_toml_roundtrip() {
    let cfg = AppConfig::builder().name("web").interpreter("node").script("server.js").build();
    let json = serde_json::to_string(&cfg).expect("serialize");
    let parsed: AppConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(cfg, parsed);
}
