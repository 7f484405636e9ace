// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App declaration: the immutable, user-declared attributes of a supervised
//! program (§3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Signal to use for a graceful stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownSignal {
    Graceful,
    Interrupt,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        ShutdownSignal::Graceful
    }
}

/// How many workers to run. The literal `"max"` resolves to the host's
/// logical CPU count at start time (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceCount {
    Fixed(u32),
    Max,
}

impl InstanceCount {
    /// Resolve to a concrete, positive instance count.
    pub fn resolve(&self, logical_cpus: u32) -> u32 {
        match self {
            InstanceCount::Fixed(n) => (*n).max(1),
            InstanceCount::Max => logical_cpus.max(1),
        }
    }
}

impl Serialize for InstanceCount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            InstanceCount::Fixed(n) => serializer.serialize_u32(*n),
            InstanceCount::Max => serializer.serialize_str("max"),
        }
    }
}

impl<'de> Deserialize<'de> for InstanceCount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(InstanceCount::Fixed(n)),
            Raw::Text(s) if s == "max" => Ok(InstanceCount::Max),
            Raw::Text(s) => {
                Err(serde::de::Error::custom(format!("invalid instance count: {:?}", s)))
            }
        }
    }
}

/// Timeouts governing one worker's lifecycle (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    pub ready_ms: u64,
    pub kill_ms: u64,
    pub min_uptime_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { ready_ms: 10_000, kill_ms: 10_000, min_uptime_ms: 5_000 }
    }
}

/// Exponential backoff curve and crash window budget (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
    pub window_ms: u64,
    pub max_restarts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { initial_ms: 1_000, multiplier: 2.0, max_ms: 30_000, window_ms: 60_000, max_restarts: 5 }
    }
}

/// HTTP health probe configuration (§4.4). `None` disables probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub path: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self { path: "/health".to_string(), interval_ms: 10_000, timeout_ms: 3_000, unhealthy_threshold: 3 }
    }
}

/// Heartbeat staleness monitor configuration (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    pub miss_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000, miss_threshold: 3 }
    }
}

/// How a public port is shared across workers when clustering is enabled (GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStrategy {
    /// All workers bind the same public port via `SO_REUSEPORT`; the kernel distributes.
    PortReuse,
    /// The supervisor owns a TCP proxy on the public port, round-robining to workers.
    Proxy,
}

/// Rolling-restart batching policy (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReloadConfig {
    pub batch_size: u32,
    pub batch_delay_ms: u64,
    pub ready_timeout_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self { batch_size: 1, batch_delay_ms: 0, ready_timeout_ms: 10_000 }
    }
}

/// Immutable declarative attributes of one supervised app (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    /// Interpreter executable (e.g. `node`, `python3`).
    pub interpreter: String,
    /// Script path passed to the interpreter.
    pub script: String,
    pub cwd: std::path::PathBuf,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_instances")]
    pub instances: InstanceCount,
    pub port: Option<u16>,
    #[serde(default)]
    pub shutdown_signal: ShutdownSignal,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub cluster_strategy: Option<ClusterStrategy>,
    #[serde(default)]
    pub reload: ReloadConfig,
}

fn default_instances() -> InstanceCount {
    InstanceCount::Fixed(1)
}

impl AppConfig {
    /// Whether this app should be fronted by the supervisor-owned [`ClusterStrategy::Proxy`]
    /// (§4.7 `startApp`: "clustering is enabled, instances > 1, a port is set, and the
    /// resolved strategy is `proxy`").
    pub fn wants_proxy(&self, resolved_instances: u32) -> bool {
        resolved_instances > 1
            && self.port.is_some()
            && matches!(self.cluster_strategy, Some(ClusterStrategy::Proxy))
    }
}

crate::builder! {
    pub struct AppConfigBuilder => AppConfig {
        into {
            name: String = "app",
            interpreter: String = "node",
            script: String = "index.js",
        }
        set {
            cwd: std::path::PathBuf = std::path::PathBuf::from("."),
            env: HashMap<String, String> = HashMap::new(),
            instances: InstanceCount = InstanceCount::Fixed(1),
            shutdown_signal: ShutdownSignal = ShutdownSignal::Graceful,
            timeouts: Timeouts = Timeouts::default(),
            backoff: BackoffConfig = BackoffConfig::default(),
            health_check: Option<HealthCheckConfig> = None,
            heartbeat: HeartbeatConfig = HeartbeatConfig::default(),
            cluster_strategy: Option<ClusterStrategy> = None,
            reload: ReloadConfig = ReloadConfig::default(),
        }
        option {
            port: u16 = None,
        }
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
