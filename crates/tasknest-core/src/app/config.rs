//! Store configuration.
//!
//! Every field has a default, so an empty TOML table (or none at all) is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage namespace of the persisted document.
pub const DEFAULT_NAMESPACE: &str = "p2p-tasks-db";

/// Prefix that turns a user-chosen room name into a mesh room id.
pub const DEFAULT_ROOM_PREFIX: &str = "tasknest-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub namespace: String,
    pub persistence: PersistenceConfig,
    pub transport: TransportConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            persistence: PersistenceConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Timeout of a single storage call.
    pub op_timeout_ms: u64,
    /// Appended records after which the log is rewritten as one snapshot.
    pub compact_after_updates: usize,
    pub retry: RetryConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: 10_000,
            compact_after_updates: 500,
            retry: RetryConfig::default(),
        }
    }
}

impl PersistenceConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub attach_timeout_ms: u64,
    pub room_prefix: String,
    /// Pause before a bridge that failed to send pushes the full state again.
    pub resend_interval_ms: u64,
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            attach_timeout_ms: 10_000,
            room_prefix: DEFAULT_ROOM_PREFIX.to_string(),
            resend_interval_ms: 5_000,
            retry: RetryConfig {
                max_attempts: 2,
                ..RetryConfig::default()
            },
        }
    }
}

impl TransportConfig {
    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }

    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let cfg: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, StoreConfig::default());
        assert_eq!(cfg.namespace, "p2p-tasks-db");
        assert_eq!(cfg.transport.room_prefix, "tasknest-");
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg: StoreConfig =
            serde_json::from_str(r#"{"persistence": {"compact_after_updates": 10}}"#).unwrap();
        assert_eq!(cfg.persistence.compact_after_updates, 10);
        assert_eq!(cfg.persistence.op_timeout(), Duration::from_secs(10));
    }
}
