use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
}

/// Business check parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Payouts strictly above this amount are rejected
    pub amount_limit: Decimal,
    /// Case-insensitive substring of `recipient_name` that fails a payout
    pub recipient_denylist_marker: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            amount_limit: Decimal::from(1_000_000),
            recipient_denylist_marker: "TEST_FAIL".to_string(),
        }
    }
}

/// Processing worker settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerSettings {
    pub max_attempts: u32,
    pub retry_delay_min_ms: u64,
    pub retry_delay_max_ms: u64,
    pub concurrency: usize,
    pub queue_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_min_ms: 1000,
            retry_delay_max_ms: 3000,
            concurrency: 4,
            queue_size: 1024,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config: {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
log_level: info
log_dir: ./logs
log_file: payouts.log
use_json: false
rotation: daily
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert!(config.postgres_url.is_none());
        assert_eq!(config.processing.amount_limit, dec!(1000000));
        assert_eq!(config.processing.recipient_denylist_marker, "TEST_FAIL");
        assert_eq!(config.worker.max_attempts, 3);
        assert_eq!(config.worker.retry_delay_min_ms, 1000);
        assert_eq!(config.worker.retry_delay_max_ms, 3000);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
log_level: debug
log_dir: /var/log/payouts
log_file: payouts.log
use_json: true
rotation: hourly
postgres_url: "postgres://localhost/payouts"
processing:
  amount_limit: "250000.00"
  recipient_denylist_marker: BLOCKED
worker:
  max_attempts: 5
  retry_delay_min_ms: 10
  retry_delay_max_ms: 20
  concurrency: 8
  queue_size: 64
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert!(config.use_json);
        assert_eq!(
            config.postgres_url.as_deref(),
            Some("postgres://localhost/payouts")
        );
        assert_eq!(config.processing.amount_limit, dec!(250000));
        assert_eq!(config.processing.recipient_denylist_marker, "BLOCKED");
        assert_eq!(config.worker.max_attempts, 5);
        assert_eq!(config.worker.concurrency, 8);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        assert!(AppConfig::from_yaml("log_level: info").is_err());
    }
}
