//! Configuration for the controller.

use anyhow::Result;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between reconciliation passes, in seconds.
    pub reconcile_interval_secs: u64,

    /// Namespace to watch; empty means all namespaces.
    pub namespace: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let reconcile_interval_secs = std::env::var("ISET_RECONCILE_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let namespace = std::env::var("ISET_NAMESPACE").unwrap_or_default();

        let log_level = std::env::var("ISET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            reconcile_interval_secs,
            namespace,
            log_level,
        })
    }
}
