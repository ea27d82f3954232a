//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_ERROR_BACKOFF_MAX_SECS,
    DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, DEFAULT_REQUEUE_AFTER_CHANGE_SECS,
    DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
    DEFAULT_STORE_CALL_TIMEOUT_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables,
/// typically populated from a ConfigMap with `envFrom` in the operator Deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Port serving `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Deadline applied to every call against the Kubernetes API (seconds)
    pub store_call_timeout_secs: u64,
    /// Requeue interval while a kind waits for a dependency (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Delay before the follow-up pass after a pass created objects (seconds)
    pub requeue_after_change_secs: u64,
    /// Upper bound of the per-instance Fibonacci error backoff (seconds)
    pub error_backoff_max_secs: u64,
    /// Watch stream backoff starting value (milliseconds)
    pub backoff_start_ms: u64,
    /// Watch stream backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Delay before restarting the watch stream after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Add the deprecated ConsoleLink finalizer alongside the current one
    pub finalizer_migration_window: bool,
    /// Global log filter when `RUST_LOG` is unset (error, warn, info, debug, trace)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Instances reconciled concurrently
    pub max_concurrent_reconciliations: u16,
    /// Maximum time to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            store_call_timeout_secs: DEFAULT_STORE_CALL_TIMEOUT_SECS,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            requeue_after_change_secs: DEFAULT_REQUEUE_AFTER_CHANGE_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            finalizer_migration_window: true,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            metrics_port: parsed(&lookup, "METRICS_PORT", defaults.metrics_port),
            store_call_timeout_secs: parsed(
                &lookup,
                "STORE_CALL_TIMEOUT_SECS",
                defaults.store_call_timeout_secs,
            ),
            reconciliation_error_requeue_secs: parsed(
                &lookup,
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                defaults.reconciliation_error_requeue_secs,
            ),
            requeue_after_change_secs: parsed(
                &lookup,
                "REQUEUE_AFTER_CHANGE_SECS",
                defaults.requeue_after_change_secs,
            ),
            error_backoff_max_secs: parsed(
                &lookup,
                "ERROR_BACKOFF_MAX_SECS",
                defaults.error_backoff_max_secs,
            ),
            backoff_start_ms: parsed(&lookup, "BACKOFF_START_MS", defaults.backoff_start_ms),
            backoff_max_ms: parsed(&lookup, "BACKOFF_MAX_MS", defaults.backoff_max_ms),
            watch_restart_delay_secs: parsed(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            finalizer_migration_window: flag(
                &lookup,
                "FINALIZER_MIGRATION_WINDOW",
                defaults.finalizer_migration_window,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT").unwrap_or(defaults.log_format),
            max_concurrent_reconciliations: parsed(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            server_startup_timeout_secs: parsed(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                defaults.server_startup_timeout_secs,
            ),
            server_poll_interval_ms: parsed(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                defaults.server_poll_interval_ms,
            ),
        }
    }

    #[must_use]
    pub fn store_call_timeout(&self) -> Duration {
        Duration::from_secs(self.store_call_timeout_secs)
    }

    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Whether logs are emitted as JSON lines
    #[must_use]
    pub fn json_logs(&self) -> bool {
        !self.log_format.eq_ignore_ascii_case("text")
    }
}

/// Parse a value or fall back to the default
fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a boolean switch (true/1/yes/on, case-insensitive)
fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| {
            let v = v.trim().to_lowercase();
            v == "true" || v == "1" || v == "yes" || v == "on"
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ControllerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(from_pairs(&[]), ControllerConfig::default());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = from_pairs(&[
            ("METRICS_PORT", "9090"),
            ("REQUEUE_AFTER_CHANGE_SECS", " 2 "),
            ("FINALIZER_MIGRATION_WINDOW", "off"),
            ("LOG_FORMAT", "text"),
        ]);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.requeue_after_change_secs, 2);
        assert!(!config.finalizer_migration_window);
        assert!(!config.json_logs());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = from_pairs(&[("METRICS_PORT", "eighty"), ("STORE_CALL_TIMEOUT_SECS", "-1")]);
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(
            config.store_call_timeout(),
            Duration::from_secs(DEFAULT_STORE_CALL_TIMEOUT_SECS)
        );
    }
}
