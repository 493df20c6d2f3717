mod broker;
mod dls;
mod logging;
mod nats;
mod store;

pub use broker::*;
pub use dls::*;
pub use logging::*;
pub use nats::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dls: DlsDefaultsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Callers abort
    /// startup only when an `Error`-severity issue is present.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.nats.url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "nats.url".into(),
                message: "url must not be empty".into(),
            });
        } else if !self.nats.url.starts_with("nats://") && !self.nats.url.starts_with("tls://") {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "nats.url".into(),
                message: format!("url must start with nats:// or tls:// (got \"{}\")", self.nats.url),
            });
        }

        if self.store.state_dir.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.state_dir".into(),
                message: "state_dir must not be empty".into(),
            });
        }

        if self.broker.default_replicas == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "broker.default_replicas".into(),
                message: "default_replicas must be at least 1".into(),
            });
        }

        if self.broker.subject_prefix.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "broker.subject_prefix".into(),
                message: "subject_prefix must not be empty".into(),
            });
        }

        if self.broker.queue_group.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "broker.queue_group".into(),
                message: "empty queue group means every broker instance competes individually for messages".into(),
            });
        }

        if self.store.default_idempotency_window_ms < 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.default_idempotency_window_ms".into(),
                message: "idempotency window cannot be negative".into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
    }

    #[test]
    fn default_values_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.store.default_idempotency_window_ms, 120_000);
        assert_eq!(cfg.store.default_retention_value, 604_800);
        assert_eq!(cfg.broker.default_replicas, 1);
    }

    #[test]
    fn empty_nats_url_is_an_error() {
        let mut cfg = Config::default();
        cfg.nats.url = String::new();
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error && i.field == "nats.url"));
    }

    #[test]
    fn bad_nats_scheme_is_an_error() {
        let mut cfg = Config::default();
        cfg.nats.url = "http://127.0.0.1:4222".into();
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "nats.url"));
    }

    #[test]
    fn zero_replicas_is_an_error() {
        let mut cfg = Config::default();
        cfg.broker.default_replicas = 0;
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "broker.default_replicas"));
    }

    #[test]
    fn toml_round_trip() {
        let cfg = Config::default();
        let s = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&s).expect("deserialize");
        assert_eq!(back.nats.url, cfg.nats.url);
    }
}
