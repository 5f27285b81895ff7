//! Configuration for the message writer service
//!
//! Values are read once at startup from `MESSAGE_WRITER_*` environment
//! variables and are immutable afterwards.

use crate::consumer::{CommitPolicy, OtherFailurePolicy};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Prefix shared by every configuration variable
pub const ENV_PREFIX: &str = "MESSAGE_WRITER_";

/// Deployment tier the service runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    PreProd,
    Prod,
}

impl Environment {
    /// Parse a tier name. Unknown or absent values fall back to `Dev`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("PRE_PROD") => Environment::PreProd,
            Some("PROD") => Environment::Prod,
            _ => Environment::Dev,
        }
    }

    pub fn is_production_like(&self) -> bool {
        matches!(self, Environment::PreProd | Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Dev => "DEV",
            Environment::PreProd => "PRE_PROD",
            Environment::Prod => "PROD",
        };
        f.write_str(name)
    }
}

/// Configuration errors, all fatal to startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("No {name} configured, set {key} environment variable")]
    Missing {
        name: &'static str,
        key: &'static str,
    },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Raw variables as found in the environment, before validation
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    environment: Option<String>,

    #[serde(default)]
    pg_url: Option<String>,

    #[serde(default)]
    topic: Option<String>,

    #[serde(default)]
    kafka_brokers: Option<String>,

    #[serde(default)]
    group_id: Option<String>,

    #[serde(default = "default_poll_timeout_ms")]
    poll_timeout_ms: u64,

    #[serde(default = "default_message_max_bytes")]
    message_max_bytes: u32,

    #[serde(default = "default_topic_replication")]
    topic_replication: i32,

    #[serde(default = "default_db_max_connections")]
    db_max_connections: u32,

    #[serde(default = "default_db_acquire_timeout_secs")]
    db_acquire_timeout_secs: u64,

    #[serde(default)]
    other_failure_policy: Option<String>,

    #[serde(default)]
    commit_policy: Option<String>,
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_message_max_bytes() -> u32 {
    1024
}

fn default_topic_replication() -> i32 {
    1
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_acquire_timeout_secs() -> u64 {
    5
}

/// Validated service configuration
#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub pg_url: String,
    pub topic: String,
    pub kafka_brokers: Vec<String>,
    pub group_id: String,
    pub poll_timeout: Duration,
    pub message_max_bytes: u32,
    pub topic_replication: i32,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub other_failure_policy: OtherFailurePolicy,
    pub commit_policy: CommitPolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("pg_url", &"[REDACTED]")
            .field("topic", &self.topic)
            .field("kafka_brokers", &self.kafka_brokers)
            .field("group_id", &self.group_id)
            .field("poll_timeout", &self.poll_timeout)
            .field("message_max_bytes", &self.message_max_bytes)
            .field("topic_replication", &self.topic_replication)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("other_failure_policy", &self.other_failure_policy)
            .field("commit_policy", &self.commit_policy)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        Self::validate(raw)
    }

    /// Broker list in the comma-separated form librdkafka expects
    pub fn bootstrap_servers(&self) -> String {
        self.kafka_brokers.join(",")
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let environment = Environment::parse(raw.environment.as_deref());

        let pg_url = required(raw.pg_url, "PostgreSQL url", "MESSAGE_WRITER_PG_URL")?;
        let topic = required(raw.topic, "topic", "MESSAGE_WRITER_TOPIC")?;

        let kafka_brokers: Vec<String> = raw
            .kafka_brokers
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|broker| !broker.is_empty())
            .map(str::to_string)
            .collect();
        if kafka_brokers.is_empty() {
            return Err(ConfigError::Missing {
                name: "Kafka brokers",
                key: "MESSAGE_WRITER_KAFKA_BROKERS",
            });
        }

        let group_id = required(raw.group_id, "group id", "MESSAGE_WRITER_GROUP_ID")?;

        if raw.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "MESSAGE_WRITER_POLL_TIMEOUT_MS",
                reason: "must be greater than zero".to_string(),
            });
        }

        if raw.topic_replication < 1 {
            return Err(ConfigError::Invalid {
                key: "MESSAGE_WRITER_TOPIC_REPLICATION",
                reason: format!("must be at least 1, got {}", raw.topic_replication),
            });
        }

        if raw.db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "MESSAGE_WRITER_DB_MAX_CONNECTIONS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let other_failure_policy = match raw.other_failure_policy.as_deref() {
            None => OtherFailurePolicy::default(),
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                key: "MESSAGE_WRITER_OTHER_FAILURE_POLICY",
                reason,
            })?,
        };

        let commit_policy = match raw.commit_policy.as_deref() {
            None => CommitPolicy::default(),
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                key: "MESSAGE_WRITER_COMMIT_POLICY",
                reason,
            })?,
        };

        Ok(Self {
            environment,
            pg_url,
            topic,
            kafka_brokers,
            group_id,
            poll_timeout: Duration::from_millis(raw.poll_timeout_ms),
            message_max_bytes: raw.message_max_bytes,
            topic_replication: raw.topic_replication,
            db_max_connections: raw.db_max_connections,
            db_acquire_timeout: Duration::from_secs(raw.db_acquire_timeout_secs),
            other_failure_policy,
            commit_policy,
        })
    }
}

fn required(
    value: Option<String>,
    name: &'static str,
    key: &'static str,
) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing { name, key }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> Vec<(String, String)> {
        vars(&[
            ("MESSAGE_WRITER_PG_URL", "postgres://writer@localhost/messages"),
            ("MESSAGE_WRITER_TOPIC", "messages"),
            ("MESSAGE_WRITER_KAFKA_BROKERS", "kafka-1:9092, kafka-2:9092"),
            ("MESSAGE_WRITER_GROUP_ID", "message-writer"),
        ])
    }

    fn without(key: &str) -> Vec<(String, String)> {
        base().into_iter().filter(|(k, _)| k != key).collect()
    }

    fn with(key: &str, value: &str) -> Vec<(String, String)> {
        let mut vars = without(key);
        vars.push((key.to_string(), value.to_string()));
        vars
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_vars(base()).unwrap();

        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.topic, "messages");
        assert_eq!(config.kafka_brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(config.bootstrap_servers(), "kafka-1:9092,kafka-2:9092");
        assert_eq!(config.group_id, "message-writer");
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.message_max_bytes, 1024);
        assert_eq!(config.topic_replication, 1);
        assert_eq!(config.other_failure_policy, OtherFailurePolicy::Skip);
        assert_eq!(config.commit_policy, CommitPolicy::BestEffort);
    }

    #[test]
    fn test_environment_tiers() {
        let config = Config::from_vars(with("MESSAGE_WRITER_ENVIRONMENT", "PROD")).unwrap();
        assert_eq!(config.environment, Environment::Prod);

        let config = Config::from_vars(with("MESSAGE_WRITER_ENVIRONMENT", "PRE_PROD")).unwrap();
        assert_eq!(config.environment, Environment::PreProd);

        let config = Config::from_vars(with("MESSAGE_WRITER_ENVIRONMENT", "staging")).unwrap();
        assert_eq!(config.environment, Environment::Dev);
    }

    #[test]
    fn test_blank_pg_url_is_rejected() {
        let err = Config::from_vars(with("MESSAGE_WRITER_PG_URL", "   ")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "MESSAGE_WRITER_PG_URL",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_topic_is_rejected() {
        let err = Config::from_vars(without("MESSAGE_WRITER_TOPIC")).unwrap_err();
        assert!(err.to_string().contains("MESSAGE_WRITER_TOPIC"));
    }

    #[test]
    fn test_empty_broker_list_is_rejected() {
        let err = Config::from_vars(with("MESSAGE_WRITER_KAFKA_BROKERS", " , ,")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "MESSAGE_WRITER_KAFKA_BROKERS",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_group_id_is_rejected() {
        let err = Config::from_vars(without("MESSAGE_WRITER_GROUP_ID")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "MESSAGE_WRITER_GROUP_ID",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_poll_timeout_is_rejected() {
        let err = Config::from_vars(with("MESSAGE_WRITER_POLL_TIMEOUT_MS", "0")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let err = Config::from_vars(with("MESSAGE_WRITER_POLL_TIMEOUT_MS", "soon")).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn test_policies_are_parsed() {
        let mut vars = base();
        vars.push((
            "MESSAGE_WRITER_OTHER_FAILURE_POLICY".to_string(),
            "halt".to_string(),
        ));
        vars.push((
            "MESSAGE_WRITER_COMMIT_POLICY".to_string(),
            "strict".to_string(),
        ));

        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.other_failure_policy, OtherFailurePolicy::Halt);
        assert_eq!(config.commit_policy, CommitPolicy::Strict);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let err =
            Config::from_vars(with("MESSAGE_WRITER_OTHER_FAILURE_POLICY", "retry")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MESSAGE_WRITER_OTHER_FAILURE_POLICY",
                ..
            }
        ));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = Config::from_vars(base()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("postgres://"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
