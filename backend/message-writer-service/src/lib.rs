//! Message Writer Service - persists chat messages from Kafka into PostgreSQL
//!
//! This service provides:
//! - A single-partition Kafka consumer with manual, per-record offset commits
//! - JSON envelope decoding
//! - PostGIS-backed message persistence with classified failure outcomes
//! - Cooperative start/stop shared with the process shutdown handler

pub mod config;
pub mod consumer;
pub mod decoder;
pub mod domain;
pub mod kafka;
pub mod repository;

pub use config::{Config, ConfigError, Environment};
pub use consumer::{
    classify, CommitPolicy, ConsumerError, ConsumerSettings, ConsumerState, ConsumerStats,
    Disposition, LifecycleController, MessageWriterConsumer, OtherFailurePolicy, StatsSnapshot,
    METRICS_SERVICE,
};
pub use decoder::{decode, DecodeError};
pub use domain::{Envelope, Location, Message, MessagePayload, Sender};
pub use kafka::{
    ensure_topic, KafkaRecordSource, ProvisioningError, RecordSource, SourceError, SourceRecord,
    TopicStatus,
};
pub use repository::{MessageRepository, PersistOutcome, PgMessageRepository};

/// Message writer error types
#[derive(Debug, thiserror::Error)]
pub enum MessageWriterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Topic provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),
}

/// Provision the topic, connect the pool and subscribe the consumer.
///
/// Every step is fatal to startup; the returned consumer is `Running` and
/// ready for [`MessageWriterConsumer::start`].
pub async fn build_consumer(
    config: &Config,
) -> Result<MessageWriterConsumer<KafkaRecordSource, PgMessageRepository>, MessageWriterError> {
    ensure_topic(
        &config.bootstrap_servers(),
        &config.topic,
        config.topic_replication,
    )
    .await?;

    let repository = PgMessageRepository::connect(
        &config.pg_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await?;

    let source = KafkaRecordSource::new(config)?;

    Ok(MessageWriterConsumer::new(
        source,
        repository,
        ConsumerSettings::from_config(config),
    ))
}
