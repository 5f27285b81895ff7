//! Record source abstraction over the Kafka consumer

use crate::config::Config;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use tracing::{debug, info};

/// A record detached from the broker client
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

impl SourceRecord {
    /// Payload bytes; a record without a payload is treated as empty.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// Broker-side failures
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Record source is closed")]
    Closed,
}

/// Capability the consumer uses to read and acknowledge records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Wait up to `timeout` for the next record. `Ok(None)` means the wait
    /// elapsed without a record and is not an error.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceRecord>, SourceError>;

    /// Commit the position just past `record`.
    fn commit(&self, record: &SourceRecord) -> Result<(), SourceError>;

    /// Release broker resources. Calling it again is a no-op.
    fn close(&mut self);
}

/// [`RecordSource`] backed by an rdkafka [`StreamConsumer`]
pub struct KafkaRecordSource {
    consumer: Option<StreamConsumer>,
    topic: String,
}

impl KafkaRecordSource {
    /// Create the consumer and subscribe to the configured topic.
    ///
    /// Offsets are never stored or committed automatically; every commit goes
    /// through [`RecordSource::commit`].
    pub fn new(config: &Config) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = client_config(config).create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        info!(
            "Kafka consumer subscribed: topic='{}', group='{}'",
            config.topic, config.group_id
        );

        Ok(Self {
            consumer: Some(consumer),
            topic: config.topic.clone(),
        })
    }

    fn consumer(&self) -> Result<&StreamConsumer, SourceError> {
        self.consumer.as_ref().ok_or(SourceError::Closed)
    }
}

/// Client settings for the message consumer
pub fn client_config(config: &Config) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("group.id", &config.group_id)
        .set("enable.auto.offset.store", "false")
        .set("enable.auto.commit", "false")
        .set("enable.idempotence", "true")
        .set("message.max.bytes", config.message_max_bytes.to_string())
        .set("enable.partition.eof", "false");
    client_config
}

#[async_trait]
impl RecordSource for KafkaRecordSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceRecord>, SourceError> {
        let consumer = self.consumer()?;

        match tokio::time::timeout(timeout, consumer.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Err(err)) => Err(SourceError::Kafka(err)),
            Ok(Ok(message)) => Ok(Some(SourceRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
        }
    }

    fn commit(&self, record: &SourceRecord) -> Result<(), SourceError> {
        let consumer = self.consumer()?;

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &record.topic,
            record.partition,
            Offset::Offset(record.offset + 1),
        )?;
        consumer.commit(&tpl, CommitMode::Sync)?;

        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Offset committed"
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            drop(consumer);
            info!("Kafka consumer for topic '{}' closed", self.topic);
        }
    }
}
