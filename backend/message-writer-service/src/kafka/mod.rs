//! Kafka integration for the message writer
//!
//! - Source: subscribed consumer with manual, per-record offset commits
//! - Admin: startup provisioning of the message topic

pub mod admin;
pub mod source;

pub use admin::{ensure_topic, ProvisioningError, TopicStatus, TOPIC_PARTITIONS};
pub use source::{KafkaRecordSource, RecordSource, SourceError, SourceRecord};
