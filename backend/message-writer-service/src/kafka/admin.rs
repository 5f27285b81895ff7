//! Topic provisioning

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;
use tracing::{error, info};

/// The message topic always has a single partition.
pub const TOPIC_PARTITIONS: i32 = 1;

const ADMIN_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Kafka admin error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Failed to create topic {topic}: {code}")]
    CreateTopic { topic: String, code: RDKafkaErrorCode },

    #[error("Topic {0} missing from admin response")]
    MissingResult(String),
}

/// What happened to the topic during provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
    Created,
    AlreadyExists,
}

/// Map a per-topic admin result; "already exists" counts as success.
pub fn interpret_topic_result(
    result: Result<String, (String, RDKafkaErrorCode)>,
) -> Result<TopicStatus, ProvisioningError> {
    match result {
        Ok(_) => Ok(TopicStatus::Created),
        Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => Ok(TopicStatus::AlreadyExists),
        Err((topic, code)) => Err(ProvisioningError::CreateTopic { topic, code }),
    }
}

/// Ensure `topic` exists with [`TOPIC_PARTITIONS`] partitions
pub async fn ensure_topic(
    bootstrap_servers: &str,
    topic: &str,
    replication: i32,
) -> Result<TopicStatus, ProvisioningError> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", bootstrap_servers)
        .create()?;

    let new_topic = NewTopic::new(topic, TOPIC_PARTITIONS, TopicReplication::Fixed(replication));
    let options = AdminOptions::new().operation_timeout(Some(ADMIN_OPERATION_TIMEOUT));

    let results = admin.create_topics(&[new_topic], &options).await?;
    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| ProvisioningError::MissingResult(topic.to_string()))?;

    match interpret_topic_result(result) {
        Ok(TopicStatus::Created) => {
            info!("Topic {} created", topic);
            Ok(TopicStatus::Created)
        }
        Ok(TopicStatus::AlreadyExists) => {
            info!("Topic {} already exists", topic);
            Ok(TopicStatus::AlreadyExists)
        }
        Err(err) => {
            error!("Failed to provision topic {}: {}", topic, err);
            Err(err)
        }
    }
}
