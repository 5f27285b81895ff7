//! The consumer loop

use super::lifecycle::LifecycleController;
use super::policy::{classify, CommitPolicy, Disposition, OtherFailurePolicy};
use super::stats::ConsumerStats;
use super::ConsumerError;
use crate::config::Config;
use crate::decoder::decode;
use crate::domain::Envelope;
use crate::kafka::{RecordSource, SourceRecord};
use crate::repository::{MessageRepository, PersistOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// `service` label on the loop counters
pub const METRICS_SERVICE: &str = "message-writer";

/// Loop tuning
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub poll_timeout: Duration,
    pub other_failure_policy: OtherFailurePolicy,
    pub commit_policy: CommitPolicy,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            other_failure_policy: OtherFailurePolicy::default(),
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl ConsumerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_timeout: config.poll_timeout,
            other_failure_policy: config.other_failure_policy,
            commit_policy: config.commit_policy,
        }
    }
}

/// Consumes envelopes from a [`RecordSource`] and writes their messages
/// through a [`MessageRepository`].
///
/// Records are handled strictly one at a time in delivery order. The source
/// and repository are owned by the consumer; only the lifecycle controller
/// and the stats are shared.
pub struct MessageWriterConsumer<S: RecordSource, R: MessageRepository> {
    source: S,
    repository: R,
    settings: ConsumerSettings,
    lifecycle: Arc<LifecycleController>,
    stats: Arc<ConsumerStats>,
}

impl<S: RecordSource, R: MessageRepository> MessageWriterConsumer<S, R> {
    /// Build a consumer over an already subscribed source. It starts in the
    /// `Running` state.
    pub fn new(source: S, repository: R, settings: ConsumerSettings) -> Self {
        Self {
            source,
            repository,
            settings,
            lifecycle: Arc::new(LifecycleController::new()),
            stats: Arc::new(ConsumerStats::new(METRICS_SERVICE)),
        }
    }

    /// Replace the counters, e.g. with ones bound to a private registry
    pub fn with_stats(mut self, stats: Arc<ConsumerStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Handle used to stop the loop from another task
    pub fn lifecycle(&self) -> Arc<LifecycleController> {
        self.lifecycle.clone()
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    /// Run the loop until it is stopped or hits a fatal error.
    ///
    /// The source is closed exactly once on the way out. Returns `Ok(())` for
    /// an external stop and the terminal error otherwise.
    pub async fn start(mut self) -> Result<(), ConsumerError> {
        info!(
            poll_timeout_ms = self.settings.poll_timeout.as_millis() as u64,
            other_failure_policy = ?self.settings.other_failure_policy,
            commit_policy = ?self.settings.commit_policy,
            "Starting message writer consumer"
        );

        let result = self.run_loop().await;

        self.lifecycle.begin_stopping().await;
        self.source.close();
        self.lifecycle.mark_stopped().await;

        let stats = self.stats.snapshot();
        info!(
            stored = stats.stored,
            skipped = stats.skipped,
            decode_failures = stats.decode_failures,
            commits = stats.commits,
            commit_failures = stats.commit_failures,
            "Message writer consumer stopped"
        );

        if let Err(err) = &result {
            error!(error = %err, "Message writer consumer ended with error");
        }
        result
    }

    async fn run_loop(&mut self) -> Result<(), ConsumerError> {
        while self.lifecycle.is_running().await {
            let record = match self.source.poll(self.settings.poll_timeout).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    error!(error = %err, "Consumer poll failed, stopping");
                    self.lifecycle.begin_stopping().await;
                    return Err(ConsumerError::Poll(err));
                }
            };

            self.process_record(&record).await?;
        }

        Ok(())
    }

    async fn process_record(&self, record: &SourceRecord) -> Result<(), ConsumerError> {
        let envelope = match decode(record.payload_bytes()) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %err,
                    "Unable to decode message, skipping"
                );
                self.stats.record_decode_failure();
                self.stats.record_skipped();
                return self.commit(record).await;
            }
        };

        let outcome = self
            .repository
            .add_message(&envelope.payload.message)
            .await;
        let disposition = classify(&outcome, self.settings.other_failure_policy);
        log_outcome(record, &envelope, &outcome, disposition);

        if !disposition.commits_offset() {
            self.lifecycle.begin_stopping().await;
            return Err(halt_error(outcome));
        }

        if disposition == Disposition::Commit {
            self.stats.record_stored();
        } else {
            self.stats.record_skipped();
        }
        self.commit(record).await
    }

    /// Commit under the configured [`CommitPolicy`].
    async fn commit(&self, record: &SourceRecord) -> Result<(), ConsumerError> {
        match self.source.commit(record) {
            Ok(()) => {
                self.stats.record_commit();
                Ok(())
            }
            Err(err) => {
                self.stats.record_commit_failure();

                if self.settings.commit_policy.escalates_failures() {
                    error!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        error = %err,
                        "Unable to commit offset, stopping"
                    );
                    self.lifecycle.begin_stopping().await;
                    return Err(ConsumerError::Commit(err));
                }

                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %err,
                    "Unable to commit offset"
                );
                Ok(())
            }
        }
    }
}

fn log_outcome(
    record: &SourceRecord,
    envelope: &Envelope,
    outcome: &PersistOutcome,
    disposition: Disposition,
) {
    let message = &envelope.payload.message;

    match outcome {
        PersistOutcome::Stored { .. } => {
            debug!(
                envelope_id = %envelope.id,
                message_id = %message.id,
                offset = record.offset,
                "Message stored"
            );
        }
        PersistOutcome::NotFound(reason) => {
            warn!(
                envelope_id = %envelope.id,
                message_id = %message.id,
                sender_id = %message.sender.id,
                offset = record.offset,
                reason = %reason,
                "Unable to store message, referenced row not found; skipping"
            );
        }
        PersistOutcome::ConnectionLost(reason) => {
            error!(
                envelope_id = %envelope.id,
                message_id = %message.id,
                offset = record.offset,
                reason = %reason,
                "Store connection lost; stopping without committing offset"
            );
        }
        PersistOutcome::OtherFailure(reason) if disposition == Disposition::Halt => {
            error!(
                envelope_id = %envelope.id,
                message_id = %message.id,
                offset = record.offset,
                reason = %reason,
                "Unable to store message; stopping without committing offset"
            );
        }
        PersistOutcome::OtherFailure(reason) => {
            warn!(
                envelope_id = %envelope.id,
                message_id = %message.id,
                offset = record.offset,
                reason = %reason,
                "Unable to store message; skipping"
            );
        }
    }
}

fn halt_error(outcome: PersistOutcome) -> ConsumerError {
    match outcome {
        PersistOutcome::ConnectionLost(reason) => ConsumerError::ConnectionLost(reason),
        PersistOutcome::OtherFailure(reason) => ConsumerError::Persistence(reason),
        other => ConsumerError::Persistence(format!("{:?}", other)),
    }
}
