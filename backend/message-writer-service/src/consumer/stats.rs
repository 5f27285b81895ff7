//! Loop counters exported as Prometheus metrics

use prometheus::{IntCounter, Opts, Registry};
use tracing::warn;

/// Counters updated by the consumer loop, readable while it runs
#[derive(Clone)]
pub struct ConsumerStats {
    pub stored: IntCounter,
    /// Counts persistence skips and decode failures alike
    pub skipped: IntCounter,
    pub decode_failures: IntCounter,
    pub commits: IntCounter,
    pub commit_failures: IntCounter,
}

/// Point-in-time copy of [`ConsumerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub stored: u64,
    pub skipped: u64,
    pub decode_failures: u64,
    pub commits: u64,
    pub commit_failures: u64,
}

fn counter(name: &str, help: &str, service: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help).const_label("service", service.to_string()))
        .expect("valid metric opts for message writer counter")
}

impl ConsumerStats {
    /// Counters registered in the process-wide default registry
    pub fn new(service: &str) -> Self {
        Self::with_registry(service, prometheus::default_registry())
    }

    pub fn with_registry(service: &str, registry: &Registry) -> Self {
        let stored = counter(
            "message_writer_messages_stored_total",
            "Total number of messages written to the store",
            service,
        );
        let skipped = counter(
            "message_writer_messages_skipped_total",
            "Total number of records committed without storing a message",
            service,
        );
        let decode_failures = counter(
            "message_writer_decode_failures_total",
            "Total number of records whose payload could not be decoded",
            service,
        );
        let commits = counter(
            "message_writer_offset_commits_total",
            "Total number of successful offset commits",
            service,
        );
        let commit_failures = counter(
            "message_writer_offset_commit_failures_total",
            "Total number of failed offset commits",
            service,
        );

        for metric in [
            Box::new(stored.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(skipped.clone()),
            Box::new(decode_failures.clone()),
            Box::new(commits.clone()),
            Box::new(commit_failures.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register message writer metric: {}", e);
            }
        }

        Self {
            stored,
            skipped,
            decode_failures,
            commits,
            commit_failures,
        }
    }

    pub fn record_stored(&self) {
        self.stored.inc();
    }

    pub fn record_skipped(&self) {
        self.skipped.inc();
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.inc();
    }

    pub fn record_commit(&self) {
        self.commits.inc();
    }

    pub fn record_commit_failure(&self) {
        self.commit_failures.inc();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            stored: self.stored.get(),
            skipped: self.skipped.get(),
            decode_failures: self.decode_failures.get(),
            commits: self.commits.get(),
            commit_failures: self.commit_failures.get(),
        }
    }
}
