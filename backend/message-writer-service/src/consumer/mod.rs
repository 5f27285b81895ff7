//! Consumption-and-commit loop
//!
//! Reads one record at a time, decodes it, persists it and only then decides
//! whether the offset may advance:
//!
//! ```text
//! poll ─► decode ──(malformed)──────────────► commit ─► next
//!            │
//!            └─► add_message ─► classify ─┬─ Commit/Skip ─► commit ─► next
//!                                         └─ Halt ─► stop, offset kept
//! ```

pub mod lifecycle;
pub mod policy;
pub mod runner;
pub mod stats;

use crate::kafka::SourceError;

pub use lifecycle::{ConsumerState, LifecycleController};
pub use policy::{classify, CommitPolicy, Disposition, OtherFailurePolicy};
pub use runner::{ConsumerSettings, MessageWriterConsumer, METRICS_SERVICE};
pub use stats::{ConsumerStats, StatsSnapshot};

/// Terminal errors that end the consumer loop
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Consumer poll failed: {0}")]
    Poll(#[source] SourceError),

    #[error("Store connection lost: {0}")]
    ConnectionLost(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Offset commit failed: {0}")]
    Commit(#[source] SourceError),
}
