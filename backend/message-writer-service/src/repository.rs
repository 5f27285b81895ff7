//! Message persistence
//!
//! The consumer only depends on the [`MessageRepository`] trait; the PostgreSQL
//! implementation lives here as well.

use crate::domain::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

const INSERT_MESSAGE: &str = r#"
    INSERT INTO message (id, user_id, content, location, client_id, sent_at, received_at)
    VALUES ($1, $2, $3, ST_GeomFromText($4), $5, $6, $7)
    RETURNING created_at
"#;

/// Result of a single persistence attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Row committed to the store
    Stored { created_at: DateTime<Utc> },
    /// A lookup or referential precondition failed (e.g. unknown sender)
    NotFound(String),
    /// The store connection is unusable
    ConnectionLost(String),
    /// Any other persistence error
    OtherFailure(String),
}

impl PersistOutcome {
    /// Classify a database error.
    ///
    /// Connection-level failures are separated from statement-level ones so the
    /// consumer can keep the offset uncommitted until the store recovers.
    pub fn from_sqlx_error(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PersistOutcome::NotFound(err.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => PersistOutcome::ConnectionLost(err.to_string()),
            sqlx::Error::Database(db_err) => {
                match db_err.code().as_deref() {
                    // foreign_key_violation
                    Some("23503") => PersistOutcome::NotFound(err.to_string()),
                    // connection_exception class
                    Some(code) if code.starts_with("08") => {
                        PersistOutcome::ConnectionLost(err.to_string())
                    }
                    // admin_shutdown, crash_shutdown, cannot_connect_now
                    Some("57P01") | Some("57P02") | Some("57P03") => {
                        PersistOutcome::ConnectionLost(err.to_string())
                    }
                    _ => PersistOutcome::OtherFailure(err.to_string()),
                }
            }
            _ => PersistOutcome::OtherFailure(err.to_string()),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, PersistOutcome::Stored { .. })
    }
}

/// Persistence capability used by the consumer.
///
/// Implementations perform exactly one write per call and never retry.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn add_message(&self, message: &Message) -> PersistOutcome;
}

/// PostgreSQL/PostGIS backed repository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool and wrap it in a repository
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!(
            "Database pool initialized with {} max connections",
            max_connections
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn add_message(&self, message: &Message) -> PersistOutcome {
        let result = sqlx::query_scalar::<_, DateTime<Utc>>(INSERT_MESSAGE)
            .bind(&message.id)
            .bind(&message.sender.id)
            .bind(&message.content)
            .bind(message.location.to_wkt_point())
            .bind(&message.client_id)
            .bind(message.sent_at)
            .bind(message.received_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(created_at) => {
                debug!(message_id = %message.id, created_at = %created_at, "Message row inserted");
                PersistOutcome::Stored { created_at }
            }
            Err(err) => PersistOutcome::from_sqlx_error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_row_not_found_is_lookup_failure() {
        let outcome = PersistOutcome::from_sqlx_error(&sqlx::Error::RowNotFound);
        assert!(matches!(outcome, PersistOutcome::NotFound(_)));
    }

    #[test]
    fn test_io_error_is_connection_lost() {
        let err = sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ));
        let outcome = PersistOutcome::from_sqlx_error(&err);
        assert!(matches!(outcome, PersistOutcome::ConnectionLost(_)));
    }

    #[test]
    fn test_pool_failures_are_connection_lost() {
        for err in [sqlx::Error::PoolClosed, sqlx::Error::PoolTimedOut] {
            let outcome = PersistOutcome::from_sqlx_error(&err);
            assert!(matches!(outcome, PersistOutcome::ConnectionLost(_)));
        }
    }

    #[test]
    fn test_protocol_error_is_other_failure() {
        let err = sqlx::Error::Protocol("unexpected message".to_string());
        let outcome = PersistOutcome::from_sqlx_error(&err);
        assert!(matches!(outcome, PersistOutcome::OtherFailure(_)));
    }

    #[test]
    fn test_is_stored() {
        assert!(PersistOutcome::Stored {
            created_at: Utc::now()
        }
        .is_stored());
        assert!(!PersistOutcome::NotFound("sender s1".to_string()).is_stored());
    }
}
