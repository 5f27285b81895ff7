//! Message Writer Service - Main entry point
//!
//! Provisions the message topic, connects to PostgreSQL, then runs the
//! consumer loop on a background task until it stops on its own or the
//! process receives SIGINT/SIGTERM.

use anyhow::{anyhow, Context, Result};
use message_writer_service::{build_consumer, Config, Environment, MessageWriterError};
use std::fmt;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::parse(
        std::env::var("MESSAGE_WRITER_ENVIRONMENT")
            .ok()
            .as_deref(),
    );
    init_tracing(environment);

    info!("Starting Message Writer Service ({})", environment);

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        MessageWriterError::from(e)
    })?;
    info!(
        "Configuration loaded: topic={}, group={}, brokers={}",
        config.topic,
        config.group_id,
        config.bootstrap_servers()
    );

    let consumer = build_consumer(&config)
        .await
        .context("Failed to start message writer consumer")?;
    let lifecycle = consumer.lifecycle();

    let mut consumer_handle = tokio::spawn(consumer.start());

    // Both exit paths go through the same stop; the loop itself closes the
    // Kafka consumer once it observes the stop.
    let joined = tokio::select! {
        joined = &mut consumer_handle => {
            lifecycle.stop().await?;
            joined
        }
        received = shutdown_signal() => {
            info!(signal = %received, "Stopping consumer");
            lifecycle.stop().await?;
            consumer_handle.await
        }
    };

    match joined {
        Ok(Ok(())) => {
            info!("Message Writer Service shutdown complete");
            Ok(())
        }
        Ok(Err(err)) => Err(MessageWriterError::from(err)).context("Consumer stopped with error"),
        Err(join_err) => Err(anyhow!("Consumer task failed: {}", join_err)),
    }
}

fn init_tracing(environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "message_writer_service=info,rdkafka=warn,info".into());

    if environment.is_production_like() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Resolve with the first shutdown signal received. A handler that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() -> ShutdownSignal {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => ShutdownSignal::Interrupt,
        _ = terminate => ShutdownSignal::Terminate,
    }
}
