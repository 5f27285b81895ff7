//! Start/stop state shared between the consumer loop and the shutdown path

use super::ConsumerError;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Consumer loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    Stopping,
    Stopped,
}

/// Owns the loop state behind a single reader/writer lock.
///
/// The loop reads it once per iteration; `stop()` and internal fatal errors
/// write it. Nothing else in the service is shared mutably.
#[derive(Debug)]
pub struct LifecycleController {
    state: RwLock<ConsumerState>,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    /// New controller in the `Running` state
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConsumerState::Running),
        }
    }

    pub async fn state(&self) -> ConsumerState {
        *self.state.read().await
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == ConsumerState::Running
    }

    /// Request a cooperative stop.
    ///
    /// The loop exits at its next check, at most one poll timeout later.
    /// Repeated calls, including after the loop has stopped, succeed.
    pub async fn stop(&self) -> Result<(), ConsumerError> {
        if self.begin_stopping().await {
            info!("Consumer stop requested");
        } else {
            debug!("Consumer already stopping or stopped");
        }
        Ok(())
    }

    /// Move `Running -> Stopping`; returns whether this call made the change.
    pub(crate) async fn begin_stopping(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == ConsumerState::Running {
            *state = ConsumerState::Stopping;
            true
        } else {
            false
        }
    }

    pub(crate) async fn mark_stopped(&self) {
        *self.state.write().await = ConsumerState::Stopped;
    }
}
