//! Server lifecycle.
//!
//! ```text
//!  Idle ──run──▶ Running ──stop──▶ ShuttingDown ──drained or deadline──▶ Stopped
//! ```
//!
//! [`StopHandle`] is the only way to leave `Running`. It can be cloned into
//! any task, called any number of times and called before `run`, in which
//! case `run` passes straight through shutdown.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::shutdown::ShutdownSignal;

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Bound, not yet serving.
    Idle,
    /// Both listeners are serving.
    Running,
    /// Draining in-flight work.
    ShuttingDown,
    /// Both listeners are closed. Terminal.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Requests shutdown and observes progress.
#[derive(Clone)]
pub struct StopHandle {
    graceful: ShutdownSignal,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl StopHandle {
    pub(crate) fn new(graceful: ShutdownSignal) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            graceful,
            state: Arc::new(state),
        }
    }

    /// Starts graceful shutdown. Later calls do nothing.
    pub fn stop(&self) {
        if !self.graceful.is_shutdown() {
            tracing::info!("stop requested");
        }
        self.graceful.trigger();
        self.transition(LifecycleState::Running, LifecycleState::ShuttingDown);
    }

    /// Whether `stop` has been called.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.graceful.is_shutdown()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Completes once the server reaches `state` or a later one.
    pub async fn wait_for(&self, state: LifecycleState) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|current| rank(*current) >= rank(state)).await;
    }

    pub(crate) fn graceful(&self) -> &ShutdownSignal {
        &self.graceful
    }

    /// Moves `from → to`; returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn set(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("state", &self.state())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

fn rank(state: LifecycleState) -> u8 {
    match state {
        LifecycleState::Idle => 0,
        LifecycleState::Running => 1,
        LifecycleState::ShuttingDown => 2,
        LifecycleState::Stopped => 3,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_starts_idle() {
        let handle = StopHandle::new(ShutdownSignal::new());
        assert_eq!(handle.state(), LifecycleState::Idle);
        assert!(!handle.is_stopping());
    }

    #[test]
    fn test_stop_before_run_keeps_idle() {
        let handle = StopHandle::new(ShutdownSignal::new());
        handle.stop();
        handle.stop();
        assert!(handle.is_stopping());
        assert_eq!(handle.state(), LifecycleState::Idle);
    }

    #[test]
    fn test_stop_while_running() {
        let handle = StopHandle::new(ShutdownSignal::new());
        assert!(handle.transition(LifecycleState::Idle, LifecycleState::Running));
        handle.stop();
        assert_eq!(handle.state(), LifecycleState::ShuttingDown);
        assert!(!handle.transition(LifecycleState::Running, LifecycleState::ShuttingDown));
    }

    #[tokio::test]
    async fn test_wait_for_later_state() {
        let handle = StopHandle::new(ShutdownSignal::new());
        let setter = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            setter.set(LifecycleState::Stopped);
        });

        tokio::time::timeout(Duration::from_secs(1), handle.wait_for(LifecycleState::ShuttingDown))
            .await
            .expect("Stopped satisfies ShuttingDown");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(LifecycleState::ShuttingDown.to_string(), "shutting_down");
        assert_eq!(
            serde_json::to_string(&LifecycleState::Running).unwrap(),
            "\"running\""
        );
    }
}
