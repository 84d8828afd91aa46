//! Graceful shutdown: one `CancellationToken`, one task list.
//!
//! The coordinator hands out the token that sessions, the serve loop, and
//! the lock sweeper select on, and tracks their task handles so shutdown
//! can drain them with a deadline.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long `shutdown_and_drain` waits before abandoning stragglers.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Single point of truth for whether the server is going down.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with nothing registered and the token live.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Clone of the cancellation token for a task to select on.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Track a task that must finish before the process exits.
    pub fn register(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Number of tracked tasks that have not been drained yet.
    #[must_use]
    pub fn tracked_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Initiate shutdown without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait for every registered task.
    ///
    /// Tasks still running at the deadline (default 30s) are abandoned with
    /// a warning; the caller is about to exit the process anyway.
    pub async fn shutdown_and_drain(&self, timeout: Option<Duration>) {
        let deadline = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();

        let handles = std::mem::take(&mut *self.tasks.lock());
        info!(tasks = handles.len(), timeout_secs = deadline.as_secs(), "draining server tasks");

        match tokio::time::timeout(deadline, futures::future::join_all(handles)).await {
            Ok(_) => info!("all tasks drained"),
            Err(_) => {
                warn!(timeout_secs = deadline.as_secs(), "tasks still running at deadline");
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
