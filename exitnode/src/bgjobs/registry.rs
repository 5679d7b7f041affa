use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Registry of all background tasks spawned by rules.
///
/// The only authorized way to create concurrent work inside the engine, so
/// that shutdown cannot leak writes: every task started through `go` is
/// joined by `wait_all` before the process exits. Errors and panics inside
/// a task are not surfaced here; a task is expected to log and discard its
/// own failures.
pub struct Registry {
    tasks: Mutex<JoinSet<()>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Spawn a new tracked background task.
    pub async fn go<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.lock().await.spawn(fut);
    }

    /// Block until every spawned task finishes, or `cancel` fires.
    ///
    /// On cancellation the registry stops waiting but does not force-kill
    /// the tasks; they are expected to observe cancellation themselves.
    pub async fn wait_all(&self, cancel: CancellationToken) {
        info!("waiting for all background jobs to finish");
        let mut tasks = self.tasks.lock().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopped waiting for background jobs: shutdown cancelled");
                    return;
                }
                next = tasks.join_next() => {
                    match next {
                        Some(_) => continue,
                        None => return,
                    }
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
