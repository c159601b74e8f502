//! Deferred deletion of generated artifacts.
//!
//! Each [`RetentionScheduler::schedule`] call spawns one Tokio task that waits
//! for the retention delay and then removes its files. Callers never await
//! these tasks. The scheduler owns them, so an orderly shutdown can either
//! run every pending deletion right away ([`ShutdownMode::Drain`]) or abandon
//! them ([`ShutdownMode::Cancel`]). Dropping the scheduler aborts whatever is
//! still pending.
//!
//! Deletion is idempotent: paths that no longer exist are skipped.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::{Error, Result};

/// How long artifacts are kept when no other delay is configured.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

/// What happens to pending deletions on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Delete everything now instead of waiting out the delay.
    Drain,
    /// Leave pending artifacts on disk.
    Cancel,
}

/// Owner of all outstanding deletion tasks.
#[derive(Debug)]
pub struct RetentionScheduler {
    delay: Duration,
    handle: Handle,
    shutdown: watch::Sender<Option<ShutdownMode>>,
    tasks: Mutex<JoinSet<usize>>,
}

impl RetentionScheduler {
    /// Create a scheduler on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] when called outside a Tokio runtime.
    pub fn new(delay: Duration) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::with_handle(delay, handle))
    }

    /// Create a scheduler that spawns its tasks on `handle`.
    #[must_use]
    pub fn with_handle(delay: Duration, handle: Handle) -> Self {
        let (shutdown, _) = watch::channel(None);
        Self {
            delay,
            handle,
            shutdown,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The retention delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Delete `paths` once the retention delay has elapsed. Returns immediately.
    ///
    /// After [`shutdown`](Self::shutdown) the mode sticks: following a
    /// `Drain` the paths are deleted right away, following a `Cancel` they
    /// are left on disk. Either way a warning is logged.
    pub fn schedule(&self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        if let Some(mode) = *self.shutdown.borrow() {
            tracing::warn!(?mode, files = paths.len(), "cleanup scheduled after shutdown");
        }
        let delay = self.delay;
        let mut shutdown = self.shutdown.subscribe();

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // reap finished tasks so the set does not grow without bound
        while tasks.try_join_next().is_some() {}

        tracing::debug!(files = paths.len(), ?delay, "scheduled artifact cleanup");
        tasks.spawn_on(
            async move {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    mode = wait_for_shutdown(&mut shutdown) => {
                        if mode == ShutdownMode::Cancel {
                            tracing::debug!(files = paths.len(), "artifact cleanup cancelled");
                            return 0;
                        }
                    }
                }
                tokio::task::spawn_blocking(move || purge(&paths))
                    .await
                    .unwrap_or_default()
            },
            &self.handle,
        );
    }

    /// Number of deletion tasks that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Stop the scheduler, resolving every pending deletion according to `mode`.
    ///
    /// Waits until all tasks have finished and returns how many files were deleted
    /// by tasks that finished during shutdown.
    pub async fn shutdown(&self, mode: ShutdownMode) -> usize {
        self.shutdown.send_replace(Some(mode));
        let mut tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let mut deleted = 0;
        while let Some(joined) = tasks.join_next().await {
            deleted += joined.unwrap_or_default();
        }
        tracing::info!(?mode, deleted, "retention scheduler stopped");
        deleted
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<Option<ShutdownMode>>) -> ShutdownMode {
    loop {
        if let Some(mode) = *rx.borrow_and_update() {
            return mode;
        }
        if rx.changed().await.is_err() {
            // scheduler gone without a shutdown signal; only the timer remains
            std::future::pending::<()>().await;
        }
    }
}

/// Delete every path in `paths` that still exists. Returns how many were removed.
///
/// Missing paths are skipped silently; other failures are logged and skipped.
pub fn purge(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "failed to delete artifact: {e}"),
        }
    }
    tracing::debug!(removed, requested = paths.len(), "purged artifacts");
    removed
}
