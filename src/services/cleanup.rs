use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::services::pending_results::PendingResults;
use crate::services::result_store::is_expired;

/// Removes a file, treating "already gone" as success. Returns whether a file
/// was actually deleted.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub errors: usize,
    pub pending_expired: usize,
}

/// Retention-based sweeper for the scratch directories.
pub struct Cleanup {
    dirs: Vec<PathBuf>,
    retention: Duration,
    pending: Option<PendingResults>,
}

impl Cleanup {
    pub fn new(dirs: Vec<PathBuf>, retention: Duration) -> Self {
        Self {
            dirs,
            retention,
            pending: None,
        }
    }

    pub fn with_pending_results(mut self, pending: PendingResults) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Deletes regular files older than the retention window. Missing
    /// directories and files that vanish mid-sweep are not errors.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for dir in &self.dirs {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot read scratch directory");
                    report.errors += 1;
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "Scratch directory listing failed");
                        report.errors += 1;
                        break;
                    }
                };

                let metadata = match entry.metadata().await {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };
                report.scanned += 1;

                let expired = metadata
                    .modified()
                    .map(|modified| is_expired(modified, self.retention))
                    .unwrap_or(false);
                if !expired {
                    continue;
                }

                match remove_if_exists(&entry.path()).await {
                    Ok(true) => {
                        debug!(path = %entry.path().display(), "Removed expired scratch file");
                        report.removed += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Failed to remove scratch file");
                        report.errors += 1;
                    }
                }
            }
        }

        if let Some(pending) = &self.pending {
            report.pending_expired = pending.purge_expired();
        }

        if report.removed > 0 || report.pending_expired > 0 || report.errors > 0 {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                pending_expired = report.pending_expired,
                errors = report.errors,
                "Cleanup sweep finished"
            );
        }
        report
    }

    /// Runs `sweep` forever on a fixed interval.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}
