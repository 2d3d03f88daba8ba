use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Running totals of a deletion run.
///
/// `seen` is advanced by the scan loop, `completed` by the result
/// aggregator. Both only grow and can be read from any task. `completed`
/// may briefly run ahead of a fresh read of `seen` and vice versa.
#[derive(Debug, Default)]
pub struct DeletionProgress {
    total_seen: AtomicU64,
    total_completed: AtomicU64,
}

impl DeletionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_seen(&self, n: u64) {
        self.total_seen.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_completed(&self, n: u64) {
        self.total_completed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn seen(&self) -> u64 {
        self.total_seen.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.total_completed.load(Ordering::Relaxed)
    }
}

/// A point-in-time view of a run, rendered as the progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub seen: u64,
    pub completed: u64,
    pub workers: usize,
    pub elapsed: Duration,
    pub dry_run: bool,
}

impl ProgressSnapshot {
    /// Objects per second over whole elapsed seconds, once both are non-zero.
    pub fn rate(&self) -> Option<u64> {
        let seconds = self.elapsed.as_secs();
        if seconds == 0 || self.completed == 0 {
            return None;
        }
        Some(self.completed / seconds)
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            write!(f, "[dryrun] ")?;
        }
        write!(
            f,
            "delete: {} of {} objects ({} workers",
            self.completed, self.seen, self.workers
        )?;
        if let Some(rate) = self.rate() {
            write!(f, ", {rate} obj/s")?;
        }
        write!(f, ")")
    }
}

/// Receives progress snapshots while a pipeline runs.
pub trait ProgressReporter: Send + Sync {
    /// Called periodically while the pipeline runs.
    fn report(&self, snapshot: &ProgressSnapshot);

    /// Called once after the pipeline has drained.
    fn finish(&self, snapshot: &ProgressSnapshot);
}
