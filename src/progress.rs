//! Run progress tracking and reporting
//!
//! Purely observational: workers push status labels and completion ticks
//! into a shared [`ProgressTracker`]; nothing here reads or writes the
//! registry or influences scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Point-in-time view of a run's progress
#[derive(Clone, Debug)]
pub struct ProgressSnapshot {
    /// Current status label per worker slot
    pub worker_statuses: Vec<String>,
    /// Tasks completed since the run started (any outcome)
    pub completed: u64,
    /// Time elapsed since the run started
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Average tasks completed per minute so far
    pub fn per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.completed as f64 / minutes
        } else {
            0.0
        }
    }
}

struct ProgressInner {
    statuses: std::sync::RwLock<Vec<String>>,
    completed: AtomicU64,
    started: Instant,
}

/// Shared, cheaply clonable progress state for one run
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<ProgressInner>,
}

impl ProgressTracker {
    /// Create a tracker with one status slot per worker
    pub fn new(slots: usize) -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                statuses: std::sync::RwLock::new(vec!["idle".to_string(); slots]),
                completed: AtomicU64::new(0),
                started: Instant::now(),
            }),
        }
    }

    /// Update one worker slot's status label
    pub fn set_status(&self, slot: usize, status: impl Into<String>) {
        if let Ok(mut statuses) = self.inner.statuses.write() {
            if let Some(entry) = statuses.get_mut(slot) {
                *entry = status.into();
            }
        }
    }

    /// Count one finished task, whatever its outcome
    pub fn task_completed(&self) {
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks completed so far
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Capture the current progress state
    pub fn snapshot(&self) -> ProgressSnapshot {
        let worker_statuses = self
            .inner
            .statuses
            .read()
            .map(|statuses| statuses.clone())
            .unwrap_or_default();
        ProgressSnapshot {
            worker_statuses,
            completed: self.completed(),
            elapsed: self.inner.started.elapsed(),
        }
    }

    /// Spawn a task logging a progress line every `interval`
    ///
    /// Runs until aborted; the pool drops it after the workers are joined.
    pub fn spawn_reporter(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so logs start one interval in
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = tracker.snapshot();
                tracing::info!(
                    completed = snapshot.completed,
                    per_minute = format!("{:.1}", snapshot.per_minute()),
                    "harvest progress"
                );
                for (slot, status) in snapshot.worker_statuses.iter().enumerate() {
                    tracing::debug!(worker = slot, status = %status, "worker status");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_starts_idle_with_zero_completed() {
        let tracker = ProgressTracker::new(3);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.worker_statuses.len(), 3);
        assert!(snapshot.worker_statuses.iter().all(|s| s == "idle"));
        assert_eq!(snapshot.completed, 0);
    }

    #[test]
    fn status_updates_land_in_the_right_slot() {
        let tracker = ProgressTracker::new(2);
        tracker.set_status(1, "harvesting Adams/Gettysburg Borough/2020");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.worker_statuses[0], "idle");
        assert_eq!(
            snapshot.worker_statuses[1],
            "harvesting Adams/Gettysburg Borough/2020"
        );
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let tracker = ProgressTracker::new(1);
        tracker.set_status(5, "ghost");
        assert_eq!(tracker.snapshot().worker_statuses, vec!["idle".to_string()]);
    }

    #[test]
    fn completion_ticks_accumulate_across_clones() {
        let tracker = ProgressTracker::new(1);
        let clone = tracker.clone();
        tracker.task_completed();
        clone.task_completed();
        assert_eq!(tracker.completed(), 2);
    }

    #[test]
    fn throughput_is_zero_before_any_time_passes() {
        let snapshot = ProgressSnapshot {
            worker_statuses: vec![],
            completed: 10,
            elapsed: Duration::ZERO,
        };
        assert_eq!(snapshot.per_minute(), 0.0);
    }

    #[test]
    fn throughput_scales_completed_by_elapsed_minutes() {
        let snapshot = ProgressSnapshot {
            worker_statuses: vec![],
            completed: 30,
            elapsed: Duration::from_secs(120),
        };
        assert!((snapshot.per_minute() - 15.0).abs() < f64::EPSILON);
    }
}
