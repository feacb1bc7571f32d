//! # Progress: Atomic Run Counters and Throttled Checkpoints
//!
//! Shared between the search workers and the journal. Workers count pairs in
//! a row-local `RowTally` and fold it into the atomics once per finished
//! A-row, so contention is bounded by the row count, not the pair count.
//! The sums are commutative; any interleaving of row completions yields the
//! same totals.
//!
//! ## Checkpoint Throttle
//!
//! After each row a worker calls `maybe_checkpoint`. A lock-free read of the
//! last report time rejects most calls; callers that pass it take the report
//! lock and re-check the elapsed time before emitting, so several workers
//! crossing the interval together produce one checkpoint, not several.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;

use crate::results::{Hit, SearchStats};
use crate::RunJournal;

/// Per-row counters, owned by one worker until the row is done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowTally {
    pub tested: u64,
    pub gcd_filtered: u64,
    pub mod_filtered: u64,
    pub exact_checks: u64,
}

/// Point-in-time view of a running search.
#[derive(Clone, Debug, Serialize)]
pub struct CheckpointSnapshot {
    pub run_id: i64,
    pub pairs_completed: u64,
    pub pairs_expected: u64,
    pub percent_complete: f64,
    pub gcd_skips: u64,
    pub mod_skips: u64,
    pub exact_checks: u64,
    pub elapsed_seconds: f64,
    pub rate_pairs_per_sec: f64,
    pub rows_done: u64,
    pub rows_total: u64,
}

pub struct Progress {
    pub tested: AtomicU64,
    pub gcd_filtered: AtomicU64,
    pub mod_filtered: AtomicU64,
    pub exact_checks: AtomicU64,
    pub rows_done: AtomicU64,
    run_id: i64,
    pairs_expected: u64,
    rows_total: u64,
    start: Instant,
    interval_ms: Option<u64>,
    last_report_ms: AtomicU64,
    report_lock: Mutex<()>,
}

impl Progress {
    /// `interval` of zero disables checkpoints.
    pub fn new(run_id: i64, pairs_expected: u64, rows_total: u64, interval: Duration) -> Self {
        let interval_ms = match interval.as_millis() {
            0 => None,
            ms => Some(ms.min(u64::MAX as u128) as u64),
        };
        Progress {
            tested: AtomicU64::new(0),
            gcd_filtered: AtomicU64::new(0),
            mod_filtered: AtomicU64::new(0),
            exact_checks: AtomicU64::new(0),
            rows_done: AtomicU64::new(0),
            run_id,
            pairs_expected,
            rows_total,
            start: Instant::now(),
            interval_ms,
            last_report_ms: AtomicU64::new(0),
            report_lock: Mutex::new(()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Fold a finished row into the shared counters.
    pub fn record_row(&self, tally: &RowTally) {
        self.tested.fetch_add(tally.tested, Ordering::Relaxed);
        self.gcd_filtered.fetch_add(tally.gcd_filtered, Ordering::Relaxed);
        self.mod_filtered.fetch_add(tally.mod_filtered, Ordering::Relaxed);
        self.exact_checks.fetch_add(tally.exact_checks, Ordering::Relaxed);
        self.rows_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CheckpointSnapshot {
        let elapsed = self.start.elapsed().as_secs_f64();
        let tested = self.tested.load(Ordering::Relaxed);
        let percent_complete = if self.pairs_expected > 0 {
            100.0 * tested as f64 / self.pairs_expected as f64
        } else {
            0.0
        };
        let rate = if elapsed > 0.0 { tested as f64 / elapsed } else { 0.0 };
        CheckpointSnapshot {
            run_id: self.run_id,
            pairs_completed: tested,
            pairs_expected: self.pairs_expected,
            percent_complete,
            gcd_skips: self.gcd_filtered.load(Ordering::Relaxed),
            mod_skips: self.mod_filtered.load(Ordering::Relaxed),
            exact_checks: self.exact_checks.load(Ordering::Relaxed),
            elapsed_seconds: elapsed,
            rate_pairs_per_sec: rate,
            rows_done: self.rows_done.load(Ordering::Relaxed),
            rows_total: self.rows_total,
        }
    }

    /// Emit a checkpoint if more than one interval has passed since the last.
    /// Returns true when this call emitted it.
    pub fn maybe_checkpoint(&self, journal: &dyn RunJournal) -> bool {
        let Some(interval_ms) = self.interval_ms else {
            return false;
        };
        if self.elapsed_ms().saturating_sub(self.last_report_ms.load(Ordering::Relaxed)) <= interval_ms {
            return false;
        }

        let _guard = self.report_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now_ms = self.elapsed_ms();
        if now_ms.saturating_sub(self.last_report_ms.load(Ordering::Relaxed)) <= interval_ms {
            return false;
        }
        self.last_report_ms.store(now_ms, Ordering::Relaxed);

        let snapshot = self.snapshot();
        info!(
            percent = format_args!("{:.2}", snapshot.percent_complete),
            tested = snapshot.pairs_completed,
            rate = format_args!("{:.1}M/s", snapshot.rate_pairs_per_sec / 1e6),
            exact_checks = snapshot.exact_checks,
            rows = format_args!("{}/{}", snapshot.rows_done, snapshot.rows_total),
            "search progress"
        );
        journal.checkpoint(&snapshot);
        true
    }

    /// Final counters, with hit totals taken from the ledger.
    pub fn stats(&self, hits: &[Hit]) -> SearchStats {
        SearchStats {
            total_pairs: self.tested.load(Ordering::Relaxed),
            gcd_filtered: self.gcd_filtered.load(Ordering::Relaxed),
            mod_filtered: self.mod_filtered.load(Ordering::Relaxed),
            exact_checks: self.exact_checks.load(Ordering::Relaxed),
            power_hits: hits.len() as u64,
            primitive_hits: hits.iter().filter(|h| h.is_primitive()).count() as u64,
        }
    }
}
