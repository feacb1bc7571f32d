//! # Results: Hits, Run Statistics, and the Shared Hit Ledger
//!
//! `SearchResults` is the final aggregate of a run, assembled after every
//! worker has joined. During the run the aggregate is split in two:
//!
//! - counters live in `progress::Progress` (atomic adds, one per finished row);
//! - hits live in `HitLedger`, a `Mutex<Vec<Hit>>` that also forwards each hit
//!   to the journal while the lock is held, so each hit is logged exactly once.
//!
//! ## Integrity Digest
//!
//! The COMPLETE log event carries a SHA-256 digest over the run parameters and
//! final counters (little-endian u64s, fixed order). `journal::audit_log`
//! recomputes it from a log file to detect edited results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::{RunJournal, SearchBounds, Signature};

/// A verified solution of A^x + B^y = C^z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hit {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub gcd: u64,
    pub signature: Signature,
}

impl Hit {
    /// gcd(A, B, C) = 1: a counterexample to the conjecture.
    pub fn is_primitive(&self) -> bool {
        self.gcd == 1
    }

    pub fn equation(&self) -> String {
        format!(
            "{}^{} + {}^{} = {}^{}",
            self.a, self.signature.x, self.b, self.signature.y, self.c, self.signature.z
        )
    }
}

/// Final counters of a run.
///
/// Every tested pair lands in exactly one of gcd_filtered, mod_filtered or
/// exact_checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_pairs: u64,
    pub gcd_filtered: u64,
    pub mod_filtered: u64,
    pub exact_checks: u64,
    pub power_hits: u64,
    pub primitive_hits: u64,
}

impl SearchStats {
    pub fn is_balanced(&self) -> bool {
        self.gcd_filtered + self.mod_filtered + self.exact_checks == self.total_pairs
    }

    /// `part` as a percentage of all tested pairs.
    pub fn percent(&self, part: u64) -> f64 {
        if self.total_pairs == 0 {
            0.0
        } else {
            100.0 * part as f64 / self.total_pairs as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Clear,
    CounterexampleFound,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Clear => write!(f, "CLEAR"),
            RunStatus::CounterexampleFound => write!(f, "COUNTEREXAMPLE_FOUND"),
        }
    }
}

/// Everything the journal needs to open a run.
#[derive(Clone, Debug)]
pub struct RunStart {
    pub run_id: i64,
    pub signature: Signature,
    pub bounds: SearchBounds,
    pub expected_pairs: u64,
    pub workers: usize,
}

/// Final aggregate of a completed run.
#[derive(Clone, Debug)]
pub struct SearchResults {
    pub run_id: i64,
    pub signature: Signature,
    pub bounds: SearchBounds,
    pub stats: SearchStats,
    pub hits: Vec<Hit>,
    pub runtime: Duration,
    pub workers: usize,
}

impl SearchResults {
    pub fn status(&self) -> RunStatus {
        if self.stats.primitive_hits > 0 {
            RunStatus::CounterexampleFound
        } else {
            RunStatus::Clear
        }
    }

    pub fn found_counterexample(&self) -> bool {
        self.status() == RunStatus::CounterexampleFound
    }

    pub fn counterexamples(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().filter(|h| h.is_primitive())
    }

    /// Average pairs per second over the whole run.
    pub fn rate(&self) -> f64 {
        let secs = self.runtime.as_secs_f64();
        if secs > 0.0 {
            self.stats.total_pairs as f64 / secs
        } else {
            0.0
        }
    }

    pub fn integrity_hash(&self) -> String {
        integrity_digest(self.signature, &self.bounds, &self.stats)
    }
}

/// SHA-256 over signature, bounds and counters, hex-encoded.
pub fn integrity_digest(signature: Signature, bounds: &SearchBounds, stats: &SearchStats) -> String {
    let fields: [u64; 14] = [
        signature.x as u64,
        signature.y as u64,
        signature.z as u64,
        bounds.a_start,
        bounds.a_max,
        bounds.b_start,
        bounds.b_max,
        bounds.c_max,
        stats.total_pairs,
        stats.gcd_filtered,
        stats.mod_filtered,
        stats.exact_checks,
        stats.power_hits,
        stats.primitive_hits,
    ];
    let mut hasher = Sha256::new();
    for v in fields {
        hasher.update(v.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Guarded sink for hits found by workers.
///
/// Workers hand over whole buffers; each hit is appended and journaled under
/// the same lock, so concurrent flushes cannot interleave log lines or log a
/// hit twice.
pub struct HitLedger<'j> {
    hits: Mutex<Vec<Hit>>,
    journal: &'j dyn RunJournal,
}

impl<'j> HitLedger<'j> {
    pub fn new(journal: &'j dyn RunJournal) -> Self {
        HitLedger {
            hits: Mutex::new(Vec::new()),
            journal,
        }
    }

    /// Move every hit out of `batch` into the ledger.
    pub fn append(&self, batch: &mut Vec<Hit>) {
        if batch.is_empty() {
            return;
        }
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        for hit in batch.drain(..) {
            self.journal.hit_recorded(&hit);
            hits.push(hit);
        }
    }

    pub fn len(&self) -> usize {
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hits in (A, B) order; arrival order depends on scheduling.
    pub fn into_hits(self) -> Vec<Hit> {
        let mut hits = self.hits.into_inner().unwrap_or_else(PoisonError::into_inner);
        hits.sort_by_key(|h| (h.a, h.b));
        hits
    }
}
