//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use beal_hunter::precompute::pow_mod;
use beal_hunter::progress::CheckpointSnapshot;
use beal_hunter::results::{Hit, RunStart, SearchResults};
use beal_hunter::sieve::gcd;
use beal_hunter::{RunJournal, SearchBounds, Signature, SIEVE_PRIMES};

/// In-memory journal that keeps every event it receives.
#[derive(Default)]
pub struct RecordingJournal {
    pub starts: Mutex<Vec<RunStart>>,
    pub checkpoints: Mutex<Vec<CheckpointSnapshot>>,
    pub hits: Mutex<Vec<Hit>>,
    pub completions: Mutex<Vec<(u64, String)>>,
}

impl RunJournal for RecordingJournal {
    fn run_started(&self, start: &RunStart) {
        self.starts.lock().unwrap().push(start.clone());
    }

    fn checkpoint(&self, snapshot: &CheckpointSnapshot) {
        self.checkpoints.lock().unwrap().push(snapshot.clone());
    }

    fn hit_recorded(&self, hit: &Hit) {
        self.hits.lock().unwrap().push(*hit);
    }

    fn run_completed(&self, results: &SearchResults) {
        self.completions
            .lock()
            .unwrap()
            .push((results.stats.total_pairs, results.integrity_hash()));
    }
}

impl RecordingJournal {
    /// Journaled hits in (A, B) order.
    pub fn sorted_hits(&self) -> Vec<Hit> {
        let mut hits = self.hits.lock().unwrap().clone();
        hits.sort_by_key(|h| (h.a, h.b));
        hits
    }
}

/// Brute-force count of coprime pairs that pass every sieve prime, computed
/// without residue tables.
pub fn naive_survivors(sig: Signature, bounds: &SearchBounds) -> u64 {
    let mut count = 0;
    for a in bounds.a_start..=bounds.a_max {
        for b in bounds.b_start..=bounds.b_max {
            if gcd(a, b) > 1 {
                continue;
            }
            let admitted = SIEVE_PRIMES.iter().all(|&p| {
                let p = p as u64;
                let s = (pow_mod(a, sig.x as u64, p) + pow_mod(b, sig.y as u64, p)) % p;
                (0..p).any(|c| pow_mod(c, sig.z as u64, p) == s)
            });
            if admitted {
                count += 1;
            }
        }
    }
    count
}
