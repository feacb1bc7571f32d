pub mod config;
pub mod journal;
pub mod precompute;
pub mod progress;
pub mod results;
pub mod search;
pub mod selftest;
pub mod sieve;
pub mod verify;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::progress::CheckpointSnapshot;
use crate::results::{Hit, RunStart, SearchResults};

/// Number of primes in the residue sieve.
pub const NUM_SIEVE_PRIMES: usize = 20;

/// The fixed sieve primes. Every table, mask and lane loop is indexed by
/// position in this list, so the order is part of the log format.
pub const SIEVE_PRIMES: [u8; NUM_SIEVE_PRIMES] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
];

/// Largest sieve prime; residue masks must hold at least this many bits.
pub const MAX_SIEVE_PRIME: u8 = 71;

/// Exponent signature (x, y, z) of the equation A^x + B^y = C^z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Signature {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Signature { x, y, z }
    }

    /// True when every exponent is at least 3 (the conjecture's domain).
    pub fn is_beal_domain(&self) -> bool {
        self.x >= 3 && self.y >= 3 && self.z >= 3
    }

    pub fn as_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Inclusive search rectangle for (A, B) plus the cap on C.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBounds {
    pub a_start: u64,
    pub a_max: u64,
    pub b_start: u64,
    pub b_max: u64,
    pub c_max: u64,
}

impl SearchBounds {
    pub fn new(a_start: u64, a_max: u64, b_start: u64, b_max: u64, c_max: u64) -> Self {
        SearchBounds {
            a_start,
            a_max,
            b_start,
            b_max,
            c_max,
        }
    }

    /// Number of A-rows in the grid.
    pub fn rows(&self) -> u64 {
        self.a_max - self.a_start + 1
    }

    /// Number of B-values per row.
    pub fn row_len(&self) -> u64 {
        self.b_max - self.b_start + 1
    }

    /// Total candidate pairs: rows × row length.
    pub fn expected_pairs(&self) -> u64 {
        self.rows().saturating_mul(self.row_len())
    }
}

/// Logging collaborator for a search run.
///
/// The scheduler calls `run_started` once, `checkpoint` from the throttled
/// reporter, `hit_recorded` exactly once per hit (inside the hit-flush lock),
/// and `run_completed` once after every worker has joined. Implementations own
/// serialization and durability and must not fail the search.
pub trait RunJournal: Send + Sync {
    fn run_started(&self, start: &RunStart);
    fn checkpoint(&self, snapshot: &CheckpointSnapshot);
    fn hit_recorded(&self, hit: &Hit);
    fn run_completed(&self, results: &SearchResults);
}
