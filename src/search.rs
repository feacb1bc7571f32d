//! # Search: Parallel Filter-then-Verify Over the (A, B) Grid
//!
//! Drives one run from table build to final aggregate:
//!
//! 1. **Initializing**: build `ResidueTables`. An allocation failure returns an
//!    error before any worker starts or any log event is written.
//! 2. **Running**: A-rows are handed to a rayon pool one at a time (work
//!    stealing balances rows whose survivor counts differ). Per pair:
//!    gcd(A, B) > 1 → skip; sieve miss → skip; otherwise exact check.
//! 3. **Draining**: each worker's `HitBuffer` flushes into the shared
//!    `HitLedger` when it fills and when the worker's share ends (on drop).
//! 4. **Finalized**: counters and hits are combined into `SearchResults` and
//!    handed to the journal.
//!
//! Row counts are folded into `Progress` atomics once per row. The sequential
//! schedule runs the same row function on the calling thread, so every
//! filtering and verification decision is identical; only wall time differs.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::precompute::ResidueTables;
use crate::progress::{Progress, RowTally};
use crate::results::{Hit, HitLedger, RunStart, SearchResults};
use crate::sieve::{coprime_lanes, filter_lanes, gcd, survives, LANES};
use crate::verify::check_power_hit;
use crate::{RunJournal, SearchBounds, Signature};

/// Hits a worker holds before taking the ledger lock.
pub const DEFAULT_HIT_BUFFER: usize = 64;

/// Which sieve evaluation a row scan uses. Both give identical decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SieveKernel {
    /// Eight B values per call, lane mask seeded by the gcd prefilter.
    #[default]
    Batch,
    /// One pair at a time.
    Scalar,
}

impl fmt::Display for SieveKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SieveKernel::Batch => write!(f, "batch"),
            SieveKernel::Scalar => write!(f, "scalar"),
        }
    }
}

impl FromStr for SieveKernel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "batch" => Ok(SieveKernel::Batch),
            "scalar" => Ok(SieveKernel::Scalar),
            other => bail!("unknown sieve kernel '{}' (expected batch or scalar)", other),
        }
    }
}

/// Fully resolved run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchParams {
    pub signature: Signature,
    pub bounds: SearchBounds,
    /// Worker threads; 0 uses every logical core.
    pub threads: usize,
    /// Minimum time between checkpoints; zero disables them.
    pub progress_interval: Duration,
    pub kernel: SieveKernel,
    /// Scan rows on the calling thread instead of a pool.
    pub sequential: bool,
    pub hit_buffer: usize,
}

impl SearchParams {
    pub fn new(signature: Signature, bounds: SearchBounds) -> Self {
        SearchParams {
            signature,
            bounds,
            threads: 0,
            progress_interval: Duration::from_secs(1),
            kernel: SieveKernel::default(),
            sequential: false,
            hit_buffer: DEFAULT_HIT_BUFFER,
        }
    }

    /// Reject configurations the search does not accept. `search` itself
    /// assumes this has passed.
    pub fn validate(&self) -> Result<()> {
        let sig = self.signature;
        if !sig.is_beal_domain() {
            bail!("exponents must all be at least 3, got {}", sig);
        }
        let b = &self.bounds;
        if b.a_start < 1 || b.b_start < 1 {
            bail!("A and B must start at 1 or above (A_start={}, B_start={})", b.a_start, b.b_start);
        }
        if b.a_start > b.a_max {
            bail!("A_start {} exceeds A_max {}", b.a_start, b.a_max);
        }
        if b.b_start > b.b_max {
            bail!("B_start {} exceeds B_max {}", b.b_start, b.b_max);
        }
        if b.c_max < 1 {
            bail!("C_max must be at least 1");
        }
        if self.hit_buffer == 0 {
            bail!("hit buffer capacity must be at least 1");
        }
        Ok(())
    }
}

/// Worker-local hit list, drained into the ledger when full and on drop.
struct HitBuffer<'a, 'j> {
    ledger: &'a HitLedger<'j>,
    pending: Vec<Hit>,
    capacity: usize,
}

impl<'a, 'j> HitBuffer<'a, 'j> {
    fn new(ledger: &'a HitLedger<'j>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HitBuffer {
            ledger,
            pending: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, hit: Hit) {
        self.pending.push(hit);
        if self.pending.len() >= self.capacity {
            self.flush();
        }
    }

    fn flush(&mut self) {
        self.ledger.append(&mut self.pending);
    }
}

impl Drop for HitBuffer<'_, '_> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Read-only inputs shared by every row scan.
struct RowScan<'t> {
    tables: &'t ResidueTables,
    signature: Signature,
    b_start: u64,
    b_max: u64,
    c_max: u64,
    kernel: SieveKernel,
}

impl RowScan<'_> {
    /// Test every B for one A and return the row's counts.
    fn scan(&self, a: u64, hits: &mut HitBuffer) -> RowTally {
        let mut tally = RowTally::default();
        match self.kernel {
            SieveKernel::Scalar => {
                for b in self.b_start..=self.b_max {
                    tally.tested += 1;
                    if gcd(a, b) > 1 {
                        tally.gcd_filtered += 1;
                    } else if !survives(self.tables, a, b) {
                        tally.mod_filtered += 1;
                    } else {
                        self.exact_check(a, b, &mut tally, hits);
                    }
                }
            }
            SieveKernel::Batch => {
                let mut b0 = self.b_start;
                while b0 <= self.b_max {
                    let lanes = (self.b_max - b0 + 1).min(LANES);
                    let coprime = coprime_lanes(a, b0, self.b_max);
                    let alive = filter_lanes(self.tables, a, b0, coprime);
                    tally.tested += lanes;
                    tally.gcd_filtered += lanes - coprime.count_ones() as u64;
                    tally.mod_filtered += (coprime.count_ones() - alive.count_ones()) as u64;

                    let mut pending = alive;
                    while pending != 0 {
                        let lane = pending.trailing_zeros() as u64;
                        pending &= pending - 1;
                        self.exact_check(a, b0 + lane, &mut tally, hits);
                    }
                    b0 += LANES;
                }
            }
        }
        tally
    }

    fn exact_check(&self, a: u64, b: u64, tally: &mut RowTally, hits: &mut HitBuffer) {
        tally.exact_checks += 1;
        let Some(m) = check_power_hit(a, b, self.signature, self.c_max) else {
            return;
        };
        let hit = Hit {
            a,
            b,
            c: m.c,
            gcd: m.gcd,
            signature: self.signature,
        };
        if hit.is_primitive() {
            warn!(equation = %hit.equation(), "counterexample found");
        } else {
            info!(equation = %hit.equation(), gcd = hit.gcd, "power hit");
        }
        hits.push(hit);
    }
}

/// Dedicated pool for one run. `None` falls back to the sequential schedule.
fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("beal-worker-{}", i))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "Could not build worker pool, running sequentially");
            None
        }
    }
}

/// Search A in [A_start, A_max] × B in [B_start, B_max] for
/// A^x + B^y = C^z with C ≤ C_max.
///
/// Assumes `params` has passed `SearchParams::validate` (tests call it with
/// exponents below 3 to reach known solutions).
pub fn search(params: &SearchParams, journal: &dyn RunJournal) -> Result<SearchResults> {
    let signature = params.signature;
    let bounds = params.bounds;

    let tables = ResidueTables::build(signature, bounds.a_max, bounds.b_max)
        .with_context(|| format!("residue tables for signature {}", signature))?;
    info!(
        signature = %signature,
        table_kib = tables.table_bytes() / 1024,
        "Residue tables ready"
    );

    let pool = if params.sequential {
        None
    } else {
        build_pool(params.threads)
    };
    let workers = pool.as_ref().map_or(1, |p| p.current_num_threads());

    let run_id = Utc::now().timestamp();
    let expected_pairs = bounds.expected_pairs();
    journal.run_started(&RunStart {
        run_id,
        signature,
        bounds,
        expected_pairs,
        workers,
    });
    info!(
        run_id,
        signature = %signature,
        expected_pairs,
        workers,
        kernel = %params.kernel,
        "Search started"
    );

    let progress = Progress::new(run_id, expected_pairs, bounds.rows(), params.progress_interval);
    let ledger = HitLedger::new(journal);
    let scan = RowScan {
        tables: &tables,
        signature,
        b_start: bounds.b_start,
        b_max: bounds.b_max,
        c_max: bounds.c_max,
        kernel: params.kernel,
    };
    let process_row = |a: u64, hits: &mut HitBuffer| {
        let tally = scan.scan(a, hits);
        progress.record_row(&tally);
        progress.maybe_checkpoint(journal);
    };

    match &pool {
        Some(pool) => pool.install(|| {
            (bounds.a_start..=bounds.a_max)
                .into_par_iter()
                .for_each_init(|| HitBuffer::new(&ledger, params.hit_buffer), |hits, a| process_row(a, hits));
        }),
        None => {
            let mut hits = HitBuffer::new(&ledger, params.hit_buffer);
            for a in bounds.a_start..=bounds.a_max {
                process_row(a, &mut hits);
            }
        }
    }

    let runtime = progress.elapsed();
    let hits = ledger.into_hits();
    let stats = progress.stats(&hits);
    let results = SearchResults {
        run_id,
        signature,
        bounds,
        stats,
        hits,
        runtime,
        workers,
    };
    journal.run_completed(&results);
    info!(
        run_id,
        tested = stats.total_pairs,
        exact_checks = stats.exact_checks,
        power_hits = stats.power_hits,
        primitive_hits = stats.primitive_hits,
        secs = format_args!("{:.2}", runtime.as_secs_f64()),
        status = %results.status(),
        "Search complete"
    );
    Ok(results)
}
