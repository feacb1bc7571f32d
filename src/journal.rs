//! # Journal: JSON-Lines Run Log and Audit
//!
//! `JsonlJournal` is the file-backed `RunJournal`: one JSON object per line,
//! tagged by `event`, flushed after every write so a killed run leaves each
//! completed event on disk.
//!
//! | Event | Written by | Payload |
//! |-------|-----------|---------|
//! | `START` | `run_started` | signature, bounds, expected pairs, workers, host |
//! | `CHECKPOINT` | throttled reporter | `CheckpointSnapshot` |
//! | `POWER_HIT` | hit ledger flush | A, B, C, gcd, exponents, primitive flag |
//! | `COMPLETE` | `run_completed` | counters, performance, status, integrity hash |
//!
//! Write failures after the file is open are logged and swallowed; the search
//! must not fail because its log did.
//!
//! `audit_log` re-reads a finished log and recomputes the integrity digest
//! from the START parameters and COMPLETE counters.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::progress::CheckpointSnapshot;
use crate::results::{integrity_digest, Hit, RunStart, RunStatus, SearchResults, SearchStats};
use crate::{RunJournal, SearchBounds, Signature, SIEVE_PRIMES};

const ENGINE: &str = concat!("beal-hunter ", env!("CARGO_PKG_VERSION"));

/// `search_{x}_{y}_{z}_{unix}.jsonl` in the working directory.
pub fn default_log_path(signature: Signature) -> PathBuf {
    PathBuf::from(format!(
        "search_{}_{}_{}_{}.jsonl",
        signature.x,
        signature.y,
        signature.z,
        Utc::now().timestamp()
    ))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize)]
struct SystemInfo {
    hostname: String,
    os: String,
    kernel: String,
    cpus: usize,
    memory_gb: u64,
}

impl SystemInfo {
    fn collect() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        SystemInfo {
            hostname: sysinfo::System::host_name().unwrap_or_else(|| "unknown".into()),
            os: sysinfo::System::long_os_version().unwrap_or_else(|| std::env::consts::OS.into()),
            kernel: sysinfo::System::kernel_version().unwrap_or_else(|| "unknown".into()),
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            memory_gb: sys.total_memory() / 1_073_741_824,
        }
    }
}

#[derive(Serialize)]
struct Performance {
    runtime_seconds: f64,
    pairs_per_second: f64,
    workers: usize,
}

#[derive(Serialize, Deserialize)]
struct Verification {
    status: RunStatus,
    integrity_hash: String,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
enum LogEvent<'a> {
    Start {
        timestamp: String,
        run_id: i64,
        engine: &'static str,
        signature: Signature,
        bounds: SearchBounds,
        expected_pairs: u64,
        workers: usize,
        sieve_primes: &'a [u8],
        system: SystemInfo,
    },
    Checkpoint {
        timestamp: String,
        checkpoint: &'a CheckpointSnapshot,
    },
    PowerHit {
        timestamp: String,
        #[serde(rename = "A")]
        a: u64,
        #[serde(rename = "B")]
        b: u64,
        #[serde(rename = "C")]
        c: u64,
        gcd: u64,
        x: u32,
        y: u32,
        z: u32,
        primitive: bool,
    },
    Complete {
        timestamp: String,
        run_id: i64,
        signature: Signature,
        bounds: SearchBounds,
        results: &'a SearchStats,
        performance: Performance,
        verification: Verification,
    },
}

/// Append-only JSONL run log.
pub struct JsonlJournal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlJournal {
    /// Create (or truncate) the log file. Failing here is fatal to the run.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create run log {}", path.display()))?;
        Ok(JsonlJournal {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_event(&self, event: &LogEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize run log event");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(error = %e, path = %self.path.display(), "Failed to write run log event");
        }
    }
}

impl RunJournal for JsonlJournal {
    fn run_started(&self, start: &RunStart) {
        self.write_event(&LogEvent::Start {
            timestamp: timestamp(),
            run_id: start.run_id,
            engine: ENGINE,
            signature: start.signature,
            bounds: start.bounds,
            expected_pairs: start.expected_pairs,
            workers: start.workers,
            sieve_primes: &SIEVE_PRIMES,
            system: SystemInfo::collect(),
        });
    }

    fn checkpoint(&self, snapshot: &CheckpointSnapshot) {
        self.write_event(&LogEvent::Checkpoint {
            timestamp: timestamp(),
            checkpoint: snapshot,
        });
    }

    fn hit_recorded(&self, hit: &Hit) {
        self.write_event(&LogEvent::PowerHit {
            timestamp: timestamp(),
            a: hit.a,
            b: hit.b,
            c: hit.c,
            gcd: hit.gcd,
            x: hit.signature.x,
            y: hit.signature.y,
            z: hit.signature.z,
            primitive: hit.is_primitive(),
        });
    }

    fn run_completed(&self, results: &SearchResults) {
        self.write_event(&LogEvent::Complete {
            timestamp: timestamp(),
            run_id: results.run_id,
            signature: results.signature,
            bounds: results.bounds,
            results: &results.stats,
            performance: Performance {
                runtime_seconds: results.runtime.as_secs_f64(),
                pairs_per_second: results.rate(),
                workers: results.workers,
            },
            verification: Verification {
                status: results.status(),
                integrity_hash: results.integrity_hash(),
            },
        });
    }
}

/// Journal that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl RunJournal for NullJournal {
    fn run_started(&self, _start: &RunStart) {}
    fn checkpoint(&self, _snapshot: &CheckpointSnapshot) {}
    fn hit_recorded(&self, _hit: &Hit) {}
    fn run_completed(&self, _results: &SearchResults) {}
}

// ── Audit ───────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
enum LoggedEvent {
    Start {
        run_id: i64,
        signature: Signature,
        bounds: SearchBounds,
    },
    PowerHit {
        primitive: bool,
    },
    Complete {
        run_id: i64,
        results: SearchStats,
        verification: Verification,
    },
    #[serde(other)]
    Other,
}

/// Outcome of re-reading a run log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub run_id: i64,
    pub signature: Signature,
    pub bounds: SearchBounds,
    pub stats: SearchStats,
    pub status: RunStatus,
    pub recorded_hash: String,
    pub computed_hash: String,
    /// POWER_HIT lines found in the log.
    pub hit_events: u64,
    pub primitive_events: u64,
}

impl AuditReport {
    pub fn hash_matches(&self) -> bool {
        self.recorded_hash == self.computed_hash
    }

    /// Hash matches, hit lines agree with the counters, and the status
    /// agrees with the primitive count.
    pub fn is_intact(&self) -> bool {
        let expected_status = if self.stats.primitive_hits > 0 {
            RunStatus::CounterexampleFound
        } else {
            RunStatus::Clear
        };
        self.hash_matches()
            && self.hit_events == self.stats.power_hits
            && self.primitive_events == self.stats.primitive_hits
            && self.status == expected_status
    }
}

/// Re-read a JSONL run log and recompute its integrity digest.
pub fn audit_log(path: &Path) -> Result<AuditReport> {
    let file = File::open(path).with_context(|| format!("Failed to open run log {}", path.display()))?;
    let mut start = None;
    let mut complete = None;
    let mut hit_events = 0u64;
    let mut primitive_events = 0u64;

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: LoggedEvent =
            serde_json::from_str(&line).with_context(|| format!("Malformed event on line {}", idx + 1))?;
        match event {
            LoggedEvent::Start {
                run_id,
                signature,
                bounds,
            } => start = Some((run_id, signature, bounds)),
            LoggedEvent::PowerHit { primitive } => {
                hit_events += 1;
                if primitive {
                    primitive_events += 1;
                }
            }
            LoggedEvent::Complete {
                run_id,
                results,
                verification,
            } => complete = Some((run_id, results, verification)),
            LoggedEvent::Other => {}
        }
    }

    let Some((run_id, signature, bounds)) = start else {
        bail!("{} has no START event", path.display());
    };
    let Some((complete_id, stats, verification)) = complete else {
        bail!("{} has no COMPLETE event (run interrupted?)", path.display());
    };
    if complete_id != run_id {
        bail!("START run_id {} does not match COMPLETE run_id {}", run_id, complete_id);
    }

    Ok(AuditReport {
        run_id,
        signature,
        bounds,
        stats,
        status: verification.status,
        recorded_hash: verification.integrity_hash,
        computed_hash: integrity_digest(signature, &bounds, &stats),
        hit_events,
        primitive_events,
    })
}
