//! # CLI Execution Functions
//!
//! Kept out of `main.rs` so the entry point stays a routing table. Each
//! function runs one subcommand and maps its outcome to a process exit code.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::info;

use beal_hunter::config::{self, BoundsSection, RunConfig, RunSection, SignatureSection};
use beal_hunter::journal::{audit_log, default_log_path, JsonlJournal};
use beal_hunter::precompute::ResidueTables;
use beal_hunter::results::SearchResults;
use beal_hunter::search::search;
use beal_hunter::selftest::run_self_tests;
use beal_hunter::sieve::survivor_pairs;
use beal_hunter::verify::check_claim;
use beal_hunter::Signature;

use super::SearchArgs;

/// Exit status when a primitive solution is found.
const EXIT_COUNTEREXAMPLE: u8 = 42;

// ── Search ──────────────────────────────────────────────────────

impl SearchArgs {
    fn to_config(&self) -> RunConfig {
        RunConfig {
            signature: SignatureSection {
                x: self.x,
                y: self.y,
                z: self.z,
            },
            bounds: BoundsSection {
                a_start: self.a_start,
                a_max: self.a_max,
                b_start: self.b_start,
                b_max: self.b_max,
                c_max: self.c_max,
            },
            run: RunSection {
                threads: self.threads,
                progress_secs: self.progress_secs,
                kernel: self.kernel,
                sequential: self.sequential.then_some(true),
                hit_buffer: self.hit_buffer,
                log: self.log.clone(),
            },
        }
    }
}

pub fn run_search(args: &SearchArgs) -> Result<ExitCode> {
    let file = match &args.config {
        Some(path) => config::load(path)?,
        None => RunConfig::default(),
    };
    let resolved = file.overlay(args.to_config()).resolve()?;
    let params = resolved.params;
    let log_path = resolved.log.unwrap_or_else(|| default_log_path(params.signature));

    let journal = JsonlJournal::create(&log_path)?;
    info!(log = %log_path.display(), "Run log opened");

    let results = search(&params, &journal)?;
    print_summary(&results, &log_path);

    if results.found_counterexample() {
        Ok(ExitCode::from(EXIT_COUNTEREXAMPLE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_summary(results: &SearchResults, log_path: &Path) {
    let s = &results.stats;
    let b = &results.bounds;
    println!();
    println!("=== Search complete ===");
    println!("Signature:      {}", results.signature);
    println!(
        "Range:          A in [{}, {}], B in [{}, {}], C <= {}",
        b.a_start, b.a_max, b.b_start, b.b_max, b.c_max
    );
    println!("Pairs tested:   {}", s.total_pairs);
    println!("GCD filtered:   {} ({:.2}%)", s.gcd_filtered, s.percent(s.gcd_filtered));
    println!("Mod filtered:   {} ({:.2}%)", s.mod_filtered, s.percent(s.mod_filtered));
    println!("Exact checks:   {} ({:.4}%)", s.exact_checks, s.percent(s.exact_checks));
    println!("Power hits:     {}", s.power_hits);
    println!("Primitive hits: {}", s.primitive_hits);
    println!(
        "Runtime:        {:.2} s ({:.2} M pairs/s, {} workers)",
        results.runtime.as_secs_f64(),
        results.rate() / 1e6,
        results.workers
    );
    println!("Status:         {}", results.status());
    println!("Integrity:      {}", results.integrity_hash());
    println!("Log:            {}", log_path.display());

    for hit in results.counterexamples() {
        println!("*** COUNTEREXAMPLE: {} ***", hit.equation());
    }
}

// ── Validate ────────────────────────────────────────────────────

pub fn run_validate() -> Result<ExitCode> {
    let report = run_self_tests()?;
    for check in &report.checks {
        let tag = if check.passed { "PASS" } else { "FAIL" };
        println!("[{}] {}: {}", tag, check.name, check.detail);
    }
    let failed = report.failures().count();
    if failed == 0 {
        println!("All {} checks passed", report.checks.len());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} of {} checks failed", failed, report.checks.len());
        Ok(ExitCode::FAILURE)
    }
}

// ── Survivors ───────────────────────────────────────────────────

pub fn run_survivors(x: u32, y: u32, z: u32, a_max: u64, b_max: u64, output: Option<&Path>) -> Result<ExitCode> {
    let signature = Signature::new(x, y, z);
    let tables = ResidueTables::build(signature, a_max, b_max)?;
    let pairs = survivor_pairs(&tables);
    let doc = serde_json::json!({
        "signature": signature.as_array(),
        "A_max": a_max,
        "B_max": b_max,
        "survivors": pairs.iter().map(|&(a, b)| [a, b]).collect::<Vec<_>>(),
        "count": pairs.len(),
    });
    let text = serde_json::to_string_pretty(&doc)?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(count = pairs.len(), path = %path.display(), "Survivors written");
        }
        None => println!("{}", text),
    }
    Ok(ExitCode::SUCCESS)
}

// ── Verify ──────────────────────────────────────────────────────

pub fn run_verify(a: u64, b: u64, c: u64, x: u32, y: u32, z: u32, json: bool) -> Result<ExitCode> {
    let signature = Signature::new(x, y, z);
    let report = check_claim(a, b, c, signature);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let verdict = if report.holds { "HOLDS" } else { "FAILS" };
        println!("{}^{} + {}^{} = {}^{}: {}", a, x, b, y, c, z, verdict);
        println!("gcd(A, B, C) = {}", report.gcd);
        println!("A^x + B^y has {} digits", report.digits);
        if report.primitive {
            println!("*** PRIMITIVE: counterexample candidate ***");
        }
    }
    Ok(match (report.holds, report.primitive) {
        (true, true) => ExitCode::from(EXIT_COUNTEREXAMPLE),
        (true, false) => ExitCode::SUCCESS,
        (false, _) => ExitCode::FAILURE,
    })
}

// ── Audit ───────────────────────────────────────────────────────

pub fn run_audit(path: &Path) -> Result<ExitCode> {
    let report = audit_log(path)?;
    println!("Run:            {}", report.run_id);
    println!("Signature:      {}", report.signature);
    println!("Pairs tested:   {}", report.stats.total_pairs);
    println!("Status:         {}", report.status);
    println!("Recorded hash:  {}", report.recorded_hash);
    println!("Computed hash:  {}", report.computed_hash);
    println!(
        "Hit events:     {} ({} primitive), counters say {} ({} primitive)",
        report.hit_events, report.primitive_events, report.stats.power_hits, report.stats.primitive_hits
    );
    if report.is_intact() {
        println!("Integrity:      OK");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Integrity:      MISMATCH");
        Ok(ExitCode::FAILURE)
    }
}
