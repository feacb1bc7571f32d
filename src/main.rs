//! # Main: CLI Entry Point
//!
//! Parses arguments, initializes logging, and routes each subcommand to its
//! execution function in `cli.rs`.
//!
//! ## Subcommands
//!
//! - `search`: run the filter-then-verify search over an (A, B) rectangle.
//! - `validate`: known-answer self-tests for masks, arithmetic, verifier, sieve.
//! - `survivors`: print every coprime sieve survivor as JSON.
//! - `verify`: exactly re-check a claimed A^x + B^y = C^z.
//! - `audit-log`: recompute the integrity hash of a finished run log.
//!
//! ## Exit Status
//!
//! 0 when a search finds no counterexample, 42 when it does, 1 on any error
//! or failed check.
//!
//! ## Environment
//!
//! - `RUST_LOG`: log filter (default `info`).
//! - `LOG_FORMAT=json`: JSON log lines instead of human-readable stderr.
//! - `BEAL_THREADS`, `BEAL_LOG`: defaults for `--threads` and `--log`.

mod cli;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use beal_hunter::search::SieveKernel;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "beal-hunter",
    version,
    about = "Search for counterexamples to the Beal conjecture: A^x + B^y = C^z with gcd(A, B, C) = 1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search an (A, B) rectangle for solutions of A^x + B^y = C^z
    Search(SearchArgs),
    /// Run the built-in known-answer self-tests
    Validate,
    /// Print all gcd-coprime sieve survivors in [1, A_max] x [1, B_max] as JSON
    Survivors {
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        z: u32,
        #[arg(long, default_value_t = 100)]
        a_max: u64,
        #[arg(long, default_value_t = 100)]
        b_max: u64,
        /// Write JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Exactly verify a claimed solution A^x + B^y = C^z
    Verify {
        #[arg(long = "a")]
        a: u64,
        #[arg(long = "b")]
        b: u64,
        #[arg(long = "c")]
        c: u64,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        z: u32,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute the integrity hash of a JSONL run log
    AuditLog {
        /// Path to the run log
        path: PathBuf,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// TOML run file; flags given here override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exponent of A
    #[arg(long)]
    x: Option<u32>,
    /// Exponent of B
    #[arg(long)]
    y: Option<u32>,
    /// Exponent of C
    #[arg(long)]
    z: Option<u32>,

    /// First A value (default 1)
    #[arg(long)]
    a_start: Option<u64>,
    /// Last A value (default 1000)
    #[arg(long)]
    a_max: Option<u64>,
    /// First B value (default 1)
    #[arg(long)]
    b_start: Option<u64>,
    /// Last B value (default 1000)
    #[arg(long)]
    b_max: Option<u64>,
    /// Largest C accepted as a hit (default 10000000)
    #[arg(long)]
    c_max: Option<u64>,

    /// Worker threads (0 = all logical cores)
    #[arg(long, env = "BEAL_THREADS")]
    threads: Option<usize>,
    /// Seconds between progress checkpoints (0 disables them; default 1)
    #[arg(long)]
    progress_secs: Option<u64>,
    /// Run log path (default search_{x}_{y}_{z}_{unix}.jsonl)
    #[arg(long, env = "BEAL_LOG")]
    log: Option<PathBuf>,
    /// Sieve kernel: batch (8 lanes) or scalar
    #[arg(long)]
    kernel: Option<SieveKernel>,
    /// Scan rows on one thread
    #[arg(long)]
    sequential: bool,
    /// Hits buffered per worker before flushing (default 64)
    #[arg(long)]
    hit_buffer: Option<usize>,
}

fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Search(args) => cli::run_search(args),
        Commands::Validate => cli::run_validate(),
        Commands::Survivors {
            x,
            y,
            z,
            a_max,
            b_max,
            output,
        } => cli::run_survivors(*x, *y, *z, *a_max, *b_max, output.as_deref()),
        Commands::Verify { a, b, c, x, y, z, json } => cli::run_verify(*a, *b, *c, *x, *y, *z, *json),
        Commands::AuditLog { path } => cli::run_audit(path),
    }
}
