//! TOML run files and their merge with command-line flags.
//!
//! A run file has three optional sections:
//!
//! ```toml
//! [signature]
//! x = 3
//! y = 4
//! z = 5
//!
//! [bounds]
//! a_max = 100000
//! b_max = 100000
//! c_max = 10000000
//!
//! [run]
//! threads = 16
//! progress_secs = 5
//! kernel = "batch"
//! log = "runs/345.jsonl"
//! ```
//!
//! Flags given on the command line override the file field by field; anything
//! left unset falls back to the defaults below.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::{SearchParams, SieveKernel, DEFAULT_HIT_BUFFER};
use crate::{SearchBounds, Signature};

pub const DEFAULT_START: u64 = 1;
pub const DEFAULT_AB_MAX: u64 = 1000;
pub const DEFAULT_C_MAX: u64 = 10_000_000;
pub const DEFAULT_PROGRESS_SECS: u64 = 1;

// ── TOML Sections ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureSection {
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub z: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsSection {
    pub a_start: Option<u64>,
    pub a_max: Option<u64>,
    pub b_start: Option<u64>,
    pub b_max: Option<u64>,
    pub c_max: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub threads: Option<usize>,
    pub progress_secs: Option<u64>,
    pub kernel: Option<SieveKernel>,
    pub sequential: Option<bool>,
    pub hit_buffer: Option<usize>,
    pub log: Option<PathBuf>,
}

/// A partially specified run, from a file, from flags, or both merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub signature: SignatureSection,
    #[serde(default)]
    pub bounds: BoundsSection,
    #[serde(default)]
    pub run: RunSection,
}

/// A run ready to hand to `search`, plus where to log it.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub params: SearchParams,
    /// `None` means the caller picks the default path.
    pub log: Option<PathBuf>,
}

// ── Parsing ─────────────────────────────────────────────────────

pub fn parse_toml(content: &str) -> Result<RunConfig> {
    let config: RunConfig = toml::from_str(content)?;
    Ok(config)
}

pub fn load(path: &Path) -> Result<RunConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read run file {}", path.display()))?;
    parse_toml(&content).with_context(|| format!("Invalid run file {}", path.display()))
}

// ── Merge & Resolve ─────────────────────────────────────────────

impl RunConfig {
    /// Fields set in `over` replace fields in `self`.
    pub fn overlay(self, over: RunConfig) -> RunConfig {
        RunConfig {
            signature: SignatureSection {
                x: over.signature.x.or(self.signature.x),
                y: over.signature.y.or(self.signature.y),
                z: over.signature.z.or(self.signature.z),
            },
            bounds: BoundsSection {
                a_start: over.bounds.a_start.or(self.bounds.a_start),
                a_max: over.bounds.a_max.or(self.bounds.a_max),
                b_start: over.bounds.b_start.or(self.bounds.b_start),
                b_max: over.bounds.b_max.or(self.bounds.b_max),
                c_max: over.bounds.c_max.or(self.bounds.c_max),
            },
            run: RunSection {
                threads: over.run.threads.or(self.run.threads),
                progress_secs: over.run.progress_secs.or(self.run.progress_secs),
                kernel: over.run.kernel.or(self.run.kernel),
                sequential: over.run.sequential.or(self.run.sequential),
                hit_buffer: over.run.hit_buffer.or(self.run.hit_buffer),
                log: over.run.log.or(self.run.log),
            },
        }
    }

    /// Fill defaults and validate. The exponents have no default.
    pub fn resolve(&self) -> Result<ResolvedRun> {
        let (Some(x), Some(y), Some(z)) = (self.signature.x, self.signature.y, self.signature.z) else {
            bail!("exponents x, y and z are required (flags or [signature] section)");
        };
        let b = &self.bounds;
        let bounds = SearchBounds::new(
            b.a_start.unwrap_or(DEFAULT_START),
            b.a_max.unwrap_or(DEFAULT_AB_MAX),
            b.b_start.unwrap_or(DEFAULT_START),
            b.b_max.unwrap_or(DEFAULT_AB_MAX),
            b.c_max.unwrap_or(DEFAULT_C_MAX),
        );
        let r = &self.run;
        let params = SearchParams {
            signature: Signature::new(x, y, z),
            bounds,
            threads: r.threads.unwrap_or(0),
            progress_interval: Duration::from_secs(r.progress_secs.unwrap_or(DEFAULT_PROGRESS_SECS)),
            kernel: r.kernel.unwrap_or_default(),
            sequential: r.sequential.unwrap_or(false),
            hit_buffer: r.hit_buffer.unwrap_or(DEFAULT_HIT_BUFFER),
        };
        params.validate()?;
        Ok(ResolvedRun {
            params,
            log: r.log.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[signature]
x = 3
y = 4
z = 5

[bounds]
a_start = 10
a_max = 500
b_max = 400
c_max = 99999

[run]
threads = 4
progress_secs = 0
kernel = "scalar"
log = "out.jsonl"
"#;

    #[test]
    fn parse_full_file() {
        let config = parse_toml(FULL).unwrap();
        assert_eq!(config.signature.z, Some(5));
        assert_eq!(config.bounds.a_start, Some(10));
        assert_eq!(config.bounds.b_start, None);
        assert_eq!(config.run.kernel, Some(SieveKernel::Scalar));

        let resolved = config.resolve().unwrap();
        let p = &resolved.params;
        assert_eq!(p.signature, Signature::new(3, 4, 5));
        assert_eq!(p.bounds, SearchBounds::new(10, 500, 1, 400, 99999));
        assert_eq!(p.threads, 4);
        assert_eq!(p.progress_interval, Duration::ZERO);
        assert_eq!(p.hit_buffer, DEFAULT_HIT_BUFFER);
        assert_eq!(resolved.log, Some(PathBuf::from("out.jsonl")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_toml("[bounds]\na_mx = 5\n").is_err());
        assert!(parse_toml("[run]\nkernel = \"avx\"\n").is_err());
        assert!(parse_toml("[extra]\n").is_err());
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = parse_toml("[signature]\nx = 3\ny = 3\nz = 4\n").unwrap();
        let p = config.resolve().unwrap().params;
        assert_eq!(p.bounds, SearchBounds::new(1, 1000, 1, 1000, 10_000_000));
        assert_eq!(p.progress_interval, Duration::from_secs(1));
        assert_eq!(p.kernel, SieveKernel::Batch);
        assert!(!p.sequential);
    }

    #[test]
    fn flags_override_file() {
        let file = parse_toml(FULL).unwrap();
        let flags = RunConfig {
            signature: SignatureSection { z: Some(7), ..Default::default() },
            bounds: BoundsSection { a_max: Some(50), ..Default::default() },
            run: RunSection { sequential: Some(true), ..Default::default() },
        };
        let merged = file.overlay(flags);
        assert_eq!(merged.signature, SignatureSection { x: Some(3), y: Some(4), z: Some(7) });
        assert_eq!(merged.bounds.a_max, Some(50));
        assert_eq!(merged.bounds.b_max, Some(400));
        assert_eq!(merged.run.sequential, Some(true));
        assert_eq!(merged.run.threads, Some(4));
    }

    #[test]
    fn resolve_requires_exponents() {
        let err = RunConfig::default().resolve().unwrap_err();
        assert!(err.to_string().contains("required"), "{}", err);
    }

    #[test]
    fn resolve_validates() {
        let config = parse_toml("[signature]\nx = 2\ny = 3\nz = 3\n").unwrap();
        assert!(config.resolve().is_err());
        let config = parse_toml("[signature]\nx = 3\ny = 3\nz = 3\n[bounds]\na_start = 9\na_max = 8\n").unwrap();
        assert!(config.resolve().is_err());
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let path = dir.path().join("run.toml");
        std::fs::write(&path, FULL).unwrap();
        assert_eq!(load(&path).unwrap(), parse_toml(FULL).unwrap());
    }
}
