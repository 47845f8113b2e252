// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration and suite definitions.
//!
//! Runtime values come from `BOUNDARY_PROBE_*` environment variables with
//! safe defaults; invalid values fall back to defaults without crashing. A
//! TOML suite definition selects the probes and may override the runtime
//! values.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `BOUNDARY_PROBE_BUDGET_MS` | 10000 | Default per-probe budget (ms) |
//! | `BOUNDARY_PROBE_MAX_WORKERS` | CPU count | Worker pool size for concurrent mode |
//! | `BOUNDARY_PROBE_CONCURRENT` | false | Run side-effect-free probes concurrently |
//! | `BOUNDARY_PROBE_CLEANUP_GRACE_MS` | 500 | Grace for a timed-out action to stop (ms) |
//! | `BOUNDARY_PROBE_CLEANUP_BOUND_MS` | 5000 | Upper bound on cleanup (ms) |
//! | `BOUNDARY_PROBE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `BOUNDARY_PROBE_LOG_LEVEL` | info | Log filter directive |
//! | `BOUNDARY_PROBE_SUITE` | unset | Path to a suite definition |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::outcome::OutcomeKind;
use crate::probe::SignalMode;
use crate::runner::RunnerConfig;
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_BUDGET_MS: u64 = 10_000;
pub const DEFAULT_CLEANUP_GRACE_MS: u64 = 500;
pub const DEFAULT_CLEANUP_BOUND_MS: u64 = 5_000;

/// Effective runtime configuration summary.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub budget_ms: u64,
    pub max_workers: usize,
    pub concurrent: bool,
    pub cleanup_grace_ms: u64,
    pub cleanup_bound_ms: u64,
    pub log_format: String,
    pub log_level: String,
    pub suite: Option<PathBuf>,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub default_budget: Duration,
    pub max_workers: usize,
    pub concurrent: bool,
    pub cleanup_grace: Duration,
    pub cleanup_bound: Duration,
    pub log_format: LogFormat,
    pub log_level: String,
    pub suite_path: Option<PathBuf>,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn load_log_format() -> LogFormat {
    std::env::var("BOUNDARY_PROBE_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let budget_ms = parse_u64("BOUNDARY_PROBE_BUDGET_MS", DEFAULT_BUDGET_MS).max(1);
    let max_workers = parse_usize("BOUNDARY_PROBE_MAX_WORKERS", num_cpus::get()).max(1);
    let grace_ms = parse_u64("BOUNDARY_PROBE_CLEANUP_GRACE_MS", DEFAULT_CLEANUP_GRACE_MS);
    let bound_ms = parse_u64("BOUNDARY_PROBE_CLEANUP_BOUND_MS", DEFAULT_CLEANUP_BOUND_MS).max(1);
    let log_level = std::env::var("BOUNDARY_PROBE_LOG_LEVEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let suite_path = std::env::var("BOUNDARY_PROBE_SUITE")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);

    EnvConfig {
        default_budget: Duration::from_millis(budget_ms),
        max_workers,
        concurrent: parse_bool("BOUNDARY_PROBE_CONCURRENT", false),
        cleanup_grace: Duration::from_millis(grace_ms),
        cleanup_bound: Duration::from_millis(bound_ms),
        log_format: load_log_format(),
        log_level,
        suite_path,
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            budget_ms: self.default_budget.as_millis() as u64,
            max_workers: self.max_workers,
            concurrent: self.concurrent,
            cleanup_grace_ms: self.cleanup_grace.as_millis() as u64,
            cleanup_bound_ms: self.cleanup_bound.as_millis() as u64,
            log_format: self.log_format.as_str().to_string(),
            log_level: self.log_level.clone(),
            suite: self.suite_path.clone(),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            cleanup_grace: self.cleanup_grace,
            cleanup_bound: self.cleanup_bound,
        }
    }

    /// `RUST_LOG` wins over the configured level when set.
    pub fn log_config(&self) -> LogConfig {
        let level = std::env::var("RUST_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.log_level.clone());
        LogConfig {
            format: self.log_format,
            level,
            output_path: None,
        }
    }
}

/// Declared limits of the sandbox under test. Reporting context and default
/// probe targets only; never enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SandboxLimits {
    pub memory_ceiling_bytes: Option<u64>,
    pub descriptor_ceiling: Option<u64>,
    /// `true` turns the egress probe into a control expected to connect.
    pub egress_allowed: Option<bool>,
}

impl SandboxLimits {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One `[[probes]]` entry of a suite definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProbeEntry {
    pub id: String,
    pub name: Option<String>,
    pub budget_ms: Option<u64>,
    pub expect: Option<String>,
    pub category: Option<String>,
    pub target_bytes: Option<u64>,
    pub chunk_bytes: Option<usize>,
    pub margin: Option<u64>,
    pub target_count: Option<u64>,
    pub endpoint: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub bind: Option<String>,
    pub targets: Option<Vec<PathBuf>>,
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub signal_mode: Option<SignalMode>,
}

impl ProbeEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Names of the probe-specific options set on this entry.
    pub fn options_set(&self) -> Vec<&'static str> {
        let mut set = Vec::new();
        if self.target_bytes.is_some() {
            set.push("target-bytes");
        }
        if self.chunk_bytes.is_some() {
            set.push("chunk-bytes");
        }
        if self.margin.is_some() {
            set.push("margin");
        }
        if self.target_count.is_some() {
            set.push("target-count");
        }
        if self.endpoint.is_some() {
            set.push("endpoint");
        }
        if self.connect_timeout_ms.is_some() {
            set.push("connect-timeout-ms");
        }
        if self.bind.is_some() {
            set.push("bind");
        }
        if self.targets.is_some() {
            set.push("targets");
        }
        if self.program.is_some() {
            set.push("program");
        }
        if !self.args.is_empty() {
            set.push("args");
        }
        if self.signal_mode.is_some() {
            set.push("signal-mode");
        }
        set
    }

    /// Expected-outcome hint. `none` clears it; absent keeps the probe default.
    pub fn expectation(&self) -> Result<Option<Option<OutcomeKind>>, ConfigError> {
        let Some(expect) = self.expect.as_deref() else {
            return Ok(None);
        };
        let kind = match expect {
            "blocked" => Some(OutcomeKind::Blocked),
            "succeeded" => Some(OutcomeKind::Succeeded),
            "inconclusive" => Some(OutcomeKind::Inconclusive),
            "crashed" => Some(OutcomeKind::Crashed),
            "none" => None,
            other => {
                return Err(ConfigError::invalid(
                    format!("probes.{}.expect", self.id),
                    format!("unknown outcome '{other}'"),
                ))
            }
        };
        Ok(Some(kind))
    }
}

/// A suite definition document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SuiteDefinition {
    pub budget_ms: Option<u64>,
    pub concurrent: Option<bool>,
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub category_filter: Vec<String>,
    #[serde(default)]
    pub sandbox: SandboxLimits,
    #[serde(default)]
    pub probes: Vec<ProbeEntry>,
}

impl SuiteDefinition {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Probe entries, falling back to the built-in suite when none are listed.
    pub fn entries(&self) -> Vec<ProbeEntry> {
        if self.probes.is_empty() {
            crate::probe::default_suite()
        } else {
            self.probes.clone()
        }
    }
}
