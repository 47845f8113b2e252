// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config subcommands: show, defaults, validate.
//!
//! These read the environment and suite definition without running probes.

use super::run_cmd::load_suite;
use super::{parse_args, EXIT_CONFIG_ERROR};
use crate::config::{self, EffectiveConfig, DEFAULT_BUDGET_MS, DEFAULT_CLEANUP_BOUND_MS, DEFAULT_CLEANUP_GRACE_MS};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    print!("{}", format_config(&config::load().effective_config()));
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("BOUNDARY_PROBE_BUDGET_MS={DEFAULT_BUDGET_MS}");
    println!("BOUNDARY_PROBE_MAX_WORKERS={}", num_cpus::get());
    println!("BOUNDARY_PROBE_CONCURRENT=false");
    println!("BOUNDARY_PROBE_CLEANUP_GRACE_MS={DEFAULT_CLEANUP_GRACE_MS}");
    println!("BOUNDARY_PROBE_CLEANUP_BOUND_MS={DEFAULT_CLEANUP_BOUND_MS}");
    println!("BOUNDARY_PROBE_LOG_FORMAT=json");
    println!("BOUNDARY_PROBE_LOG_LEVEL=info");
}

/// Validate the suite definition without running it.
///
/// Returns 0 if valid, 2 on a configuration fault.
pub fn run_validate(raw_args: &[String]) -> u8 {
    let args = match parse_args(raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    let env = config::load();
    match load_suite(&args, &env) {
        Ok(suite) => {
            println!("Suite is valid: {} probes", suite.len());
            for scheduled in suite.probes() {
                let d = scheduled.descriptor();
                println!(
                    "  {} ({}, budget {}ms)",
                    d.name,
                    d.category,
                    scheduled.budget().as_millis()
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_CONFIG_ERROR
        }
    }
}

fn format_config(cfg: &EffectiveConfig) -> String {
    let suite = cfg
        .suite
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!(
        "BOUNDARY_PROBE_BUDGET_MS={}\n\
         BOUNDARY_PROBE_MAX_WORKERS={}\n\
         BOUNDARY_PROBE_CONCURRENT={}\n\
         BOUNDARY_PROBE_CLEANUP_GRACE_MS={}\n\
         BOUNDARY_PROBE_CLEANUP_BOUND_MS={}\n\
         BOUNDARY_PROBE_LOG_FORMAT={}\n\
         BOUNDARY_PROBE_LOG_LEVEL={}\n\
         BOUNDARY_PROBE_SUITE={}\n",
        cfg.budget_ms,
        cfg.max_workers,
        cfg.concurrent,
        cfg.cleanup_grace_ms,
        cfg.cleanup_bound_ms,
        cfg.log_format,
        cfg.log_level,
        suite,
    )
}
