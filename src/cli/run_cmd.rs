// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! `run` subcommand: load a suite, run it, print the report.

use super::{exit_code, parse_args, render, CliArgs, CliError, EXIT_CONFIG_ERROR};
use crate::config::{self, EnvConfig, SuiteDefinition};
use crate::journal::JsonLinesSink;
use crate::runner::ProbeRunner;
use crate::scheduler::{Suite, SuiteScheduler};
use crate::verdict::SuiteReport;

/// Resolve the suite from `--suite`, then `BOUNDARY_PROBE_SUITE`, then the
/// built-in suite.
pub fn load_suite(args: &CliArgs, env: &EnvConfig) -> Result<Suite, CliError> {
    let definition = match args.suite.as_ref().or(env.suite_path.as_ref()) {
        Some(path) => SuiteDefinition::from_path(path)?,
        None => SuiteDefinition::default(),
    };
    Ok(Suite::from_definition(&definition, env)?)
}

pub async fn execute(args: &CliArgs, env: &EnvConfig) -> Result<SuiteReport, CliError> {
    let suite = load_suite(args, env)?;
    let mut scheduler = SuiteScheduler::new(ProbeRunner::new(env.runner_config()));
    if let Some(path) = &args.journal {
        scheduler = scheduler.with_journal(Box::new(JsonLinesSink::open(path)?));
    }
    Ok(scheduler.run(&suite).await)
}

/// Returns the process exit code.
pub async fn run(raw_args: &[String]) -> u8 {
    let args = match parse_args(raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    let env = config::load();

    let report = match execute(&args, &env).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {}", CliError::from(e));
                return EXIT_CONFIG_ERROR;
            }
        }
    } else {
        print!("{}", render::text(&report));
    }
    exit_code(report.verdict())
}
