// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! boundary-probe entry point.
//!
//! ## CLI Subcommands
//!
//! - `boundary-probe` or `boundary-probe run` - Run the probe suite (default)
//! - `boundary-probe list` - List built-in probes
//! - `boundary-probe env` - Show the host snapshot
//! - `boundary-probe config show|defaults|validate`

use std::process::ExitCode;

use boundary_probe::cli::{block_on_bounded, config_cmd, probes_cmd, run_cmd, EXIT_CONFIG_ERROR};
use boundary_probe::config;
use boundary_probe::probe::memory::{allocate_main, ALLOCATE_COMMAND};
use boundary_probe::telemetry::init_logging;

/// Run the suite with logging set up. Abandoned probe threads get at most the
/// cleanup bound once the verdict is in.
fn run_suite(args: &[String]) -> ExitCode {
    let env = config::load();
    if let Err(e) = init_logging(&env.log_config()) {
        eprintln!("Logging setup failed: {}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }
    match block_on_bounded(run_cmd::run(args), env.cleanup_bound) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Runtime setup failed: {}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("run");
    let rest = args.get(2..).unwrap_or_default();

    match command {
        "run" => run_suite(rest),
        // Child side of the memory-ceiling probe.
        cmd if cmd == ALLOCATE_COMMAND => ExitCode::from(allocate_main(rest)),
        "list" => {
            probes_cmd::run_list();
            ExitCode::SUCCESS
        }
        "env" => ExitCode::from(probes_cmd::run_env(rest)),
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("boundary-probe {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => {
                    let code = config_cmd::run_validate(args.get(3..).unwrap_or_default());
                    ExitCode::from(code)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::from(EXIT_CONFIG_ERROR)
                }
            }
        }
        // Bare options run the default command.
        flag if flag.starts_with("--") => run_suite(args.get(1..).unwrap_or_default()),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "boundary-probe - Sandbox boundary probes v{}

USAGE:
    boundary-probe [COMMAND] [OPTIONS]

COMMANDS:
    run          Run the probe suite (default when no command given)
    list         List built-in probes
    env          Show what the host reports about itself
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help          Show help for command
    -V, --version       Show version information
    -s, --suite FILE    Suite definition (TOML)
    -j, --journal FILE  Append results to a JSON-lines journal
    --json              Print the report as JSON

EXAMPLES:
    boundary-probe                            # Run the built-in suite
    boundary-probe run --suite suite.toml     # Run a declared suite
    boundary-probe run --json > report.json   # Machine-readable report
    boundary-probe run -j /var/tmp/probe.jsonl
    boundary-probe list                       # Built-in probes
    boundary-probe config validate -s suite.toml

ENVIRONMENT:
    BOUNDARY_PROBE_SUITE            Suite definition path
    BOUNDARY_PROBE_BUDGET_MS        Default per-probe budget (default: 10000)
    BOUNDARY_PROBE_MAX_WORKERS      Worker pool size (default: CPU count)
    BOUNDARY_PROBE_CONCURRENT       Run side-effect-free probes concurrently
    BOUNDARY_PROBE_CLEANUP_GRACE_MS Grace period after a timeout (default: 500)
    BOUNDARY_PROBE_CLEANUP_BOUND_MS Cleanup time limit (default: 5000)
    BOUNDARY_PROBE_LOG_FORMAT       json or pretty (default: json)
    BOUNDARY_PROBE_LOG_LEVEL        Log level (default: info)
    RUST_LOG                        Log filter, overrides the level

EXIT CODES:
    0  All boundaries held
    1  Boundary violations found
    2  Configuration error
    3  Indeterminate results
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "run" => {
            eprintln!(
                "boundary-probe run - Run the probe suite

USAGE:
    boundary-probe run [OPTIONS]

OPTIONS:
    -s, --suite FILE    Suite definition (default: BOUNDARY_PROBE_SUITE or built-in)
    -j, --journal FILE  Append each result to a JSON-lines journal as it completes
    --json              Print the report as JSON on stdout

DESCRIPTION:
    Runs every probe in the suite under its time budget, classifies each
    outcome as blocked, succeeded, inconclusive or crashed, and reduces
    them to a verdict. Logs go to stderr.

    Probes that can leave the host unusable (process control, privileged
    syscalls) run last in the built-in suite.

EXIT CODES:
    0  All boundaries held
    1  Boundary violations found
    2  Configuration error
    3  Indeterminate results

EXAMPLES:
    boundary-probe run
    boundary-probe run --suite /etc/boundary-probe/suite.toml --json
"
            );
        }
        "list" => {
            eprintln!(
                "boundary-probe list - List built-in probes

USAGE:
    boundary-probe list

DESCRIPTION:
    Shows each built-in probe identifier with its category, whether it is
    side-effect free (eligible for concurrent runs), whether it is
    destructive, and whether the built-in suite includes it.
"
            );
        }
        "env" => {
            eprintln!(
                "boundary-probe env - Show the host snapshot

USAGE:
    boundary-probe env [--json]

DESCRIPTION:
    Prints user, descriptor and address-space limits, host memory and
    CPU count as the process sees them. The same snapshot is attached to
    every report.
"
            );
        }
        "config" => {
            eprintln!(
                "boundary-probe config - Inspect configuration

USAGE:
    boundary-probe config <SUBCOMMAND>

SUBCOMMANDS:
    show      Show effective configuration
    defaults  Show default values
    validate  Validate a suite definition without running it

OPTIONS (validate):
    -s, --suite FILE  Suite definition to validate

EXIT CODES:
    0  Configuration is valid
    2  Configuration error

EXAMPLES:
    boundary-probe config show
    boundary-probe config validate --suite suite.toml
"
            );
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!();
            print_usage();
        }
    }
}
