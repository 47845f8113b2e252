// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! `list` and `env` subcommands.

use super::{parse_args, EXIT_CONFIG_ERROR};
use crate::config::{ProbeEntry, SandboxLimits};
use crate::environment::HostSnapshot;
use crate::probe::{build_probe, default_suite, BUILTIN_PROBES};

/// One row of `list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeListing {
    pub id: &'static str,
    pub category: String,
    pub side_effect_free: bool,
    pub destructive: bool,
    pub in_default_suite: bool,
}

pub fn listings() -> Vec<ProbeListing> {
    let defaults: Vec<String> = default_suite().into_iter().map(|e| e.id).collect();
    BUILTIN_PROBES
        .iter()
        .copied()
        .map(|id| {
            let in_default_suite = defaults.iter().any(|d| d == id);
            match build_probe(&ProbeEntry::new(id), &SandboxLimits::default()) {
                Ok(probe) => {
                    let d = probe.describe();
                    ProbeListing {
                        id,
                        category: d.category.to_string(),
                        side_effect_free: d.side_effect_free,
                        destructive: d.category.is_destructive(),
                        in_default_suite,
                    }
                }
                // `command` takes its category from the suite entry.
                Err(_) => ProbeListing {
                    id,
                    category: "(declared)".to_string(),
                    side_effect_free: false,
                    destructive: false,
                    in_default_suite,
                },
            }
        })
        .collect()
}

pub fn run_list() {
    println!("{:<16} {:<20} {:<6} {:<12} DEFAULT", "ID", "CATEGORY", "PURE", "DESTRUCTIVE");
    for row in listings() {
        println!(
            "{:<16} {:<20} {:<6} {:<12} {}",
            row.id,
            row.category,
            yes_no(row.side_effect_free),
            yes_no(row.destructive),
            yes_no(row.in_default_suite),
        );
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn fmt_opt(value: Option<u64>) -> String {
    value.map_or_else(|| "unlimited".to_string(), |v| v.to_string())
}

/// Print the host snapshot. Accepts `--json`.
pub fn run_env(raw_args: &[String]) -> u8 {
    let args = match parse_args(raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    let host = HostSnapshot::capture();

    if args.json {
        match serde_json::to_string_pretty(&host) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_CONFIG_ERROR;
            }
        }
        return 0;
    }

    println!("hostname={}", host.hostname.as_deref().unwrap_or("unknown"));
    println!("uid={} gid={}", host.uid, host.gid);
    println!("cpu_count={}", host.cpu_count);
    println!("nofile_soft={}", fmt_opt(host.nofile_soft));
    println!("nofile_hard={}", fmt_opt(host.nofile_hard));
    println!("address_space_limit={}", fmt_opt(host.address_space_limit));
    println!("mem_total_bytes={}", fmt_opt(host.mem_total_bytes));
    println!("temp_dir={}", host.temp_dir.display());
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listings_cover_builtins() {
        let rows = listings();
        assert_eq!(rows.len(), BUILTIN_PROBES.len());

        let egress = rows.iter().find(|r| r.id == "egress").unwrap();
        assert_eq!(egress.category, "network");
        assert!(egress.side_effect_free);
        assert!(egress.in_default_suite);

        let command = rows.iter().find(|r| r.id == "command").unwrap();
        assert!(!command.in_default_suite);

        let listen = rows.iter().find(|r| r.id == "listen").unwrap();
        assert_eq!(listen.category, "network");
        assert!(listen.in_default_suite);
        let scratch = rows.iter().find(|r| r.id == "fs-writable").unwrap();
        assert_eq!(scratch.category, "filesystem");
    }

    #[test]
    fn test_destructive_probes_flagged() {
        let rows = listings();
        let kill = rows.iter().find(|r| r.id == "process-kill").unwrap();
        assert!(kill.destructive);
        let fs = rows.iter().find(|r| r.id == "fs-write").unwrap();
        assert!(!fs.destructive);
    }
}
