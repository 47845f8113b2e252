// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host snapshot: limits discovered on the machine running the suite.
//!
//! Recorded next to the declared sandbox limits for reporting context only.

use std::path::PathBuf;

use nix::sys::resource::{getrlimit, Resource, RLIM_INFINITY};
use nix::unistd::{getgid, getuid};
use serde::Serialize;

use crate::config::SandboxLimits;

const MEMINFO: &str = "/proc/meminfo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub hostname: Option<String>,
    pub uid: u32,
    pub gid: u32,
    pub cpu_count: usize,
    pub nofile_soft: Option<u64>,
    pub nofile_hard: Option<u64>,
    /// `None` when unlimited or unreadable.
    pub address_space_limit: Option<u64>,
    pub mem_total_bytes: Option<u64>,
    pub temp_dir: PathBuf,
}

fn limit(resource: Resource) -> (Option<u64>, Option<u64>) {
    let finite = |v: u64| (v != RLIM_INFINITY as u64).then_some(v);
    match getrlimit(resource) {
        Ok((soft, hard)) => (finite(soft as u64), finite(hard as u64)),
        Err(e) => {
            tracing::debug!(?resource, error = %e, "getrlimit failed");
            (None, None)
        }
    }
}

/// `MemTotal` from a `/proc/meminfo` document, in bytes.
pub fn parse_mem_total(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let mut fields = line.split_whitespace().skip(1);
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

impl HostSnapshot {
    pub fn capture() -> Self {
        let (nofile_soft, nofile_hard) = limit(Resource::RLIMIT_NOFILE);
        let (address_space_limit, _) = limit(Resource::RLIMIT_AS);
        let mem_total_bytes = std::fs::read_to_string(MEMINFO)
            .ok()
            .and_then(|text| parse_mem_total(&text));

        Self {
            hostname: hostname::get().ok().map(|h| h.to_string_lossy().into_owned()),
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
            cpu_count: num_cpus::get(),
            nofile_soft,
            nofile_hard,
            address_space_limit,
            mem_total_bytes,
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }

    /// Differences between declared limits and what the host reports.
    pub fn notes(&self, declared: &SandboxLimits) -> Vec<String> {
        let mut notes = Vec::new();
        if self.is_root() {
            notes.push("running as root; privileged probes are expected to succeed".to_string());
        }
        if let (Some(declared), Some(soft)) = (declared.descriptor_ceiling, self.nofile_soft) {
            if declared != soft {
                notes.push(format!(
                    "declared descriptor ceiling {declared} differs from soft RLIMIT_NOFILE {soft}"
                ));
            }
        }
        if let Some(ceiling) = declared.memory_ceiling_bytes {
            match (self.address_space_limit, self.mem_total_bytes) {
                (Some(limit), _) if limit > ceiling => notes.push(format!(
                    "address-space limit {limit} is above the declared memory ceiling {ceiling}"
                )),
                (None, Some(total)) if total > ceiling => notes.push(format!(
                    "no address-space limit; host memory {total} exceeds declared ceiling {ceiling}"
                )),
                _ => {}
            }
        }
        notes
    }
}
