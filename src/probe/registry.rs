// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resolves suite-definition entries into concrete probes.

use std::sync::Arc;
use std::time::Duration;

use super::{
    Category, CommandProbe, EgressProbe, FdLimitProbe, FsWriteProbe, ListenProbe, MemoryProbe,
    PrivilegedProbe, Probe, ProcessProbe, ScratchProbe,
};
use crate::config::{ProbeEntry, SandboxLimits};
use crate::error::ConfigError;

/// Identifiers accepted in `[[probes]] id`.
pub const BUILTIN_PROBES: [&str; 9] = [
    "memory-ceiling",
    "fd-ceiling",
    "privileged-ops",
    "process-kill",
    "egress",
    "listen",
    "fs-writable",
    "fs-write",
    "command",
];

/// Built-in suite order. Probes that can take the host down run last.
const DEFAULT_ORDER: [&str; 8] = [
    "egress",
    "listen",
    "fs-writable",
    "fs-write",
    "memory-ceiling",
    "fd-ceiling",
    "process-kill",
    "privileged-ops",
];

pub fn default_suite() -> Vec<ProbeEntry> {
    DEFAULT_ORDER.iter().map(|id| ProbeEntry::new(*id)).collect()
}

/// Options each probe id accepts, beyond the common ones.
fn accepted_options(id: &str) -> &'static [&'static str] {
    match id {
        "memory-ceiling" => &["target-bytes", "chunk-bytes"],
        "fd-ceiling" => &["margin", "target-count"],
        "process-kill" => &["signal-mode"],
        "egress" => &["endpoint", "connect-timeout-ms"],
        "listen" => &["bind"],
        "fs-writable" | "fs-write" => &["targets"],
        "command" => &["program", "args"],
        _ => &[],
    }
}

fn field(entry: &ProbeEntry, option: &str) -> String {
    format!("probes.{}.{option}", entry.id)
}

fn check_options(entry: &ProbeEntry) -> Result<(), ConfigError> {
    let accepted = accepted_options(&entry.id);
    match entry.options_set().into_iter().find(|o| !accepted.contains(o)) {
        Some(option) => Err(ConfigError::invalid(
            field(entry, option),
            format!("not an option of {}", entry.id),
        )),
        None => Ok(()),
    }
}

fn check_category(entry: &ProbeEntry, fixed: Category) -> Result<(), ConfigError> {
    match entry.category.as_deref() {
        None => Ok(()),
        Some(declared) => {
            let declared: Category = declared.parse()?;
            if declared == fixed {
                Ok(())
            } else {
                Err(ConfigError::invalid(
                    field(entry, "category"),
                    format!("{} probes are always {fixed}", entry.id),
                ))
            }
        }
    }
}

fn nonzero<T: PartialEq + Default>(entry: &ProbeEntry, option: &str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        Err(ConfigError::invalid(field(entry, option), "must be greater than zero"))
    } else {
        Ok(value)
    }
}

fn targets(entry: &ProbeEntry) -> Result<Option<Vec<std::path::PathBuf>>, ConfigError> {
    match &entry.targets {
        Some(targets) if targets.is_empty() => {
            Err(ConfigError::invalid(field(entry, "targets"), "must not be empty"))
        }
        targets => Ok(targets.clone()),
    }
}

fn fixed_category(id: &str) -> Option<Category> {
    match id {
        "memory-ceiling" => Some(Category::Memory),
        "fd-ceiling" => Some(Category::ResourceLimit),
        "privileged-ops" => Some(Category::PrivilegedSyscall),
        "process-kill" => Some(Category::ProcessControl),
        "egress" | "listen" => Some(Category::Network),
        "fs-writable" | "fs-write" => Some(Category::Filesystem),
        _ => None,
    }
}

/// Build the probe an entry names. Declared sandbox limits supply default
/// targets where the entry gives none.
pub fn build_probe(entry: &ProbeEntry, sandbox: &SandboxLimits) -> Result<Arc<dyn Probe>, ConfigError> {
    if !BUILTIN_PROBES.contains(&entry.id.as_str()) {
        return Err(ConfigError::UnknownProbe(entry.id.clone()));
    }
    check_options(entry)?;
    if let Some(category) = fixed_category(&entry.id) {
        check_category(entry, category)?;
    }
    let name = entry.name.clone().unwrap_or_else(|| entry.id.clone());

    let probe: Arc<dyn Probe> = match entry.id.as_str() {
        "memory-ceiling" => {
            let mut probe = match entry.target_bytes {
                Some(target) => MemoryProbe::new(nonzero(entry, "target-bytes", target)?),
                None => MemoryProbe::for_ceiling(sandbox.memory_ceiling_bytes),
            };
            if let Some(chunk) = entry.chunk_bytes {
                probe = probe.chunk_bytes(nonzero(entry, "chunk-bytes", chunk)?);
            }
            Arc::new(probe.isolated().named(name))
        }
        "fd-ceiling" => {
            let mut probe = FdLimitProbe::new();
            if let Some(ceiling) = sandbox.descriptor_ceiling {
                probe = probe.soft_limit(ceiling);
            }
            if let Some(margin) = entry.margin {
                probe = probe.margin(margin);
            }
            if let Some(target) = entry.target_count {
                probe = probe.target(nonzero(entry, "target-count", target)?);
            }
            Arc::new(probe.named(name))
        }
        "privileged-ops" => Arc::new(PrivilegedProbe::standard().named(name)),
        "process-kill" => {
            Arc::new(ProcessProbe::new(entry.signal_mode.unwrap_or_default()).named(name))
        }
        "egress" => {
            let mut probe = match &entry.endpoint {
                Some(endpoint) if endpoint.trim().is_empty() => {
                    return Err(ConfigError::invalid(field(entry, "endpoint"), "must not be empty"))
                }
                Some(endpoint) => EgressProbe::new(endpoint.clone()),
                None => EgressProbe::default(),
            };
            if let Some(ms) = entry.connect_timeout_ms {
                probe = probe.connect_timeout(Duration::from_millis(nonzero(
                    entry,
                    "connect-timeout-ms",
                    ms,
                )?));
            }
            let allowed = sandbox.egress_allowed.unwrap_or(false);
            Arc::new(probe.allowed(allowed).named(name))
        }
        "listen" => {
            let probe = match &entry.bind {
                Some(bind) if bind.trim().is_empty() => {
                    return Err(ConfigError::invalid(field(entry, "bind"), "must not be empty"))
                }
                Some(bind) => ListenProbe::new(bind.clone()),
                None => ListenProbe::default(),
            };
            Arc::new(probe.named(name))
        }
        "fs-writable" => {
            let probe = match targets(entry)? {
                Some(targets) => ScratchProbe::new(targets),
                None => ScratchProbe::default(),
            };
            Arc::new(probe.named(name))
        }
        "fs-write" => {
            let probe = match targets(entry)? {
                Some(targets) => FsWriteProbe::new(targets),
                None => FsWriteProbe::default(),
            };
            Arc::new(probe.named(name))
        }
        "command" => {
            let program = entry
                .program
                .clone()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| ConfigError::invalid(field(entry, "program"), "required"))?;
            let category: Category = entry
                .category
                .as_deref()
                .ok_or_else(|| ConfigError::invalid(field(entry, "category"), "required"))?
                .parse()?;
            Arc::new(CommandProbe::new(name, category, program).args(entry.args.clone()))
        }
        other => return Err(ConfigError::UnknownProbe(other.to_string())),
    };
    Ok(probe)
}
