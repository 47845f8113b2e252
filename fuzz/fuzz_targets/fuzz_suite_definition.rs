//! Fuzz target for suite definition parsing.
//!
//! Arbitrary documents must resolve to a suite or a configuration error,
//! never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use boundary_probe::config::EnvConfig;
use boundary_probe::telemetry::LogFormat;
use boundary_probe::{Suite, SuiteDefinition};
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(definition) = SuiteDefinition::parse(text) else {
        return;
    };
    let env = EnvConfig {
        default_budget: Duration::from_secs(1),
        max_workers: 2,
        concurrent: false,
        cleanup_grace: Duration::from_millis(100),
        cleanup_bound: Duration::from_secs(1),
        log_format: LogFormat::Json,
        log_level: "off".into(),
        suite_path: None,
    };
    let _ = Suite::from_definition(&definition, &env);
});
