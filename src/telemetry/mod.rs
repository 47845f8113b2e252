// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging, probe spans and security-event logging.

mod logging;
pub mod security_log;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use security_log::{log_security_event, SecurityEvent, SecuritySeverity};
pub use spans::{ProbeSpan, SpanExt};
