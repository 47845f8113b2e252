// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities for suite and probe tracing.

use tracing::{info_span, Span};

use crate::outcome::Outcome;
use crate::runner::CleanupStatus;

/// Extension trait for recording probe results into a span.
pub trait SpanExt {
    fn record_outcome(&self, outcome: &Outcome, cleanup: CleanupStatus);
}

impl SpanExt for Span {
    fn record_outcome(&self, outcome: &Outcome, cleanup: CleanupStatus) {
        self.record("outcome", outcome.kind.as_str());
        self.record("elapsed_ms", outcome.elapsed.as_millis() as u64);
        self.record("cleanup", format!("{cleanup:?}").as_str());
    }
}

/// Factory for standardized probe spans.
pub struct ProbeSpan;

impl ProbeSpan {
    /// `outcome`, `elapsed_ms` and `cleanup` are filled in by
    /// [`SpanExt::record_outcome`].
    pub fn new(run_id: &str, probe: &str, category: &str) -> Span {
        info_span!(
            "probe",
            run_id = %run_id,
            probe = %probe,
            category = %category,
            outcome = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
            cleanup = tracing::field::Empty,
        )
    }
}
