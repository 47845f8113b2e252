// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Incremental report journal.
//!
//! Each entry is written and synced as soon as its probe finishes, so a probe
//! that takes the host down still leaves the earlier results on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::verdict::{OutcomeCounts, ReportEntry, SuiteReport, Verdict};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to open journal {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Failed to write journal: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to encode journal record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for report entries as they become available.
pub trait ReportSink: Send {
    /// Record the entry at `index` in suite order.
    fn record(&mut self, run_id: Uuid, index: usize, entry: &ReportEntry) -> Result<(), JournalError>;

    /// Record the final verdict.
    fn finish(&mut self, report: &SuiteReport) -> Result<(), JournalError>;
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "kebab-case")]
enum JournalRecord<'a> {
    Entry {
        run_id: Uuid,
        index: usize,
        entry: &'a ReportEntry,
    },
    Verdict {
        run_id: Uuid,
        verdict: Verdict,
        counts: OutcomeCounts,
    },
}

/// Appends one JSON object per line.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| JournalError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, record: &JournalRecord<'_>) -> Result<(), JournalError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

impl ReportSink for JsonLinesSink {
    fn record(&mut self, run_id: Uuid, index: usize, entry: &ReportEntry) -> Result<(), JournalError> {
        self.append(&JournalRecord::Entry {
            run_id,
            index,
            entry,
        })
    }

    fn finish(&mut self, report: &SuiteReport) -> Result<(), JournalError> {
        self.append(&JournalRecord::Verdict {
            run_id: report.run_id(),
            verdict: report.verdict(),
            counts: report.counts(),
        })
    }
}
