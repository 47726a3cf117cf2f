// src/ingest/report.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-source line of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceReport {
    Ok {
        fetched: usize,
        written: usize,
        write_errors: usize,
        attempts: u32,
    },
    Failed {
        detail: String,
        attempts: Option<u32>,
        transient: bool,
    },
}

/// Summary of one pass: what was fetched, what was written, what failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.sources
            .values()
            .filter(|s| matches!(s, SourceReport::Ok { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.sources.len() - self.succeeded()
    }

    pub fn records_ingested(&self) -> usize {
        self.sources
            .values()
            .map(|s| match s {
                SourceReport::Ok { written, .. } => *written,
                SourceReport::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn write_errors(&self) -> usize {
        self.sources
            .values()
            .map(|s| match s {
                SourceReport::Ok { write_errors, .. } => *write_errors,
                SourceReport::Failed { .. } => 0,
            })
            .sum()
    }

    /// A pass succeeds when some source succeeded and something was written.
    pub fn is_success(&self) -> bool {
        self.succeeded() > 0 && self.records_ingested() > 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn log(&self) {
        for (source, line) in &self.sources {
            match line {
                SourceReport::Ok {
                    fetched,
                    written,
                    write_errors,
                    attempts,
                } => tracing::info!(
                    target: "ingest",
                    source = %source,
                    fetched,
                    written,
                    write_errors,
                    attempts,
                    "source ok"
                ),
                SourceReport::Failed {
                    detail,
                    attempts,
                    transient,
                } => tracing::warn!(
                    target: "ingest",
                    source = %source,
                    attempts = ?attempts,
                    transient,
                    detail = %detail,
                    "source failed"
                ),
            }
        }

        let elapsed_ms = (self.finished_at - self.started_at).num_milliseconds();
        if self.is_success() {
            tracing::info!(
                target: "ingest",
                succeeded = self.succeeded(),
                failed = self.failed(),
                records = self.records_ingested(),
                elapsed_ms,
                "scraped and saved pricing tiers"
            );
        } else {
            tracing::warn!(
                target: "ingest",
                succeeded = self.succeeded(),
                failed = self.failed(),
                elapsed_ms,
                "no pricing data collected"
            );
        }
    }
}
