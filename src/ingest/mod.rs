// src/ingest/mod.rs
pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod report;
pub mod retry;
pub mod types;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::ingest::orchestrator::{Orchestrator, RunOutcome};
use crate::ingest::report::{RunReport, SourceReport};
use crate::ingest::types::PricingRecord;
use crate::store::PricingStore;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_passes_total", "Completed scrape passes.");
        describe_counter!("ingest_source_ok_total", "Sources that returned records.");
        describe_counter!(
            "ingest_source_failed_total",
            "Sources that failed after retries, fast-failed, panicked or were cancelled."
        );
        describe_counter!("ingest_fetch_attempts_total", "Adapter fetch attempts.");
        describe_counter!("ingest_retries_total", "Backoff waits before a retry.");
        describe_counter!("ingest_records_written_total", "Records upserted into the store.");
        describe_counter!("ingest_store_errors_total", "Record writes that failed.");
        describe_histogram!("ingest_fetch_ms", "Per-source fetch time in milliseconds, retries included.");
        describe_histogram!("ingest_parse_ms", "Single page load + extraction time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the scrape pass last finished."
        );
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize scraped text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();
    let untagged = RE_TAGS.replace_all(&decoded, "");

    let quoted = untagged
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let mut out = RE_WS.replace_all(&quoted, " ").trim().to_string();

    // Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// Write every successful source's records, one blocking writer per source.
/// Failed writes are counted, never retried, and never stop sibling writes.
pub async fn ingest_outcome(store: &Arc<PricingStore>, outcome: &RunOutcome) -> RunReport {
    ensure_metrics_described();

    let mut sources: BTreeMap<String, SourceReport> = BTreeMap::new();
    let mut writers = Vec::new();

    for (id, result) in &outcome.results {
        match result {
            Ok(success) => {
                let store = Arc::clone(store);
                let records = success.records.clone();
                let handle = tokio::task::spawn_blocking(move || write_records(&store, &records));
                writers.push((id.clone(), success.count(), success.attempts, handle));
            }
            Err(failure) => {
                sources.insert(
                    id.clone(),
                    SourceReport::Failed {
                        detail: failure.to_string(),
                        attempts: failure.attempts(),
                        transient: failure.is_transient(),
                    },
                );
            }
        }
    }

    for (id, fetched, attempts, handle) in writers {
        let (written, write_errors) = match handle.await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(target: "ingest", source = %id, error = %e, "store writer task failed");
                counter!("ingest_store_errors_total").increment(fetched as u64);
                (0, fetched)
            }
        };
        sources.insert(
            id,
            SourceReport::Ok {
                fetched,
                written,
                write_errors,
                attempts,
            },
        );
    }

    let finished_at = Utc::now();
    counter!("ingest_passes_total").increment(1);
    gauge!("ingest_pipeline_last_run_ts").set(finished_at.timestamp().max(0) as f64);

    RunReport {
        started_at: outcome.started_at,
        finished_at,
        observed_at: outcome.observed_at,
        sources,
    }
}

/// Records with distinct natural keys; a repeated key keeps its last occurrence,
/// the one an upsert sequence would leave behind.
fn distinct_by_key(records: &[PricingRecord]) -> Vec<&PricingRecord> {
    let mut seen = HashSet::new();
    let mut out: Vec<&PricingRecord> = records
        .iter()
        .rev()
        .filter(|r| seen.insert((r.source.as_str(), r.variant.as_str(), r.observed_at)))
        .collect();
    out.reverse();
    out
}

fn write_records(store: &PricingStore, records: &[PricingRecord]) -> (usize, usize) {
    let mut written = 0usize;
    let mut failed = 0usize;
    let distinct = distinct_by_key(records);
    if distinct.len() < records.len() {
        tracing::debug!(
            target: "ingest",
            duplicates = records.len() - distinct.len(),
            "collapsed records sharing a natural key"
        );
    }
    for r in distinct {
        match store.upsert(r) {
            Ok(()) => {
                written += 1;
                tracing::debug!(target: "ingest", source = %r.source, variant = %r.variant, "saved");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    target: "ingest",
                    source = %r.source,
                    variant = %r.variant,
                    error = %e,
                    "store write failed"
                );
            }
        }
    }
    counter!("ingest_records_written_total").increment(written as u64);
    counter!("ingest_store_errors_total").increment(failed as u64);
    (written, failed)
}

/// One full pass: fetch every registered source, then ingest what succeeded.
pub async fn run_pass(
    orchestrator: &Orchestrator,
    store: &Arc<PricingStore>,
    cancel: CancellationToken,
) -> RunReport {
    ensure_metrics_described();
    let outcome = orchestrator.run_until_cancelled(cancel).await;
    ingest_outcome(store, &outcome).await
}
