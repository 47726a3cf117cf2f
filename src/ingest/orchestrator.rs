// src/ingest/orchestrator.rs
//! Runs every registered adapter concurrently, one retry-wrapped call per source.
//!
//! Each source is its own Tokio task. A failure (or panic) in one task is recorded
//! against that source and never reaches its siblings. `run*` returns only after
//! every task has reached a terminal state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ingest::retry::{retry, Attempted, RetryPolicy, SourceFailure};
use crate::ingest::types::{observation_time, PricingRecord, SourceAdapter};

/// Records one source produced in a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSuccess {
    pub records: Vec<PricingRecord>,
    pub attempts: u32,
}

impl SourceSuccess {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

pub type SourceResult = Result<SourceSuccess, SourceFailure>;

/// Result of one pass, keyed by source id.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Observation time stamped on every record of this pass.
    pub observed_at: DateTime<Utc>,
    pub results: BTreeMap<String, SourceResult>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }

    pub fn records_fetched(&self) -> usize {
        self.successes().map(|(_, s)| s.count()).sum()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &SourceSuccess)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().ok().map(|s| (id.as_str(), s)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SourceFailure)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|f| (id.as_str(), f)))
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceResult> {
        self.results.get(source_id)
    }
}

pub struct Orchestrator {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
    policy: RetryPolicy,
}

impl Orchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            adapters: BTreeMap::new(),
            policy,
        }
    }

    /// Register an adapter under its `source_id`. A second adapter with the
    /// same id replaces the first.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        let id = adapter.source_id().to_string();
        if self.adapters.insert(id.clone(), adapter).is_some() {
            tracing::warn!(target: "ingest", source = %id, "adapter replaced");
        }
        self
    }

    pub fn with_adapter<A: SourceAdapter + 'static>(mut self, adapter: A) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    pub fn sources(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One pass over every registered source.
    pub async fn run(&self) -> RunOutcome {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// One pass over every registered source; sources still in flight when
    /// `cancel` fires are recorded as [`SourceFailure::Cancelled`].
    pub async fn run_until_cancelled(&self, cancel: CancellationToken) -> RunOutcome {
        let ids: Vec<String> = self.adapters.keys().cloned().collect();
        self.run_sources(ids, cancel).await
    }

    /// One pass over the given source ids. Ids without a registered adapter
    /// fail non-transiently with zero attempts.
    pub async fn run_sources<I, S>(&self, sources: I, cancel: CancellationToken) -> RunOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let started_at = Utc::now();
        let observed_at = observation_time(started_at);
        let mut results: BTreeMap<String, SourceResult> = BTreeMap::new();
        let mut handles: Vec<(String, JoinHandle<Result<Attempted<Vec<PricingRecord>>, SourceFailure>>)> =
            Vec::new();

        for id in sources {
            let id = id.as_ref().to_string();
            if results.contains_key(&id) || handles.iter().any(|(h, _)| *h == id) {
                continue;
            }
            let Some(adapter) = self.adapters.get(&id).cloned() else {
                tracing::warn!(target: "ingest", source = %id, "no adapter registered");
                results.insert(
                    id.clone(),
                    Err(SourceFailure::NonTransient {
                        source_id: id,
                        attempts: 0,
                        cause: "no adapter registered".to_string(),
                    }),
                );
                continue;
            };
            let handle = tokio::spawn(run_source(
                id.clone(),
                adapter,
                self.policy,
                cancel.child_token(),
            ));
            handles.push((id, handle));
        }

        tracing::info!(
            target: "ingest",
            sources = handles.len(),
            "running scrapers"
        );

        // Barrier: every task reaches a terminal state before we report.
        for (id, handle) in handles {
            let result = match handle.await {
                Ok(Ok(done)) => {
                    let records = done
                        .value
                        .into_iter()
                        .map(|r| r.observed(observed_at))
                        .collect::<Vec<_>>();
                    tracing::info!(
                        target: "ingest",
                        source = %id,
                        records = records.len(),
                        attempts = done.attempts,
                        "source finished"
                    );
                    counter!("ingest_source_ok_total").increment(1);
                    Ok(SourceSuccess {
                        records,
                        attempts: done.attempts,
                    })
                }
                Ok(Err(failure)) => Err(failure),
                Err(join_err) if join_err.is_panic() => Err(SourceFailure::Panicked {
                    source_id: id.clone(),
                    detail: panic_message(join_err.into_panic()),
                }),
                Err(_) => Err(SourceFailure::Cancelled {
                    source_id: id.clone(),
                }),
            };
            if let Err(f) = &result {
                tracing::error!(target: "ingest", source = %id, error = %f, "scraper failed");
                counter!("ingest_source_failed_total").increment(1);
            }
            results.insert(id, result);
        }

        RunOutcome {
            started_at,
            finished_at: Utc::now(),
            observed_at,
            results,
        }
    }
}

async fn run_source(
    id: String,
    adapter: Arc<dyn SourceAdapter>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> Result<Attempted<Vec<PricingRecord>>, SourceFailure> {
    let t0 = std::time::Instant::now();
    let out = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceFailure::Cancelled { source_id: id.clone() }),
        r = retry(&id, &policy, || adapter.fetch(&id)) => r,
    };
    histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    out
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
