// tests/ingest_orchestrator.rs
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pricing_intel::ingest::orchestrator::Orchestrator;
use pricing_intel::{AdapterError, PricingRecord, RetryPolicy, SourceAdapter, SourceFailure};
use tokio_util::sync::CancellationToken;

struct Fixed {
    id: &'static str,
    n: usize,
    delay: Duration,
}

#[async_trait]
impl SourceAdapter for Fixed {
    fn source_id(&self) -> &str {
        self.id
    }
    async fn fetch(&self, source_id: &str) -> Result<Vec<PricingRecord>, AdapterError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok((0..self.n)
            .map(|i| {
                PricingRecord::new(source_id, format!("Tier {i}"))
                    .with_limits("none")
                    .with_features("everything")
            })
            .collect())
    }
}

struct Failing {
    id: &'static str,
    transient: bool,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl SourceAdapter for Failing {
    fn source_id(&self) -> &str {
        self.id
    }
    async fn fetch(&self, source_id: &str) -> Result<Vec<PricingRecord>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AdapterError {
            source_id: source_id.to_string(),
            cause: "boom".to_string(),
            transient: self.transient,
        })
    }
}

struct Panicking;

#[async_trait]
impl SourceAdapter for Panicking {
    fn source_id(&self) -> &str {
        "Panicky"
    }
    async fn fetch(&self, _source_id: &str) -> Result<Vec<PricingRecord>, AdapterError> {
        panic!("selector not found")
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(1))
}

fn fixed(id: &'static str, n: usize) -> Fixed {
    Fixed {
        id,
        n,
        delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn all_sources_succeed_and_counts_add_up() {
    let orch = Orchestrator::new(policy())
        .with_adapter(fixed("Alpha", 2))
        .with_adapter(fixed("Beta", 3))
        .with_adapter(fixed("Delta", 0));

    let out = orch.run().await;
    assert_eq!(out.succeeded(), 3);
    assert_eq!(out.failed(), 0);
    assert_eq!(out.records_fetched(), 5);

    // one pass = one observation time
    for (_, s) in out.successes() {
        assert_eq!(s.attempts, 1);
        assert!(s.records.iter().all(|r| r.observed_at == out.observed_at));
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_isolated_and_exhausts_budget() {
    let calls = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::new(policy())
        .with_adapter(fixed("Alpha", 2))
        .with_adapter(Failing {
            id: "Beta",
            transient: true,
            calls: calls.clone(),
        });

    let t0 = tokio::time::Instant::now();
    let out = orch.run().await;

    assert_eq!(out.get("Alpha").unwrap().as_ref().unwrap().count(), 2);
    match out.get("Beta").unwrap() {
        Err(SourceFailure::RetryExhausted { attempts, .. }) => assert_eq!(*attempts, 3),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // waits of 1s then 2s before attempts 2 and 3
    let elapsed = t0.elapsed();
    assert!(
        elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3_050),
        "elapsed {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn non_transient_failure_gets_one_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let orch = Orchestrator::new(policy())
        .with_adapter(fixed("Alpha", 1))
        .with_adapter(Failing {
            id: "Gamma",
            transient: false,
            calls: calls.clone(),
        });

    let out = orch.run().await;
    let gamma = out.get("Gamma").unwrap().as_ref().unwrap_err();
    assert!(matches!(gamma, SourceFailure::NonTransient { attempts: 1, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(out.get("Alpha").unwrap().is_ok());
}

#[tokio::test]
async fn panicking_adapter_is_contained() {
    let orch = Orchestrator::new(policy())
        .with_adapter(fixed("Alpha", 2))
        .with_adapter(Panicking);

    let out = orch.run().await;
    assert!(out.get("Alpha").unwrap().is_ok());
    match out.get("Panicky").unwrap() {
        Err(SourceFailure::Panicked { detail, .. }) => assert!(detail.contains("selector")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn sources_run_concurrently() {
    let orch = Orchestrator::new(policy())
        .with_adapter(Fixed {
            id: "Slow1",
            n: 1,
            delay: Duration::from_secs(10),
        })
        .with_adapter(Fixed {
            id: "Slow2",
            n: 1,
            delay: Duration::from_secs(10),
        });

    let t0 = tokio::time::Instant::now();
    let out = orch.run().await;
    assert_eq!(out.succeeded(), 2);
    let elapsed = t0.elapsed();
    assert!(
        elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11),
        "sources ran one after another: {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_finished_sources() {
    let orch = Orchestrator::new(policy())
        .with_adapter(fixed("Fast", 2))
        .with_adapter(Fixed {
            id: "Hanging",
            n: 1,
            delay: Duration::from_secs(3_600),
        });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let out = orch.run_until_cancelled(cancel).await;
    assert_eq!(out.get("Fast").unwrap().as_ref().unwrap().count(), 2);
    let hanging = out.get("Hanging").unwrap().as_ref().unwrap_err();
    assert!(matches!(hanging, SourceFailure::Cancelled { .. }));
    assert!(hanging.is_transient());
}

#[tokio::test]
async fn unknown_source_id_fails_without_attempts() {
    let orch = Orchestrator::new(policy()).with_adapter(fixed("Alpha", 1));
    let out = orch
        .run_sources(["Alpha", "Nowhere", "Alpha"], CancellationToken::new())
        .await;
    assert_eq!(out.results.len(), 2);
    assert_eq!(out.get("Nowhere").unwrap().as_ref().unwrap_err().attempts(), Some(0));
}
