// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::ingest::orchestrator::{Orchestrator, RunOutcome, SourceSuccess};
pub use crate::ingest::report::{RunReport, SourceReport};
pub use crate::ingest::retry::{RetryPolicy, SourceFailure};
pub use crate::ingest::types::{AdapterError, PricingRecord, SourceAdapter};
pub use crate::store::{PricingStore, StoreError};
