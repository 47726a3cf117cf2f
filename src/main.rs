//! Pricing Intel serving binary.
//! Boots the read-only Axum API over the pricing store.

use std::sync::Arc;

use pricing_intel::api::{self, AppState};
use pricing_intel::ingest::config::load_config_default;
use pricing_intel::logging::init_tracing;
use pricing_intel::metrics::Metrics;
use pricing_intel::store::PricingStore;
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let cfg = load_config_default()?;
    let store = PricingStore::open(&cfg.db_path).map_err(anyhow::Error::from)?;
    tracing::info!(target: "api", db = %cfg.db_path.display(), "pricing store opened");

    let metrics = Metrics::init()?;
    let router = api::router(AppState::new(Arc::new(store), &cfg)).merge(metrics.router());

    Ok(router.into())
}
