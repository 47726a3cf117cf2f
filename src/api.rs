// src/api.rs
//! Read-only HTTP surface over the pricing store.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::ingest::config::IngestConfig;
use crate::ingest::types::PricingRecord;
use crate::store::{PricingStore, SourceSummary, StoreError, StoreResult};

/// Upper bound for `?limit=` on `/pricing/{source}`.
pub const MAX_LATEST_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PricingStore>,
    pub latest_limit: usize,
    pub search_limit: usize,
}

impl AppState {
    pub fn new(store: Arc<PricingStore>, cfg: &IngestConfig) -> Self {
        Self {
            store,
            latest_limit: cfg.latest_limit,
            search_limit: cfg.search_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/services", get(list_services))
        .route("/pricing/{source}", get(get_pricing))
        .route("/search", get(search_pricing))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::NotFound(d) => (StatusCode::NOT_FOUND, d),
            Self::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            Self::Internal(d) => {
                tracing::error!(target: "api", error = %d, "store read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, d)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Run a store read on the blocking pool.
async fn read_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&PricingStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let rows = tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))??;
    Ok(rows)
}

async fn index() -> Json<serde_json::Value> {
    counter!("api_requests_total", "endpoint" => "index").increment(1);
    Json(json!({
        "name": "Pricing Intel API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/services": "List all tracked services",
            "/pricing/{service}": "Get pricing for a specific service",
            "/search?q=query": "Search pricing data",
        }
    }))
}

#[derive(Serialize)]
struct ServicesOut {
    services: Vec<SourceSummary>,
    total: usize,
}

async fn list_services(State(state): State<AppState>) -> Result<Json<ServicesOut>, ApiError> {
    counter!("api_requests_total", "endpoint" => "services").increment(1);
    let services = read_store(&state, |s| s.list_sources()).await?;
    Ok(Json(ServicesOut {
        total: services.len(),
        services,
    }))
}

#[derive(Deserialize)]
struct PricingParams {
    limit: Option<usize>,
}

async fn get_pricing(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(params): Query<PricingParams>,
) -> Result<Json<Vec<PricingRecord>>, ApiError> {
    counter!("api_requests_total", "endpoint" => "pricing").increment(1);
    let limit = params
        .limit
        .unwrap_or(state.latest_limit)
        .clamp(1, MAX_LATEST_LIMIT);
    let lookup = source.clone();
    let rows = read_store(&state, move |s| s.latest(&lookup, limit)).await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!("No pricing data for {source}")));
    }
    Ok(Json(rows))
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Serialize)]
struct SearchOut {
    results: Vec<PricingRecord>,
    count: usize,
}

async fn search_pricing(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchOut>, ApiError> {
    counter!("api_requests_total", "endpoint" => "search").increment(1);
    let q = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter `q` is required".to_string()))?;
    let limit = state.search_limit;
    let results = read_store(&state, move |s| s.search(&q, limit)).await?;
    Ok(Json(SearchOut {
        count: results.len(),
        results,
    }))
}
