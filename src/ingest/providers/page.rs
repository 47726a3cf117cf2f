// src/ingest/providers/page.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::StatusCode;

use crate::ingest::normalize_text;
use crate::ingest::types::{AdapterError, PricingRecord, SourceAdapter};

/// Static description of one tier a page is expected to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct TierSpec {
    pub variant: String,
    pub monthly_price: Option<f64>,
    pub usage_price: Option<String>,
    pub limits: String,
    pub features: String,
}

impl TierSpec {
    /// Usage-priced tier with no flat monthly fee.
    pub fn usage(variant: &str, usage: &str, limits: &str, features: &str) -> Self {
        Self {
            variant: variant.to_string(),
            monthly_price: None,
            usage_price: Some(usage.to_string()),
            limits: limits.to_string(),
            features: features.to_string(),
        }
    }

    pub fn monthly(variant: &str, price: f64, usage: &str, limits: &str, features: &str) -> Self {
        Self {
            monthly_price: Some(price),
            ..Self::usage(variant, usage, limits, features)
        }
    }

    pub fn to_record(&self, source: &str, url: &str) -> PricingRecord {
        PricingRecord {
            monthly_price: self.monthly_price,
            usage_price: self
                .usage_price
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty()),
            ..PricingRecord::new(source, normalize_text(&self.variant))
                .with_limits(normalize_text(&self.limits))
                .with_features(normalize_text(&self.features))
                .with_reference_url(url)
        }
    }
}

enum Mode {
    Http { client: reqwest::Client, timeout: Duration },
    // Page body held in memory; no network.
    Fixture(String),
}

/// Adapter for one public pricing page: load it, check it still looks like the
/// page the tier table was written for, emit the tier table.
pub struct PageAdapter {
    source_id: String,
    url: String,
    marker: String,
    tiers: Vec<TierSpec>,
    mode: Mode,
}

impl PageAdapter {
    pub fn new(source_id: &str, url: &str, marker: &str, tiers: Vec<TierSpec>) -> Self {
        Self {
            source_id: source_id.to_string(),
            url: url.to_string(),
            marker: marker.to_string(),
            tiers,
            mode: Mode::Http {
                client: reqwest::Client::new(),
                timeout: Duration::from_secs(20),
            },
        }
    }

    pub fn from_fixture(
        source_id: &str,
        url: &str,
        marker: &str,
        tiers: Vec<TierSpec>,
        body: &str,
    ) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            ..Self::new(source_id, url, marker, tiers)
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        let timeout = match &self.mode {
            Mode::Http { timeout, .. } => *timeout,
            Mode::Fixture(_) => Duration::from_secs(20),
        };
        self.mode = Mode::Http { client, timeout };
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        if let Mode::Http { timeout, .. } = &mut self.mode {
            *timeout = Duration::from_secs(secs);
        }
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tiers(&self) -> &[TierSpec] {
        &self.tiers
    }

    async fn load_page(&self) -> Result<String, AdapterError> {
        let (client, timeout) = match &self.mode {
            Mode::Fixture(body) => return Ok(body.clone()),
            Mode::Http { client, timeout } => (client, *timeout),
        };

        let resp = client
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.classify(&e, "get"))?;

        let status = resp.status();
        if !status.is_success() {
            let cause = format!("HTTP {status} from {}", self.url);
            return Err(if is_retryable_status(status) {
                AdapterError::transient(&self.source_id, cause)
            } else {
                AdapterError::permanent(&self.source_id, cause)
            });
        }

        resp.text().await.map_err(|e| self.classify(&e, "read body"))
    }

    fn classify(&self, e: &reqwest::Error, op: &str) -> AdapterError {
        let cause = format!("{op} {}: {e}", self.url);
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            AdapterError::transient(&self.source_id, cause)
        } else {
            AdapterError::permanent(&self.source_id, cause)
        }
    }

    fn extract(&self, body: &str) -> Result<Vec<PricingRecord>, AdapterError> {
        let text = normalize_text(body).to_lowercase();
        let full = html_escape::decode_html_entities(body).to_lowercase();
        let marker = self.marker.to_lowercase();
        if !marker.is_empty() && !text.contains(&marker) && !full.contains(&marker) {
            return Err(AdapterError::permanent(
                &self.source_id,
                format!("markup mismatch: {:?} not found on {}", self.marker, self.url),
            ));
        }
        Ok(self
            .tiers
            .iter()
            .map(|t| t.to_record(&self.source_id, &self.url))
            .collect())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[async_trait]
impl SourceAdapter for PageAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self, _source_id: &str) -> Result<Vec<PricingRecord>, AdapterError> {
        let t0 = std::time::Instant::now();
        let body = self.load_page().await?;
        let out = self.extract(&body)?;
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "ingest",
            source = %self.source_id,
            tiers = out.len(),
            "scraped pricing page"
        );
        Ok(out)
    }
}
