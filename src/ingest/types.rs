// src/ingest/types.rs
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One pricing tier of one source, as observed at `observed_at`.
///
/// `(source, variant, observed_at)` is the natural key; the store enforces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingRecord {
    pub source: String,  // e.g. "OpenAI", "ElevenLabs"
    pub variant: String, // e.g. "API", "Creator"
    pub monthly_price: Option<f64>,
    pub usage_price: Option<String>, // e.g. "$0.10/image"
    pub limits: String,
    pub features: String,
    pub reference_url: String,
    pub observed_at: DateTime<Utc>, // whole seconds, UTC
}

impl PricingRecord {
    /// Record stamped with the current time (whole seconds).
    pub fn new(source: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            variant: variant.into(),
            monthly_price: None,
            usage_price: None,
            limits: String::new(),
            features: String::new(),
            reference_url: String::new(),
            observed_at: observation_time(Utc::now()),
        }
    }

    pub fn with_monthly_price(mut self, price: f64) -> Self {
        self.monthly_price = Some(price);
        self
    }

    pub fn with_usage_price(mut self, usage: impl Into<String>) -> Self {
        self.usage_price = Some(usage.into());
        self
    }

    pub fn with_limits(mut self, limits: impl Into<String>) -> Self {
        self.limits = limits.into();
        self
    }

    pub fn with_features(mut self, features: impl Into<String>) -> Self {
        self.features = features.into();
        self
    }

    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        self.reference_url = url.into();
        self
    }

    pub fn observed(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = observation_time(at);
        self
    }
}

/// Truncate to second precision, the resolution of the natural key.
pub fn observation_time(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

/// Failure raised by a source adapter. Adapters classify `transient` themselves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{source_id}: {cause}")]
pub struct AdapterError {
    pub source_id: String,
    pub cause: String,
    pub transient: bool,
}

impl AdapterError {
    pub fn transient(source_id: impl Into<String>, cause: impl ToString) -> Self {
        Self {
            source_id: source_id.into(),
            cause: cause.to_string(),
            transient: true,
        }
    }

    pub fn permanent(source_id: impl Into<String>, cause: impl ToString) -> Self {
        Self {
            source_id: source_id.into(),
            cause: cause.to_string(),
            transient: false,
        }
    }
}

/// Pluggable extraction capability for one source.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier this adapter is registered under.
    fn source_id(&self) -> &str;

    async fn fetch(&self, source_id: &str) -> Result<Vec<PricingRecord>, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn observation_time_drops_subseconds() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        let rec = PricingRecord::new("OpenAI", "API").observed(at);
        assert_eq!(
            rec.observed_at,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap()
        );
    }

    #[test]
    fn adapter_error_constructors_classify() {
        let e = AdapterError::transient("Beta", "connection reset");
        assert!(e.transient);
        assert_eq!(e.to_string(), "Beta: connection reset");
        let p = AdapterError::permanent("Gamma", "markup mismatch");
        assert!(!p.transient);
    }
}
