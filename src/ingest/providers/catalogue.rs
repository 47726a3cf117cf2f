// src/ingest/providers/catalogue.rs
//! Hand-maintained pricing set, served without network I/O.

use async_trait::async_trait;

use super::page::TierSpec;
use crate::ingest::types::{AdapterError, PricingRecord, SourceAdapter};

pub const SOURCE_ID: &str = "Catalogue";

/// One known tier of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    pub source: String,
    pub url: String,
    pub tier: TierSpec,
}

impl CatalogueEntry {
    pub fn new(source: &str, url: &str, tier: TierSpec) -> Self {
        Self {
            source: source.to_string(),
            url: url.to_string(),
            tier,
        }
    }
}

pub struct CatalogueAdapter {
    id: String,
    entries: Vec<CatalogueEntry>,
}

impl CatalogueAdapter {
    pub fn new(id: &str, entries: Vec<CatalogueEntry>) -> Self {
        Self {
            id: id.to_string(),
            entries,
        }
    }

    /// The seed set the first version of the service shipped with.
    pub fn known() -> Self {
        Self::new(SOURCE_ID, known_pricing())
    }

    pub fn entries(&self) -> &[CatalogueEntry] {
        &self.entries
    }
}

#[async_trait]
impl SourceAdapter for CatalogueAdapter {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, _source_id: &str) -> Result<Vec<PricingRecord>, AdapterError> {
        Ok(self
            .entries
            .iter()
            .map(|e| e.tier.to_record(&e.source, &e.url))
            .collect())
    }
}

pub fn known_pricing() -> Vec<CatalogueEntry> {
    vec![
        CatalogueEntry::new(
            "OpenAI GPT-4",
            "https://openai.com/pricing",
            TierSpec::usage(
                "API",
                "$0.03/1K tokens (input), $0.06/1K tokens (output)",
                "Rate limits vary by tier",
                "GPT-4 access, function calling, JSON mode",
            ),
        ),
        CatalogueEntry::new(
            "Anthropic Claude",
            "https://anthropic.com/pricing",
            TierSpec::usage(
                "API",
                "$0.015/1K tokens (input), $0.075/1K tokens (output)",
                "Rate limits by tier",
                "Claude 3.5 Sonnet, 200K context, vision",
            ),
        ),
        CatalogueEntry::new(
            "ElevenLabs",
            "https://elevenlabs.io/pricing",
            TierSpec::monthly(
                "Starter",
                5.0,
                "~$0.20/1K characters",
                "30,000 chars/month",
                "10 voices, 3 custom voices",
            ),
        ),
        CatalogueEntry::new(
            "ElevenLabs",
            "https://elevenlabs.io/pricing",
            TierSpec::monthly(
                "Creator",
                22.0,
                "~$0.055/1K characters",
                "100,000 chars/month",
                "30 voices, 10 custom voices, commercial license",
            ),
        ),
        CatalogueEntry::new(
            "Midjourney",
            "https://midjourney.com/pricing",
            TierSpec::monthly(
                "Basic",
                10.0,
                "~$0.30/image",
                "~200 images/month (3.3 GPU hours)",
                "Fast generations, member gallery access",
            ),
        ),
        CatalogueEntry::new(
            "Midjourney",
            "https://midjourney.com/pricing",
            TierSpec::monthly(
                "Standard",
                30.0,
                "~$0.20/image",
                "~900 images/month (15 GPU hours)",
                "Fast + Relax mode, stealth mode available",
            ),
        ),
    ]
}
