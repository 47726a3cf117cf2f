// src/ingest/providers/openai.rs
use super::page::{PageAdapter, TierSpec};

pub const SOURCE_ID: &str = "OpenAI";
pub const PRICING_URL: &str = "https://openai.com/api/pricing/";

pub fn tiers() -> Vec<TierSpec> {
    vec![
        TierSpec::usage(
            "GPT-4",
            "$0.03/1K tokens (input), $0.06/1K tokens (output)",
            "Rate limits vary by tier",
            "GPT-4 access, function calling, JSON mode",
        ),
        TierSpec::usage(
            "GPT-3.5 Turbo",
            "$0.0005/1K tokens (input), $0.0015/1K tokens (output)",
            "Rate limits vary by tier",
            "Fast, cost-effective, good for simple tasks",
        ),
    ]
}

pub fn adapter() -> PageAdapter {
    PageAdapter::new(SOURCE_ID, PRICING_URL, "pricing", tiers())
}
