// src/ingest/providers/anthropic.rs
use super::page::{PageAdapter, TierSpec};

pub const SOURCE_ID: &str = "Anthropic";
pub const PRICING_URL: &str = "https://www.anthropic.com/pricing";

pub fn tiers() -> Vec<TierSpec> {
    vec![
        TierSpec::usage(
            "Claude 3.5 Sonnet",
            "$0.003/1K tokens (input), $0.015/1K tokens (output)",
            "Rate limits by tier",
            "200K context, vision, JSON mode, tool use",
        ),
        TierSpec::usage(
            "Claude 3 Opus",
            "$0.015/1K tokens (input), $0.075/1K tokens (output)",
            "Rate limits by tier",
            "200K context, most capable, vision, tool use",
        ),
        TierSpec::usage(
            "Claude 3 Haiku",
            "$0.00025/1K tokens (input), $0.00125/1K tokens (output)",
            "Rate limits by tier",
            "200K context, fastest, most affordable",
        ),
    ]
}

pub fn adapter() -> PageAdapter {
    PageAdapter::new(SOURCE_ID, PRICING_URL, "claude", tiers())
}
