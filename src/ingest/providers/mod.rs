// src/ingest/providers/mod.rs
pub mod anthropic;
pub mod catalogue;
pub mod openai;
pub mod page;

use std::sync::Arc;

use crate::ingest::config::IngestConfig;
use crate::ingest::orchestrator::Orchestrator;
use crate::ingest::types::SourceAdapter;

/// Built-in adapter for a configured source id (case-insensitive).
pub fn adapter_for(id: &str) -> Option<Arc<dyn SourceAdapter>> {
    match id.to_ascii_lowercase().as_str() {
        "openai" => Some(Arc::new(openai::adapter())),
        "anthropic" => Some(Arc::new(anthropic::adapter())),
        "catalogue" => Some(Arc::new(catalogue::CatalogueAdapter::known())),
        _ => None,
    }
}

/// Adapters for every configured source id that has a built-in implementation.
pub fn build_registry(cfg: &IngestConfig) -> Vec<Arc<dyn SourceAdapter>> {
    cfg.sources
        .iter()
        .filter_map(|id| {
            let adapter = adapter_for(id);
            if adapter.is_none() {
                tracing::warn!(target: "ingest", source = %id, "unknown source in config; skipped");
            }
            adapter
        })
        .collect()
}

pub fn build_orchestrator(cfg: &IngestConfig) -> Orchestrator {
    let mut orch = Orchestrator::new(cfg.retry_policy());
    for adapter in build_registry(cfg) {
        orch.register(adapter);
    }
    orch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_skips_unknown_ids() {
        let cfg = IngestConfig {
            sources: vec!["openai".into(), "Nope".into(), "Catalogue".into()],
            ..IngestConfig::default()
        };
        assert_eq!(build_registry(&cfg).len(), 2);
        let orch = build_orchestrator(&cfg);
        assert_eq!(orch.sources(), vec!["Catalogue", "OpenAI"]);
    }
}
