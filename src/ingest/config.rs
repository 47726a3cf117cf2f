// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::retry::RetryPolicy;
use crate::store::{DEFAULT_LATEST_LIMIT, DEFAULT_SEARCH_LIMIT};

pub const ENV_CONFIG_PATH: &str = "PRICING_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "PRICING_DB_PATH";
pub const ENV_MAX_ATTEMPTS: &str = "PRICING_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "PRICING_BASE_DELAY_MS";

fn default_db_path() -> PathBuf {
    PathBuf::from("pricing.db")
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_attempt_timeout_secs() -> u64 {
    30
}
fn default_sources() -> Vec<String> {
    vec!["OpenAI".to_string(), "Anthropic".to_string()]
}
fn default_latest_limit() -> usize {
    DEFAULT_LATEST_LIMIT
}
fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// 0 disables the per-attempt deadline.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_latest_limit")]
    pub latest_limit: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            sources: default_sources(),
            latest_limit: default_latest_limit(),
            search_limit: default_search_limit(),
        }
    }
}

impl IngestConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let timeout = (self.attempt_timeout_secs > 0)
            .then(|| Duration::from_secs(self.attempt_timeout_secs));
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_attempt_timeout(timeout)
    }

    /// Replace the source list, trimmed and de-duplicated like a file entry.
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = clean_list(sources.into_iter().map(Into::into).collect());
        self
    }

    fn sanitize(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self.latest_limit = self.latest_limit.max(1);
        self.search_limit = self.search_limit.max(1);
        self.sources = clean_list(std::mem::take(&mut self.sources));
        self
    }

    fn apply_env(mut self) -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_DB_PATH) {
            if !p.trim().is_empty() {
                self.db_path = PathBuf::from(p.trim());
            }
        }
        if let Ok(v) = std::env::var(ENV_MAX_ATTEMPTS) {
            self.max_attempts = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_ATTEMPTS}={v:?} is not a number"))?;
        }
        if let Ok(v) = std::env::var(ENV_BASE_DELAY_MS) {
            self.base_delay_ms = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BASE_DELAY_MS}={v:?} is not a number"))?;
        }
        Ok(self)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pricing config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing pricing config {}", path.display()))
}

/// Load from `path` when given, otherwise via [`load_config_default`].
/// Env overrides apply on both branches.
pub fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    match path {
        Some(p) => Ok(load_config_from(p)?.apply_env()?.sanitize()),
        None => load_config_default(),
    }
}

/// Load config using env var + fallbacks, then env overrides:
/// 1) $PRICING_CONFIG_PATH
/// 2) config/pricing.toml
/// 3) config/pricing.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<IngestConfig> {
    let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/pricing.toml");
        let json_p = PathBuf::from("config/pricing.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            IngestConfig::default()
        }
    };
    Ok(base.apply_env()?.sanitize())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    let parsed = match hint_ext {
        "toml" => toml::from_str::<IngestConfig>(s).map_err(anyhow::Error::from),
        "json" => serde_json::from_str::<IngestConfig>(s).map_err(anyhow::Error::from),
        // Unknown extension: JSON if it looks like an object, TOML otherwise.
        _ if s.trim_start().starts_with('{') => {
            serde_json::from_str::<IngestConfig>(s).map_err(anyhow::Error::from)
        }
        _ => toml::from_str::<IngestConfig>(s).map_err(anyhow::Error::from),
    };
    Ok(parsed?.sanitize())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|s| s == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_fill_defaults() {
        let toml = r#"
max_attempts = 5
sources = [" OpenAI ", "", "Catalogue", "OpenAI"]
"#;
        let cfg = parse_config(toml, "toml").unwrap();
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.sources, vec!["OpenAI".to_string(), "Catalogue".to_string()]);
        assert_eq!(cfg.base_delay_ms, 1_000);
        assert_eq!(cfg.db_path, PathBuf::from("pricing.db"));

        let json = r#"{"db_path": "/tmp/p.db", "max_attempts": 0}"#;
        let cfg = parse_config(json, "").unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/p.db"));
        assert_eq!(cfg.max_attempts, 1, "attempt budget floors at 1");
        assert_eq!(cfg.sources, default_sources());
    }

    #[test]
    fn retry_policy_from_config() {
        let cfg = IngestConfig {
            max_attempts: 4,
            base_delay_ms: 250,
            attempt_timeout_secs: 0,
            ..IngestConfig::default()
        };
        let p = cfg.retry_policy();
        assert_eq!(p.max_attempts, 4);
        assert_eq!(p.base_delay, Duration::from_millis(250));
        assert_eq!(p.attempt_timeout, None);
    }

    #[test]
    fn source_override_is_cleaned() {
        let cfg = IngestConfig::default().with_sources(["OpenAI", " Catalogue", "", "OpenAI "]);
        assert_eq!(cfg.sources, vec!["OpenAI".to_string(), "Catalogue".to_string()]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_config("max_attempts = \"many\"", "toml").is_err());
    }
}
