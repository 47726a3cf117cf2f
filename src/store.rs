// src/store.rs
//! SQLite-backed pricing store.
//!
//! One table, `pricing_tiers`, with a unique index on the natural key
//! `(source, variant, observed_at)`. Writes are single `INSERT OR REPLACE`
//! statements, so repeated or overlapping passes converge on one row per key.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::ingest::types::{observation_time, PricingRecord};

pub const DEFAULT_LATEST_LIMIT: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored timestamp {value:?} is not RFC 3339")]
    BadTimestamp { value: String },
    #[error("store connection mutex poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    TaskJoin(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One row of `list_sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub tier_count: usize,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pricing_tiers (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  source TEXT NOT NULL,
  variant TEXT NOT NULL,
  monthly_price REAL NULL,
  usage_price TEXT NULL,
  limits TEXT NOT NULL,
  features TEXT NOT NULL,
  reference_url TEXT NOT NULL,
  observed_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS pt_natural_key_idx
  ON pricing_tiers(source, variant, observed_at);
CREATE INDEX IF NOT EXISTS pt_source_observed_idx
  ON pricing_tiers(source, observed_at DESC);
"#;

const SELECT_COLUMNS: &str =
    "source, variant, monthly_price, usage_price, limits, features, reference_url, observed_at";

pub struct PricingStore {
    conn: Mutex<Connection>,
}

impl PricingStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // A missing parent surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // journal_mode returns a row, so it goes through query_row.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        Self::init(conn)
    }

    /// Private in-memory store, used by tests and demos.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert `record`, replacing any row with the same natural key.
    pub fn upsert(&self, record: &PricingRecord) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO pricing_tiers
               (source, variant, monthly_price, usage_price, limits, features, reference_url, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.source,
                record.variant,
                record.monthly_price,
                record.usage_price,
                record.limits,
                record.features,
                record.reference_url,
                format_ts(record.observed_at),
            ],
        )?;
        Ok(())
    }

    /// Most recent `limit` records for `source`, newest first. Ties on
    /// `observed_at` go to the most recently written row.
    pub fn latest(&self, source: &str, limit: usize) -> StoreResult<Vec<PricingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM pricing_tiers
             WHERE source = ?1
             ORDER BY observed_at DESC, id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![source, clamp_limit(limit)], read_row)?;
        collect_records(rows)
    }

    /// Distinct sources with their number of distinct variants, by name.
    pub fn list_sources(&self) -> StoreResult<Vec<SourceSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source, COUNT(DISTINCT variant) FROM pricing_tiers
             GROUP BY source
             ORDER BY source",
        )?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok(SourceSummary {
                name: row.get(0)?,
                tier_count: usize::try_from(count).unwrap_or(0),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive substring match over source name and features, newest first.
    pub fn search(&self, query: &str, limit: usize) -> StoreResult<Vec<PricingRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(query));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM pricing_tiers
             WHERE source LIKE ?1 ESCAPE '\\' OR features LIKE ?1 ESCAPE '\\'
             ORDER BY observed_at DESC, id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![pattern, clamp_limit(limit)], read_row)?;
        collect_records(rows)
    }

    /// Exact-key lookup.
    pub fn get(
        &self,
        source: &str,
        variant: &str,
        observed_at: DateTime<Utc>,
    ) -> StoreResult<Option<PricingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM pricing_tiers
             WHERE source = ?1 AND variant = ?2 AND observed_at = ?3"
        ))?;
        let row = stmt
            .query_row(params![source, variant, format_ts(observed_at)], read_row)
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM pricing_tiers", [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Flush and close. Dropping the store closes it too; this variant reports errors.
    pub fn close(self) -> StoreResult<()> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

/// Row as read from SQLite, before the timestamp is parsed.
struct RawRecord {
    source: String,
    variant: String,
    monthly_price: Option<f64>,
    usage_price: Option<String>,
    limits: String,
    features: String,
    reference_url: String,
    observed_at: String,
}

impl RawRecord {
    fn into_record(self) -> StoreResult<PricingRecord> {
        let observed_at = DateTime::parse_from_rfc3339(&self.observed_at)
            .map(|d| observation_time(d.with_timezone(&Utc)))
            .map_err(|_| StoreError::BadTimestamp {
                value: self.observed_at.clone(),
            })?;
        Ok(PricingRecord {
            source: self.source,
            variant: self.variant,
            monthly_price: self.monthly_price,
            usage_price: self.usage_price,
            limits: self.limits,
            features: self.features,
            reference_url: self.reference_url,
            observed_at,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        source: row.get(0)?,
        variant: row.get(1)?,
        monthly_price: row.get(2)?,
        usage_price: row.get(3)?,
        limits: row.get(4)?,
        features: row.get(5)?,
        reference_url: row.get(6)?,
        observed_at: row.get(7)?,
    })
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRecord>>,
) -> StoreResult<Vec<PricingRecord>> {
    let mut out = Vec::new();
    for raw in rows {
        out.push(raw?.into_record()?);
    }
    Ok(out)
}

pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    observation_time(at).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
