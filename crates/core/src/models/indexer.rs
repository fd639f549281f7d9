//! IndexerRecord: the configured, rate-limited Torznab source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexerCapabilities {
    pub supports_textual: bool,
    pub supports_tvsearch: bool,
    pub supports_moviesearch: bool,
    pub supports_imdbid: bool,
    pub supports_tmdbid: bool,
    pub supports_tvdbid: bool,
}

/// A Torznab category this indexer advertised on its last `t=caps` probe,
/// with our inferred media type ("movie", "tv", "other") — persisted so the
/// pipeline doesn't need to reprobe every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerCategory {
    pub indexer_id: i64,
    pub category_id: i64,
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerRecord {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub apikey: String,
    pub active: bool,
    pub capabilities: Option<IndexerCapabilities>,
    pub requests_per_interval: u32,
    pub interval_seconds: u64,
    pub disabled_until: Option<DateTime<Utc>>,
    /// Current backoff duration, carried forward so repeated failures keep
    /// doubling instead of resetting to the floor on every call.
    pub current_backoff: Option<Duration>,
}

impl IndexerRecord {
    pub fn new(id: i64, name: impl Into<String>, url: impl Into<String>, apikey: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            apikey: apikey.into(),
            active: true,
            capabilities: None,
            requests_per_interval: 5,
            interval_seconds: 10,
            disabled_until: None,
            current_backoff: None,
        }
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.active && self.disabled_until.map(|t| now >= t).unwrap_or(true)
    }
}
