//! Torznab protocol client: capability probing, search dispatch, and
//! per-indexer rate limiting/backoff.
//!
//! Grounded on the teacher's Prowlarr client (`prowlarr.rs`): same sliding
//! window rate limiter shape and request/response handling idiom, response
//! parsing replaced with the real Torznab XML parser in `xml.rs`.

use crate::xml::parse_search_response;
use chrono::Utc;
use cross_seed_core::models::IndexerCategory;
use cross_seed_core::{Candidate, CrossSeedError, IndexerCapabilities, IndexerRecord, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A sliding-window rate limiter: at most `max_requests` calls are allowed
/// within any `window` duration. Overflow blocks the caller.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    timestamps: Mutex<Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(Vec::new()),
        }
    }

    /// Block until a token is available, then record the call.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                timestamps.retain(|t| now.duration_since(*t) < self.window);

                if timestamps.len() < self.max_requests as usize {
                    timestamps.push(now);
                    None
                } else {
                    let oldest = timestamps[0];
                    Some(self.window.saturating_sub(now.duration_since(oldest)))
                }
            };

            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub mode: SearchMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Search,
    TvSearch,
    MovieSearch,
}

impl SearchMode {
    fn as_torznab_t(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::TvSearch => "tvsearch",
            Self::MovieSearch => "movie",
        }
    }
}

/// Torznab client for a single configured indexer.
pub struct TorznabClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl TorznabClient {
    pub fn new(requests_per_interval: u32, interval: Duration, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("cross-seed/1.0")
            .build()?;
        Ok(Self {
            http,
            rate_limiter: RateLimiter::new(requests_per_interval, interval),
        })
    }

    /// `t=caps`: discover supported search modes and ID types.
    pub async fn probe(&self, indexer: &IndexerRecord) -> Result<IndexerCapabilities> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/api?t=caps&apikey={}", indexer.url.trim_end_matches('/'), indexer.apikey);
        let response = self.http.get(&url).send().await.map_err(|e| {
            CrossSeedError::transient_indexer(&indexer.name, format!("caps request failed: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CrossSeedError::PermanentIndexerError {
                indexer: indexer.name.clone(),
                message: format!("caps probe returned {status}"),
            });
        }
        if !status.is_success() {
            return Err(CrossSeedError::transient_indexer(
                &indexer.name,
                format!("caps probe returned {status}"),
            ));
        }

        Ok(parse_caps(&body))
    }

    /// Probe `t=caps` and return both the capability flags and the
    /// categories the indexer advertises, for `indexer_category` persistence.
    pub async fn probe_categories(&self, indexer: &IndexerRecord) -> Result<Vec<IndexerCategory>> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/api?t=caps&apikey={}", indexer.url.trim_end_matches('/'), indexer.apikey);
        let response = self.http.get(&url).send().await.map_err(|e| {
            CrossSeedError::transient_indexer(&indexer.name, format!("caps request failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(CrossSeedError::transient_indexer(
                &indexer.name,
                format!("caps probe returned {}", response.status()),
            ));
        }

        let body = response.text().await.unwrap_or_default();
        Ok(parse_caps_categories(&body, indexer.id))
    }

    /// Issue a Torznab search and parse the response into candidates.
    pub async fn search(&self, indexer: &IndexerRecord, query: &SearchQuery) -> Result<Vec<Candidate>> {
        self.rate_limiter.acquire().await;

        let mut url = format!(
            "{}/api?t={}&apikey={}",
            indexer.url.trim_end_matches('/'),
            query.mode.as_torznab_t(),
            indexer.apikey
        );
        if let Some(text) = &query.text {
            url.push_str(&format!("&q={}", urlencoding::encode(text)));
        }
        if let Some(v) = &query.imdb_id {
            url.push_str(&format!("&imdbid={v}"));
        }
        if let Some(v) = &query.tmdb_id {
            url.push_str(&format!("&tmdbid={v}"));
        }
        if let Some(v) = &query.tvdb_id {
            url.push_str(&format!("&tvdbid={v}"));
        }
        if let Some(v) = query.season {
            url.push_str(&format!("&season={v}"));
        }
        if let Some(v) = query.episode {
            url.push_str(&format!("&ep={v}"));
        }

        debug!(indexer = %indexer.name, "issuing torznab search");

        let response = self.http.get(&url).send().await.map_err(|e| {
            CrossSeedError::transient_indexer(&indexer.name, format!("search request failed: {e}"))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(indexer = %indexer.name, "rate limited by indexer");
            return Err(CrossSeedError::TransientIndexerError {
                indexer: indexer.name.clone(),
                message: "429 too many requests".to_string(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CrossSeedError::PermanentIndexerError {
                indexer: indexer.name.clone(),
                message: format!("search returned {status}"),
            });
        }
        if !status.is_success() {
            return Err(CrossSeedError::transient_indexer(
                &indexer.name,
                format!("search returned {status}"),
            ));
        }

        let body = response.text().await.map_err(|e| {
            CrossSeedError::transient_indexer(&indexer.name, format!("failed reading body: {e}"))
        })?;

        parse_search_response(&body, indexer.id, &indexer.name)
    }
}

/// Extract `<category id=".." name="..">` elements from a `t=caps` response
/// body, inferring each category's media type from its advertised name.
/// Uses `quick_xml` rather than substring scraping since categories nest
/// (a `<subcat>` inside a `<category>`) and a crude scan can't tell them apart.
fn parse_caps_categories(body: &str, indexer_id: i64) -> Vec<IndexerCategory> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut categories = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.name().as_ref().rsplit(|&b| b == b':').next().unwrap_or(e.name().as_ref()).to_vec();
                if local != b"category" && local != b"subcat" {
                    continue;
                }

                let mut id = None;
                let mut name = None;
                for attr in e.attributes().flatten() {
                    let key = attr.key.as_ref();
                    let value = attr.unescape_value().unwrap_or_default().into_owned();
                    if key == b"id" {
                        id = value.parse::<i64>().ok();
                    } else if key == b"name" {
                        name = Some(value);
                    }
                }

                if let (Some(id), Some(name)) = (id, name) {
                    categories.push(IndexerCategory {
                        indexer_id,
                        category_id: id,
                        media_type: infer_media_type(&name),
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    categories
}

fn infer_media_type(category_name: &str) -> String {
    let lower = category_name.to_lowercase();
    if lower.contains("tv") {
        "tv".to_string()
    } else if lower.contains("movie") {
        "movie".to_string()
    } else {
        "other".to_string()
    }
}

fn parse_caps(body: &str) -> IndexerCapabilities {
    let lower = body.to_lowercase();
    IndexerCapabilities {
        supports_textual: lower.contains("search") || true,
        supports_tvsearch: lower.contains("tv-search") || lower.contains("tvsearch"),
        supports_moviesearch: lower.contains("movie-search") || lower.contains("moviesearch"),
        supports_imdbid: lower.contains("imdbid"),
        supports_tmdbid: lower.contains("tmdbid"),
        supports_tvdbid: lower.contains("tvdbid"),
    }
}

/// Backs off an indexer after a transient/permanent failure; resets on
/// success. Doubling backoff up to a ceiling, per SPEC_FULL.md §4.3. Reads
/// and writes `indexer.current_backoff` so consecutive failures keep
/// doubling instead of resetting to the floor on every call.
pub fn apply_backoff(indexer: &mut IndexerRecord, ceiling: Duration) -> Duration {
    let next = indexer
        .current_backoff
        .map(|d| (d * 2).min(ceiling))
        .unwrap_or(Duration::from_secs(30))
        .min(ceiling);
    indexer.current_backoff = Some(next);
    indexer.disabled_until = Some(Utc::now() + chrono::Duration::from_std(next).unwrap_or_default());
    next
}

pub fn reset_backoff(indexer: &mut IndexerRecord) {
    indexer.disabled_until = None;
    indexer.current_backoff = None;
}

/// Shared, cloneable handle so multiple pipeline tasks can use one client.
pub type SharedTorznabClient = Arc<TorznabClient>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_blocks_until_window_clears() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut indexer = IndexerRecord::new(1, "test", "http://x", "key");
        let ceiling = Duration::from_secs(300);
        let first = apply_backoff(&mut indexer, ceiling);
        assert_eq!(first, Duration::from_secs(30));
        let second = apply_backoff(&mut indexer, ceiling);
        assert_eq!(second, Duration::from_secs(60));
    }

    #[test]
    fn caps_categories_parses_ids_and_infers_media_type() {
        let body = r#"
            <caps>
              <categories>
                <category id="2000" name="Movies">
                  <subcat id="2040" name="Movies/HD" />
                </category>
                <category id="5000" name="TV" />
              </categories>
            </caps>
        "#;
        let categories = parse_caps_categories(body, 1);
        assert_eq!(categories.len(), 3);
        assert!(categories.iter().any(|c| c.category_id == 2000 && c.media_type == "movie"));
        assert!(categories.iter().any(|c| c.category_id == 2040 && c.media_type == "movie"));
        assert!(categories.iter().any(|c| c.category_id == 5000 && c.media_type == "tv"));
    }
}
