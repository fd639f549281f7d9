//! Immutable application configuration.
//!
//! `AppConfig` is built once at startup from a config file plus CLI/env
//! overrides, then cloned into every component's constructor. There is no
//! process-wide singleton; components that need configuration take an
//! `AppConfig` (or a narrower sub-config) by value or reference.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub name: String,
    pub url: String,
    pub apikey: String,
    pub requests_per_interval: u32,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrConfig {
    pub name: String,
    pub url: String,
    pub apikey: String,
    pub kind: ArrKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrKind {
    Sonarr,
    Radarr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    Save,
    Inject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientKind {
    QBittorrent,
    Transmission,
    Deluge,
    RTorrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub kind: ClientKind,
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Fractional size tolerance, e.g. 0.025 for 2.5%.
    pub size_fuzz: f64,
    pub partial_match_enabled: bool,
    /// Fraction of a candidate's size that must be covered to accept MATCH_PARTIAL.
    pub partial_threshold: f64,
    pub size_only_match_enabled: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            size_fuzz: 0.025,
            partial_match_enabled: true,
            partial_threshold: 1.0,
            size_only_match_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Duration after which a DOWNLOAD_FAILED decision is re-checked.
    pub download_failed_recheck: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            download_failed_recheck: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub link_dir: PathBuf,
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub indexers: Vec<IndexerConfig>,
    pub arrs: Vec<ArrConfig>,
    pub matcher: MatcherConfig,
    pub retention: RetentionConfig,
    pub dispatch_mode: DispatchMode,
    pub client: Option<ClientConfig>,
    pub allow_cross_device_copy_fallback: bool,
    /// Ceiling for the CLIENT_ERROR dispatch-retry backoff (§4.8).
    #[serde(default = "default_dispatch_retry_ceiling")]
    pub dispatch_retry_ceiling: Duration,
    pub search_cadence: Duration,
    pub search_concurrency: usize,
    pub http_bind_address: String,
    pub log_json: bool,
}

fn default_dispatch_retry_ceiling() -> Duration {
    Duration::from_secs(3600)
}

impl AppConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.indexers.is_empty() {
            return Err("at least one indexer must be configured".to_string());
        }
        for indexer in &self.indexers {
            if indexer.apikey.trim().is_empty() {
                return Err(format!("indexer '{}' is missing an apikey", indexer.name));
            }
        }
        if matches!(self.dispatch_mode, DispatchMode::Inject) && self.client.is_none() {
            return Err("dispatch_mode is Inject but no client is configured".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_apikey() {
        let cfg = AppConfig {
            paths: PathsConfig {
                data_dir: "/tmp/data".into(),
                output_dir: "/tmp/out".into(),
                link_dir: "/tmp/link".into(),
                database_path: "/tmp/db.sqlite".into(),
            },
            indexers: vec![IndexerConfig {
                name: "indexer1".into(),
                url: "http://localhost".into(),
                apikey: "".into(),
                requests_per_interval: 5,
                interval_seconds: 10,
            }],
            arrs: vec![],
            matcher: MatcherConfig::default(),
            retention: RetentionConfig::default(),
            dispatch_mode: DispatchMode::Save,
            client: None,
            allow_cross_device_copy_fallback: false,
            dispatch_retry_ceiling: Duration::from_secs(3600),
            search_cadence: Duration::from_secs(600),
            search_concurrency: 4,
            http_bind_address: "127.0.0.1:9117".into(),
            log_json: false,
        };

        assert!(cfg.validate().is_err());
    }
}
