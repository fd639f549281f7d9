//! qBittorrent Web API client implementation.
//!
//! Adapted from the teacher's `downloaders::qbittorrent`: same cookie-jar
//! session tracking, auth-retry-once wrapper and circuit breaker, swapped
//! to inject raw `.torrent` bytes (the cross-seed dispatcher always has the
//! metainfo already fetched) and to compute infoHash instead of an md5
//! stand-in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::adapter::{BitTorrentClient, ClientTorrent, InjectParams};
use async_trait::async_trait;
use cross_seed_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use cross_seed_core::error::{CrossSeedError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct QBittorrentConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: u64,
}

impl Default for QBittorrentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            timeout: 30,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    authenticated: bool,
    last_auth_time: Option<std::time::Instant>,
}

#[derive(Debug)]
pub struct QBittorrentClient {
    config: QBittorrentConfig,
    client: Client,
    base_url: Url,
    session_state: Arc<RwLock<SessionState>>,
    circuit_breaker: CircuitBreaker,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTorrentInfo {
    hash: String,
    name: String,
    save_path: String,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("invalid base url: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .cookie_store(true)
            .build()
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("failed to build http client: {e}")))?;

        let circuit_breaker_config = CircuitBreakerConfig::new("qBittorrent")
            .with_failure_threshold(3)
            .with_timeout(Duration::from_secs(30))
            .with_request_timeout(Duration::from_secs(config.timeout))
            .with_success_threshold(1);

        Ok(Self {
            config,
            client,
            base_url,
            session_state: Arc::new(RwLock::new(SessionState::default())),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_config),
        })
    }

    async fn needs_authentication(&self) -> bool {
        let state = self.session_state.read().await;
        if !state.authenticated {
            return true;
        }
        match state.last_auth_time {
            Some(last_auth) => last_auth.elapsed() > Duration::from_secs(30 * 60),
            None => true,
        }
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        if self.needs_authentication().await {
            self.login().await?;
        }
        Ok(())
    }

    pub async fn login(&self) -> Result<()> {
        let login_url = self
            .base_url
            .join("api/v2/auth/login")
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("bad login url: {e}")))?;

        let mut form = HashMap::new();
        form.insert("username", &self.config.username);
        form.insert("password", &self.config.password);

        debug!(url = %login_url, "logging in to qBittorrent");

        let response = self
            .client
            .post(login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("login request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CrossSeedError::client(
                "qBittorrent",
                format!("login failed with status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("failed to read login response: {e}")))?;

        if body.to_lowercase().contains("fails") {
            return Err(CrossSeedError::client(
                "qBittorrent",
                "authentication failed: invalid credentials",
            ));
        }

        let mut state = self.session_state.write().await;
        state.authenticated = true;
        state.last_auth_time = Some(std::time::Instant::now());
        info!("logged in to qBittorrent");
        Ok(())
    }

    async fn reset_auth_state(&self) {
        let mut state = self.session_state.write().await;
        state.authenticated = false;
        state.last_auth_time = None;
    }

    fn is_auth_error(&self, error: &CrossSeedError) -> bool {
        let s = error.to_string().to_lowercase();
        s.contains("forbidden") || s.contains("unauthorized") || s.contains("403") || s.contains("login")
    }

    async fn add_torrent_internal(&self, params: &InjectParams) -> Result<()> {
        let add_url = self
            .base_url
            .join("api/v2/torrents/add")
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("bad add url: {e}")))?;

        let mut form = reqwest::multipart::Form::new().part(
            "torrents",
            reqwest::multipart::Part::bytes(params.torrent_bytes.clone())
                .file_name("torrent.torrent")
                .mime_str("application/x-bittorrent")
                .map_err(|e| CrossSeedError::client("qBittorrent", format!("bad mime type: {e}")))?,
        );

        form = form.text("savepath", params.save_path.clone());
        if let Some(category) = &params.category {
            form = form.text("category", category.clone());
        }
        if params.paused {
            form = form.text("paused", "true");
        }
        if params.skip_hash_check {
            form = form.text("skip_checking", "true");
        }

        debug!("adding torrent to qBittorrent");

        let response = self
            .client
            .post(add_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("add torrent request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CrossSeedError::client(
                "qBittorrent",
                format!("add torrent failed with status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("failed to read add response: {e}")))?;

        if body.is_empty() || body.to_lowercase().contains("ok") {
            info!("added torrent to qBittorrent");
            Ok(())
        } else {
            Err(CrossSeedError::client("qBittorrent", format!("add torrent rejected: {body}")))
        }
    }

    async fn get_torrents_internal(&self) -> Result<Vec<RawTorrentInfo>> {
        let url = self
            .base_url
            .join("api/v2/torrents/info")
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("bad torrents url: {e}")))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("get torrents request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CrossSeedError::client(
                "qBittorrent",
                format!("get torrents failed with status {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| CrossSeedError::client("qBittorrent", format!("failed to parse torrents response: {e}")))
    }

    pub async fn get_circuit_breaker_metrics(&self) -> cross_seed_core::CircuitBreakerMetrics {
        self.circuit_breaker.get_metrics().await
    }

    pub async fn is_healthy(&self) -> bool {
        self.circuit_breaker.is_healthy().await
    }
}

#[async_trait]
impl BitTorrentClient for QBittorrentClient {
    async fn add_torrent(&self, params: InjectParams) -> Result<String> {
        let info_hash = cross_seed_core::models::TorrentMetadata::parse(&params.torrent_bytes)
            .map(|m| m.info_hash)
            .map_err(|_| CrossSeedError::client("qBittorrent", "torrent bytes did not parse as valid bencode"))?;

        self.ensure_authenticated().await?;

        match self.add_torrent_internal(&params).await {
            Ok(()) => Ok(info_hash),
            Err(e) if self.is_auth_error(&e) => {
                warn!("authentication error on add_torrent, retrying with fresh login");
                self.reset_auth_state().await;
                self.ensure_authenticated().await?;
                self.add_torrent_internal(&params).await?;
                Ok(info_hash)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_torrents(&self) -> Result<Vec<ClientTorrent>> {
        self.ensure_authenticated().await?;

        let raw = match self.get_torrents_internal().await {
            Ok(raw) => raw,
            Err(e) if self.is_auth_error(&e) => {
                warn!("authentication error on get_torrents, retrying with fresh login");
                self.reset_auth_state().await;
                self.ensure_authenticated().await?;
                self.get_torrents_internal().await?
            }
            Err(e) => return Err(e),
        };

        Ok(raw
            .into_iter()
            .map(|t| ClientTorrent {
                info_hash: t.hash,
                name: t.name,
                save_path: t.save_path,
            })
            .collect())
    }

    async fn test_connection(&self) -> Result<()> {
        debug!("testing connection to qBittorrent");

        let base_url = self.base_url.clone();
        let client = self.client.clone();
        let username = self.config.username.clone();
        let password = self.config.password.clone();

        self.circuit_breaker
            .call(async move {
                let login_url = base_url
                    .join("api/v2/auth/login")
                    .map_err(|e| CrossSeedError::client("qBittorrent", format!("bad login url: {e}")))?;

                let mut form = HashMap::new();
                form.insert("username", &username);
                form.insert("password", &password);

                let response = client
                    .post(login_url)
                    .form(&form)
                    .send()
                    .await
                    .map_err(|e| CrossSeedError::client("qBittorrent", format!("login request failed: {e}")))?;

                if !response.status().is_success() {
                    return Err(CrossSeedError::client(
                        "qBittorrent",
                        format!("login failed with status {}", response.status()),
                    ));
                }

                Ok(())
            })
            .await?;

        info!("qBittorrent connection test succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_localhost() {
        let config = QBittorrentConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let config = QBittorrentConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(QBittorrentClient::new(config).is_err());
    }

    #[test]
    fn accepts_valid_base_url() {
        let config = QBittorrentConfig::default();
        assert!(QBittorrentClient::new(config).is_ok());
    }
}
