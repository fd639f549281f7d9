//! The action dispatcher: takes an accepted match and either saves the
//! `.torrent` to disk or injects it into a BitTorrent client.
//!
//! New orchestration code grounded on the staged, typed-result sequencing of
//! `pipeline.rs` (scan → analyze → hardlink → rename, one struct per stage
//! output) adapted to the state machine named in the action-dispatch design:
//! `PENDING → LINKING → INJECTING → (SUCCESS | CONFLICT | CLIENT_ERROR)`.

use crate::hardlink_manager::{HardlinkConfig, HardlinkManager};
use cross_seed_clients::{BitTorrentClient, InjectParams};
use cross_seed_core::error::{CrossSeedError, Result};
use cross_seed_core::models::{Searchee, TorrentMetadata};
use cross_seed_core::{DispatchMode, PathsConfig};
use sha1::{Digest, Sha1};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    Linking,
    Injecting,
    Success,
    Conflict,
    ClientError,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub state: DispatchState,
    pub info_hash: String,
    pub saved_path: Option<PathBuf>,
    pub message: Option<String>,
}

pub struct ActionDispatcher {
    mode: DispatchMode,
    paths: PathsConfig,
    hardlink_manager: HardlinkManager,
    client: Option<Arc<dyn BitTorrentClient>>,
    allow_cross_device_copy_fallback: bool,
}

impl ActionDispatcher {
    pub fn new(
        mode: DispatchMode,
        paths: PathsConfig,
        client: Option<Arc<dyn BitTorrentClient>>,
        allow_cross_device_copy_fallback: bool,
    ) -> Self {
        let hardlink_manager = HardlinkManager::new(HardlinkConfig {
            copy_fallback: allow_cross_device_copy_fallback,
            ..HardlinkConfig::default()
        });

        Self {
            mode,
            paths,
            hardlink_manager,
            client,
            allow_cross_device_copy_fallback,
        }
    }

    #[instrument(skip(self, torrent_bytes, metadata), fields(info_hash = %metadata.info_hash))]
    pub async fn dispatch(
        &self,
        searchee: &Searchee,
        metadata: &TorrentMetadata,
        torrent_bytes: &[u8],
    ) -> Result<DispatchOutcome> {
        match self.mode {
            DispatchMode::Save => self.save(metadata, torrent_bytes).await,
            DispatchMode::Inject => self.inject(searchee, metadata, torrent_bytes).await,
        }
    }

    async fn save(&self, metadata: &TorrentMetadata, torrent_bytes: &[u8]) -> Result<DispatchOutcome> {
        fs::create_dir_all(&self.paths.output_dir)
            .await
            .map_err(|e| CrossSeedError::client("filesystem", format!("failed to create output dir: {e}")))?;

        let mut path = self.paths.output_dir.join(format!("{}.torrent", sanitize(&metadata.name)));
        if fs::metadata(&path).await.is_ok() {
            let suffix = short_hash(&metadata.info_hash);
            path = self
                .paths
                .output_dir
                .join(format!("{}.[{suffix}].torrent", sanitize(&metadata.name)));
        }

        fs::write(&path, torrent_bytes)
            .await
            .map_err(|e| CrossSeedError::client("filesystem", format!("failed to write torrent file: {e}")))?;

        info!(path = %path.display(), "saved torrent file");

        Ok(DispatchOutcome {
            state: DispatchState::Success,
            info_hash: metadata.info_hash.clone(),
            saved_path: Some(path),
            message: None,
        })
    }

    async fn inject(
        &self,
        searchee: &Searchee,
        metadata: &TorrentMetadata,
        torrent_bytes: &[u8],
    ) -> Result<DispatchOutcome> {
        let Some(client) = &self.client else {
            return Err(CrossSeedError::configuration(
                "dispatch mode is INJECT but no client is configured",
            ));
        };

        debug!(state = ?DispatchState::Linking, "entering LINKING");

        let expected_path = self.paths.link_dir.join(sanitize(&searchee.name));
        match (&searchee.source_path, expected_path.exists()) {
            (_, true) => {}
            (None, false) => {
                warn!("searchee has no known source path, skipping link step");
            }
            (Some(source_path), false) => {
                if let Err(e) = self.hardlink_manager.create_hardlink(source_path, &expected_path).await {
                    if !self.allow_cross_device_copy_fallback {
                        return Ok(DispatchOutcome {
                            state: DispatchState::ClientError,
                            info_hash: metadata.info_hash.clone(),
                            saved_path: None,
                            message: Some(format!("linking failed: {e}")),
                        });
                    }
                    warn!(error = %e, "hardlink failed even with copy fallback allowed");
                }
            }
        }

        debug!(state = ?DispatchState::Injecting, "entering INJECTING");

        if client.check_exists(&metadata.info_hash).await.unwrap_or(false) {
            return Ok(DispatchOutcome {
                state: DispatchState::Conflict,
                info_hash: metadata.info_hash.clone(),
                saved_path: None,
                message: Some("infoHash already present in client".to_string()),
            });
        }

        let params = InjectParams {
            torrent_bytes: torrent_bytes.to_vec(),
            save_path: expected_path.to_string_lossy().to_string(),
            category: None,
            paused: false,
            skip_hash_check: true,
        };

        match client.add_torrent(params).await {
            Ok(info_hash) => {
                info!(info_hash = %info_hash, "injected torrent into client");
                Ok(DispatchOutcome {
                    state: DispatchState::Success,
                    info_hash,
                    saved_path: None,
                    message: None,
                })
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.to_lowercase().contains("already") || msg.to_lowercase().contains("duplicate") {
                    Ok(DispatchOutcome {
                        state: DispatchState::Conflict,
                        info_hash: metadata.info_hash.clone(),
                        saved_path: None,
                        message: Some(msg),
                    })
                } else {
                    Ok(DispatchOutcome {
                        state: DispatchState::ClientError,
                        info_hash: metadata.info_hash.clone(),
                        saved_path: None,
                        message: Some(msg),
                    })
                }
            }
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if "/\\:*?\"<>|".contains(c) { '_' } else { c })
        .collect()
}

fn short_hash(info_hash: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(info_hash.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize("Show.S01/Ep01"), "Show.S01_Ep01");
    }

    #[test]
    fn short_hash_is_deterministic() {
        assert_eq!(short_hash("abc"), short_hash("abc"));
        assert_ne!(short_hash("abc"), short_hash("abd"));
    }
}
