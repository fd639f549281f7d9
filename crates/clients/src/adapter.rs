//! The pluggable injection backend seam.
//!
//! Every supported BitTorrent client implements `BitTorrentClient` so the
//! dispatcher can inject without knowing which daemon it's talking to.
//! Grounded on the teacher's downloader trait shape, generalized from a
//! single qBittorrent-specific client to an `async_trait` interface.

use async_trait::async_trait;
use cross_seed_core::error::Result;

/// A torrent already present in the client, by infoHash.
#[derive(Debug, Clone)]
pub struct ClientTorrent {
    pub info_hash: String,
    pub name: String,
    pub save_path: String,
}

/// Where to put the injected torrent's data, and how it got there.
#[derive(Debug, Clone)]
pub struct InjectParams {
    pub torrent_bytes: Vec<u8>,
    pub save_path: String,
    pub category: Option<String>,
    pub paused: bool,
    pub skip_hash_check: bool,
}

#[async_trait]
pub trait BitTorrentClient: Send + Sync {
    /// Inject a `.torrent` file, returning the infoHash the client assigned it.
    async fn add_torrent(&self, params: InjectParams) -> Result<String>;

    /// List every torrent currently known to the client.
    async fn get_torrents(&self) -> Result<Vec<ClientTorrent>>;

    /// Whether a torrent with this infoHash is already present.
    async fn check_exists(&self, info_hash: &str) -> Result<bool> {
        let torrents = self.get_torrents().await?;
        Ok(torrents
            .iter()
            .any(|t| t.info_hash.eq_ignore_ascii_case(info_hash)))
    }

    /// Cheap connectivity probe used at startup and by health checks.
    async fn test_connection(&self) -> Result<()>;
}
