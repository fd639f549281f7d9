//! Pluggable BitTorrent client backends used by the action dispatcher.

pub mod adapter;
pub mod qbittorrent;

pub use adapter::{BitTorrentClient, ClientTorrent, InjectParams};
pub use qbittorrent::{QBittorrentClient, QBittorrentConfig};
