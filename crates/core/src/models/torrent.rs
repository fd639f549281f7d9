//! `.torrent` file parsing and infoHash computation.
//!
//! Bencode shapes mirror a standard BitTorrent v1 metainfo file. `infoHash`
//! is the SHA-1 digest of the canonical bencode re-encoding of the `info`
//! dictionary, matching what any BitTorrent client would compute.

use crate::error::{CrossSeedError, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTorrentFile {
    pub announce: Option<String>,
    #[serde(rename = "announce-list")]
    pub announce_list: Option<Vec<Vec<String>>>,
    pub comment: Option<String>,
    #[serde(rename = "created by")]
    pub created_by: Option<String>,
    #[serde(rename = "creation date")]
    pub creation_date: Option<i64>,
    pub encoding: Option<String>,
    pub info: RawInfoDict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInfoDict {
    pub name: String,
    #[serde(rename = "piece length")]
    pub piece_length: i64,
    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,
    /// Present for single-file torrents.
    pub length: Option<i64>,
    #[serde(default)]
    pub md5sum: Option<String>,
    /// Present for multi-file torrents.
    pub files: Option<Vec<RawFileEntry>>,
    #[serde(default)]
    pub private: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFileEntry {
    pub length: i64,
    pub path: Vec<String>,
    #[serde(default)]
    pub md5sum: Option<String>,
}

/// One file within a searchee or a parsed torrent, relative to the content root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub relative_path: String,
    pub size: u64,
}

impl FileEntry {
    pub fn basename(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Parsed, client-usable view of a `.torrent` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentMetadata {
    pub info_hash: String,
    pub name: String,
    pub file_list: Vec<FileEntry>,
    pub piece_length: i64,
    pub private: bool,
    pub announce_list: Vec<String>,
    pub raw: Vec<u8>,
}

impl TorrentMetadata {
    /// Total size in bytes across every file.
    pub fn total_size(&self) -> u64 {
        self.file_list.iter().map(|f| f.size).sum()
    }

    /// Parse a `.torrent` file's raw bytes into metadata, computing infoHash
    /// as SHA-1 over the canonical bencode re-encoding of `info`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let torrent: RawTorrentFile = serde_bencode::from_bytes(raw)
            .map_err(|e| CrossSeedError::Bencode(e.to_string()))?;

        let info_bytes = serde_bencode::to_bytes(&torrent.info)
            .map_err(|e| CrossSeedError::Bencode(e.to_string()))?;
        let mut hasher = Sha1::new();
        hasher.update(&info_bytes);
        let info_hash = hex::encode(hasher.finalize());

        let file_list = match &torrent.info.files {
            Some(files) => files
                .iter()
                .map(|f| FileEntry {
                    relative_path: f.path.join("/"),
                    size: f.length.max(0) as u64,
                })
                .collect(),
            None => vec![FileEntry {
                relative_path: torrent.info.name.clone(),
                size: torrent.info.length.unwrap_or(0).max(0) as u64,
            }],
        };

        let mut announce_list = Vec::new();
        if let Some(lists) = &torrent.announce_list {
            for tier in lists {
                announce_list.extend(tier.iter().cloned());
            }
        }
        if let Some(announce) = &torrent.announce {
            if !announce_list.contains(announce) {
                announce_list.insert(0, announce.clone());
            }
        }

        Ok(TorrentMetadata {
            info_hash,
            name: torrent.info.name,
            file_list,
            piece_length: torrent.info.piece_length,
            private: torrent.info.private.unwrap_or(0) != 0,
            announce_list,
            raw: raw.to_vec(),
        })
    }
}

/// Minimal hex encoding, avoided pulling in the `hex` crate twice across the
/// workspace — kept local since this is the only bencode-adjacent spot that
/// needs it.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let mut s = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_torrent_bytes() -> Vec<u8> {
        // Single-file torrent: d8:announce.../4:infod.../ee
        let raw = RawTorrentFile {
            announce: Some("http://tracker.example/announce".to_string()),
            announce_list: None,
            comment: None,
            created_by: None,
            creation_date: None,
            encoding: None,
            info: RawInfoDict {
                name: "sample.bin".to_string(),
                piece_length: 16384,
                pieces: vec![0u8; 20],
                length: Some(1000),
                md5sum: None,
                files: None,
                private: None,
            },
        };
        serde_bencode::to_bytes(&raw).unwrap()
    }

    #[test]
    fn parses_single_file_torrent() {
        let bytes = sample_torrent_bytes();
        let meta = TorrentMetadata::parse(&bytes).unwrap();
        assert_eq!(meta.name, "sample.bin");
        assert_eq!(meta.total_size(), 1000);
        assert_eq!(meta.file_list.len(), 1);
        assert_eq!(meta.info_hash.len(), 40);
    }

    #[test]
    fn info_hash_is_stable_across_reparse() {
        let bytes = sample_torrent_bytes();
        let a = TorrentMetadata::parse(&bytes).unwrap();
        let b = TorrentMetadata::parse(&bytes).unwrap();
        assert_eq!(a.info_hash, b.info_hash);
    }

    #[test]
    fn multi_file_torrent_builds_relative_paths() {
        let raw = RawTorrentFile {
            announce: None,
            announce_list: None,
            comment: None,
            created_by: None,
            creation_date: None,
            encoding: None,
            info: RawInfoDict {
                name: "Show.S01".to_string(),
                piece_length: 16384,
                pieces: vec![0u8; 20],
                length: None,
                md5sum: None,
                files: Some(vec![
                    RawFileEntry { length: 500, path: vec!["E01.mkv".to_string()], md5sum: None },
                    RawFileEntry { length: 600, path: vec!["E02.mkv".to_string()], md5sum: None },
                ]),
                private: Some(1),
            },
        };
        let bytes = serde_bencode::to_bytes(&raw).unwrap();
        let meta = TorrentMetadata::parse(&bytes).unwrap();
        assert_eq!(meta.total_size(), 1100);
        assert!(meta.private);
        assert_eq!(meta.file_list[0].relative_path, "E01.mkv");
    }
}
