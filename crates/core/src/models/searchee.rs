//! The Searchee model: a normalized description of local content to find
//! alternate sources for.

use super::torrent::{FileEntry, TorrentMetadata};
use crate::error::{CrossSeedError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearcheeOrigin {
    TorrentFile,
    DataDir,
    Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Searchee {
    pub name: String,
    pub file_list: Vec<FileEntry>,
    pub total_size: u64,
    pub info_hash: Option<String>,
    pub origin: SearcheeOrigin,
    pub trackers: HashSet<String>,
    /// Where the underlying data lives on disk, when known. Used by the
    /// action dispatcher's LINKING step; absent for client-reported searchees
    /// whose data path isn't surfaced by the fingerprinting source.
    pub source_path: Option<PathBuf>,
}

impl Searchee {
    /// Build from a parsed `.torrent` file.
    pub fn from_torrent_metadata(metadata: &TorrentMetadata) -> Self {
        Self {
            name: metadata.name.clone(),
            file_list: metadata.file_list.clone(),
            total_size: metadata.total_size(),
            info_hash: Some(metadata.info_hash.clone()),
            origin: SearcheeOrigin::TorrentFile,
            trackers: metadata.announce_list.iter().cloned().collect(),
            source_path: None,
        }
    }

    /// Build by enumerating a data directory. Symlinks are not traversed.
    pub fn from_data_dir(root: &Path) -> Result<Self> {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CrossSeedError::candidate("data directory has no usable name"))?
            .to_string();

        let mut file_list = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                if file_type.is_symlink() {
                    continue;
                }
                if file_type.is_dir() {
                    stack.push(entry.path());
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or(&entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let size = entry.metadata()?.len();
                file_list.push(FileEntry { relative_path: relative, size });
            }
        }
        file_list.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let total_size = file_list.iter().map(|f| f.size).sum();

        Ok(Self {
            name,
            file_list,
            total_size,
            info_hash: None,
            origin: SearcheeOrigin::DataDir,
            trackers: HashSet::new(),
            source_path: Some(root.to_path_buf()),
        })
    }

    /// Build from a client-reported torrent.
    pub fn from_client_torrent(
        name: String,
        info_hash: String,
        file_list: Vec<FileEntry>,
        trackers: HashSet<String>,
        source_path: Option<PathBuf>,
    ) -> Self {
        let total_size = file_list.iter().map(|f| f.size).sum();
        Self {
            name,
            file_list,
            total_size,
            info_hash: Some(info_hash),
            origin: SearcheeOrigin::Client,
            trackers,
            source_path,
        }
    }

    /// The multiset of (basename, size) pairs the matcher compares against.
    pub fn file_bag(&self) -> Vec<(&str, u64)> {
        self.file_list.iter().map(|f| (f.basename(), f.size)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_bag_uses_basenames() {
        let s = Searchee {
            name: "x".into(),
            file_list: vec![FileEntry { relative_path: "Season 1/E01.mkv".into(), size: 10 }],
            total_size: 10,
            info_hash: None,
            origin: SearcheeOrigin::DataDir,
            trackers: HashSet::new(),
            source_path: None,
        };
        assert_eq!(s.file_bag(), vec![("E01.mkv", 10)]);
    }
}
