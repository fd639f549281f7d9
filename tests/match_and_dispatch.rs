//! End-to-end exercises of the match → cache → dispatch path, without the
//! daemon's HTTP surface or search-cycle scheduling: a searchee and a
//! fetched candidate go in, a cached `Decision` and a dispatched outcome
//! come out.

use async_trait::async_trait;
use cross_seed_action::{ActionDispatcher, DispatchState};
use cross_seed_clients::{BitTorrentClient, ClientTorrent, InjectParams};
use cross_seed_core::config::{DispatchMode, MatcherConfig, PathsConfig, RetentionConfig};
use cross_seed_core::error::{DecisionKind, Result};
use cross_seed_core::models::{FileEntry, Searchee, SearcheeOrigin, TorrentMetadata};
use cross_seed_decision::{DecisionCache, KnownState, MatchEngine};
use cross_seed_storage::{create_pool, run_migrations, PoolConfig};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tempfile::tempdir;

#[derive(Debug, Serialize)]
struct RawInfo {
    name: String,
    #[serde(rename = "piece length")]
    piece_length: i64,
    #[serde(with = "serde_bytes")]
    pieces: Vec<u8>,
    length: Option<i64>,
    files: Option<Vec<RawFile>>,
}

#[derive(Debug, Serialize)]
struct RawFile {
    length: i64,
    path: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RawTorrent {
    info: RawInfo,
}

fn single_file_torrent_bytes(name: &str, size: u64) -> Vec<u8> {
    let raw = RawTorrent {
        info: RawInfo {
            name: name.to_string(),
            piece_length: 16384,
            pieces: vec![0u8; 20],
            length: Some(size as i64),
            files: None,
        },
    };
    serde_bencode::to_bytes(&raw).unwrap()
}

async fn open_cache() -> DecisionCache {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");
    let pool = create_pool(&db_path, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    std::mem::forget(dir); // keep the tempdir alive for the pool's lifetime
    DecisionCache::new(pool, RetentionConfig::default())
}

fn local_searchee(name: &str, files: Vec<(&str, u64)>) -> Searchee {
    let file_list = files
        .into_iter()
        .map(|(n, size)| FileEntry { relative_path: n.to_string(), size })
        .collect::<Vec<_>>();
    let total_size = file_list.iter().map(|f| f.size).sum();
    Searchee {
        name: name.to_string(),
        file_list,
        total_size,
        info_hash: None,
        origin: SearcheeOrigin::DataDir,
        trackers: HashSet::new(),
        source_path: None,
    }
}

#[tokio::test]
async fn full_match_is_cached_and_saved_to_disk() {
    let cache = open_cache().await;
    let matcher = MatchEngine::new(MatcherConfig::default());

    let searchee = local_searchee("Movie.2020.1080p", vec![("Movie.2020.1080p.mkv", 5000)]);
    let torrent_bytes = single_file_torrent_bytes("Movie.2020.1080p.mkv", 5000);
    let metadata = TorrentMetadata::parse(&torrent_bytes).unwrap();

    let known = KnownState { known_info_hashes: &[] };
    let decision = matcher.decide(&searchee, &metadata, &known);
    assert_eq!(decision, DecisionKind::Match);

    cache
        .record_decision(&searchee.name, 1, "guid-1", decision, Some(&metadata.info_hash))
        .await
        .unwrap();

    let cached = cache.has_decision(&searchee.name, 1, "guid-1").await.unwrap();
    assert_eq!(cached.unwrap().decision, DecisionKind::Match);

    let output_dir = tempdir().unwrap();
    let dispatcher = ActionDispatcher::new(
        DispatchMode::Save,
        PathsConfig {
            data_dir: output_dir.path().to_path_buf(),
            output_dir: output_dir.path().to_path_buf(),
            link_dir: output_dir.path().to_path_buf(),
            database_path: output_dir.path().join("unused.sqlite"),
        },
        None,
        false,
    );

    let outcome = dispatcher.dispatch(&searchee, &metadata, &torrent_bytes).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Success);
    let saved_path = outcome.saved_path.expect("save mode always reports a path");
    assert!(saved_path.exists());
}

#[tokio::test]
async fn size_mismatch_is_rejected_before_any_network_fetch() {
    let matcher = MatchEngine::new(MatcherConfig::default());
    let searchee = local_searchee("Movie.2020.1080p", vec![("Movie.2020.1080p.mkv", 1_000_000)]);

    // Candidate claims a wildly different size: the prefilter should reject
    // it without the caller ever needing to fetch and parse the torrent.
    let rejection = matcher.size_prefilter(&searchee, 10);
    assert_eq!(rejection, Some(DecisionKind::SizeMismatch));
}

#[tokio::test]
async fn already_decided_candidate_is_skipped_on_second_pass() {
    let cache = open_cache().await;
    cache
        .record_decision("Movie.2020", 1, "guid-7", DecisionKind::FileTreeMismatch, None)
        .await
        .unwrap();

    let cached = cache.has_decision("Movie.2020", 1, "guid-7").await.unwrap();
    assert_eq!(cached.unwrap().decision, DecisionKind::FileTreeMismatch);

    // A decision this cache has already made must not force a refetch on
    // the next cycle: has_decision simply returns the prior verdict.
    let cached_again = cache.has_decision("Movie.2020", 1, "guid-7").await.unwrap();
    assert!(cached_again.is_some());
}

#[derive(Default)]
struct MockClient {
    torrents: RwLock<Vec<ClientTorrent>>,
}

#[async_trait]
impl BitTorrentClient for MockClient {
    async fn add_torrent(&self, params: InjectParams) -> Result<String> {
        let metadata = TorrentMetadata::parse(&params.torrent_bytes)?;
        self.torrents.write().unwrap().push(ClientTorrent {
            info_hash: metadata.info_hash.clone(),
            name: metadata.name.clone(),
            save_path: params.save_path,
        });
        Ok(metadata.info_hash)
    }

    async fn get_torrents(&self) -> Result<Vec<ClientTorrent>> {
        Ok(self.torrents.read().unwrap().clone())
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn partial_match_links_source_data_before_injecting() {
    let source_dir = tempdir().unwrap();
    let link_dir = tempdir().unwrap();
    let source_file = source_dir.path().join("E01.mkv");
    std::fs::write(&source_file, vec![0u8; 100]).unwrap();

    let mut searchee = local_searchee("Show.S01", vec![("E01.mkv", 100)]);
    searchee.source_path = Some(source_file);

    let torrent_bytes = single_file_torrent_bytes("E01.mkv", 100);
    let metadata = TorrentMetadata::parse(&torrent_bytes).unwrap();

    let client: Arc<dyn BitTorrentClient> = Arc::new(MockClient::default());
    let dispatcher = ActionDispatcher::new(
        DispatchMode::Inject,
        PathsConfig {
            data_dir: source_dir.path().to_path_buf(),
            output_dir: link_dir.path().to_path_buf(),
            link_dir: link_dir.path().to_path_buf(),
            database_path: link_dir.path().join("unused.sqlite"),
        },
        Some(client.clone()),
        false,
    );

    let outcome = dispatcher.dispatch(&searchee, &metadata, &torrent_bytes).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Success);
    assert_eq!(outcome.info_hash, metadata.info_hash);

    let injected = client.get_torrents().await.unwrap();
    assert_eq!(injected.len(), 1);
    assert_eq!(injected[0].info_hash, metadata.info_hash);
}

#[tokio::test]
async fn injecting_an_already_present_info_hash_reports_conflict() {
    let torrent_bytes = single_file_torrent_bytes("E01.mkv", 100);
    let metadata = TorrentMetadata::parse(&torrent_bytes).unwrap();

    let client = MockClient::default();
    client.torrents.write().unwrap().push(ClientTorrent {
        info_hash: metadata.info_hash.clone(),
        name: metadata.name.clone(),
        save_path: "/already/here".to_string(),
    });
    let client: Arc<dyn BitTorrentClient> = Arc::new(client);

    let link_dir = tempdir().unwrap();
    let dispatcher = ActionDispatcher::new(
        DispatchMode::Inject,
        PathsConfig {
            data_dir: link_dir.path().to_path_buf(),
            output_dir: link_dir.path().to_path_buf(),
            link_dir: link_dir.path().to_path_buf(),
            database_path: link_dir.path().join("unused.sqlite"),
        },
        Some(client),
        false,
    );

    let searchee = local_searchee("Show.S01", vec![("E01.mkv", 100)]);
    let outcome = dispatcher.dispatch(&searchee, &metadata, &torrent_bytes).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Conflict);
}
