//! Exercises the Torznab client against a mock indexer HTTP server, and the
//! decision cache's retention-aware re-check behavior.

use chrono::Utc;
use cross_seed_core::models::{DispatchJobState, IndexerRecord};
use cross_seed_core::RetentionConfig;
use cross_seed_decision::DecisionCache;
use cross_seed_indexers::torznab::{SearchMode, SearchQuery, TorznabClient};
use cross_seed_storage::{create_pool, run_migrations, PoolConfig};
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <item>
      <title>Show.Name.S01.1080p-GRP</title>
      <guid>https://indexer.example/details/123</guid>
      <link>https://indexer.example/download/123</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <torznab:attr name="size" value="2048"/>
      <torznab:attr name="infohash" value="ABCDEF0123456789"/>
      <torznab:attr name="seeders" value="12"/>
      <torznab:attr name="category" value="5000"/>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn search_parses_candidates_from_a_live_http_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("t", "tvsearch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_RESPONSE))
        .mount(&server)
        .await;

    let client = TorznabClient::new(10, Duration::from_secs(1), Duration::from_secs(5)).unwrap();
    let indexer = IndexerRecord::new(1, "mock-indexer", server.uri(), "testkey");
    let query = SearchQuery {
        text: Some("Show Name S01".to_string()),
        imdb_id: None,
        tmdb_id: None,
        tvdb_id: None,
        season: Some(1),
        episode: None,
        mode: SearchMode::TvSearch,
    };

    let candidates = client.search(&indexer, &query).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].name, "Show.Name.S01.1080p-GRP");
    assert_eq!(candidates[0].size, 2048);
    assert_eq!(candidates[0].indexer_id, 1);
    assert_eq!(candidates[0].indexer_name, "mock-indexer");
}

#[tokio::test]
async fn a_429_response_surfaces_as_a_transient_indexer_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = TorznabClient::new(10, Duration::from_secs(1), Duration::from_secs(5)).unwrap();
    let indexer = IndexerRecord::new(1, "mock-indexer", server.uri(), "testkey");
    let query = SearchQuery {
        text: Some("anything".to_string()),
        imdb_id: None,
        tmdb_id: None,
        tvdb_id: None,
        season: None,
        episode: None,
        mode: SearchMode::Search,
    };

    let err = client.search(&indexer, &query).await.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("too many requests"));
}

#[tokio::test]
async fn the_rate_limiter_throttles_back_to_back_searches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel></channel></rss>"))
        .mount(&server)
        .await;

    // One request allowed per 80ms window: the third search must wait.
    let client = TorznabClient::new(1, Duration::from_millis(80), Duration::from_secs(5)).unwrap();
    let indexer = IndexerRecord::new(1, "mock-indexer", server.uri(), "testkey");
    let query = SearchQuery {
        text: Some("x".to_string()),
        imdb_id: None,
        tmdb_id: None,
        tvdb_id: None,
        season: None,
        episode: None,
        mode: SearchMode::Search,
    };

    let start = std::time::Instant::now();
    client.search(&indexer, &query).await.unwrap();
    client.search(&indexer, &query).await.unwrap();
    client.search(&indexer, &query).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn a_stale_download_failed_decision_is_treated_as_absent_after_retention() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");
    let pool = create_pool(&db_path, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let retention = RetentionConfig {
        download_failed_recheck: Duration::from_millis(1),
    };
    let cache = DecisionCache::new(pool, retention);

    cache
        .record_decision(
            "Movie.2020",
            1,
            "guid-download-failed",
            cross_seed_core::error::DecisionKind::DownloadFailed,
            None,
        )
        .await
        .unwrap();

    // Give the sub-millisecond recheck window time to elapse.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let cached = cache.has_decision("Movie.2020", 1, "guid-download-failed").await.unwrap();
    assert!(cached.is_none(), "a stale DOWNLOAD_FAILED decision should be treated as absent");
}

#[tokio::test]
async fn next_due_searchee_picks_the_globally_oldest_last_searched() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");
    let pool = create_pool(&db_path, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let cache = DecisionCache::new(pool, RetentionConfig::default());

    let now = Utc::now();
    // "Newer" was searched most recently; "older" was searched further back;
    // "never" has no timestamp row at all and should win regardless of order.
    cache.mark_searched("newer", now - chrono::Duration::hours(1)).await.unwrap();
    cache.mark_searched("older", now - chrono::Duration::hours(5)).await.unwrap();

    let due = cache
        .next_due_searchee(
            &["newer".to_string(), "older".to_string()],
            Duration::from_secs(600),
            now,
        )
        .await
        .unwrap();
    assert_eq!(due.as_deref(), Some("older"), "the longest-overdue searchee should win even when listed second");

    let due_with_never_searched = cache
        .next_due_searchee(
            &["newer".to_string(), "older".to_string(), "never".to_string()],
            Duration::from_secs(600),
            now,
        )
        .await
        .unwrap();
    assert_eq!(due_with_never_searched.as_deref(), Some("never"), "a never-searched name outranks any prior search");
}

#[tokio::test]
async fn dispatch_outcome_client_error_schedules_a_doubling_backoff_retry() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");
    let pool = create_pool(&db_path, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let cache = DecisionCache::new(pool, RetentionConfig::default());

    let now = Utc::now();
    assert!(cache.dispatch_is_due("Movie.2020", 1, "guid-a", now).await.unwrap());

    cache
        .record_dispatch_outcome(
            "Movie.2020",
            1,
            "guid-a",
            DispatchJobState::ClientError,
            Duration::from_secs(3600),
            Some("connection refused"),
        )
        .await
        .unwrap();

    assert!(
        !cache.dispatch_is_due("Movie.2020", 1, "guid-a", now).await.unwrap(),
        "should not be due again before its backoff window elapses"
    );
    assert!(cache
        .dispatch_is_due("Movie.2020", 1, "guid-a", now + chrono::Duration::hours(1))
        .await
        .unwrap());
}

#[tokio::test]
async fn dispatch_outcome_success_is_never_retried() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");
    let pool = create_pool(&db_path, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let cache = DecisionCache::new(pool, RetentionConfig::default());

    cache
        .record_dispatch_outcome(
            "Movie.2020",
            1,
            "guid-b",
            DispatchJobState::Success,
            Duration::from_secs(3600),
            None,
        )
        .await
        .unwrap();

    assert!(!cache
        .dispatch_is_due("Movie.2020", 1, "guid-b", Utc::now())
        .await
        .unwrap());
}

#[tokio::test]
async fn indexer_categories_round_trip_after_upserting_the_owning_indexer() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cache.sqlite");
    let pool = create_pool(&db_path, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let cache = DecisionCache::new(pool, RetentionConfig::default());

    let indexer = IndexerRecord::new(1, "mock-indexer", "http://example", "key");
    cache.upsert_indexer(&indexer).await.unwrap();

    cache
        .record_indexer_categories(&[cross_seed_core::models::IndexerCategory {
            indexer_id: 1,
            category_id: 5000,
            media_type: "tv".to_string(),
        }])
        .await
        .unwrap();
}
