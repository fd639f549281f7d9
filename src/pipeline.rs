//! The search cycle: pick the next due searchee, fan out indexer queries
//! under a concurrency cap, run every candidate through the matcher, and
//! dispatch whatever comes back actionable.
//!
//! Orchestration shape adapted from the teacher's `services::workflow`
//! (one struct owning every component, one `run_*` entry point, errors from
//! a single item logged and swallowed rather than aborting the cycle).

use cross_seed_action::{ActionDispatcher, DispatchState};
use cross_seed_clients::BitTorrentClient;
use cross_seed_core::config::{AppConfig, IndexerConfig};
use cross_seed_core::error::CrossSeedError;
use cross_seed_core::models::{Candidate, DispatchJobState, IndexerRecord, Searchee, TorrentMetadata};
use cross_seed_core::parser::parse_release_name;
use cross_seed_decision::{DecisionCache, KnownState, MatchEngine};
use cross_seed_indexers::torznab::{apply_backoff, reset_backoff, SearchMode, SearchQuery, SharedTorznabClient};
use cross_seed_arr::ArrClient;
use cross_seed_daemon::DaemonMetrics;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, instrument, warn};

/// One configured indexer plus the client that talks to it.
pub struct IndexerHandle {
    pub record: Mutex<IndexerRecord>,
    pub client: SharedTorznabClient,
}

pub struct Pipeline {
    data_dir: PathBuf,
    indexers: Vec<IndexerHandle>,
    arr: ArrClient,
    cache: DecisionCache,
    matcher: MatchEngine,
    dispatcher: ActionDispatcher,
    client: Option<Arc<dyn BitTorrentClient>>,
    metrics: Arc<DaemonMetrics>,
    concurrency: usize,
    dispatch_retry_ceiling: Duration,
    http: reqwest::Client,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        indexer_clients: Vec<(IndexerConfig, SharedTorznabClient)>,
        arr: ArrClient,
        cache: DecisionCache,
        matcher: MatchEngine,
        dispatcher: ActionDispatcher,
        client: Option<Arc<dyn BitTorrentClient>>,
        metrics: Arc<DaemonMetrics>,
    ) -> Self {
        let indexers = indexer_clients
            .into_iter()
            .enumerate()
            .map(|(i, (cfg, client))| IndexerHandle {
                record: Mutex::new(IndexerRecord::new(i as i64 + 1, cfg.name, cfg.url, cfg.apikey)),
                client,
            })
            .collect();

        Self {
            data_dir: config.paths.data_dir.clone(),
            indexers,
            arr,
            cache,
            matcher,
            dispatcher,
            client,
            metrics,
            concurrency: config.search_concurrency.max(1),
            dispatch_retry_ceiling: config.dispatch_retry_ceiling,
            http: reqwest::Client::new(),
        }
    }

    /// Every infoHash the configured client currently knows about, for the
    /// INFO_HASH_ALREADY_EXISTS check. Empty (not an error) when dispatch
    /// mode is SAVE and no client is configured.
    async fn known_info_hashes(&self) -> Vec<String> {
        let Some(client) = &self.client else {
            return Vec::new();
        };
        match client.get_torrents().await {
            Ok(torrents) => torrents.into_iter().map(|t| t.info_hash).collect(),
            Err(e) => {
                warn!(error = %e, "failed listing client torrents for dedup check");
                Vec::new()
            }
        }
    }

    /// Every direct subdirectory of `data_dir` is one searchee candidate.
    fn enumerate_searchee_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.data_dir) else {
            warn!(dir = %self.data_dir.display(), "failed to read data directory");
            return Vec::new();
        };

        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect()
    }

    /// Run the tick loop: on every cadence interval, and whenever a signal
    /// arrives on `trigger`, run one search cycle.
    pub async fn run_loop(mut self, cadence: Duration, mut trigger: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("search cycle triggered by cadence tick");
                }
                signal = trigger.recv() => {
                    if signal.is_none() {
                        info!("search trigger channel closed, stopping pipeline loop");
                        return;
                    }
                    debug!("search cycle triggered on demand");
                }
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "search cycle failed");
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Result<(), CrossSeedError> {
        let names = self.enumerate_searchee_names();
        let Some(name) = self
            .cache
            .next_due_searchee(&names, Duration::from_secs(600), Utc::now())
            .await
            .map_err(CrossSeedError::Database)?
        else {
            debug!("no searchee is due for a search right now");
            return Ok(());
        };

        let searchee = Searchee::from_data_dir(&self.data_dir.join(&name))?;
        info!(searchee = %name, "starting search cycle");

        let parsed = parse_release_name(&name);
        let resolved_ids = self.arr.resolve_ids(&parsed.title, parsed.media_type).await;

        let mode = match parsed.media_type {
            cross_seed_core::parser::MediaType::Movie => SearchMode::MovieSearch,
            cross_seed_core::parser::MediaType::Episode | cross_seed_core::parser::MediaType::Season => {
                SearchMode::TvSearch
            }
            _ => SearchMode::Search,
        };

        let query = SearchQuery {
            text: Some(parsed.title.clone()),
            imdb_id: resolved_ids.imdb_id,
            tmdb_id: resolved_ids.tmdb_id,
            tvdb_id: resolved_ids.tvdb_id,
            season: parsed.season,
            episode: parsed.episode,
            mode,
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let queue_depth = Arc::new(AtomicI64::new(0));
        let mut join_set = tokio::task::JoinSet::new();

        for handle in &self.indexers {
            let record = {
                let guard = handle.record.lock().expect("indexer record mutex poisoned");
                if !guard.is_available(Utc::now()) {
                    continue;
                }
                guard.clone()
            };

            let client = handle.client.clone();
            let query = query.clone();
            let permit = semaphore.clone().acquire_owned().await.map_err(|_| {
                CrossSeedError::invariant("search concurrency semaphore closed unexpectedly")
            })?;
            queue_depth.fetch_add(1, Ordering::Relaxed);
            self.metrics.set_queue_depth(queue_depth.load(Ordering::Relaxed));

            let qd = queue_depth.clone();
            let metrics = self.metrics.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = client.search(&record, &query).await;
                qd.fetch_sub(1, Ordering::Relaxed);
                metrics.set_queue_depth(qd.load(Ordering::Relaxed));
                (record.id, result)
            });
        }

        let mut candidates = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (indexer_id, result) = joined.map_err(|e| CrossSeedError::invariant(format!("search task panicked: {e}")))?;
            let handle = self.indexers.iter().find(|h| h.record.lock().expect("indexer record mutex poisoned").id == indexer_id);
            match result {
                Ok(found) => {
                    if let Some(handle) = handle {
                        let mut record = handle.record.lock().expect("indexer record mutex poisoned");
                        reset_backoff(&mut record);
                    }
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!(indexer_id, error = %e, "indexer search failed");
                    self.metrics.record_indexer_failure(&indexer_id.to_string());
                    if let Some(handle) = handle {
                        let mut record = handle.record.lock().expect("indexer record mutex poisoned");
                        apply_backoff(&mut record, Duration::from_secs(3600));
                    }
                }
            }
        }

        let known_hashes = self.known_info_hashes().await;

        for candidate in candidates {
            self.metrics.record_candidate_evaluated();

            if let Some(cached) = self
                .cache
                .has_decision(&searchee.name, candidate.indexer_id, &candidate.guid)
                .await
                .map_err(CrossSeedError::Database)?
            {
                if cached.decision.is_actionable() {
                    let due = self
                        .cache
                        .dispatch_is_due(&searchee.name, candidate.indexer_id, &candidate.guid, Utc::now())
                        .await
                        .map_err(CrossSeedError::Database)?;
                    if due {
                        self.fetch_and_dispatch(&searchee, &candidate).await?;
                    }
                }
                debug!(guid = %candidate.guid, decision = %cached.decision, "skipping already-decided candidate");
                continue;
            }

            if let Some(rejection) = self.matcher.size_prefilter(&searchee, candidate.size) {
                self.cache
                    .record_decision(&searchee.name, candidate.indexer_id, &candidate.guid, rejection, None)
                    .await
                    .map_err(CrossSeedError::Database)?;
                continue;
            }

            let bytes = match self.http.get(&candidate.link).send().await {
                Ok(resp) => match resp.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(guid = %candidate.guid, error = %e, "failed reading candidate body");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(guid = %candidate.guid, error = %e, "failed fetching candidate");
                    continue;
                }
            };

            let metadata = match TorrentMetadata::parse(&bytes) {
                Ok(m) => m,
                Err(e) => {
                    warn!(guid = %candidate.guid, error = %e, "candidate did not parse as a torrent");
                    self.cache
                        .record_decision(
                            &searchee.name,
                            candidate.indexer_id,
                            &candidate.guid,
                            cross_seed_core::error::DecisionKind::DownloadFailed,
                            None,
                        )
                        .await
                        .map_err(CrossSeedError::Database)?;
                    continue;
                }
            };

            let known = KnownState { known_info_hashes: &known_hashes };
            let decision = self.matcher.decide(&searchee, &metadata, &known);

            self.cache
                .record_decision(
                    &searchee.name,
                    candidate.indexer_id,
                    &candidate.guid,
                    decision,
                    Some(&metadata.info_hash),
                )
                .await
                .map_err(CrossSeedError::Database)?;

            if decision.is_actionable() {
                match self.dispatcher.dispatch(&searchee, &metadata, &bytes).await {
                    Ok(outcome) => {
                        self.handle_dispatch_outcome(&searchee.name, candidate.indexer_id, &candidate.guid, &outcome)
                            .await?;
                    }
                    Err(e) => error!(error = %e, "dispatch failed"),
                }
            }
        }

        self.cache
            .mark_searched(&searchee.name, Utc::now())
            .await
            .map_err(CrossSeedError::Database)?;
        self.metrics.record_search_completed();

        Ok(())
    }

    /// Re-fetch and re-dispatch a candidate already recorded as actionable,
    /// for a job whose CLIENT_ERROR backoff has elapsed.
    async fn fetch_and_dispatch(&self, searchee: &Searchee, candidate: &Candidate) -> Result<(), CrossSeedError> {
        let bytes = match self.http.get(&candidate.link).send().await {
            Ok(resp) => match resp.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(guid = %candidate.guid, error = %e, "failed reading candidate body on retry");
                    return Ok(());
                }
            },
            Err(e) => {
                warn!(guid = %candidate.guid, error = %e, "failed fetching candidate on retry");
                return Ok(());
            }
        };

        let metadata = match TorrentMetadata::parse(&bytes) {
            Ok(m) => m,
            Err(e) => {
                warn!(guid = %candidate.guid, error = %e, "candidate did not parse as a torrent on retry");
                return Ok(());
            }
        };

        match self.dispatcher.dispatch(searchee, &metadata, &bytes).await {
            Ok(outcome) => {
                self.handle_dispatch_outcome(&searchee.name, candidate.indexer_id, &candidate.guid, &outcome)
                    .await
            }
            Err(e) => {
                error!(error = %e, "retry dispatch failed");
                Ok(())
            }
        }
    }

    /// Act on a dispatch outcome per §4.8: CONFLICT overwrites the decision
    /// cache with INFO_HASH_ALREADY_EXISTS; CLIENT_ERROR schedules a
    /// backoff-gated requeue; SUCCESS just clears any prior retry state.
    async fn handle_dispatch_outcome(
        &self,
        searchee_name: &str,
        indexer_id: i64,
        guid: &str,
        outcome: &cross_seed_action::DispatchOutcome,
    ) -> Result<(), CrossSeedError> {
        match outcome.state {
            DispatchState::Success => {
                self.metrics.record_match_dispatched();
                info!(state = ?outcome.state, "match dispatched");
                self.cache
                    .record_dispatch_outcome(
                        searchee_name,
                        indexer_id,
                        guid,
                        DispatchJobState::Success,
                        self.dispatch_retry_ceiling,
                        None,
                    )
                    .await
                    .map_err(CrossSeedError::Database)?;
            }
            DispatchState::Conflict => {
                warn!(guid = %guid, "dispatch conflicted with an existing client torrent");
                self.cache
                    .record_decision(
                        searchee_name,
                        indexer_id,
                        guid,
                        cross_seed_core::error::DecisionKind::InfoHashAlreadyExists,
                        Some(&outcome.info_hash),
                    )
                    .await
                    .map_err(CrossSeedError::Database)?;
                self.cache
                    .record_dispatch_outcome(
                        searchee_name,
                        indexer_id,
                        guid,
                        DispatchJobState::Conflict,
                        self.dispatch_retry_ceiling,
                        outcome.message.as_deref(),
                    )
                    .await
                    .map_err(CrossSeedError::Database)?;
            }
            DispatchState::ClientError => {
                warn!(guid = %guid, message = ?outcome.message, "dispatch failed with a client error, scheduling retry");
                self.cache
                    .record_dispatch_outcome(
                        searchee_name,
                        indexer_id,
                        guid,
                        DispatchJobState::ClientError,
                        self.dispatch_retry_ceiling,
                        outcome.message.as_deref(),
                    )
                    .await
                    .map_err(CrossSeedError::Database)?;
            }
            DispatchState::Pending | DispatchState::Linking | DispatchState::Injecting => {
                debug!(state = ?outcome.state, "dispatch returned a non-terminal state");
            }
        }

        Ok(())
    }
}
