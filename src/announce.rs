//! The announce listener: reacts to indexer-pushed notifications (e.g. an
//! IRC/Torznab push-notification bridge feeding a channel) instead of
//! waiting for the next cadence tick, per SPEC_FULL.md §4.9.
//!
//! Grounded on `pipeline.rs`'s per-candidate evaluation step; an announce is
//! just a single candidate arriving out of band, matched against every
//! known searchee instead of one a cycle already picked.

use cross_seed_core::error::CrossSeedError;
use cross_seed_core::models::{Candidate, DispatchJobState, Searchee, TorrentMetadata};
use cross_seed_decision::{DecisionCache, KnownState, MatchEngine};
use cross_seed_action::{ActionDispatcher, DispatchState};
use cross_seed_clients::BitTorrentClient;
use cross_seed_daemon::DaemonMetrics;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// A candidate pushed in from outside the regular search cycle.
#[derive(Debug, Clone)]
pub struct AnnounceEvent {
    pub candidate: Candidate,
}

pub struct AnnounceListener {
    data_dir: PathBuf,
    cache: DecisionCache,
    matcher: MatchEngine,
    dispatcher: ActionDispatcher,
    client: Option<Arc<dyn BitTorrentClient>>,
    metrics: Arc<DaemonMetrics>,
    dispatch_retry_ceiling: Duration,
    http: reqwest::Client,
}

impl AnnounceListener {
    pub fn new(
        data_dir: PathBuf,
        cache: DecisionCache,
        matcher: MatchEngine,
        dispatcher: ActionDispatcher,
        client: Option<Arc<dyn BitTorrentClient>>,
        metrics: Arc<DaemonMetrics>,
        dispatch_retry_ceiling: Duration,
    ) -> Self {
        Self {
            data_dir,
            cache,
            matcher,
            dispatcher,
            client,
            metrics,
            dispatch_retry_ceiling,
            http: reqwest::Client::new(),
        }
    }

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

    /// Find the local searchee whose name overlaps the announce's title the
    /// most closely. A real deployment would use a title index; this scans
    /// the data directory, which only runs when an announce actually fires.
    fn find_matching_searchee(&self, candidate_name: &str) -> Option<Searchee> {
        let entries = std::fs::read_dir(&self.data_dir).ok()?;
        let needle = cross_seed_core::parser::parse_release_name(candidate_name).title.to_lowercase();

        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let title = cross_seed_core::parser::parse_release_name(&name).title.to_lowercase();
            if title == needle {
                return Searchee::from_data_dir(&entry.path()).ok();
            }
        }
        None
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<AnnounceEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                error!(error = %e, "failed handling announce event");
            }
        }
        info!("announce channel closed, listener stopping");
    }

    #[instrument(skip(self, event), fields(guid = %event.candidate.guid))]
    async fn handle_event(&mut self, event: AnnounceEvent) -> Result<(), CrossSeedError> {
        let candidate = event.candidate;

        let Some(searchee) = self.find_matching_searchee(&candidate.name) else {
            debug!("no known searchee matches this announce, ignoring");
            return Ok(());
        };

        self.metrics.record_candidate_evaluated();

        if self
            .cache
            .has_decision(&searchee.name, candidate.indexer_id, &candidate.guid)
            .await
            .map_err(CrossSeedError::Database)?
            .is_some()
        {
            debug!("announce already decided, ignoring");
            return Ok(());
        }

        if let Some(rejection) = self.matcher.size_prefilter(&searchee, candidate.size) {
            self.cache
                .record_decision(&searchee.name, candidate.indexer_id, &candidate.guid, rejection, None)
                .await
                .map_err(CrossSeedError::Database)?;
            return Ok(());
        }

        let bytes = self
            .http
            .get(&candidate.link)
            .send()
            .await
            .map_err(|e| CrossSeedError::candidate(format!("failed fetching announced candidate: {e}")))?
            .bytes()
            .await
            .map_err(|e| CrossSeedError::candidate(format!("failed reading announced candidate body: {e}")))?;

        let metadata = match TorrentMetadata::parse(&bytes) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "announced candidate did not parse as a torrent");
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
                return Ok(());
            }
        };

        let known_hashes = self.known_info_hashes().await;
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
            let outcome = self.dispatcher.dispatch(&searchee, &metadata, &bytes).await?;
            self.handle_dispatch_outcome(&searchee.name, candidate.indexer_id, &candidate.guid, &outcome)
                .await?;
        }

        Ok(())
    }

    /// Act on a dispatch outcome per §4.8, mirroring the search-cycle pipeline.
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
                info!(state = ?outcome.state, "announced match dispatched");
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
                warn!(guid = %guid, "announced dispatch conflicted with an existing client torrent");
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
                warn!(guid = %guid, message = ?outcome.message, "announced dispatch failed with a client error, scheduling retry");
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
                debug!(state = ?outcome.state, "announced dispatch returned a non-terminal state");
            }
        }

        Ok(())
    }
}
