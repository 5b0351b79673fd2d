//! Parallel, individually time-boxed searches across indexers.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::pack::is_season_pack;
use super::{Candidate, IndexerBackend, IndexerGateway, SearchError, SlowIndexerTracker};
use crate::media::{MediaKind, MediaQuery};
use crate::metrics;
use crate::profile::UserProfile;

#[derive(Debug, Clone, Copy)]
enum SearchKind {
    Movies,
    Episodes,
    Seasons,
}

/// Fans a media query out to indexers and merges what comes back.
///
/// Each indexer search runs as its own task under a timeout. A search that
/// overruns is abandoned: the task keeps running but its result is
/// discarded. Every search duration feeds the [`SlowIndexerTracker`].
pub struct FanoutCoordinator {
    gateway: Arc<dyn IndexerGateway>,
    tracker: Arc<SlowIndexerTracker>,
}

impl FanoutCoordinator {
    pub fn new(gateway: Arc<dyn IndexerGateway>, tracker: Arc<SlowIndexerTracker>) -> Self {
        Self { gateway, tracker }
    }

    pub fn gateway(&self) -> &Arc<dyn IndexerGateway> {
        &self.gateway
    }

    pub fn tracker(&self) -> &Arc<SlowIndexerTracker> {
        &self.tracker
    }

    /// Pick the indexers to query for `kind`.
    ///
    /// Starts from the indexers supporting `kind` that the profile allows.
    /// Falls back to every indexer supporting `kind`, then to every indexer,
    /// then fails. Slow indexers are dropped from the result unless that
    /// would leave nothing.
    pub async fn select_backends(
        &self,
        kind: MediaKind,
        profile: &UserProfile,
    ) -> Result<Vec<IndexerBackend>, SearchError> {
        let all = self.gateway.list_backends().await?;
        let available: Vec<IndexerBackend> =
            all.iter().filter(|b| b.supports(kind)).cloned().collect();
        let allowed: Vec<IndexerBackend> = available
            .iter()
            .filter(|b| profile.allows_indexer(&b.id))
            .cloned()
            .collect();

        let chosen = if !allowed.is_empty() {
            allowed
        } else if !available.is_empty() {
            info!(
                indexers = ?profile.indexers,
                kind = %kind,
                "Requested indexers unavailable, falling back to all indexers for kind"
            );
            available
        } else if !all.is_empty() {
            info!(
                indexers = ?profile.indexers,
                kind = %kind,
                "No indexer supports kind, falling back to all indexers"
            );
            all
        } else {
            return Err(SearchError::NoBackendConfigured);
        };

        Ok(self.tracker.select_fast(chosen))
    }

    /// Search `backends` in parallel. Failed or timed-out searches yield
    /// nothing for that indexer; duplicates across indexers are kept.
    ///
    /// For series, episode and season searches run side by side and season
    /// results are kept only when they look like a pack for the query's
    /// season.
    pub async fn search(
        &self,
        query: &MediaQuery,
        backends: &[IndexerBackend],
        timeout: Duration,
    ) -> Vec<Candidate> {
        let start = Instant::now();
        debug!(
            media_id = %query.media_id,
            indexers = ?backends.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            "Starting indexer fan-out"
        );

        let results = match query.kind {
            MediaKind::Movie => self.search_all(query, backends, SearchKind::Movies, timeout).await,
            MediaKind::Series => {
                let (episodes, seasons) = tokio::join!(
                    self.search_all(query, backends, SearchKind::Episodes, timeout),
                    self.search_all(query, backends, SearchKind::Seasons, timeout),
                );
                let season = query.season_number();
                let packs = seasons
                    .into_iter()
                    .filter(|c| is_season_pack(&c.name, season))
                    .map(|mut c| {
                        c.is_pack = true;
                        c
                    });
                episodes.into_iter().chain(packs).collect()
            }
        };

        metrics::SEARCH_RESULTS
            .with_label_values(&[query.kind.as_str()])
            .observe(results.len() as f64);
        info!(
            media_id = %query.media_id,
            results = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Indexer fan-out complete"
        );

        results
    }

    async fn search_all(
        &self,
        query: &MediaQuery,
        backends: &[IndexerBackend],
        kind: SearchKind,
        timeout: Duration,
    ) -> Vec<Candidate> {
        let searches = backends
            .iter()
            .map(|backend| self.timed_search(query, &backend.id, kind, timeout));
        join_all(searches).await.into_iter().flatten().collect()
    }

    async fn timed_search(
        &self,
        query: &MediaQuery,
        indexer: &str,
        kind: SearchKind,
        timeout: Duration,
    ) -> Vec<Candidate> {
        let gateway = Arc::clone(&self.gateway);
        let query = query.clone();
        let indexer_id = indexer.to_string();
        let task = tokio::spawn(async move {
            match kind {
                SearchKind::Movies => gateway.search_movies(&indexer_id, &query).await,
                SearchKind::Episodes => gateway.search_episodes(&indexer_id, &query).await,
                SearchKind::Seasons => gateway.search_seasons(&indexer_id, &query).await,
            }
        });

        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, task).await;
        let elapsed = start.elapsed();

        self.tracker.record(indexer, elapsed, timeout);
        metrics::INDEXER_SEARCH_DURATION
            .with_label_values(&[indexer])
            .observe(elapsed.as_secs_f64());

        let (result_label, candidates) = match outcome {
            Ok(Ok(Ok(candidates))) => ("success", candidates),
            Ok(Ok(Err(e))) => {
                warn!(indexer = indexer, ?kind, error = %e, "Indexer search failed");
                ("error", Vec::new())
            }
            Ok(Err(e)) => {
                warn!(indexer = indexer, ?kind, error = %e, "Indexer search task failed");
                ("error", Vec::new())
            }
            Err(_) => {
                warn!(
                    indexer = indexer,
                    ?kind,
                    timeout_ms = timeout.as_millis() as u64,
                    "Indexer search timed out"
                );
                ("timeout", Vec::new())
            }
        };
        metrics::INDEXER_SEARCHES
            .with_label_values(&[indexer, result_label])
            .inc();

        candidates
    }
}
