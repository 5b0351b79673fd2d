//! Bounded-concurrency enrichment of search results with torrent infos.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::TorrentInfoResolver;
use crate::metrics;
use crate::searcher::{deduplicate_by_hash, Candidate};

/// Attaches [`super::TorrentInfos`] to candidates.
///
/// All enrichment in the process shares one semaphore, so the number of
/// in-flight fetches is capped globally rather than per request.
pub struct InfoEnricher {
    resolver: Arc<dyn TorrentInfoResolver>,
    permits: Arc<Semaphore>,
    timeout_cap: Duration,
}

impl InfoEnricher {
    pub fn new(
        resolver: Arc<dyn TorrentInfoResolver>,
        concurrency: usize,
        timeout_cap: Duration,
    ) -> Self {
        Self {
            resolver,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout_cap,
        }
    }

    pub fn resolver(&self) -> &Arc<dyn TorrentInfoResolver> {
        &self.resolver
    }

    /// Resolve infos for every candidate, keeping input order.
    ///
    /// Each fetch is limited to `min(cap, indexer_timeout)`. Failed or
    /// timed-out candidates are dropped. Survivors are deduplicated by info
    /// hash and truncated to `max`.
    pub async fn enrich(
        &self,
        candidates: Vec<Candidate>,
        indexer_timeout: Duration,
        max: usize,
    ) -> Vec<Candidate> {
        let timeout = self.timeout_cap.min(indexer_timeout);
        let width = candidates.len().max(1);
        let total = candidates.len();

        let enriched: Vec<Candidate> = stream::iter(candidates)
            .map(|candidate| self.enrich_one(candidate, timeout))
            .buffered(width)
            .filter_map(|c| async move { c })
            .collect()
            .await;

        let resolved = enriched.len();
        let mut unique = deduplicate_by_hash(enriched);
        unique.truncate(max);
        debug!(
            total = total,
            resolved = resolved,
            kept = unique.len(),
            "Torrent info enrichment complete"
        );
        unique
    }

    async fn enrich_one(&self, mut candidate: Candidate, timeout: Duration) -> Option<Candidate> {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(error = %e, "Info resolver pool closed");
                return None;
            }
        };

        // The permit travels with the task, so an abandoned fetch still
        // counts against the cap until it finishes.
        let resolver = Arc::clone(&self.resolver);
        let target = candidate.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            resolver.resolve(&target).await
        });

        let (label, outcome) = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(infos))) => ("success", Some(infos)),
            Ok(Ok(Err(e))) => {
                warn!(name = %candidate.name, error = %e, "Failed to resolve torrent infos");
                ("failed", None)
            }
            Ok(Err(e)) => {
                warn!(name = %candidate.name, error = %e, "Torrent info task failed");
                ("failed", None)
            }
            Err(_) => {
                warn!(
                    name = %candidate.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Torrent info resolution timed out"
                );
                ("timeout", None)
            }
        };
        metrics::TORRENT_INFO_RESOLUTIONS
            .with_label_values(&[label])
            .inc();

        let infos = outcome?;
        candidate.infos = Some(infos);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentInfoResolver};
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn test_enrich_drops_failures_and_dedups() {
        let resolver = Arc::new(MockTorrentInfoResolver::new());
        resolver.set_hash("A", "hash-a").await;
        resolver.set_hash("B", "hash-a").await;
        resolver.set_hash("C", "hash-c").await;
        resolver.fail("D").await;
        resolver.set_hash("E", "hash-e").await;
        resolver.set_delay("E", Duration::from_secs(60)).await;

        let enricher = InfoEnricher::new(resolver, 5, Duration::from_secs(30));
        let candidates = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|n| fixtures::candidate(n, 1))
            .collect();

        let enriched = enricher.enrich(candidates, Duration::from_secs(10), 10).await;
        let names: Vec<_> = enriched.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(enriched[0].info_hash(), Some("hash-a"));
    }

    #[tokio::test]
    async fn test_enrich_truncates_to_max() {
        let resolver = Arc::new(MockTorrentInfoResolver::new());
        for name in ["A", "B", "C"] {
            resolver.set_hash(name, &format!("hash-{}", name)).await;
        }
        let enricher = InfoEnricher::new(resolver, 2, Duration::from_secs(30));
        let candidates = ["A", "B", "C"]
            .iter()
            .map(|n| fixtures::candidate(n, 1))
            .collect();

        let enriched = enricher.enrich(candidates, Duration::from_secs(10), 2).await;
        assert_eq!(enriched.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_capped() {
        let resolver = Arc::new(MockTorrentInfoResolver::new());
        let names: Vec<String> = (0..6).map(|i| format!("T{}", i)).collect();
        for name in &names {
            resolver.set_hash(name, &format!("hash-{}", name)).await;
            resolver.set_delay(name, Duration::from_millis(100)).await;
        }
        let enricher = InfoEnricher::new(resolver.clone(), 2, Duration::from_secs(30));
        let candidates = names.iter().map(|n| fixtures::candidate(n, 1)).collect();

        let enriched = enricher.enrich(candidates, Duration::from_secs(10), 10).await;
        assert_eq!(enriched.len(), 6);
        assert_eq!(resolver.max_in_flight().load(Ordering::SeqCst), 2);
    }
}
