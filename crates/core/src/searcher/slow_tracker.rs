//! Per-indexer latency ledger used to route around slow indexers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use super::IndexerBackend;
use crate::config::SlowIndexerConfig;
use crate::metrics;

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration: Duration,
    at: Instant,
}

/// Latency statistics over the live window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexerStats {
    pub min_ms: u64,
    pub avg_ms: u64,
    pub max_ms: u64,
    pub count: usize,
}

/// Tracks slow searches per indexer within a sliding window.
///
/// Only searches whose allotted timeout exceeds the slow threshold are
/// eligible; a short-timeout probe can never be slow, so it is ignored
/// entirely. A slow search appends a sample. Any eligible search that
/// finishes under the threshold clears the indexer's samples.
pub struct SlowIndexerTracker {
    slow_duration: Duration,
    window: Duration,
    limit: i64,
    samples: Mutex<HashMap<String, Vec<Sample>>>,
}

impl SlowIndexerTracker {
    pub fn new(config: &SlowIndexerConfig) -> Self {
        Self {
            slow_duration: Duration::from_secs(config.duration_secs),
            window: Duration::from_secs(config.window_secs),
            limit: config.request_limit,
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// Record one search. Returns true when the search was recorded as slow.
    pub fn record(&self, indexer: &str, elapsed: Duration, timeout: Duration) -> bool {
        if timeout <= self.slow_duration {
            return false;
        }

        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if elapsed > self.slow_duration {
            warn!(
                indexer = indexer,
                duration_ms = elapsed.as_millis() as u64,
                "Slow indexer detected"
            );
            metrics::SLOW_INDEXER_DETECTIONS
                .with_label_values(&[indexer])
                .inc();
            samples.entry(indexer.to_string()).or_default().push(Sample {
                duration: elapsed,
                at: Instant::now(),
            });
            true
        } else {
            samples.remove(indexer);
            false
        }
    }

    /// Statistics over samples still inside the window.
    pub fn stats(&self, indexer: &str) -> IndexerStats {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = samples.get_mut(indexer) else {
            return IndexerStats::default();
        };
        let now = Instant::now();
        entries.retain(|s| now.duration_since(s.at) < self.window);

        if entries.is_empty() {
            samples.remove(indexer);
            return IndexerStats::default();
        }

        let durations: Vec<u64> = entries
            .iter()
            .map(|s| s.duration.as_millis() as u64)
            .collect();
        let total: u64 = durations.iter().sum();
        IndexerStats {
            min_ms: durations.iter().copied().min().unwrap_or(0),
            avg_ms: total / durations.len() as u64,
            max_ms: durations.iter().copied().max().unwrap_or(0),
            count: durations.len(),
        }
    }

    /// Whether the indexer is below the slow limit. Always true when the
    /// limit is disabled.
    pub fn is_fast(&self, indexer: &str) -> bool {
        if self.limit <= 0 {
            return true;
        }
        (self.stats(indexer).count as i64) < self.limit
    }

    /// Keep only fast indexers, or all of them if none is fast.
    pub fn select_fast(&self, backends: Vec<IndexerBackend>) -> Vec<IndexerBackend> {
        let (fast, slow): (Vec<_>, Vec<_>) =
            backends.into_iter().partition(|b| self.is_fast(&b.id));
        if fast.is_empty() {
            slow
        } else {
            fast
        }
    }

    /// Stats for every indexer with live samples.
    pub fn snapshot(&self) -> Vec<(String, IndexerStats)> {
        let ids: Vec<String> = {
            let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
            samples.keys().cloned().collect()
        };
        let mut snapshot: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let stats = self.stats(&id);
                (id, stats)
            })
            .filter(|(_, stats)| stats.count > 0)
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}
