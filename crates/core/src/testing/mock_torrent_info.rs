//! Mock torrent info resolver for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::fixtures;
use crate::searcher::Candidate;
use crate::torrent_info::{TorrentInfoError, TorrentInfoResolver, TorrentInfos};

/// Mock implementation of the TorrentInfoResolver trait.
///
/// Infos are configured per candidate name. Resolved infos are remembered
/// by id, so `get_by_id` works for anything resolved before.
#[derive(Debug, Default)]
pub struct MockTorrentInfoResolver {
    by_name: Arc<RwLock<HashMap<String, TorrentInfos>>>,
    by_id: Arc<RwLock<HashMap<String, TorrentInfos>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MockTorrentInfoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the candidate named `name` to a magnet-only torrent with
    /// `hash`.
    pub async fn set_hash(&self, name: &str, hash: &str) {
        self.set_infos(name, fixtures::torrent_infos(name, hash))
            .await;
    }

    /// Resolve the candidate named `name` to `infos`.
    pub async fn set_infos(&self, name: &str, infos: TorrentInfos) {
        self.by_name.write().await.insert(name.to_string(), infos);
    }

    /// Make `get_by_id` find `infos` without resolving a candidate first.
    pub async fn insert(&self, infos: TorrentInfos) {
        self.by_id.write().await.insert(infos.id.clone(), infos);
    }

    pub async fn fail(&self, name: &str) {
        self.failing.write().await.insert(name.to_string());
    }

    pub async fn set_delay(&self, name: &str, delay: Duration) {
        self.delays.write().await.insert(name.to_string(), delay);
    }

    /// Highest number of concurrent `resolve` calls seen.
    pub fn max_in_flight(&self) -> &AtomicUsize {
        &self.max_in_flight
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    async fn lookup(&self, name: &str) -> Result<TorrentInfos, TorrentInfoError> {
        let delay = self.delays.read().await.get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().await.contains(name) {
            return Err(TorrentInfoError::Request(format!("{} failed", name)));
        }
        let infos = self
            .by_name
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| TorrentInfoError::NotFound(name.to_string()))?;
        self.by_id
            .write()
            .await
            .insert(infos.id.clone(), infos.clone());
        Ok(infos)
    }
}

#[async_trait]
impl TorrentInfoResolver for MockTorrentInfoResolver {
    async fn resolve(&self, candidate: &Candidate) -> Result<TorrentInfos, TorrentInfoError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = self.lookup(&candidate.name).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_by_id(&self, id: &str) -> Result<TorrentInfos, TorrentInfoError> {
        self.by_id
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TorrentInfoError::NotFound(id.to_string()))
    }
}
