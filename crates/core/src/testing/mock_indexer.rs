//! Mock indexer gateway for testing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::media::MediaQuery;
use crate::searcher::{Candidate, IndexerBackend, IndexerGateway, SearchError};

/// Which gateway call a search came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCall {
    Movies,
    Episodes,
    Seasons,
}

/// Mock implementation of the IndexerGateway trait.
///
/// Results are configured per indexer. Movie and episode searches return
/// the same configured list; season searches have their own.
#[derive(Debug, Default)]
pub struct MockIndexerGateway {
    backends: Arc<RwLock<Vec<IndexerBackend>>>,
    results: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    season_results: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    searches: Arc<RwLock<Vec<(String, SearchCall, String)>>>,
}

impl MockIndexerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway exposing `backends`.
    pub fn with_backends(backends: Vec<IndexerBackend>) -> Self {
        Self {
            backends: Arc::new(RwLock::new(backends)),
            ..Self::default()
        }
    }

    /// Results of movie and episode searches on `indexer`.
    pub async fn set_results(&self, indexer: &str, results: Vec<Candidate>) {
        self.results
            .write()
            .await
            .insert(indexer.to_string(), results);
    }

    /// Results of season searches on `indexer`.
    pub async fn set_season_results(&self, indexer: &str, results: Vec<Candidate>) {
        self.season_results
            .write()
            .await
            .insert(indexer.to_string(), results);
    }

    /// Delay every search on `indexer`.
    pub async fn set_delay(&self, indexer: &str, delay: Duration) {
        self.delays.write().await.insert(indexer.to_string(), delay);
    }

    /// Make every search on `indexer` fail.
    pub async fn fail_indexer(&self, indexer: &str) {
        self.failing.write().await.insert(indexer.to_string());
    }

    /// Recorded searches as (indexer, call, media id).
    pub async fn recorded_searches(&self) -> Vec<(String, SearchCall, String)> {
        self.searches.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    async fn search(
        &self,
        indexer: &str,
        query: &MediaQuery,
        call: SearchCall,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.searches
            .write()
            .await
            .push((indexer.to_string(), call, query.media_id.clone()));

        let delay = self.delays.read().await.get(indexer).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().await.contains(indexer) {
            return Err(SearchError::ApiError(format!("{} is down", indexer)));
        }

        let source = match call {
            SearchCall::Movies | SearchCall::Episodes => &self.results,
            SearchCall::Seasons => &self.season_results,
        };
        let results = source.read().await.get(indexer).cloned().unwrap_or_default();
        Ok(results
            .into_iter()
            .map(|mut c| {
                c.indexer_id = indexer.to_string();
                c
            })
            .collect())
    }
}

#[async_trait]
impl IndexerGateway for MockIndexerGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_backends(&self) -> Result<Vec<IndexerBackend>, SearchError> {
        Ok(self.backends.read().await.clone())
    }

    async fn search_movies(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.search(indexer, query, SearchCall::Movies).await
    }

    async fn search_episodes(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.search(indexer, query, SearchCall::Episodes).await
    }

    async fn search_seasons(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.search(indexer, query, SearchCall::Seasons).await
    }
}
