//! Mock metadata provider for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::fixtures;
use crate::media::{MediaInfo, MetadataError, MetadataProvider};

/// Mock implementation of the MetadataProvider trait.
///
/// Unknown movie ids resolve to [`fixtures::movie_info`] and unknown series
/// ids to [`fixtures::series_info`], unless marked missing.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    infos: Arc<RwLock<HashMap<String, MediaInfo>>>,
    missing: Arc<RwLock<Vec<String>>>,
    lookups: AtomicUsize,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata returned for `id`.
    pub async fn set_info(&self, id: &str, info: MediaInfo) {
        self.infos.write().await.insert(id.to_string(), info);
    }

    /// Make lookups of `id` fail with `NotFound`.
    pub async fn set_missing(&self, id: &str) {
        self.missing.write().await.push(id.to_string());
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn lookup(&self, id: &str, fallback: MediaInfo) -> Result<MediaInfo, MetadataError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.missing.read().await.iter().any(|m| m == id) {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        Ok(self.infos.read().await.get(id).cloned().unwrap_or(fallback))
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_movie(&self, id: &str, _language: &str) -> Result<MediaInfo, MetadataError> {
        self.lookup(id, fixtures::movie_info()).await
    }

    async fn get_episode(
        &self,
        id: &str,
        _season: u32,
        _episode: u32,
        _language: &str,
    ) -> Result<MediaInfo, MetadataError> {
        self.lookup(id, fixtures::series_info()).await
    }
}
