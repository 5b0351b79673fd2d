//! In-memory cache store.

use std::time::Duration;

use async_trait::async_trait;

use super::{CacheError, CacheStore, TtlCache};

/// Process-local [`CacheStore`]. Contents are lost on restart.
pub struct MemoryCacheStore {
    entries: TtlCache<String, String>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: TtlCache::new(Duration::from_secs(24 * 3600)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(&key.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert_with_ttl(key.to_string(), value.to_string(), ttl);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(self.entries.purge_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_get_expire() {
        let store = MemoryCacheStore::new();
        store
            .set("download:1", "https://x", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(
            store.get("download:1").await.unwrap().as_deref(),
            Some("https://x")
        );

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get("download:1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_removes_unread_entries() {
        let store = MemoryCacheStore::new();
        store.set("a", "1", Duration::from_secs(10)).await.unwrap();
        store.set("b", "2", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
