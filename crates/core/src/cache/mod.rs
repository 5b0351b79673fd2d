//! Key/value caching.
//!
//! [`CacheStore`] is the persistent TTL store used for resolved download
//! URLs and torrent infos. [`TtlCache`] is the generic in-process cache the
//! memory store and the debrid status cache are built on.

mod memory;
mod sqlite;
mod ttl;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;
pub use ttl::TtlCache;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// String key/value store with per-entry TTL.
///
/// A missing or expired key is a normal miss (`Ok(None)`), never an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;
}

/// Read and deserialize a JSON value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

/// Serialize a value as JSON and store it.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    store.set(key, &raw, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        url: String,
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryCacheStore::new();
        let entry = Entry {
            url: "https://cdn.example/file.mkv".to_string(),
        };
        set_json(&store, "k", &entry, Duration::from_secs(60))
            .await
            .unwrap();
        let loaded: Option<Entry> = get_json(&store, "k").await.unwrap();
        assert_eq!(loaded, Some(entry));

        let missing: Option<Entry> = get_json(&store, "missing").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_json_bad_payload() {
        let store = MemoryCacheStore::new();
        store.set("k", "not json", Duration::from_secs(60)).await.unwrap();
        let result: Result<Option<Entry>, _> = get_json(&store, "k").await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }
}
