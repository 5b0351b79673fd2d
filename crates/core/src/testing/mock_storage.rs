//! Mock debrid storage backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::debrid::{
    BackendDescriptor, BackendFactory, CacheCheck, ConfigField, DebridError, DebridFile,
    StorageBackend, Transfer, TransferStatus,
};
use crate::profile::UserProfile;

/// Scripted statuses of one transfer, returned poll after poll.
#[derive(Debug, Clone)]
struct TransferScript {
    statuses: Vec<TransferStatus>,
    files: Vec<(String, u64)>,
    polls: usize,
}

/// Mock implementation of the StorageBackend trait.
///
/// Hashes marked cached report their files as ready; a cached hash added
/// through `add_magnet`/`add_torrent_file` comes back ready as well.
/// Anything else stays queued unless a transfer sequence is scripted for
/// it (transfer ids are info hashes).
#[derive(Debug)]
pub struct MockStorageBackend {
    cached: Arc<RwLock<HashMap<String, Vec<(String, u64)>>>>,
    transfers: Arc<RwLock<HashMap<String, TransferScript>>>,
    check_batches: Arc<RwLock<Vec<usize>>>,
    added: Arc<RwLock<Vec<String>>>,
    uploads: Arc<RwLock<Vec<Vec<u8>>>>,
    expired: AtomicBool,
    can_check_cache: AtomicBool,
    empty_links: AtomicBool,
    resolve_calls: AtomicUsize,
    user: String,
}

impl Default for MockStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorageBackend {
    pub fn new() -> Self {
        Self::with_user("mock-user")
    }

    /// A backend whose caller identity is `user`.
    pub fn with_user(user: &str) -> Self {
        Self {
            cached: Arc::new(RwLock::new(HashMap::new())),
            transfers: Arc::new(RwLock::new(HashMap::new())),
            check_batches: Arc::new(RwLock::new(Vec::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            uploads: Arc::new(RwLock::new(Vec::new())),
            expired: AtomicBool::new(false),
            can_check_cache: AtomicBool::new(true),
            empty_links: AtomicBool::new(false),
            resolve_calls: AtomicUsize::new(0),
            user: user.to_string(),
        }
    }

    /// Report `hash` as cached with `files`.
    pub async fn set_cached(&self, hash: &str, files: &[(&str, u64)]) {
        let files = files.iter().map(|(n, s)| (n.to_string(), *s)).collect();
        self.cached.write().await.insert(hash.to_string(), files);
    }

    /// Script the statuses `get_transfer(id)` reports, one per poll. The
    /// last status repeats once the script runs out.
    pub async fn set_transfer_sequence(
        &self,
        id: &str,
        statuses: Vec<TransferStatus>,
        files: Vec<(&str, u64)>,
    ) {
        let script = TransferScript {
            statuses,
            files: files.into_iter().map(|(n, s)| (n.to_string(), s)).collect(),
            polls: 0,
        };
        self.transfers.write().await.insert(id.to_string(), script);
    }

    /// Number of `get_transfer` calls made for `id`.
    pub async fn transfer_polls(&self, id: &str) -> usize {
        self.transfers
            .read()
            .await
            .get(id)
            .map(|s| s.polls)
            .unwrap_or(0)
    }

    /// Make cache checks fail with an expired credential.
    pub async fn expire_credential(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    pub fn set_can_check_cache(&self, value: bool) {
        self.can_check_cache.store(value, Ordering::SeqCst);
    }

    /// Make `resolve_download` hand back an empty link.
    pub fn set_empty_links(&self, value: bool) {
        self.empty_links.store(value, Ordering::SeqCst);
    }

    /// Size of every `check_cache` batch, in call order.
    pub async fn check_batches(&self) -> Vec<usize> {
        self.check_batches.read().await.clone()
    }

    /// Info hashes added, by magnet or torrent file.
    pub async fn added_hashes(&self) -> Vec<String> {
        self.added.read().await.clone()
    }

    /// Raw `.torrent` files uploaded.
    pub async fn uploaded_torrents(&self) -> Vec<Vec<u8>> {
        self.uploads.read().await.clone()
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    fn files(id: &str, files: &[(String, u64)], ready: bool) -> Vec<DebridFile> {
        files
            .iter()
            .enumerate()
            .map(|(i, (name, size))| DebridFile {
                id: format!("{}:{}", id, i),
                name: name.clone(),
                size: *size,
                ready,
            })
            .collect()
    }

    async fn add(&self, hash: &str) -> Transfer {
        self.added.write().await.push(hash.to_string());
        match self.cached.read().await.get(hash) {
            Some(files) => Transfer {
                id: hash.to_string(),
                status: TransferStatus::Cached,
                files: Self::files(hash, files, true),
            },
            None => Transfer {
                id: hash.to_string(),
                status: TransferStatus::Queued,
                files: Vec::new(),
            },
        }
    }
}

#[async_trait]
impl StorageBackend for MockStorageBackend {
    fn id(&self) -> &str {
        "mock"
    }

    fn short_name(&self) -> &str {
        "MK"
    }

    fn can_check_cache(&self) -> bool {
        self.can_check_cache.load(Ordering::SeqCst)
    }

    fn user_hash(&self) -> String {
        self.user.clone()
    }

    async fn check_cache(
        &self,
        hashes: &[String],
        _sid: &str,
    ) -> Result<Vec<CacheCheck>, DebridError> {
        self.check_batches.write().await.push(hashes.len());
        if self.expired.load(Ordering::SeqCst) {
            return Err(DebridError::ExpiredCredential);
        }
        let cached = self.cached.read().await;
        Ok(hashes
            .iter()
            .filter_map(|hash| {
                cached.get(hash).map(|files| CacheCheck {
                    hash: hash.clone(),
                    status: TransferStatus::Cached,
                    files: Self::files(hash, files, true),
                })
            })
            .collect())
    }

    async fn add_magnet(&self, magnet: &str) -> Result<Transfer, DebridError> {
        let hash = magnet
            .split("urn:btih:")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .ok_or_else(|| DebridError::InvalidResponse(format!("bad magnet {}", magnet)))?;
        Ok(self.add(&hash.to_ascii_lowercase()).await)
    }

    async fn add_torrent_file(
        &self,
        torrent: &[u8],
        info_hash: &str,
    ) -> Result<Transfer, DebridError> {
        self.uploads.write().await.push(torrent.to_vec());
        Ok(self.add(info_hash).await)
    }

    async fn get_transfer(&self, id: &str) -> Result<Transfer, DebridError> {
        let mut transfers = self.transfers.write().await;
        let Some(script) = transfers.get_mut(id) else {
            return Ok(Transfer {
                id: id.to_string(),
                status: TransferStatus::Queued,
                files: Vec::new(),
            });
        };
        let index = script.polls.min(script.statuses.len().saturating_sub(1));
        script.polls += 1;
        let status = script
            .statuses
            .get(index)
            .copied()
            .unwrap_or(TransferStatus::Unknown);
        Ok(Transfer {
            id: id.to_string(),
            status,
            files: Self::files(id, &script.files, status.is_ready()),
        })
    }

    async fn resolve_download(&self, file: &DebridFile) -> Result<String, DebridError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if !file.ready {
            return Err(DebridError::NotReady);
        }
        if self.empty_links.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        Ok(format!(
            "https://cdn.example/{}/{}",
            file.id,
            urlencoding::encode(&file.name)
        ))
    }
}

/// Backend factory handing out one shared [`MockStorageBackend`].
#[derive(Debug, Clone)]
pub struct MockBackendFactory {
    backend: Arc<MockStorageBackend>,
}

impl MockBackendFactory {
    pub fn new(backend: Arc<MockStorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<MockStorageBackend> {
        &self.backend
    }
}

impl BackendFactory for MockBackendFactory {
    fn create(&self, _profile: &UserProfile) -> Result<Arc<dyn StorageBackend>, DebridError> {
        Ok(Arc::clone(&self.backend) as Arc<dyn StorageBackend>)
    }

    fn descriptors(&self) -> Vec<BackendDescriptor> {
        vec![BackendDescriptor {
            id: "mock".to_string(),
            name: "Mock".to_string(),
            short_name: "MK".to_string(),
            config_fields: vec![ConfigField::password("debrid_api_key", "API Key")],
        }]
    }
}
