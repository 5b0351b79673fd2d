//! Types for debrid storage backends.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during storage backend operations.
#[derive(Debug, Error)]
pub enum DebridError {
    #[error("Unknown debrid service: {0}")]
    UnknownBackend(String),

    #[error("Debrid service {0} is only reachable through StremThru")]
    Unsupported(String),

    #[error("Missing debrid setting: {0}")]
    MissingSetting(&'static str),

    #[error("Expired debrid API key")]
    ExpiredCredential,

    #[error("Torrent not ready on debrid")]
    NotReady,

    #[error("Debrid connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Debrid API error {code}: {message}")]
    ApiError { code: String, message: String },

    #[error("Invalid debrid response: {0}")]
    InvalidResponse(String),

    #[error("File not found on debrid: {0}")]
    FileNotFound(String),
}

/// Transfer state reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Cached,
    Queued,
    Downloading,
    Processing,
    Downloaded,
    Uploading,
    Failed,
    Invalid,
    #[serde(other)]
    Unknown,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Cached => "cached",
            TransferStatus::Queued => "queued",
            TransferStatus::Downloading => "downloading",
            TransferStatus::Processing => "processing",
            TransferStatus::Downloaded => "downloaded",
            TransferStatus::Uploading => "uploading",
            TransferStatus::Failed => "failed",
            TransferStatus::Invalid => "invalid",
            TransferStatus::Unknown => "unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TransferStatus::Cached => "⚡",
            TransferStatus::Queued => "⏳",
            TransferStatus::Downloading => "⏬",
            TransferStatus::Processing => "⚙️",
            TransferStatus::Downloaded => "✅",
            TransferStatus::Uploading => "⏫",
            TransferStatus::Failed => "❌",
            TransferStatus::Invalid => "⛔",
            TransferStatus::Unknown => "❓",
        }
    }

    /// Content can be streamed right away.
    pub fn is_ready(&self) -> bool {
        matches!(self, TransferStatus::Cached | TransferStatus::Downloaded)
    }
}

/// Download progress of an uncached transfer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub percent: f64,
    /// Bytes per second.
    pub speed: u64,
}

/// A file as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebridFile {
    /// Backend-specific reference used to resolve a download.
    pub id: String,
    pub name: String,
    pub size: u64,
    pub ready: bool,
}

/// Availability of one info hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCheck {
    pub hash: String,
    pub status: TransferStatus,
    #[serde(default)]
    pub files: Vec<DebridFile>,
}

/// A torrent added to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub status: TransferStatus,
    #[serde(default)]
    pub files: Vec<DebridFile>,
}

/// One user-facing setting of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigField {
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ConfigField {
    pub fn text(name: &str, label: &str, value: Option<&str>) -> Self {
        Self {
            field_type: "text".to_string(),
            name: name.to_string(),
            label: label.to_string(),
            required: true,
            value: value.map(str::to_string),
        }
    }

    pub fn password(name: &str, label: &str) -> Self {
        Self {
            field_type: "password".to_string(),
            ..Self::text(name, label, None)
        }
    }
}

/// Static description of a storage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub config_fields: Vec<ConfigField>,
}

/// A debrid storage service.
///
/// Implementations are request scoped: they carry the caller's credential.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Provider id used in profiles ("realdebrid", "stremthru", ...).
    fn id(&self) -> &str;

    /// Abbreviation shown in stream names.
    fn short_name(&self) -> &str;

    /// Whether `check_cache` reports real availability. When false,
    /// uncached candidates are always listed.
    fn can_check_cache(&self) -> bool {
        true
    }

    /// Marker appended to the short name of a listed candidate.
    fn availability_icon(&self, cached: bool) -> &'static str {
        if cached {
            "+"
        } else {
            ""
        }
    }

    /// Stable hash of the caller's identity on this backend.
    fn user_hash(&self) -> String;

    /// Namespace of availability statuses learned through this backend.
    /// Two callers share statuses only when they share a scope.
    fn cache_scope(&self) -> String {
        format!("{}:{}", self.id(), self.user_hash())
    }

    /// Availability of each hash. Hashes the backend knows nothing about
    /// may be absent from the result.
    async fn check_cache(
        &self,
        hashes: &[String],
        sid: &str,
    ) -> Result<Vec<CacheCheck>, DebridError>;

    /// Progress of uncached transfers by hash.
    async fn progress(&self, hashes: &[String]) -> Result<HashMap<String, Progress>, DebridError> {
        Ok(hashes
            .iter()
            .map(|hash| (hash.clone(), Progress::default()))
            .collect())
    }

    async fn add_magnet(&self, magnet: &str) -> Result<Transfer, DebridError>;

    /// Add a `.torrent` file. Backends without upload support add the
    /// info hash as a magnet.
    async fn add_torrent_file(
        &self,
        _torrent: &[u8],
        info_hash: &str,
    ) -> Result<Transfer, DebridError> {
        self.add_magnet(&format!("magnet:?xt=urn:btih:{}", info_hash))
            .await
    }

    async fn get_transfer(&self, id: &str) -> Result<Transfer, DebridError>;

    /// Direct download URL of `file`. Fails with [`DebridError::NotReady`]
    /// while the transfer is still in progress.
    async fn resolve_download(&self, file: &DebridFile) -> Result<String, DebridError>;
}
