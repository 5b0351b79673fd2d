//! Types for the resolution pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::config::{Config, PasskeyConfig};
use crate::debrid::DebridError;
use crate::media::MetadataError;
use crate::searcher::SearchError;
use crate::torrent_info::{PasskeyError, TorrentInfoError};

/// Errors surfaced by stream listing and download resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No indexer configured")]
    NoBackendConfigured,

    #[error("No torrent infos for {0}")]
    NoTorrentInfos(String),

    #[error("Torrent not ready on debrid")]
    NotReady,

    #[error("Expired debrid API key")]
    ExpiredCredential,

    #[error("Invalid user passkey, pattern not matched: {0}")]
    InvalidPasskey(String),

    #[error("Unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    #[error("Search failed: {0}")]
    Search(SearchError),

    #[error("Metadata lookup failed: {0}")]
    Metadata(MetadataError),

    #[error("Torrent infos failed: {0}")]
    TorrentInfo(#[from] TorrentInfoError),

    #[error("Debrid failed: {0}")]
    Debrid(DebridError),

    #[error("Passkey rewrite failed: {0}")]
    Passkey(#[from] PasskeyError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<SearchError> for ResolveError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::NoBackendConfigured => ResolveError::NoBackendConfigured,
            other => ResolveError::Search(other),
        }
    }
}

impl From<MetadataError> for ResolveError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::UnsupportedKind(kind) => ResolveError::UnsupportedMediaKind(kind),
            other => ResolveError::Metadata(other),
        }
    }
}

impl From<DebridError> for ResolveError {
    fn from(e: DebridError) -> Self {
        match e {
            DebridError::NotReady => ResolveError::NotReady,
            DebridError::ExpiredCredential => ResolveError::ExpiredCredential,
            other => ResolveError::Debrid(other),
        }
    }
}

/// One entry of a stream listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub name: String,
    /// Description lines joined with newlines.
    pub title: String,
    /// Download action, `#` when disabled.
    pub url: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// Result of a download resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Direct (possibly proxied) URL of the file.
    Url(String),
    /// Placeholder shown while nothing is playable.
    Fallback(String),
}

impl DownloadOutcome {
    pub fn url(&self) -> &str {
        match self {
            DownloadOutcome::Url(url) | DownloadOutcome::Fallback(url) => url,
        }
    }
}

/// Operator settings the pipeline needs at request time.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Base URL of this server, without trailing slash.
    pub public_url: String,
    pub addon_name: String,
    pub passkey: PasskeyConfig,
    pub download_ttl: Duration,
    pub magnet_poll_attempts: u32,
    pub magnet_poll_interval: Duration,
}

impl ResolverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_url: config.server.public_url.trim_end_matches('/').to_string(),
            addon_name: config.addon.name.clone(),
            passkey: config.passkey.clone(),
            download_ttl: Duration::from_secs(config.cache.download_ttl_secs),
            magnet_poll_attempts: config.resolver.magnet_poll_attempts,
            magnet_poll_interval: Duration::from_millis(config.resolver.magnet_poll_interval_ms),
        }
    }

    /// Placeholder video served when no download URL can be produced.
    pub fn not_ready_url(&self) -> String {
        format!("{}/static/videos/not_ready.mp4", self.public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions_keep_taxonomy() {
        assert!(matches!(
            ResolveError::from(SearchError::NoBackendConfigured),
            ResolveError::NoBackendConfigured
        ));
        assert!(matches!(
            ResolveError::from(SearchError::Timeout),
            ResolveError::Search(_)
        ));
        assert!(matches!(
            ResolveError::from(DebridError::NotReady),
            ResolveError::NotReady
        ));
        assert!(matches!(
            ResolveError::from(DebridError::ExpiredCredential),
            ResolveError::ExpiredCredential
        ));
        assert!(matches!(
            ResolveError::from(MetadataError::UnsupportedKind("tv".to_string())),
            ResolveError::UnsupportedMediaKind(_)
        ));
    }

    #[test]
    fn test_stream_entry_omits_enabled_flag() {
        let entry = StreamEntry {
            name: "n".to_string(),
            title: "t".to_string(),
            url: "u".to_string(),
            disabled: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("disabled").is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let config = crate::config::load_config_from_str(
            r#"
[server]
public_url = "https://addon.example/"

[jackett]
url = "http://localhost:9117"
api_key = "abc"
"#,
        )
        .unwrap();
        let settings = ResolverSettings::from_config(&config);
        assert_eq!(
            settings.not_ready_url(),
            "https://addon.example/static/videos/not_ready.mp4"
        );
        assert_eq!(settings.magnet_poll_interval, Duration::from_secs(2));
    }
}
