//! Per-request user profile.
//!
//! A profile is the operator defaults overlaid with the caller's own
//! settings. Callers ship their settings as base64url-encoded JSON in the
//! request path; keys the operator marks immutable are stripped before the
//! overlay so they always keep their default value.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field a candidate list can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Quality,
    Seeders,
    Size,
}

/// One key of a multi-key sort. Serialized as `["quality", true]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(SortField, bool)", into = "(SortField, bool)")]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub const fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub const fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }
}

impl From<(SortField, bool)> for SortKey {
    fn from((field, descending): (SortField, bool)) -> Self {
        Self { field, descending }
    }
}

impl From<SortKey> for (SortField, bool) {
    fn from(key: SortKey) -> Self {
        (key.field, key.descending)
    }
}

/// Resolved settings for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Allowed quality values (0 means unknown).
    pub qualities: Vec<u32>,
    /// Candidates whose title contains any of these words are dropped.
    pub exclude_keywords: Vec<String>,
    pub max_torrents: usize,
    /// Language values ("french", "english", ...) to move to the front.
    pub prioritize_languages: Vec<String>,
    /// Number of season packs to force into the list when none made the cut.
    pub prioritize_pack_torrents: usize,
    pub force_cache_next_episode: bool,
    pub sort_cached: Vec<SortKey>,
    pub sort_uncached: Vec<SortKey>,
    pub hide_uncached: bool,
    /// Indexer allow-list; `"all"` allows every indexer.
    pub indexers: Vec<String>,
    pub indexer_timeout_sec: u64,
    pub passkey: String,
    pub meta_language: String,
    pub enable_mediaflow: bool,
    pub mediaflow_proxy_url: String,
    pub mediaflow_api_password: String,
    pub mediaflow_public_ip: String,
    pub use_stremthru: bool,
    pub stremthru_url: String,
    /// Store used when `debrid_id` is `stremthru` itself.
    pub stremthru_store: Option<String>,
    pub debrid_id: String,
    pub debrid_api_key: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            qualities: vec![0, 720, 1080],
            exclude_keywords: Vec::new(),
            max_torrents: 8,
            prioritize_languages: Vec::new(),
            prioritize_pack_torrents: 2,
            force_cache_next_episode: false,
            sort_cached: vec![
                SortKey::desc(SortField::Quality),
                SortKey::desc(SortField::Size),
            ],
            sort_uncached: vec![SortKey::desc(SortField::Seeders)],
            hide_uncached: false,
            indexers: vec!["all".to_string()],
            indexer_timeout_sec: 60,
            passkey: String::new(),
            meta_language: String::new(),
            enable_mediaflow: false,
            mediaflow_proxy_url: String::new(),
            mediaflow_api_password: String::new(),
            mediaflow_public_ip: String::new(),
            use_stremthru: true,
            stremthru_url: "https://stremthru.13377001.xyz".to_string(),
            stremthru_store: None,
            debrid_id: "realdebrid".to_string(),
            debrid_api_key: String::new(),
        }
    }
}

/// Errors that can occur when decoding or merging a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid profile encoding: {0}")]
    InvalidEncoding(String),

    #[error("Invalid profile JSON: {0}")]
    InvalidJson(String),

    #[error("Profile must be a JSON object")]
    NotAnObject,
}

impl UserProfile {
    /// Whether `indexer_id` passes the allow-list.
    pub fn allows_indexer(&self, indexer_id: &str) -> bool {
        self.indexers.iter().any(|i| i == "all" || i == indexer_id)
    }

    /// Per-indexer search timeout.
    pub fn indexer_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.indexer_timeout_sec)
    }

    /// Encode as base64url JSON for embedding in URLs.
    pub fn encode(&self) -> String {
        // Serializing a struct of plain fields cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Overlay caller overrides on `defaults`. Keys listed in
    /// `immutable_keys` are removed from the overrides first.
    pub fn merge(
        defaults: &UserProfile,
        overrides: Value,
        immutable_keys: &[String],
    ) -> Result<UserProfile, ProfileError> {
        let Value::Object(mut overrides) = overrides else {
            return Err(ProfileError::NotAnObject);
        };
        for key in immutable_keys {
            overrides.remove(key);
        }

        let mut base = serde_json::to_value(defaults)
            .map_err(|e| ProfileError::InvalidJson(e.to_string()))?;
        if let Value::Object(base) = &mut base {
            for (key, value) in overrides {
                // Null means "not set" for the caller, not "clear".
                if !value.is_null() {
                    base.insert(key, value);
                }
            }
        }

        serde_json::from_value(base).map_err(|e| ProfileError::InvalidJson(e.to_string()))
    }

    /// Decode a path segment and merge it over `defaults`.
    pub fn decode(
        encoded: &str,
        defaults: &UserProfile,
        immutable_keys: &[String],
    ) -> Result<UserProfile, ProfileError> {
        let trimmed = encoded.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .or_else(|_| STANDARD.decode(encoded))
            .map_err(|e| ProfileError::InvalidEncoding(e.to_string()))?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| ProfileError::InvalidJson(e.to_string()))?;
        Self::merge(defaults, value, immutable_keys)
    }
}
