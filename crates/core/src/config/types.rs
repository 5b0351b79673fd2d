use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::profile::UserProfile;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub jackett: JackettConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub slow_indexer: SlowIndexerConfig,
    #[serde(default)]
    pub passkey: PasskeyConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub addon: AddonConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL clients use to reach this server; used for action links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    4000
}

fn default_public_url() -> String {
    "http://localhost:4000".to_string()
}

/// Key/value cache backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    /// SQLite database path (sqlite backend only)
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// TTL of resolved download URLs
    #[serde(default = "default_download_ttl")]
    pub download_ttl_secs: u64,
    /// TTL of resolved torrent infos, addressed by their opaque id
    #[serde(default = "default_torrent_infos_ttl")]
    pub torrent_infos_ttl_secs: u64,
    /// How often expired entries are swept from this cache and the
    /// availability status cache
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: default_cache_path(),
            download_ttl_secs: default_download_ttl(),
            torrent_infos_ttl_secs: default_torrent_infos_ttl(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Sqlite
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("debridge-cache.db")
}

fn default_download_ttl() -> u64 {
    3600
}

fn default_torrent_infos_ttl() -> u64 {
    7 * 24 * 3600
}

fn default_purge_interval() -> u64 {
    3600
}

/// Jackett indexer gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// HTTP client timeout in seconds. Per-search budgets are applied on top.
    #[serde(default = "default_jackett_timeout")]
    pub timeout_secs: u32,
    /// Indexers exposed through this Jackett instance
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
}

fn default_jackett_timeout() -> u32 {
    120
}

/// One indexer configured in Jackett
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    /// Jackett indexer id (e.g., "yts")
    pub id: String,
    /// Display title (defaults to the id)
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the indexer supports movie searches
    #[serde(default = "default_true")]
    pub movies: bool,
    /// Whether the indexer supports series searches
    #[serde(default = "default_true")]
    pub series: bool,
}

fn default_true() -> bool {
    true
}

/// Metadata provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_cinemeta_url")]
    pub cinemeta_url: String,
    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            cinemeta_url: default_cinemeta_url(),
            timeout_secs: default_metadata_timeout(),
        }
    }
}

fn default_cinemeta_url() -> String {
    "https://v3-cinemeta.strem.io".to_string()
}

fn default_metadata_timeout() -> u64 {
    10
}

/// Slow indexer detection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlowIndexerConfig {
    /// A search slower than this counts as slow. Searches whose timeout
    /// is not above it are never recorded.
    #[serde(default = "default_slow_duration")]
    pub duration_secs: u64,
    /// Only samples within this window count
    #[serde(default = "default_slow_window")]
    pub window_secs: u64,
    /// Slow samples needed to exclude an indexer; <= 0 disables exclusion
    #[serde(default = "default_slow_limit")]
    pub request_limit: i64,
}

impl Default for SlowIndexerConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_slow_duration(),
            window_secs: default_slow_window(),
            request_limit: default_slow_limit(),
        }
    }
}

fn default_slow_duration() -> u64 {
    20
}

fn default_slow_window() -> u64 {
    1800
}

fn default_slow_limit() -> i64 {
    5
}

/// Private tracker passkey replacement
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasskeyConfig {
    /// Operator passkey found in torrent files, replaced by the user's own.
    /// Replacement is disabled when unset.
    #[serde(default)]
    pub replace: Option<String>,
    /// Pattern a user passkey must fully match
    #[serde(default = "default_passkey_pattern")]
    pub pattern: String,
    /// Where users can find their passkey
    #[serde(default)]
    pub info_url: Option<String>,
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self {
            replace: None,
            pattern: default_passkey_pattern(),
            info_url: None,
        }
    }
}

fn default_passkey_pattern() -> String {
    "[a-zA-Z0-9]+".to_string()
}

/// Resolution pipeline tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Process-wide cap on concurrent torrent info fetches
    #[serde(default = "default_info_concurrency")]
    pub info_concurrency: usize,
    /// Upper bound for a single torrent info fetch
    #[serde(default = "default_info_timeout_cap")]
    pub info_timeout_cap_secs: u64,
    /// Lifetime of cached per-hash availability statuses
    #[serde(default = "default_status_cache_ttl")]
    pub status_cache_ttl_secs: u64,
    /// Hashes per availability check request
    #[serde(default = "default_check_batch_size")]
    pub check_batch_size: usize,
    /// Polls of a freshly added magnet before giving up
    #[serde(default = "default_magnet_poll_attempts")]
    pub magnet_poll_attempts: u32,
    #[serde(default = "default_magnet_poll_interval")]
    pub magnet_poll_interval_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            info_concurrency: default_info_concurrency(),
            info_timeout_cap_secs: default_info_timeout_cap(),
            status_cache_ttl_secs: default_status_cache_ttl(),
            check_batch_size: default_check_batch_size(),
            magnet_poll_attempts: default_magnet_poll_attempts(),
            magnet_poll_interval_ms: default_magnet_poll_interval(),
        }
    }
}

fn default_info_concurrency() -> usize {
    5
}

fn default_info_timeout_cap() -> u64 {
    30
}

fn default_status_cache_ttl() -> u64 {
    300
}

fn default_check_batch_size() -> usize {
    50
}

fn default_magnet_poll_attempts() -> u32 {
    10
}

fn default_magnet_poll_interval() -> u64 {
    2000
}

/// Presentation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddonConfig {
    #[serde(default = "default_addon_name")]
    pub name: String,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            name: default_addon_name(),
        }
    }
}

fn default_addon_name() -> String {
    "Debridge".to_string()
}

/// Default user profile and the keys callers may not override
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub immutable_keys: Vec<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub jackett: SanitizedJackettConfig,
    pub metadata: MetadataConfig,
    pub slow_indexer: SlowIndexerConfig,
    pub passkey: SanitizedPasskeyConfig,
    pub resolver: ResolverConfig,
    pub addon: AddonConfig,
    pub immutable_keys: Vec<String>,
}

/// Sanitized Jackett config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub indexers: Vec<IndexerConfig>,
}

/// Sanitized passkey config (operator passkey hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPasskeyConfig {
    pub replace_enabled: bool,
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            cache: config.cache.clone(),
            jackett: SanitizedJackettConfig {
                url: config.jackett.url.clone(),
                api_key_configured: !config.jackett.api_key.is_empty(),
                timeout_secs: config.jackett.timeout_secs,
                indexers: config.jackett.indexers.clone(),
            },
            metadata: config.metadata.clone(),
            slow_indexer: config.slow_indexer.clone(),
            passkey: SanitizedPasskeyConfig {
                replace_enabled: config.passkey.replace.is_some(),
                pattern: config.passkey.pattern.clone(),
                info_url: config.passkey.info_url.clone(),
            },
            resolver: config.resolver.clone(),
            addon: config.addon.clone(),
            immutable_keys: config.defaults.immutable_keys.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[jackett]
url = "http://localhost:9117"
api_key = "abc"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.download_ttl_secs, 3600);
        assert_eq!(config.slow_indexer.duration_secs, 20);
        assert_eq!(config.slow_indexer.window_secs, 1800);
        assert_eq!(config.slow_indexer.request_limit, 5);
        assert_eq!(config.resolver.info_concurrency, 5);
        assert_eq!(config.resolver.check_batch_size, 50);
        assert_eq!(config.defaults.profile.max_torrents, 8);
        assert!(config.passkey.replace.is_none());
    }

    #[test]
    fn test_deserialize_missing_jackett_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_indexers_and_defaults() {
        let toml = r#"
[jackett]
url = "http://localhost:9117"
api_key = "abc"

[[jackett.indexers]]
id = "yts"
series = false

[[jackett.indexers]]
id = "eztv"
title = "EZTV"
movies = false

[defaults]
immutable_keys = ["indexer_timeout_sec"]

[defaults.profile]
max_torrents = 12
prioritize_languages = ["french"]
sort_uncached = [["seeders", true], ["size", false]]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.jackett.indexers.len(), 2);
        assert!(config.jackett.indexers[0].movies);
        assert!(!config.jackett.indexers[0].series);
        assert_eq!(config.jackett.indexers[1].title.as_deref(), Some("EZTV"));
        assert_eq!(config.defaults.profile.max_torrents, 12);
        assert_eq!(config.defaults.profile.sort_uncached.len(), 2);
        assert_eq!(config.defaults.immutable_keys, vec!["indexer_timeout_sec"]);
        // Unset profile fields keep their defaults
        assert_eq!(config.defaults.profile.qualities, vec![0, 720, 1080]);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.passkey.replace = Some("OPERATORKEY".to_string());
        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("abc"));
        assert!(!json.contains("OPERATORKEY"));
        assert!(sanitized.jackett.api_key_configured);
        assert!(sanitized.passkey.replace_enabled);
    }
}
