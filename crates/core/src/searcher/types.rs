//! Types for the indexer search system.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::release;
use crate::debrid::{Progress, TransferStatus};
use crate::media::{MediaKind, MediaQuery};
use crate::torrent_info::TorrentInfos;

/// Video quality parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Quality {
    Unknown,
    P360,
    P480,
    P720,
    P1080,
    P2160,
}

impl Quality {
    /// Numeric value used in profiles (0 for unknown).
    pub fn value(&self) -> u32 {
        match self {
            Quality::Unknown => 0,
            Quality::P360 => 360,
            Quality::P480 => 480,
            Quality::P720 => 720,
            Quality::P1080 => 1080,
            Quality::P2160 => 2160,
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Unknown => "Unknown",
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P2160 => "4K",
        }
    }
}

impl TryFrom<u32> for Quality {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Quality::Unknown),
            360 => Ok(Quality::P360),
            480 => Ok(Quality::P480),
            720 => Ok(Quality::P720),
            1080 => Ok(Quality::P1080),
            2160 => Ok(Quality::P2160),
            other => Err(format!("unknown quality value: {}", other)),
        }
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.value()
    }
}

/// Audio/subtitle language tag detected in a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Multi,
    Arabic,
    Chinese,
    German,
    English,
    Spanish,
    French,
    Dutch,
    Italian,
    Lithuanian,
    Korean,
    Portuguese,
    Brazilian,
    Russian,
    Swedish,
    Tamil,
    Turkish,
}

impl Language {
    pub const ALL: [Language; 17] = [
        Language::Multi,
        Language::Arabic,
        Language::Chinese,
        Language::German,
        Language::English,
        Language::Spanish,
        Language::French,
        Language::Dutch,
        Language::Italian,
        Language::Lithuanian,
        Language::Korean,
        Language::Portuguese,
        Language::Brazilian,
        Language::Russian,
        Language::Swedish,
        Language::Tamil,
        Language::Turkish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Multi => "multi",
            Language::Arabic => "arabic",
            Language::Chinese => "chinese",
            Language::German => "german",
            Language::English => "english",
            Language::Spanish => "spanish",
            Language::French => "french",
            Language::Dutch => "dutch",
            Language::Italian => "italian",
            Language::Lithuanian => "lithuanian",
            Language::Korean => "korean",
            Language::Portuguese => "portuguese",
            Language::Brazilian => "brazilian",
            Language::Russian => "russian",
            Language::Swedish => "swedish",
            Language::Tamil => "tamil",
            Language::Turkish => "turkish",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Language::Multi => "🌎",
            Language::Arabic => "🇦🇪",
            Language::Chinese => "🇨🇳",
            Language::German => "🇩🇪",
            Language::English => "🇺🇸",
            Language::Spanish => "🇪🇸",
            Language::French => "🇫🇷",
            Language::Dutch => "🇳🇱",
            Language::Italian => "🇮🇹",
            Language::Lithuanian => "🇱🇹",
            Language::Korean => "🇰🇷",
            Language::Portuguese => "🇵🇹",
            Language::Brazilian => "🇧🇷",
            Language::Russian => "🇷🇺",
            Language::Swedish => "🇸🇪",
            Language::Tamil => "🇮🇳",
            Language::Turkish => "🇹🇷",
        }
    }

    /// Word pattern matched against normalized release names.
    pub(crate) fn pattern(&self) -> &'static str {
        match self {
            Language::English => "eng(lish)?",
            Language::Spanish => "spa(nish)?",
            Language::French => "fre(nch)?",
            Language::Italian => "ita(lian)?",
            Language::Russian => "rus(sian)?",
            Language::Brazilian => "portuguese",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A torrent release flowing through the resolution pipeline.
///
/// Produced by an indexer search, then enriched in place with technical
/// infos and availability state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Release name as reported by the indexer.
    pub name: String,
    /// Indexer that returned the result.
    pub indexer_id: String,
    /// Magnet URI or .torrent download URL.
    pub link: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub quality: Quality,
    pub languages: Vec<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Whether this came from a whole-season search and matched the pack heuristic.
    #[serde(default)]
    pub is_pack: bool,
    /// Technical infos, set by the info resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infos: Option<TorrentInfos>,
    #[serde(default)]
    pub is_cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransferStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Disabled candidates are listed but not actionable.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_text: Option<String>,
}

impl Candidate {
    /// Build a candidate from raw indexer fields, parsing quality,
    /// languages and year from the release name.
    pub fn new(
        name: impl Into<String>,
        indexer_id: impl Into<String>,
        link: impl Into<String>,
        size_bytes: u64,
        seeders: u32,
    ) -> Self {
        let name = name.into();
        let parsed = release::parse_release(&name);
        Self {
            name,
            indexer_id: indexer_id.into(),
            link: link.into(),
            size_bytes,
            seeders,
            quality: parsed.quality,
            languages: parsed.languages,
            year: parsed.year,
            is_pack: false,
            infos: None,
            is_cached: false,
            status: None,
            progress: None,
            disabled: false,
            info_text: None,
        }
    }

    /// Content hash, once infos are resolved.
    pub fn info_hash(&self) -> Option<&str> {
        self.infos.as_ref().map(|i| i.info_hash.as_str())
    }

    /// Opaque id of the resolved infos.
    pub fn torrent_id(&self) -> Option<&str> {
        self.infos.as_ref().map(|i| i.id.as_str())
    }

    /// Whether the candidate carries one of `languages` or is multi-language.
    /// An empty preference list matches everything.
    pub fn matches_languages(&self, languages: &[String]) -> bool {
        if languages.is_empty() {
            return true;
        }
        self.languages
            .iter()
            .any(|l| *l == Language::Multi || languages.iter().any(|p| p == l.as_str()))
    }

    /// Disable the candidate with an explanatory message.
    pub fn disable(&mut self, reason: impl Into<String>) {
        self.disabled = true;
        self.info_text = Some(reason.into());
    }
}

/// An indexer exposed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerBackend {
    pub id: String,
    pub title: String,
    /// Supports movie searches.
    pub movies: bool,
    /// Supports series searches.
    pub series: bool,
}

impl IndexerBackend {
    pub fn supports(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Movie => self.movies,
            MediaKind::Series => self.series,
        }
    }
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No indexer configured")]
    NoBackendConfigured,

    #[error("Search backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Search backend API error: {0}")]
    ApiError(String),

    #[error("Indexer not found: {0}")]
    IndexerNotFound(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for indexer search gateways.
///
/// Each search targets exactly one indexer; fan-out across indexers is the
/// caller's job.
#[async_trait]
pub trait IndexerGateway: Send + Sync {
    /// Gateway name for logging.
    fn name(&self) -> &str;

    /// All indexers known to the gateway.
    async fn list_backends(&self) -> Result<Vec<IndexerBackend>, SearchError>;

    async fn search_movies(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError>;

    /// Single-episode releases.
    async fn search_episodes(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError>;

    /// Whole-season and complete-series releases.
    async fn search_seasons(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_ordering_and_labels() {
        assert!(Quality::P2160 > Quality::P1080);
        assert!(Quality::Unknown < Quality::P360);
        assert_eq!(Quality::P2160.label(), "4K");
        assert_eq!(Quality::try_from(720).unwrap(), Quality::P720);
        assert!(Quality::try_from(721).is_err());
    }

    #[test]
    fn test_quality_serde_as_number() {
        assert_eq!(serde_json::to_string(&Quality::P1080).unwrap(), "1080");
        let q: Quality = serde_json::from_str("0").unwrap();
        assert_eq!(q, Quality::Unknown);
    }

    #[test]
    fn test_candidate_new_parses_release() {
        let c = Candidate::new(
            "Heat 1995 1080p BluRay FRENCH x264",
            "yts",
            "magnet:?xt=urn:btih:abc",
            1000,
            5,
        );
        assert_eq!(c.quality, Quality::P1080);
        assert_eq!(c.year, Some(1995));
        assert!(c.languages.contains(&Language::French));
    }

    #[test]
    fn test_matches_languages() {
        let mut c = Candidate::new("Heat 1995 1080p", "yts", "", 0, 0);
        assert!(c.matches_languages(&[]));
        assert!(!c.matches_languages(&["french".to_string()]));
        c.languages = vec![Language::Multi];
        assert!(c.matches_languages(&["french".to_string()]));
    }

    #[test]
    fn test_backend_supports_kind() {
        let backend = IndexerBackend {
            id: "yts".to_string(),
            title: "YTS".to_string(),
            movies: true,
            series: false,
        };
        assert!(backend.supports(MediaKind::Movie));
        assert!(!backend.supports(MediaKind::Series));
    }
}
