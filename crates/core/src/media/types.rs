//! Types for media identification and metadata lookup.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of media a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// Returns the string representation used in URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "series" => Ok(MediaKind::Series),
            other => Err(MetadataError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Composite media identifier: `tt1234567` or `tt1234567:1:2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId {
    pub id: String,
    pub season: u32,
    pub episode: u32,
}

impl MediaId {
    /// Parse a composite identifier. Missing or malformed season and
    /// episode parts are treated as 0.
    pub fn parse(composite: &str) -> Self {
        let composite = composite.trim_end_matches(".json");
        let mut parts = composite.split(':');
        let id = parts.next().unwrap_or_default().to_string();
        let season = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let episode = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Self {
            id,
            season,
            episode,
        }
    }

    /// Format back into the composite form.
    pub fn composite(&self, kind: MediaKind) -> String {
        match kind {
            MediaKind::Movie => self.id.clone(),
            MediaKind::Series => format!("{}:{}:{}", self.id, self.season, self.episode),
        }
    }
}

/// Reference to one episode of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
}

/// Metadata returned by a [`MetadataProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Title used for searching.
    pub title: String,
    /// Release year (first air year for series).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// All known episodes, ordered by season then episode. Empty for movies.
    #[serde(default)]
    pub episodes: Vec<EpisodeRef>,
}

/// Immutable description of what a single request is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    /// Composite identifier as received from the caller.
    pub media_id: String,
    /// External identifier without season/episode parts.
    pub external_id: String,
    pub kind: MediaKind,
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
    pub language: String,
}

impl MediaQuery {
    /// Build a query from a parsed identifier and its looked-up metadata.
    pub fn new(kind: MediaKind, id: &MediaId, info: &MediaInfo, language: &str) -> Self {
        let (season, episode) = match kind {
            MediaKind::Movie => (None, None),
            MediaKind::Series => (Some(id.season), Some(id.episode)),
        };
        Self {
            media_id: id.composite(kind),
            external_id: id.id.clone(),
            kind,
            title: info.title.clone(),
            season,
            episode,
            year: info.year,
            language: language.to_string(),
        }
    }

    /// Season number, 0 when not applicable.
    pub fn season_number(&self) -> u32 {
        self.season.unwrap_or(0)
    }

    /// Episode number, 0 when not applicable.
    pub fn episode_number(&self) -> u32 {
        self.episode.unwrap_or(0)
    }
}

/// Errors that can occur during metadata lookup.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Unsupported media kind: {0}")]
    UnsupportedKind(String),

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Metadata request failed: {0}")]
    Request(String),

    #[error("Invalid metadata response: {0}")]
    InvalidResponse(String),
}

/// Trait for title/year/episode lookups by external id.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Look up a movie.
    async fn get_movie(&self, id: &str, language: &str) -> Result<MediaInfo, MetadataError>;

    /// Look up a series episode. The returned info carries the full episode list.
    async fn get_episode(
        &self,
        id: &str,
        season: u32,
        episode: u32,
        language: &str,
    ) -> Result<MediaInfo, MetadataError>;
}
