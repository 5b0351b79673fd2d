//! Cinemeta metadata provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{EpisodeRef, MediaInfo, MediaKind, MetadataError, MetadataProvider};
use crate::config::MetadataConfig;

/// Metadata provider backed by a Cinemeta-compatible HTTP API.
pub struct CinemetaClient {
    client: Client,
    base_url: String,
}

impl CinemetaClient {
    pub fn new(config: &MetadataConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.cinemeta_url.trim_end_matches('/').to_string(),
        })
    }

    fn meta_url(&self, kind: MediaKind, id: &str) -> String {
        format!(
            "{}/meta/{}/{}.json",
            self.base_url,
            kind.as_str(),
            urlencoding::encode(id)
        )
    }

    async fn fetch(&self, kind: MediaKind, id: &str) -> Result<CinemetaMeta, MetadataError> {
        let url = self.meta_url(kind, id);
        debug!(url = %url, "Fetching metadata");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(MetadataError::Request(format!("HTTP {}", response.status())));
        }

        let body: CinemetaResponse = response
            .json()
            .await
            .map_err(|e| MetadataError::InvalidResponse(e.to_string()))?;

        body.meta.ok_or_else(|| MetadataError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl MetadataProvider for CinemetaClient {
    fn name(&self) -> &str {
        "cinemeta"
    }

    async fn get_movie(&self, id: &str, _language: &str) -> Result<MediaInfo, MetadataError> {
        let meta = self.fetch(MediaKind::Movie, id).await?;
        Ok(meta.into_info())
    }

    async fn get_episode(
        &self,
        id: &str,
        season: u32,
        episode: u32,
        _language: &str,
    ) -> Result<MediaInfo, MetadataError> {
        let meta = self.fetch(MediaKind::Series, id).await?;
        let info = meta.into_info();

        if !info.episodes.is_empty()
            && !info
                .episodes
                .iter()
                .any(|e| e.season == season && e.episode == episode)
        {
            return Err(MetadataError::NotFound(format!("{}:{}:{}", id, season, episode)));
        }

        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct CinemetaResponse {
    meta: Option<CinemetaMeta>,
}

#[derive(Debug, Deserialize)]
struct CinemetaMeta {
    name: String,
    #[serde(default)]
    year: Option<serde_json::Value>,
    #[serde(default, rename = "releaseInfo")]
    release_info: Option<String>,
    #[serde(default)]
    videos: Vec<CinemetaVideo>,
}

#[derive(Debug, Deserialize)]
struct CinemetaVideo {
    #[serde(default)]
    season: u32,
    #[serde(default, alias = "number")]
    episode: u32,
}

impl CinemetaMeta {
    fn into_info(self) -> MediaInfo {
        let year = self
            .year
            .as_ref()
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_u64().map(|y| y.to_string()),
                serde_json::Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .or(self.release_info)
            .and_then(|s| parse_leading_year(&s));

        // Season 0 holds specials, which indexers rarely label consistently.
        let mut episodes: Vec<EpisodeRef> = self
            .videos
            .into_iter()
            .filter(|v| v.season > 0)
            .map(|v| EpisodeRef {
                season: v.season,
                episode: v.episode,
            })
            .collect();
        episodes.sort_by_key(|e| (e.season, e.episode));
        episodes.dedup();

        MediaInfo {
            title: self.name,
            year,
            episodes,
        }
    }
}

/// Extract the first four-digit year from strings like `2008–2013` or `2019-`.
fn parse_leading_year(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}
