//! Jackett indexer gateway implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::JackettConfig;
use crate::media::MediaQuery;

use super::{Candidate, IndexerBackend, IndexerGateway, SearchError};

/// Jackett category ids.
const CATEGORY_MOVIES: u32 = 2000;
const CATEGORY_TV: u32 = 5000;

/// Indexer gateway backed by a Jackett instance.
///
/// The set of indexers comes from configuration; each search hits one
/// indexer's results endpoint.
pub struct JackettGateway {
    client: Client,
    config: JackettConfig,
}

impl JackettGateway {
    /// Create a new JackettGateway with the given configuration.
    pub fn new(config: JackettConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(&self, indexer: &str, query: &str, category: u32) -> String {
        format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}&Category[]={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(query),
            category
        )
    }

    /// Search a single indexer.
    async fn search_indexer(
        &self,
        indexer: &str,
        query: &str,
        category: u32,
    ) -> Result<Vec<Candidate>, SearchError> {
        let url = self.build_search_url(indexer, query, category);
        debug!(indexer = indexer, query = query, "Searching Jackett");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else if e.is_connect() {
                SearchError::ConnectionFailed(e.to_string())
            } else {
                SearchError::ApiError(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let jackett_response: JackettResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ApiError(format!("Failed to parse response: {}", e)))?;

        debug!(
            indexer = indexer,
            results = jackett_response.Results.len(),
            "Jackett search complete"
        );

        Ok(jackett_response
            .Results
            .into_iter()
            .filter_map(|r| into_candidate(r, indexer))
            .collect())
    }
}

fn into_candidate(r: JackettResult, indexer: &str) -> Option<Candidate> {
    // Prefer the .torrent link: it carries the file list and private flag.
    let link = r.Link.filter(|l| !l.is_empty()).or(r.MagnetUri)?;
    Some(Candidate::new(
        r.Title,
        indexer,
        link,
        r.Size.unwrap_or(0).max(0) as u64,
        r.Seeders.unwrap_or(0).max(0) as u32,
    ))
}

fn movie_query(query: &MediaQuery) -> String {
    match query.year {
        Some(year) => format!("{} {}", query.title, year),
        None => query.title.clone(),
    }
}

fn episode_query(query: &MediaQuery) -> String {
    format!(
        "{} S{:02}E{:02}",
        query.title,
        query.season_number(),
        query.episode_number()
    )
}

#[async_trait]
impl IndexerGateway for JackettGateway {
    fn name(&self) -> &str {
        "jackett"
    }

    async fn list_backends(&self) -> Result<Vec<IndexerBackend>, SearchError> {
        Ok(self
            .config
            .indexers
            .iter()
            .filter(|i| i.enabled)
            .map(|i| IndexerBackend {
                id: i.id.clone(),
                title: i.title.clone().unwrap_or_else(|| i.id.clone()),
                movies: i.movies,
                series: i.series,
            })
            .collect())
    }

    async fn search_movies(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.search_indexer(indexer, &movie_query(query), CATEGORY_MOVIES)
            .await
    }

    async fn search_episodes(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.search_indexer(indexer, &episode_query(query), CATEGORY_TV)
            .await
    }

    async fn search_seasons(
        &self,
        indexer: &str,
        query: &MediaQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.search_indexer(indexer, &query.title, CATEGORY_TV).await
    }
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
}
