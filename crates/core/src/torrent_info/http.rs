//! Torrent info resolver that fetches candidate links over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::magnet::parse_magnet;
use super::torrent_parser::parse_torrent;
use super::{TorrentInfoError, TorrentInfoResolver, TorrentInfos};
use crate::cache::{get_json, set_json, CacheStore};
use crate::searcher::Candidate;

const CACHE_PREFIX: &str = "torrent-infos";

/// Resolves infos from magnet links or `.torrent` downloads and keeps them
/// in the key/value cache under their opaque id.
pub struct HttpTorrentInfoResolver {
    client: Client,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl HttpTorrentInfoResolver {
    pub fn new(cache: Arc<dyn CacheStore>, ttl: Duration) -> Result<Self, TorrentInfoError> {
        // Magnet-only results redirect to the magnet URI; read Location, don't follow.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| TorrentInfoError::Request(e.to_string()))?;
        Ok(Self { client, cache, ttl })
    }

    async fn fetch(&self, id: String, link: &str) -> Result<TorrentInfos, TorrentInfoError> {
        if link.starts_with("magnet:") {
            return from_magnet(id, link);
        }

        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| TorrentInfoError::Request(e.to_string()))?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if location.starts_with("magnet:") {
                return from_magnet(id, &location);
            }
            return Err(TorrentInfoError::Request(format!(
                "unexpected redirect to {}",
                location
            )));
        }

        if !status.is_success() {
            return Err(TorrentInfoError::Request(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TorrentInfoError::Request(e.to_string()))?;
        let parsed =
            parse_torrent(&bytes).map_err(|e| TorrentInfoError::InvalidTorrent(e.to_string()))?;

        Ok(TorrentInfos {
            id,
            info_hash: parsed.info_hash,
            name: parsed.name,
            files: parsed.files,
            private: parsed.private,
            magnet_url: None,
            source: Some(bytes.to_vec()),
        })
    }
}

/// Stable opaque id for a link.
pub fn infos_id(link: &str) -> String {
    let digest = Sha256::digest(link.as_bytes());
    digest.iter().take(12).map(|b| format!("{:02x}", b)).collect()
}

fn cache_key(id: &str) -> String {
    format!("{}:{}", CACHE_PREFIX, id)
}

fn from_magnet(id: String, uri: &str) -> Result<TorrentInfos, TorrentInfoError> {
    let magnet = parse_magnet(uri)?;
    Ok(TorrentInfos {
        id,
        name: magnet.name.unwrap_or_else(|| magnet.info_hash.clone()),
        info_hash: magnet.info_hash,
        files: Vec::new(),
        private: false,
        magnet_url: Some(uri.to_string()),
        source: None,
    })
}

#[async_trait]
impl TorrentInfoResolver for HttpTorrentInfoResolver {
    async fn resolve(&self, candidate: &Candidate) -> Result<TorrentInfos, TorrentInfoError> {
        let id = infos_id(&candidate.link);
        let key = cache_key(&id);

        if let Some(infos) = get_json::<TorrentInfos>(self.cache.as_ref(), &key).await? {
            debug!(id = %id, "Torrent infos served from cache");
            return Ok(infos);
        }

        let infos = self.fetch(id, &candidate.link).await?;
        if let Err(e) = set_json(self.cache.as_ref(), &key, &infos, self.ttl).await {
            warn!(id = %infos.id, error = %e, "Failed to persist torrent infos");
        }
        debug!(
            id = %infos.id,
            hash = %infos.info_hash,
            files = infos.files.len(),
            "Resolved torrent infos"
        );
        Ok(infos)
    }

    async fn get_by_id(&self, id: &str) -> Result<TorrentInfos, TorrentInfoError> {
        get_json(self.cache.as_ref(), &cache_key(id))
            .await?
            .ok_or_else(|| TorrentInfoError::NotFound(id.to_string()))
    }
}
