//! Types for torrent info resolution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::searcher::Candidate;

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFileEntry {
    /// File name without its directory.
    pub name: String,
    pub size: u64,
}

/// Canonical technical metadata of a candidate.
///
/// Resolved once per candidate and addressed afterwards by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfos {
    /// Opaque id assigned by the resolver.
    pub id: String,
    /// Lowercase hex info hash.
    pub info_hash: String,
    pub name: String,
    /// Empty when only a magnet link is known.
    #[serde(default)]
    pub files: Vec<TorrentFileEntry>,
    /// Whether the torrent comes from a private tracker.
    #[serde(default)]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_url: Option<String>,
    /// Raw `.torrent` bytes, kept so the file can be re-submitted.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "source_bytes")]
    pub source: Option<Vec<u8>>,
}

impl TorrentInfos {
    /// Total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Magnet link for this torrent, built from the hash when none was
    /// provided.
    pub fn magnet(&self) -> String {
        match &self.magnet_url {
            Some(url) => url.clone(),
            None => format!(
                "magnet:?xt=urn:btih:{}&dn={}",
                self.info_hash,
                urlencoding::encode(&self.name)
            ),
        }
    }
}

/// Errors that can occur while resolving torrent infos.
#[derive(Debug, Error)]
pub enum TorrentInfoError {
    #[error("Torrent request failed: {0}")]
    Request(String),

    #[error("Invalid torrent file: {0}")]
    InvalidTorrent(String),

    #[error("Invalid magnet link: {0}")]
    InvalidMagnet(String),

    #[error("Torrent infos not found: {0}")]
    NotFound(String),

    #[error("Torrent info resolution timed out")]
    Timeout,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Resolves and re-fetches [`TorrentInfos`].
#[async_trait]
pub trait TorrentInfoResolver: Send + Sync {
    /// Resolve the infos of a search result.
    async fn resolve(&self, candidate: &Candidate) -> Result<TorrentInfos, TorrentInfoError>;

    /// Fetch previously resolved infos by their opaque id.
    async fn get_by_id(&self, id: &str) -> Result<TorrentInfos, TorrentInfoError>;
}

mod source_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infos() -> TorrentInfos {
        TorrentInfos {
            id: "abc".to_string(),
            info_hash: "0123456789abcdef0123456789abcdef01234567".to_string(),
            name: "Show S01".to_string(),
            files: vec![
                TorrentFileEntry {
                    name: "e1.mkv".to_string(),
                    size: 10,
                },
                TorrentFileEntry {
                    name: "e2.mkv".to_string(),
                    size: 20,
                },
            ],
            private: true,
            magnet_url: None,
            source: Some(b"d4:infode".to_vec()),
        }
    }

    #[test]
    fn test_source_survives_json() {
        let json = serde_json::to_string(&infos()).unwrap();
        assert!(json.contains("ZDQ6aW5mb2Rl"));
        let back: TorrentInfos = serde_json::from_str(&json).unwrap();
        assert_eq!(back, infos());
    }

    #[test]
    fn test_magnet_built_from_hash() {
        let magnet = infos().magnet();
        assert_eq!(
            magnet,
            "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=Show%20S01"
        );
        assert_eq!(infos().total_size(), 30);
    }
}
