//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external collaborator
//! of the resolution pipeline, so the pipeline can be exercised end to end
//! without indexers, metadata services or debrid accounts.
//!
//! # Example
//!
//! ```rust,ignore
//! use debridge_core::testing::{fixtures, MockIndexerGateway, MockStorageBackend};
//!
//! let gateway = MockIndexerGateway::with_backends(vec![fixtures::indexer("yts")]);
//! gateway.set_results("yts", vec![fixtures::candidate("Test Movie 2020 1080p", 10)]).await;
//!
//! let backend = MockStorageBackend::new();
//! backend.set_cached("hash-a", &[("movie.mkv", 1024)]).await;
//! ```

mod mock_indexer;
mod mock_metadata;
mod mock_storage;
mod mock_torrent_info;

pub use mock_indexer::MockIndexerGateway;
pub use mock_metadata::MockMetadataProvider;
pub use mock_storage::{MockBackendFactory, MockStorageBackend};
pub use mock_torrent_info::MockTorrentInfoResolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::media::{EpisodeRef, MediaId, MediaInfo, MediaKind, MediaQuery};
    use crate::searcher::{Candidate, IndexerBackend};
    use crate::torrent_info::TorrentInfos;
    use serde_bencode::value::Value;
    use std::collections::HashMap;

    /// Indexer id used by [`candidate`].
    pub const INDEXER: &str = "test-indexer";

    /// A raw search result with reasonable defaults.
    pub fn candidate(name: &str, seeders: u32) -> Candidate {
        Candidate::new(
            name,
            INDEXER,
            format!("http://indexer.example/dl/{}", urlencoding::encode(name)),
            100,
            seeders,
        )
    }

    /// A search result whose infos are already resolved.
    pub fn enriched_candidate(name: &str, info_hash: &str, seeders: u32) -> Candidate {
        let mut candidate = candidate(name, seeders);
        candidate.infos = Some(torrent_infos(name, info_hash));
        candidate
    }

    /// Infos of a magnet-only torrent.
    pub fn torrent_infos(name: &str, info_hash: &str) -> TorrentInfos {
        TorrentInfos {
            id: format!("id-{}", info_hash),
            info_hash: info_hash.to_string(),
            name: name.to_string(),
            files: Vec::new(),
            private: false,
            magnet_url: None,
            source: None,
        }
    }

    /// An indexer supporting both movies and series.
    pub fn indexer(id: &str) -> IndexerBackend {
        IndexerBackend {
            id: id.to_string(),
            title: id.to_string(),
            movies: true,
            series: true,
        }
    }

    /// Metadata of "Test Movie" (2020).
    pub fn movie_info() -> MediaInfo {
        MediaInfo {
            title: "Test Movie".to_string(),
            year: Some(2020),
            episodes: Vec::new(),
        }
    }

    /// Metadata of "Test Show" with two seasons of three episodes.
    pub fn series_info() -> MediaInfo {
        MediaInfo {
            title: "Test Show".to_string(),
            year: None,
            episodes: (1..=2)
                .flat_map(|season| (1..=3).map(move |episode| EpisodeRef { season, episode }))
                .collect(),
        }
    }

    pub fn movie_query(id: &str) -> MediaQuery {
        MediaQuery::new(MediaKind::Movie, &MediaId::parse(id), &movie_info(), "")
    }

    pub fn episode_query(id: &str, season: u32, episode: u32) -> MediaQuery {
        let media_id = MediaId {
            id: id.to_string(),
            season,
            episode,
        };
        MediaQuery::new(MediaKind::Series, &media_id, &series_info(), "")
    }

    /// Bencoded `.torrent` file.
    ///
    /// Without `files` the torrent is single-file, named `name`, 1024 bytes
    /// long. The announce URL is repeated in `announce-list`.
    pub fn torrent_bytes(
        name: &str,
        files: &[(&str, u64)],
        private: bool,
        announce: &str,
    ) -> Vec<u8> {
        let mut info = HashMap::new();
        if files.is_empty() {
            info.insert(key("length"), Value::Int(1024));
        } else {
            let entries = files
                .iter()
                .map(|(path, size)| {
                    Value::Dict(HashMap::from([
                        (key("length"), Value::Int(*size as i64)),
                        (key("path"), Value::List(vec![bytes(path)])),
                    ]))
                })
                .collect();
            info.insert(key("files"), Value::List(entries));
        }
        info.insert(key("name"), bytes(name));
        info.insert(key("piece length"), Value::Int(16384));
        info.insert(key("pieces"), Value::Bytes(vec![0xab; 20]));
        if private {
            info.insert(key("private"), Value::Int(1));
        }

        let root = HashMap::from([
            (key("announce"), bytes(announce)),
            (
                key("announce-list"),
                Value::List(vec![Value::List(vec![bytes(announce)])]),
            ),
            (key("info"), Value::Dict(info)),
        ]);
        serde_bencode::to_bytes(&Value::Dict(root)).unwrap()
    }

    fn key(name: &str) -> Vec<u8> {
        name.as_bytes().to_vec()
    }

    fn bytes(text: &str) -> Value {
        Value::Bytes(text.as_bytes().to_vec())
    }
}
