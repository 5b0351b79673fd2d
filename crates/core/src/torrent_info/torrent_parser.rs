//! Torrent file parser - extracts hash, file listing and private flag.
//!
//! Uses librqbit-core to parse bencoded .torrent data. The private flag is
//! read through serde_bencode since librqbit-core does not expose it.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use serde::Deserialize;
use thiserror::Error;

use super::TorrentFileEntry;

/// Errors that can occur when parsing torrent files.
#[derive(Debug, Error)]
pub enum TorrentParseError {
    #[error("Failed to parse torrent: {0}")]
    ParseError(String),

    #[error("Empty torrent (no files)")]
    EmptyTorrent,
}

/// Everything the resolver needs from a .torrent file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTorrent {
    pub info_hash: String,
    pub name: String,
    pub files: Vec<TorrentFileEntry>,
    pub private: bool,
}

/// Parse a .torrent file.
///
/// Supports both single-file and multi-file torrents. File names are the
/// last path component of each entry.
pub fn parse_torrent(bytes: &[u8]) -> Result<ParsedTorrent, TorrentParseError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| TorrentParseError::ParseError(e.to_string()))?;

    let info = &torrent.info;
    let name = info
        .name
        .as_ref()
        .map(|b| bytes_to_string(b.as_ref()))
        .unwrap_or_else(|| "unknown".to_string());

    let files = if let Some(ref files) = info.files {
        files
            .iter()
            .map(|file| TorrentFileEntry {
                name: file
                    .path
                    .last()
                    .map(|part| bytes_to_string(part.as_ref()))
                    .unwrap_or_else(|| name.clone()),
                size: file.length,
            })
            .collect()
    } else if let Some(length) = info.length {
        vec![TorrentFileEntry {
            name: name.clone(),
            size: length,
        }]
    } else {
        Vec::new()
    };

    if files.is_empty() {
        return Err(TorrentParseError::EmptyTorrent);
    }

    Ok(ParsedTorrent {
        info_hash: torrent.info_hash.as_string(),
        name,
        files,
        private: is_private(bytes),
    })
}

#[derive(Deserialize)]
struct PrivateFlag {
    info: InfoFlags,
}

#[derive(Deserialize)]
struct InfoFlags {
    #[serde(default)]
    private: Option<i64>,
}

/// Whether the info dictionary carries `private = 1`.
pub fn is_private(bytes: &[u8]) -> bool {
    serde_bencode::from_bytes::<PrivateFlag>(bytes)
        .ok()
        .and_then(|torrent| torrent.info.private)
        == Some(1)
}

/// Convert bytes to a string, replacing invalid UTF-8.
fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
