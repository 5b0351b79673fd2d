//! Torrent info resolution.
//!
//! Turns a search result's link into [`TorrentInfos`] (hash, files, private
//! flag), enriches candidate lists under a process-wide concurrency cap and
//! rewrites private tracker passkeys before torrents are handed on.

mod enrich;
mod http;
mod magnet;
pub mod passkey;
mod torrent_parser;
mod types;

pub use enrich::InfoEnricher;
pub use http::{infos_id, HttpTorrentInfoResolver};
pub use magnet::{parse_magnet, MagnetLink};
pub use passkey::{is_valid_passkey, replace_passkey, PasskeyError};
pub use torrent_parser::{parse_torrent, ParsedTorrent, TorrentParseError};
pub use types::*;
