//! Resolution pipeline.
//!
//! This module provides the `StreamResolver`, which turns a media id into a
//! ranked stream list (fan-out search, search-phase ranking, torrent info
//! enrichment, availability, cache-aware ranking) and resolves a listed
//! torrent into a direct download URL through the user's debrid backend.

mod files;
mod present;
mod proxy;
mod resolver;
mod types;

pub use files::{search_episode_file, select_file, NamedFile};
pub use present::{format_size, render_stream, Presentation};
pub use proxy::apply_mediaflow;
pub use resolver::{download_key, StreamResolver};
pub use types::*;
