//! Indexer search.
//!
//! This module provides the `IndexerGateway` trait for searching torrents on
//! a single indexer, the fan-out coordinator that queries many indexers at
//! once while routing around slow ones, and the ranking logic applied to
//! the merged results.

mod dedup;
mod fanout;
mod jackett;
mod pack;
pub mod ranker;
mod release;
mod slow_tracker;
mod types;

pub use dedup::deduplicate_by_hash;
pub use fanout::FanoutCoordinator;
pub use jackett::JackettGateway;
pub use pack::is_season_pack;
pub use release::{parse_release, parse_words, ParsedRelease};
pub use slow_tracker::{IndexerStats, SlowIndexerTracker};
pub use types::*;
