pub mod cache;
pub mod config;
pub mod debrid;
pub mod keylock;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod profile;
pub mod searcher;
pub mod testing;
pub mod torrent_info;

pub use cache::{CacheError, CacheStore, MemoryCacheStore, SqliteCacheStore, TtlCache};
pub use config::{
    load_config, load_config_from_str, validate_config, CacheBackend, Config, ConfigError,
    SanitizedConfig,
};
pub use debrid::{
    AvailabilityResolver, BackendFactory, DebridError, DebridRegistry, StorageBackend,
};
pub use keylock::KeyedLocks;
pub use media::{CinemetaClient, MediaKind, MediaQuery, MetadataProvider};
pub use pipeline::{DownloadOutcome, ResolveError, ResolverSettings, StreamEntry, StreamResolver};
pub use profile::{ProfileError, UserProfile};
pub use searcher::{
    Candidate, FanoutCoordinator, IndexerGateway, JackettGateway, SearchError, SlowIndexerTracker,
};
pub use torrent_info::{HttpTorrentInfoResolver, InfoEnricher, TorrentInfoResolver};
