//! Stream listing and download resolution.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::files::{search_episode_file, select_file};
use super::present::{render_stream, Presentation};
use super::proxy::apply_mediaflow;
use super::{DownloadOutcome, ResolveError, ResolverSettings, StreamEntry};
use crate::cache::CacheStore;
use crate::debrid::{
    wait_for_files, AvailabilityRequest, AvailabilityResolver, BackendFactory, DebridError,
    DebridFile, StorageBackend, TransferStatus,
};
use crate::keylock::KeyedLocks;
use crate::media::{EpisodeRef, MediaId, MediaInfo, MediaKind, MediaQuery, MetadataProvider};
use crate::metrics;
use crate::profile::UserProfile;
use crate::searcher::{ranker, Candidate, FanoutCoordinator};
use crate::torrent_info::{is_valid_passkey, replace_passkey, InfoEnricher, TorrentInfos};

/// Composes search, enrichment and availability into the two public
/// operations: listing streams for a media id and resolving the download
/// URL of one listed torrent.
///
/// Concurrent listings of the same media id, and concurrent resolutions of
/// the same download, run one at a time.
pub struct StreamResolver {
    settings: ResolverSettings,
    metadata: Arc<dyn MetadataProvider>,
    fanout: FanoutCoordinator,
    enricher: InfoEnricher,
    availability: AvailabilityResolver,
    backends: Arc<dyn BackendFactory>,
    cache: Arc<dyn CacheStore>,
    search_locks: KeyedLocks,
    download_locks: KeyedLocks,
}

impl StreamResolver {
    pub fn new(
        settings: ResolverSettings,
        metadata: Arc<dyn MetadataProvider>,
        fanout: FanoutCoordinator,
        enricher: InfoEnricher,
        availability: AvailabilityResolver,
        backends: Arc<dyn BackendFactory>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            settings,
            metadata,
            fanout,
            enricher,
            availability,
            backends,
            cache,
            search_locks: KeyedLocks::new(),
            download_locks: KeyedLocks::new(),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn fanout(&self) -> &FanoutCoordinator {
        &self.fanout
    }

    pub fn backends(&self) -> &Arc<dyn BackendFactory> {
        &self.backends
    }

    /// Sweep expired entries from the status cache and the key/value cache.
    pub async fn purge_expired(&self) {
        let statuses = self.availability.purge_expired();
        match self.cache.purge_expired().await {
            Ok(entries) => debug!(statuses, entries, "Expired cache entries purged"),
            Err(e) => warn!(statuses, error = %e, "Cache purge failed"),
        }
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every`, starting
    /// one period from now, until the task is aborted.
    pub fn spawn_purge(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                resolver.purge_expired().await;
            }
        })
    }

    /// Ranked stream entries for `media_id` (`tt123` or `tt123:1:2`).
    ///
    /// For series, the next episode's candidates are warmed in the
    /// background.
    pub async fn list_streams(
        self: &Arc<Self>,
        profile: &UserProfile,
        kind: MediaKind,
        media_id: &str,
    ) -> Result<Vec<StreamEntry>, ResolveError> {
        let start = Instant::now();
        let result = self.list_streams_inner(profile, kind, media_id).await;
        let label = if result.is_ok() { "success" } else { "error" };
        metrics::STREAM_LISTING_DURATION
            .with_label_values(&[kind.as_str(), label])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn list_streams_inner(
        self: &Arc<Self>,
        profile: &UserProfile,
        kind: MediaKind,
        media_id: &str,
    ) -> Result<Vec<StreamEntry>, ResolveError> {
        let backend = self.backends.create(profile)?;
        let id = MediaId::parse(media_id);
        let info = self.lookup(kind, &id, &profile.meta_language).await?;
        let query = MediaQuery::new(kind, &id, &info, &profile.meta_language);

        let candidates = self.find_candidates(profile, &query, backend.as_ref()).await?;
        info!(
            media_id = %query.media_id,
            store = backend.short_name(),
            streams = candidates.len(),
            "Streams resolved"
        );

        if kind == MediaKind::Series && !candidates.is_empty() {
            let warm_profile = UserProfile {
                force_cache_next_episode: false,
                ..profile.clone()
            };
            self.spawn_next_episode(warm_profile, id, info.episodes, Arc::clone(&backend));
        }

        let profile_segment = profile.encode();
        let presentation = Presentation {
            addon_name: &self.settings.addon_name,
            public_url: &self.settings.public_url,
            profile_segment: &profile_segment,
            mediaflow: profile.enable_mediaflow,
        };
        Ok(candidates
            .iter()
            .map(|c| render_stream(c, &query, backend.as_ref(), &presentation))
            .collect())
    }

    /// Search, narrow, enrich and check availability for one query.
    ///
    /// Serialized per media id.
    pub async fn find_candidates(
        &self,
        profile: &UserProfile,
        query: &MediaQuery,
        backend: &dyn StorageBackend,
    ) -> Result<Vec<Candidate>, ResolveError> {
        let _guard = self.search_locks.acquire(&query.media_id).await;

        let indexers = self.fanout.select_backends(query.kind, profile).await?;
        let timeout = profile.indexer_timeout();
        let raw = self.fanout.search(query, &indexers, timeout).await;
        let narrowed = ranker::narrow_search(raw, query, profile);
        debug!(
            media_id = %query.media_id,
            kept = narrowed.len(),
            "Search results narrowed, resolving torrent infos"
        );

        let enriched = self
            .enricher
            .enrich(narrowed, timeout, profile.max_torrents)
            .await;
        if enriched.is_empty() {
            return Err(ResolveError::NoTorrentInfos(query.media_id.clone()));
        }

        let (kind, season, episode) = (query.kind, query.season_number(), query.episode_number());
        let is_valid = move |files: &[DebridFile]| match kind {
            MediaKind::Movie => true,
            MediaKind::Series => search_episode_file(files, season, episode).is_some(),
        };
        let request = AvailabilityRequest {
            profile,
            sid: &query.media_id,
            passkey_required: self.passkey_required(profile),
        };
        Ok(self
            .availability
            .resolve(backend, enriched, &is_valid, &request)
            .await)
    }

    /// Direct URL of the file matching `media_id` inside torrent
    /// `torrent_id`.
    ///
    /// Resolved URLs are cached per backend identity, proxy flag, media and
    /// torrent. When the backend hands back nothing playable the outcome is
    /// the placeholder video.
    pub async fn resolve_download(
        self: &Arc<Self>,
        profile: &UserProfile,
        kind: MediaKind,
        media_id: &str,
        torrent_id: &str,
    ) -> Result<DownloadOutcome, ResolveError> {
        let backend = self.backends.create(profile)?;
        let infos = self.enricher.resolver().get_by_id(torrent_id).await?;
        let id = MediaId::parse(media_id);
        let media_id = id.composite(kind);

        self.availability
            .mark_status(backend.as_ref(), &infos.info_hash, TransferStatus::Queued);

        let key = download_key(
            &backend.user_hash(),
            profile.enable_mediaflow,
            &media_id,
            torrent_id,
        );
        if self.download_locks.is_held(&key) {
            debug!(media_id = %media_id, torrent_id, "Waiting for in-flight download resolution");
        }
        let _guard = self.download_locks.acquire(&key).await;

        if kind == MediaKind::Series && profile.force_cache_next_episode {
            let resolver = Arc::clone(self);
            let profile = profile.clone();
            let backend = Arc::clone(&backend);
            let id = id.clone();
            tokio::spawn(async move {
                match resolver.lookup(kind, &id, &profile.meta_language).await {
                    Ok(info) => {
                        resolver
                            .prepare_next_episode(&profile, &id, &info.episodes, backend)
                            .await
                    }
                    Err(e) => warn!(
                        media_id = %id.composite(kind),
                        error = %e,
                        "Next episode lookup failed"
                    ),
                }
            });
        }

        match self.cache.get(&key).await {
            Ok(Some(url)) => {
                metrics::DOWNLOAD_RESOLUTIONS
                    .with_label_values(&["cache_hit"])
                    .inc();
                debug!(media_id = %media_id, "Download served from cache");
                return Ok(DownloadOutcome::Url(url));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Download cache read failed"),
        }

        let result = self
            .resolve_uncached(profile, kind, &id, &infos, backend.as_ref())
            .await;
        let url = match result {
            Ok(url) => url,
            Err(e) => {
                let label = if matches!(e, ResolveError::NotReady) {
                    "not_ready"
                } else {
                    "failed"
                };
                metrics::DOWNLOAD_RESOLUTIONS
                    .with_label_values(&[label])
                    .inc();
                return Err(e);
            }
        };

        if url.is_empty() {
            info!(media_id = %media_id, "No download available, serving placeholder");
            metrics::DOWNLOAD_RESOLUTIONS
                .with_label_values(&["fallback"])
                .inc();
            return Ok(DownloadOutcome::Fallback(self.settings.not_ready_url()));
        }

        let url = apply_mediaflow(&url, profile);
        if let Err(e) = self
            .cache
            .set(&key, &url, self.settings.download_ttl)
            .await
        {
            warn!(key = %key, error = %e, "Download cache write failed");
        }
        metrics::DOWNLOAD_RESOLUTIONS
            .with_label_values(&["resolved"])
            .inc();
        Ok(DownloadOutcome::Url(url))
    }

    async fn resolve_uncached(
        &self,
        profile: &UserProfile,
        kind: MediaKind,
        id: &MediaId,
        infos: &TorrentInfos,
        backend: &dyn StorageBackend,
    ) -> Result<String, ResolveError> {
        debug!(
            store = backend.short_name(),
            hash = %infos.info_hash,
            "Getting debrid files"
        );
        let files = self.debrid_files(profile, infos, backend).await?;
        info!(
            store = backend.short_name(),
            hash = %infos.info_hash,
            files = files.len(),
            "Debrid files found"
        );

        let file = select_file(&files, kind, id.season, id.episode)
            .ok_or_else(|| DebridError::FileNotFound(infos.info_hash.clone()))?;
        Ok(backend.resolve_download(file).await?)
    }

    /// Add the torrent to the backend and wait for its file list.
    ///
    /// With passkey replacement configured, `.torrent` files get the
    /// operator passkey swapped for the user's. A private torrent with no
    /// user passkey is added by hash only.
    async fn debrid_files(
        &self,
        profile: &UserProfile,
        infos: &TorrentInfos,
        backend: &dyn StorageBackend,
    ) -> Result<Vec<DebridFile>, ResolveError> {
        let transfer = match (&infos.magnet_url, &infos.source) {
            (Some(magnet), _) => backend.add_magnet(magnet).await?,
            (None, None) => backend.add_magnet(&infos.magnet()).await?,
            (None, Some(source)) => match &self.settings.passkey.replace {
                None => backend.add_torrent_file(source, &infos.info_hash).await?,
                Some(_) if profile.passkey.is_empty() => {
                    if infos.private {
                        backend.add_magnet(&infos.magnet()).await?
                    } else {
                        backend.add_torrent_file(source, &infos.info_hash).await?
                    }
                }
                Some(placeholder) => {
                    let pattern = &self.settings.passkey.pattern;
                    if !is_valid_passkey(&profile.passkey, pattern)? {
                        return Err(ResolveError::InvalidPasskey(pattern.clone()));
                    }
                    let rewritten = replace_passkey(source, placeholder, &profile.passkey)?;
                    backend
                        .add_torrent_file(&rewritten, &infos.info_hash)
                        .await?
                }
            },
        };

        Ok(wait_for_files(
            backend,
            transfer,
            self.settings.magnet_poll_attempts,
            self.settings.magnet_poll_interval,
        )
        .await?)
    }

    /// Warm the episode after `id`: list its candidates and, with
    /// `force_cache_next_episode`, add the best one to the backend when
    /// nothing is cached yet. Failures are logged only.
    pub async fn prepare_next_episode(
        &self,
        profile: &UserProfile,
        id: &MediaId,
        episodes: &[EpisodeRef],
        backend: Arc<dyn StorageBackend>,
    ) {
        let result = self
            .warm_next_episode(profile, id, episodes, backend.as_ref())
            .await;
        match result {
            Ok(()) | Err(ResolveError::NotReady) => {}
            Err(e) => warn!(media_id = %id.id, error = %e, "Next episode preparation failed"),
        }
    }

    async fn warm_next_episode(
        &self,
        profile: &UserProfile,
        id: &MediaId,
        episodes: &[EpisodeRef],
        backend: &dyn StorageBackend,
    ) -> Result<(), ResolveError> {
        let Some(next) = next_episode(episodes, id.season, id.episode) else {
            return Ok(());
        };
        let next_id = MediaId {
            id: id.id.clone(),
            season: next.season,
            episode: next.episode,
        };
        let info = self
            .lookup(MediaKind::Series, &next_id, &profile.meta_language)
            .await?;
        let query = MediaQuery::new(MediaKind::Series, &next_id, &info, &profile.meta_language);
        let candidates = self.find_candidates(profile, &query, backend).await?;

        if profile.force_cache_next_episode
            && !candidates.is_empty()
            && !candidates.iter().any(|c| c.is_cached)
        {
            let best = candidates
                .iter()
                .find(|c| !c.disabled)
                .and_then(|c| c.infos.as_ref());
            if let Some(infos) = best {
                info!(
                    media_id = %query.media_id,
                    hash = %infos.info_hash,
                    "Force caching next episode on debrid"
                );
                self.debrid_files(profile, infos, backend).await?;
            }
        }
        Ok(())
    }

    fn spawn_next_episode(
        self: &Arc<Self>,
        profile: UserProfile,
        id: MediaId,
        episodes: Vec<EpisodeRef>,
        backend: Arc<dyn StorageBackend>,
    ) {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            resolver
                .prepare_next_episode(&profile, &id, &episodes, backend)
                .await;
        });
    }

    async fn lookup(
        &self,
        kind: MediaKind,
        id: &MediaId,
        language: &str,
    ) -> Result<MediaInfo, ResolveError> {
        let info = match kind {
            MediaKind::Movie => self.metadata.get_movie(&id.id, language).await?,
            MediaKind::Series => {
                self.metadata
                    .get_episode(&id.id, id.season, id.episode, language)
                    .await?
            }
        };
        Ok(info)
    }

    /// Uncached private torrents need a user passkey when the operator
    /// passkey is replaced.
    fn passkey_required(&self, profile: &UserProfile) -> bool {
        if self.settings.passkey.replace.is_none() {
            return false;
        }
        let valid = !profile.passkey.is_empty()
            && is_valid_passkey(&profile.passkey, &self.settings.passkey.pattern).unwrap_or(false);
        !valid
    }
}

/// Cache and lock key of a resolved download.
pub fn download_key(user_hash: &str, mediaflow: bool, media_id: &str, torrent_id: &str) -> String {
    format!(
        "download:2:{}{}:{}:{}",
        user_hash,
        if mediaflow { ":mfp" } else { "" },
        media_id,
        torrent_id
    )
}

/// Episode following `season`/`episode` in `episodes`.
fn next_episode(episodes: &[EpisodeRef], season: u32, episode: u32) -> Option<EpisodeRef> {
    let current = episodes
        .iter()
        .position(|e| e.season == season && e.episode == episode)?;
    episodes.get(current + 1).copied()
}
