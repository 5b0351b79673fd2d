//! Instant-availability resolution against a storage backend.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CacheCheck, DebridError, DebridFile, StorageBackend, TransferStatus};
use crate::cache::TtlCache;
use crate::metrics;
use crate::profile::UserProfile;
use crate::searcher::ranker::rank;
use crate::searcher::Candidate;

pub const EXPIRED_KEY_MESSAGE: &str = "Unable to verify cache (+): Expired Debrid API Key.";
pub const PASSKEY_REQUIRED_MESSAGE: &str = "Uncached torrent require a passkey configuration";

/// Per-request inputs to [`AvailabilityResolver::resolve`].
pub struct AvailabilityRequest<'a> {
    pub profile: &'a UserProfile,
    /// Session id forwarded to the backend (the composite media id).
    pub sid: &'a str,
    /// Uncached private torrents must be disabled.
    pub passkey_required: bool,
}

/// Folds backend availability into candidate lists.
///
/// Holds the process-wide status cache: check results reused for a short
/// while instead of asking the backend again. Entries are keyed by the
/// backend's [`cache_scope`](StorageBackend::cache_scope) and the hash, so
/// one caller's store never answers for another's.
pub struct AvailabilityResolver {
    statuses: TtlCache<(String, String), CacheCheck>,
    batch_size: usize,
}

impl AvailabilityResolver {
    pub fn new(status_ttl: Duration, batch_size: usize) -> Self {
        Self {
            statuses: TtlCache::new(status_ttl),
            batch_size: batch_size.max(1),
        }
    }

    /// Last known status of `hash` on `backend`, if still fresh.
    pub fn status(&self, backend: &dyn StorageBackend, hash: &str) -> Option<TransferStatus> {
        self.statuses
            .get(&status_key(backend, hash))
            .map(|c| c.status)
    }

    /// Record a status learned outside a cache check (e.g. a torrent was
    /// just queued for download).
    pub fn mark_status(&self, backend: &dyn StorageBackend, hash: &str, status: TransferStatus) {
        self.statuses.insert(
            status_key(backend, hash),
            CacheCheck {
                hash: hash.to_string(),
                status,
                files: Vec::new(),
            },
        );
    }

    /// Drop expired statuses; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.statuses.purge_expired()
    }

    /// Check `hashes`, serving ready statuses from the status cache and
    /// asking the backend for the rest in batches.
    ///
    /// A failed batch is logged and skipped unless the failure is an
    /// expired credential, which aborts the whole check.
    pub async fn check(
        &self,
        backend: &dyn StorageBackend,
        hashes: &[String],
        sid: &str,
    ) -> Result<Vec<CacheCheck>, DebridError> {
        let scope = backend.cache_scope();
        let mut checks = Vec::with_capacity(hashes.len());
        let mut pending = Vec::new();
        for hash in hashes {
            match self.statuses.get(&(scope.clone(), hash.clone())) {
                Some(check) if check.status.is_ready() => {
                    metrics::STATUS_CACHE_HITS.inc();
                    checks.push(check);
                }
                _ => pending.push(hash.clone()),
            }
        }

        let store = backend.short_name();
        for batch in pending.chunks(self.batch_size) {
            match backend.check_cache(batch, sid).await {
                Ok(results) => {
                    for check in results {
                        self.statuses
                            .insert((scope.clone(), check.hash.clone()), check.clone());
                        checks.push(check);
                    }
                }
                Err(DebridError::ExpiredCredential) => {
                    metrics::CACHE_CHECKS
                        .with_label_values(&[store, "error"])
                        .inc_by(batch.len() as u64);
                    return Err(DebridError::ExpiredCredential);
                }
                Err(e) => {
                    metrics::CACHE_CHECKS
                        .with_label_values(&[store, "error"])
                        .inc_by(batch.len() as u64);
                    warn!(store = store, hashes = batch.len(), error = %e, "Cache check failed");
                }
            }
        }
        Ok(checks)
    }

    /// Tag candidates with their availability and order them for display.
    ///
    /// Cached candidates come first (sorted by the profile's cached keys),
    /// then uncached ones unless the profile hides them and the backend can
    /// actually tell cached from uncached. Preferred languages are pulled
    /// forward within each group. When the credential has expired every
    /// candidate is kept but disabled.
    pub async fn resolve(
        &self,
        backend: &dyn StorageBackend,
        mut candidates: Vec<Candidate>,
        is_valid: &(dyn Fn(&[DebridFile]) -> bool + Send + Sync),
        request: &AvailabilityRequest<'_>,
    ) -> Vec<Candidate> {
        let hashes = unique_hashes(&candidates);
        let checks = match self.check(backend, &hashes, request.sid).await {
            Ok(checks) => checks,
            Err(DebridError::ExpiredCredential) => {
                info!(store = backend.short_name(), "Debrid API key expired");
                for candidate in &mut candidates {
                    candidate.disable(EXPIRED_KEY_MESSAGE);
                }
                return candidates;
            }
            Err(e) => {
                warn!(store = backend.short_name(), error = %e, "Availability check failed");
                return candidates;
            }
        };

        let store = backend.short_name();
        let (mut cached, mut uncached): (Vec<Candidate>, Vec<Candidate>) = (Vec::new(), Vec::new());
        for mut candidate in candidates {
            let check = candidate
                .info_hash()
                .and_then(|hash| checks.iter().find(|c| c.hash == hash));
            if let Some(check) = check {
                candidate.status = Some(check.status);
                candidate.is_cached =
                    check.status.is_ready() && !check.files.is_empty() && is_valid(&check.files);
            }
            if candidate.is_cached {
                metrics::CACHE_CHECKS.with_label_values(&[store, "cached"]).inc();
                cached.push(candidate);
            } else {
                metrics::CACHE_CHECKS
                    .with_label_values(&[store, "uncached"])
                    .inc();
                uncached.push(candidate);
            }
        }

        if request.passkey_required {
            for candidate in uncached.iter_mut() {
                if candidate.infos.as_ref().is_some_and(|i| i.private) {
                    candidate.disable(PASSKEY_REQUIRED_MESSAGE);
                }
            }
        }

        info!(
            store = store,
            cached = cached.len(),
            uncached = uncached.len(),
            "Availability resolved"
        );

        let profile = request.profile;
        let language = |c: &Candidate| c.matches_languages(&profile.prioritize_languages);
        let mut ordered = rank(cached, &profile.sort_cached, language, None);
        if !profile.hide_uncached || !backend.can_check_cache() {
            ordered.extend(rank(uncached, &profile.sort_uncached, language, None));
        }

        self.attach_progress(backend, &mut ordered).await;
        ordered
    }

    async fn attach_progress(&self, backend: &dyn StorageBackend, candidates: &mut [Candidate]) {
        let hashes = unique_hashes(candidates);
        match backend.progress(&hashes).await {
            Ok(progress) => {
                for candidate in candidates.iter_mut() {
                    candidate.progress = candidate
                        .info_hash()
                        .and_then(|hash| progress.get(hash))
                        .copied();
                }
            }
            Err(e) => debug!(error = %e, "Progress lookup failed"),
        }
    }
}

fn status_key(backend: &dyn StorageBackend, hash: &str) -> (String, String) {
    (backend.cache_scope(), hash.to_string())
}

fn unique_hashes(candidates: &[Candidate]) -> Vec<String> {
    let mut hashes: Vec<String> = Vec::with_capacity(candidates.len());
    for hash in candidates.iter().filter_map(Candidate::info_hash) {
        if !hashes.iter().any(|h| h == hash) {
            hashes.push(hash.to_string());
        }
    }
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{SortField, SortKey};
    use crate::testing::{fixtures, MockStorageBackend};

    fn resolver() -> AvailabilityResolver {
        AvailabilityResolver::new(Duration::from_secs(300), 2)
    }

    fn request(profile: &UserProfile) -> AvailabilityRequest<'_> {
        AvailabilityRequest {
            profile,
            sid: "tt1",
            passkey_required: false,
        }
    }

    fn accept_all(_: &[DebridFile]) -> bool {
        true
    }

    fn names(items: &[Candidate]) -> Vec<&str> {
        items.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_cached_first_then_uncached() {
        let backend = MockStorageBackend::new();
        backend.set_cached("hash-b", &[("b.mkv", 10)]).await;

        let candidates = vec![
            fixtures::enriched_candidate("A", "hash-a", 50),
            fixtures::enriched_candidate("B", "hash-b", 5),
        ];
        let profile = UserProfile::default();
        let result = resolver()
            .resolve(&backend, candidates, &accept_all, &request(&profile))
            .await;

        assert_eq!(names(&result), vec!["B", "A"]);
        assert!(result[0].is_cached);
        assert_eq!(result[0].status, Some(TransferStatus::Cached));
        assert!(!result[1].is_cached);
        assert!(result[1].progress.is_some());
    }

    #[tokio::test]
    async fn test_validity_predicate_gates_cache_hits() {
        let backend = MockStorageBackend::new();
        backend.set_cached("hash-a", &[("wrong.mkv", 10)]).await;

        let candidates = vec![fixtures::enriched_candidate("A", "hash-a", 1)];
        let profile = UserProfile::default();
        let reject = |_: &[DebridFile]| false;
        let result = resolver()
            .resolve(&backend, candidates, &reject, &request(&profile))
            .await;

        assert!(!result[0].is_cached);
        assert_eq!(result[0].status, Some(TransferStatus::Cached));
    }

    #[tokio::test]
    async fn test_hide_uncached() {
        let backend = MockStorageBackend::new();
        backend.set_cached("hash-a", &[("a.mkv", 10)]).await;

        let candidates = vec![
            fixtures::enriched_candidate("A", "hash-a", 1),
            fixtures::enriched_candidate("B", "hash-b", 1),
        ];
        let profile = UserProfile {
            hide_uncached: true,
            ..UserProfile::default()
        };
        let result = resolver()
            .resolve(&backend, candidates.clone(), &accept_all, &request(&profile))
            .await;
        assert_eq!(names(&result), vec!["A"]);

        backend.set_can_check_cache(false);
        let result = resolver()
            .resolve(&backend, candidates, &accept_all, &request(&profile))
            .await;
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_credential_disables_everything() {
        let backend = MockStorageBackend::new();
        backend.expire_credential().await;

        let candidates = vec![
            fixtures::enriched_candidate("A", "hash-a", 1),
            fixtures::enriched_candidate("B", "hash-b", 1),
        ];
        let profile = UserProfile::default();
        let result = resolver()
            .resolve(&backend, candidates, &accept_all, &request(&profile))
            .await;

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|c| c.disabled));
        assert_eq!(result[0].info_text.as_deref(), Some(EXPIRED_KEY_MESSAGE));
    }

    #[tokio::test]
    async fn test_private_uncached_needs_passkey() {
        let backend = MockStorageBackend::new();
        let mut private = fixtures::enriched_candidate("P", "hash-p", 1);
        if let Some(infos) = private.infos.as_mut() {
            infos.private = true;
        }
        let public = fixtures::enriched_candidate("Q", "hash-q", 1);

        let profile = UserProfile::default();
        let req = AvailabilityRequest {
            passkey_required: true,
            ..request(&profile)
        };
        let result = resolver()
            .resolve(&backend, vec![private, public], &accept_all, &req)
            .await;

        let p = result.iter().find(|c| c.name == "P").unwrap();
        let q = result.iter().find(|c| c.name == "Q").unwrap();
        assert!(p.disabled);
        assert_eq!(p.info_text.as_deref(), Some(PASSKEY_REQUIRED_MESSAGE));
        assert!(!q.disabled);
    }

    #[tokio::test]
    async fn test_checks_are_batched_and_cached() {
        let backend = MockStorageBackend::new();
        for hash in ["h1", "h2", "h3"] {
            backend.set_cached(hash, &[("f.mkv", 1)]).await;
        }
        let resolver = resolver();
        let hashes: Vec<String> = ["h1", "h2", "h3"].iter().map(|h| h.to_string()).collect();

        let checks = resolver.check(&backend, &hashes, "sid").await.unwrap();
        assert_eq!(checks.len(), 3);
        assert_eq!(backend.check_batches().await, vec![2, 1]);

        // second round is served from the status cache
        resolver.check(&backend, &hashes, "sid").await.unwrap();
        assert_eq!(backend.check_batches().await.len(), 2);
        assert_eq!(resolver.status(&backend, "h1"), Some(TransferStatus::Cached));
    }

    #[tokio::test]
    async fn test_statuses_are_scoped_per_caller() {
        let alice = MockStorageBackend::with_user("alice");
        let bob = MockStorageBackend::with_user("bob");
        alice.set_cached("hash-x", &[("x.mkv", 10)]).await;
        let resolver = resolver();
        let profile = UserProfile::default();

        let result = resolver
            .resolve(
                &alice,
                vec![fixtures::enriched_candidate("X", "hash-x", 1)],
                &accept_all,
                &request(&profile),
            )
            .await;
        assert!(result[0].is_cached);

        let result = resolver
            .resolve(
                &bob,
                vec![fixtures::enriched_candidate("X", "hash-x", 1)],
                &accept_all,
                &request(&profile),
            )
            .await;
        assert!(!result[0].is_cached);
        assert_eq!(bob.check_batches().await, vec![1]);
        assert_eq!(resolver.status(&bob, "hash-x"), None);
        assert_eq!(resolver.status(&alice, "hash-x"), Some(TransferStatus::Cached));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_drops_expired_statuses() {
        let backend = MockStorageBackend::new();
        let resolver = resolver();
        resolver.mark_status(&backend, "h1", TransferStatus::Queued);
        assert_eq!(resolver.purge_expired(), 0);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(resolver.purge_expired(), 1);
    }

    #[tokio::test]
    async fn test_queued_status_is_rechecked() {
        let backend = MockStorageBackend::new();
        let resolver = resolver();
        resolver.mark_status(&backend, "h1", TransferStatus::Queued);
        assert_eq!(resolver.status(&backend, "h1"), Some(TransferStatus::Queued));

        resolver
            .check(&backend, &["h1".to_string()], "sid")
            .await
            .unwrap();
        assert_eq!(backend.check_batches().await, vec![1]);
    }

    #[tokio::test]
    async fn test_cached_sorted_with_language_priority() {
        let backend = MockStorageBackend::new();
        for hash in ["h1", "h2", "h3"] {
            backend.set_cached(hash, &[("f.mkv", 1)]).await;
        }
        let small = fixtures::enriched_candidate("Small", "h1", 1);
        let mut big = fixtures::enriched_candidate("Big", "h2", 1);
        big.size_bytes = 1000;
        let mut french = fixtures::enriched_candidate("French", "h3", 1);
        french.languages = vec![crate::searcher::Language::French];

        let profile = UserProfile {
            sort_cached: vec![SortKey::desc(SortField::Size)],
            prioritize_languages: vec!["french".to_string()],
            ..UserProfile::default()
        };
        let result = resolver()
            .resolve(&backend, vec![small, big, french], &accept_all, &request(&profile))
            .await;
        assert_eq!(names(&result), vec!["French", "Big", "Small"]);
    }
}
