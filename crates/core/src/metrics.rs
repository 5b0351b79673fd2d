//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Indexer fan-out (search outcomes, durations, slow indexer detections)
//! - Torrent info resolution
//! - Debrid availability checks and download resolution
//! - Stream listings

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Indexer Metrics
// =============================================================================

/// Indexer searches total by result.
pub static INDEXER_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("debridge_indexer_searches_total", "Total indexer searches"),
        &["indexer", "result"], // "success", "error", "timeout"
    )
    .unwrap()
});

/// Indexer search duration in seconds.
pub static INDEXER_SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "debridge_indexer_search_duration_seconds",
            "Duration of individual indexer searches",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["indexer"],
    )
    .unwrap()
});

/// Slow indexer samples recorded.
pub static SLOW_INDEXER_DETECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridge_slow_indexer_detections_total",
            "Total searches recorded as slow",
        ),
        &["indexer"],
    )
    .unwrap()
});

/// Candidates returned per fan-out round.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "debridge_search_results",
            "Number of candidates returned per fan-out round",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Torrent Info Metrics
// =============================================================================

/// Torrent info resolutions by result.
pub static TORRENT_INFO_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridge_torrent_info_resolutions_total",
            "Total torrent info resolutions",
        ),
        &["result"], // "success", "failed", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Debrid Metrics
// =============================================================================

/// Per-hash availability check outcomes.
pub static CACHE_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridge_cache_checks_total",
            "Total per-hash availability check outcomes",
        ),
        &["store", "result"], // "cached", "uncached", "error"
    )
    .unwrap()
});

/// Availability answers served from the short-lived status cache.
pub static STATUS_CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "debridge_status_cache_hits_total",
        "Availability statuses served from the status cache",
    )
    .unwrap()
});

/// Debrid API requests by outcome.
pub static DEBRID_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("debridge_debrid_requests_total", "Total debrid API requests"),
        &["store", "status"], // status: "success", "retry", "error"
    )
    .unwrap()
});

/// Download resolutions by result.
pub static DOWNLOAD_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridge_download_resolutions_total",
            "Total download resolutions",
        ),
        &["result"], // "cache_hit", "resolved", "not_ready", "fallback", "failed"
    )
    .unwrap()
});

// =============================================================================
// Stream Listing Metrics
// =============================================================================

/// Stream listing duration in seconds.
pub static STREAM_LISTING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "debridge_stream_listing_duration_seconds",
            "Duration of stream listings",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["kind", "result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Indexers
        Box::new(INDEXER_SEARCHES.clone()),
        Box::new(INDEXER_SEARCH_DURATION.clone()),
        Box::new(SLOW_INDEXER_DETECTIONS.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Torrent infos
        Box::new(TORRENT_INFO_RESOLUTIONS.clone()),
        // Debrid
        Box::new(CACHE_CHECKS.clone()),
        Box::new(STATUS_CACHE_HITS.clone()),
        Box::new(DEBRID_REQUESTS.clone()),
        Box::new(DOWNLOAD_RESOLUTIONS.clone()),
        // Streams
        Box::new(STREAM_LISTING_DURATION.clone()),
    ]
}
