//! Indexer API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use debridge_core::searcher::IndexerStats;
use serde::Serialize;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IndexerStatus {
    pub id: String,
    pub title: String,
    pub movies: bool,
    pub series: bool,
    /// False once the indexer hit the slow limit within the window.
    pub fast: bool,
    pub stats: IndexerStats,
}

#[derive(Debug, Serialize)]
pub struct IndexersResponse {
    pub indexers: Vec<IndexerStatus>,
}

/// GET /api/v1/indexers
///
/// List indexers exposed by the gateway with their slow-search statistics.
pub async fn list_indexers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IndexersResponse>, impl IntoResponse> {
    let fanout = state.resolver().fanout();
    let backends = match fanout.gateway().list_backends().await {
        Ok(backends) => backends,
        Err(e) => return Err(ErrorResponse::reply(StatusCode::BAD_GATEWAY, e)),
    };

    let tracker = fanout.tracker();
    let indexers = backends
        .into_iter()
        .map(|b| IndexerStatus {
            fast: tracker.is_fast(&b.id),
            stats: tracker.stats(&b.id),
            id: b.id,
            title: b.title,
            movies: b.movies,
            series: b.series,
        })
        .collect();

    Ok(Json(IndexersResponse { indexers }))
}
