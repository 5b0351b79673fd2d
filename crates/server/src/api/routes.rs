use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::{debrids, handlers, indexers, middleware::metrics_middleware, stremio};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Placeholder videos and other static assets (configurable via env)
    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string());

    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/indexers", get(indexers::list_indexers))
        .route("/debrids", get(debrids::list_debrids));

    // Addon routes, the profile travels in the first segment
    let addon_routes = Router::new()
        .route("/{profile}/stream/{kind}/{id}", get(stremio::list_streams))
        .route(
            "/{profile}/download/{kind}/{id}/{torrent_id}/{filename}",
            get(stremio::download),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(addon_routes)
        .route("/metrics", get(handlers::metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
