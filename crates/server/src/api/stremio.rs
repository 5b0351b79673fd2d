//! Addon routes: stream listing and download redirects.
//!
//! Both routes carry the caller's profile as their first path segment.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use debridge_core::{
    torrent_info::TorrentInfoError, MediaKind, ResolveError, StreamEntry, UserProfile,
};
use serde::Serialize;
use tracing::{error, info};

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamEntry>,
}

/// GET /{profile}/stream/{kind}/{id}
///
/// `id` is `tt123` for movies and `tt123:1:2` for episodes, optionally
/// suffixed with `.json`.
pub async fn list_streams(
    State(state): State<Arc<AppState>>,
    Path((profile, kind, id)): Path<(String, String, String)>,
) -> Response {
    let (profile, kind) = match parse_request(&state, &profile, &kind) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let id = id.trim_end_matches(".json");

    match state.resolver().list_streams(&profile, kind, id).await {
        Ok(streams) => Json(StreamsResponse { streams }).into_response(),
        Err(ResolveError::NoTorrentInfos(_)) => {
            info!(media_id = id, "No torrent found");
            Json(StreamsResponse {
                streams: Vec::new(),
            })
            .into_response()
        }
        Err(e) => {
            error!(media_id = id, error = %e, "Stream listing failed");
            ErrorResponse::reply(status_for(&e), e)
        }
    }
}

/// GET /{profile}/download/{kind}/{id}/{torrent_id}/{filename}
///
/// Redirects to the resolved file URL, or to the placeholder video while
/// the torrent is still being processed. The filename segment only makes
/// the URL readable to players.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((profile, kind, id, torrent_id, _filename)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Response {
    let (profile, kind) = match parse_request(&state, &profile, &kind) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let resolver = state.resolver();
    match resolver
        .resolve_download(&profile, kind, &id, &torrent_id)
        .await
    {
        Ok(outcome) => found(outcome.url()),
        Err(ResolveError::NotReady) => {
            info!(media_id = %id, torrent_id = %torrent_id, "Download not ready yet");
            found(&resolver.settings().not_ready_url())
        }
        Err(e) => {
            error!(media_id = %id, torrent_id = %torrent_id, error = %e, "Download failed");
            ErrorResponse::reply(status_for(&e), e)
        }
    }
}

fn parse_request(
    state: &AppState,
    profile: &str,
    kind: &str,
) -> Result<(UserProfile, MediaKind), Response> {
    let profile = state
        .profile(profile)
        .map_err(|e| ErrorResponse::reply(StatusCode::BAD_REQUEST, e))?;
    let kind = kind
        .parse::<MediaKind>()
        .map_err(|e| ErrorResponse::reply(StatusCode::BAD_REQUEST, e))?;
    Ok((profile, kind))
}

fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

fn status_for(e: &ResolveError) -> StatusCode {
    match e {
        ResolveError::NoBackendConfigured => StatusCode::SERVICE_UNAVAILABLE,
        ResolveError::NoTorrentInfos(_)
        | ResolveError::TorrentInfo(TorrentInfoError::NotFound(_)) => StatusCode::NOT_FOUND,
        ResolveError::UnsupportedMediaKind(_) | ResolveError::InvalidPasskey(_) => {
            StatusCode::BAD_REQUEST
        }
        ResolveError::ExpiredCredential => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
