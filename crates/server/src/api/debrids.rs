//! Debrid provider API handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use debridge_core::debrid::BackendDescriptor;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DebridsResponse {
    pub debrids: Vec<BackendDescriptor>,
}

/// GET /api/v1/debrids
///
/// Known debrid providers with the settings a profile needs for each.
pub async fn list_debrids(State(state): State<Arc<AppState>>) -> Json<DebridsResponse> {
    Json(DebridsResponse {
        debrids: state.resolver().backends().descriptors(),
    })
}
