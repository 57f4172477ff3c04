//! REST API routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::{grading, roads};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/grading/analyze", post(grading::analyze_grading))
        .route("/v1/roads/plan", post(roads::plan_roads))
        .route("/v1/results/:id", get(get_result))
}

async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .results()
        .get(&id)
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}
