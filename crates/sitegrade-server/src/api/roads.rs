//! Road network planning from an entrance to a set of assets.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitegrade_core::{
    split_assets, AssetRoute, AssetSpec, Capabilities, FeatureCollection, GradingError,
    GraphStats, NetworkStats, RoadIntersection, RoadNetwork, RoadNetworkConfig, RoadSegment,
    SitePoint, TerrainSpec,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoadPlanRequest {
    pub terrain: TerrainSpec,
    pub entrance: SitePoint,
    pub assets: Vec<AssetSpec>,
    #[serde(default = "default_true")]
    pub optimize: bool,
    pub config: Option<RoadNetworkConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RoadPlanResponse {
    pub result_id: String,
    pub generated_at: DateTime<Utc>,
    pub success: bool,
    pub segments: Vec<RoadSegment>,
    pub intersections: Vec<RoadIntersection>,
    pub stats: NetworkStats,
    pub graph: Option<GraphStats>,
    pub routes: Vec<AssetRoute>,
    pub features: FeatureCollection,
}

pub async fn plan_roads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RoadPlanRequest>,
) -> Result<Json<RoadPlanResponse>, ApiError> {
    state.ensure_grid_size(request.terrain.cell_count())?;
    if request.assets.is_empty() {
        return Err(ApiError::Validation("at least one asset is required".to_string()));
    }

    // Thread count always comes from the server config.
    let mut config = request.config.clone().unwrap_or_default();
    config.search_threads = state.config().search_threads;
    if config.graph.spacing.is_none() {
        config.graph.spacing = state.config().graph_spacing;
    }
    let capabilities = state.capabilities().clone();

    let mut response =
        tokio::task::spawn_blocking(move || run_plan(request, config, &capabilities)).await??;
    response.result_id = uuid::Uuid::new_v4().to_string();
    state.store_response(&response.result_id, &response)?;

    tracing::info!(
        result_id = %response.result_id,
        success = response.success,
        segments = response.segments.len(),
        "roads planned"
    );
    Ok(Json(response))
}

fn run_plan(
    request: RoadPlanRequest,
    config: RoadNetworkConfig,
    capabilities: &Capabilities,
) -> Result<RoadPlanResponse, GradingError> {
    let terrain = request.terrain.to_grid()?;
    let mut network = RoadNetwork::new(terrain, request.entrance, config, capabilities)?;
    let (positions, ids) = split_assets(&request.assets);
    let success = network.generate_network(&positions, &ids, request.optimize)?;

    Ok(RoadPlanResponse {
        result_id: String::new(),
        generated_at: Utc::now(),
        success,
        segments: network.segments().to_vec(),
        intersections: network.intersections().to_vec(),
        stats: network.network_stats(),
        graph: network.graph_stats().cloned(),
        routes: network.routes().to_vec(),
        features: network.to_feature_collection(),
    })
}
