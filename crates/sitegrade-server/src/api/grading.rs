//! Grading analysis: existing surface, design zones, volumes, costs.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitegrade_core::{
    BalancingResult, Capabilities, CostDatabase, CrossSection, EarthworkCost, GradingError,
    GradingStatistics, PostGradingModel, PreGradingModel, SitePoint, SoilProperties,
    TerrainSpec, TerrainStatistics, VolumeCalculator, VolumeResult, ZoneSpec,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GradingRequest {
    pub terrain: TerrainSpec,
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
    /// Soil key; the server default when absent.
    pub soil: Option<String>,
    #[serde(default = "default_true")]
    pub apply_shrink_swell: bool,
    pub costs: Option<CostDatabase>,
    /// Average haul distance for costing; the cut/fill centroid distance when absent.
    pub haul_distance: Option<f64>,
    pub section_width: Option<f64>,
    #[serde(default)]
    pub cross_sections: Vec<SectionRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SectionRequest {
    pub start: SitePoint,
    pub end: SitePoint,
    #[serde(default = "default_samples")]
    pub samples: usize,
}

fn default_true() -> bool {
    true
}

fn default_samples() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct GradingResponse {
    pub result_id: String,
    pub generated_at: DateTime<Utc>,
    pub soil: SoilProperties,
    pub terrain: TerrainStatistics,
    pub grading: GradingStatistics,
    pub volumes: VolumeResult,
    pub costs: EarthworkCost,
    pub balancing: BalancingResult,
    pub cross_sections: Vec<CrossSection>,
}

pub async fn analyze_grading(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GradingRequest>,
) -> Result<Json<GradingResponse>, ApiError> {
    state.ensure_grid_size(request.terrain.cell_count())?;
    let soil_key = request
        .soil
        .clone()
        .unwrap_or_else(|| state.config().default_soil.clone());
    let soil = state.soils().require(&soil_key)?;
    let capabilities = state.capabilities().clone();

    let mut response =
        tokio::task::spawn_blocking(move || run_analysis(request, soil, &capabilities)).await??;
    response.result_id = uuid::Uuid::new_v4().to_string();
    state.store_response(&response.result_id, &response)?;

    tracing::info!(
        result_id = %response.result_id,
        cut = response.volumes.cut_volume,
        fill = response.volumes.fill_volume,
        "grading analyzed"
    );
    Ok(Json(response))
}

fn run_analysis(
    request: GradingRequest,
    soil: SoilProperties,
    capabilities: &Capabilities,
) -> Result<GradingResponse, GradingError> {
    let pre = PreGradingModel::new(request.terrain.to_grid()?, capabilities)?;
    let terrain = pre.statistics()?;

    let mut post = PostGradingModel::new(&pre);
    for zone in &request.zones {
        post.add_zone(zone.to_zone()?);
    }
    post.generate_grading()?;
    let grading = post.statistics();

    let mut calculator = VolumeCalculator::from_models(&pre, &post, soil.clone())?
        .with_costs(request.costs.unwrap_or_default());
    if let Some(width) = request.section_width {
        calculator = calculator.with_section_width(width);
    }
    let volumes = calculator.calculate_volumes(request.apply_shrink_swell);
    let balancing = calculator.calculate_balancing();
    let haul = request
        .haul_distance
        .unwrap_or(balancing.optimal_haul_distance);
    let costs = calculator.calculate_costs(&volumes, haul)?;
    let cross_sections = request
        .cross_sections
        .iter()
        .map(|section| calculator.generate_cross_section(section.start, section.end, section.samples))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GradingResponse {
        result_id: String::new(),
        generated_at: Utc::now(),
        soil,
        terrain,
        grading,
        volumes,
        costs,
        balancing,
        cross_sections,
    })
}
