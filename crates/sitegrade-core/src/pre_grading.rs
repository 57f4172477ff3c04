//! Existing ("pre-grading") terrain surface.

use crate::capability::Capabilities;
use crate::error::GradingError;
use crate::geometry::{FootprintRasterizer, SiteGeometry, SitePoint};
use crate::terrain::{ElevationGrid, ElevationSummary, SlopeCalculator};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cap on the `1 / cos(slope)` surface-area correction (about 84 degrees).
pub const MAX_SURFACE_AREA_FACTOR: f64 = 10.0;

/// Upper bound on samples along one profile or cross section.
pub const MAX_PROFILE_SAMPLES: usize = 100_000;

/// Elevations sampled along a straight line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationProfile {
    pub points: Vec<SitePoint>,
    /// Cumulative ground distance from the start, non-decreasing.
    pub distances: Vec<f64>,
    /// `NaN` where the sample is outside the grid or no-data.
    pub elevations: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainStatistics {
    pub elevation: ElevationSummary,
    pub valid_cells: usize,
    /// Planar area of valid cells in square ground units.
    pub planar_area: f64,
    /// 3D surface area estimate; equals `planar_area` when slope was unavailable.
    pub surface_area: f64,
    pub slope_corrected: bool,
}

/// Query surface over the existing terrain.
pub struct PreGradingModel {
    grid: ElevationGrid,
    capabilities: Capabilities,
    rasterizer: Arc<dyn FootprintRasterizer>,
    slope: Arc<dyn SlopeCalculator>,
}

impl PreGradingModel {
    pub fn new(grid: ElevationGrid, capabilities: &Capabilities) -> Result<Self> {
        let rasterizer = capabilities.require_rasterizer()?;
        let slope = capabilities.require_slope()?;
        if !grid.has_elevation() {
            return Err(GradingError::validation(
                "elevation grid contains no elevation values",
            ));
        }
        tracing::debug!(
            rows = grid.rows(),
            cols = grid.cols(),
            "pre-grading surface loaded"
        );
        Ok(Self {
            grid,
            capabilities: capabilities.clone(),
            rasterizer,
            slope,
        })
    }

    pub fn grid(&self) -> &ElevationGrid {
        &self.grid
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub(crate) fn rasterizer(&self) -> &Arc<dyn FootprintRasterizer> {
        &self.rasterizer
    }

    /// Existing elevation at a world coordinate.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        self.grid.sample(x, y)
    }

    /// Sample `samples` equally spaced points from `start` to `end` inclusive.
    pub fn elevation_profile(
        &self,
        start: SitePoint,
        end: SitePoint,
        samples: usize,
    ) -> Result<ElevationProfile> {
        sample_profile(&self.grid, start, end, samples)
    }

    /// Valid elevations under a footprint.
    pub fn zone_elevations(&self, geometry: &SiteGeometry) -> Vec<f64> {
        self.rasterizer
            .mask(geometry, &self.grid)
            .iter()
            .zip(self.grid.values())
            .filter(|(inside, value)| **inside && self.grid.is_valid_value(**value))
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn statistics(&self) -> Result<TerrainStatistics> {
        let values = self.grid.valid_values();
        let elevation = ElevationSummary::from_values(&values)
            .ok_or_else(|| GradingError::validation("no valid elevations"))?;
        let (cell_w, cell_h) = self.grid.cell_size_ground();
        let cell_area = cell_w * cell_h;
        let planar_area = values.len() as f64 * cell_area;

        let (surface_area, slope_corrected) = match self.slope.slope_degrees(&self.grid) {
            Ok(slopes) => {
                let area: f64 = slopes
                    .iter()
                    .flatten()
                    .map(|deg| surface_factor(*deg) * cell_area)
                    .sum();
                (area, true)
            }
            Err(err) => {
                tracing::warn!("slope calculation failed, using planar area: {}", err);
                (planar_area, false)
            }
        };

        Ok(TerrainStatistics {
            elevation,
            valid_cells: values.len(),
            planar_area,
            surface_area,
            slope_corrected,
        })
    }
}

fn surface_factor(slope_deg: f64) -> f64 {
    let cos = slope_deg.to_radians().cos();
    if !cos.is_finite() || cos <= 1.0 / MAX_SURFACE_AREA_FACTOR {
        return MAX_SURFACE_AREA_FACTOR;
    }
    1.0 / cos
}

pub(crate) fn sample_profile(
    grid: &ElevationGrid,
    start: SitePoint,
    end: SitePoint,
    samples: usize,
) -> Result<ElevationProfile> {
    if samples < 2 {
        return Err(GradingError::validation("profile needs at least 2 samples"));
    }
    if samples > MAX_PROFILE_SAMPLES {
        return Err(GradingError::validation(format!(
            "profile of {samples} samples exceeds the limit of {MAX_PROFILE_SAMPLES}"
        )));
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(GradingError::validation("profile endpoints must be finite"));
    }
    let total = grid.ground_distance(start.x, start.y, end.x, end.y);
    let last = (samples - 1) as f64;

    let mut points = Vec::with_capacity(samples);
    let mut distances = Vec::with_capacity(samples);
    let mut elevations = Vec::with_capacity(samples);
    for i in 0..samples {
        let t = i as f64 / last;
        let point = SitePoint::new(
            start.x + t * (end.x - start.x),
            start.y + t * (end.y - start.y),
        );
        distances.push(total * t);
        elevations.push(grid.sample(point.x, point.y).unwrap_or(f64::NAN));
        points.push(point);
    }
    Ok(ElevationProfile {
        points,
        distances,
        elevations,
    })
}
