//! Serializable inputs shared by the HTTP service and the CLI.

use crate::error::GradingError;
use crate::geometry::{GeometrySpec, SitePoint};
use crate::post_grading::{GradingZone, RoadCorridorParams, SwaleParams, DEFAULT_TRANSITION_SLOPE};
use crate::terrain::{Bounds, CoordinateSystem, ElevationGrid, LinearUnit};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Elevation raster as nested rows, row 0 at the top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSpec {
    pub rows: Vec<Vec<f64>>,
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    /// Lower-left corner in world coordinates.
    #[serde(default)]
    pub origin: [f64; 2],
    #[serde(default)]
    pub no_data: Option<f64>,
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
    #[serde(default)]
    pub linear_unit: LinearUnit,
}

fn default_cell_size() -> f64 {
    1.0
}

impl TerrainSpec {
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn to_grid(&self) -> Result<ElevationGrid> {
        let height = self.rows.len();
        let width = self.rows.first().map(Vec::len).unwrap_or(0);
        if self.rows.iter().any(|row| row.len() != width) {
            return Err(GradingError::validation("elevation rows have differing lengths"));
        }
        let [ox, oy] = self.origin;
        if !ox.is_finite() || !oy.is_finite() {
            return Err(GradingError::validation("terrain origin must be finite"));
        }
        let bounds = Bounds::new(
            ox,
            oy,
            ox + width as f64 * self.cell_size,
            oy + height as f64 * self.cell_size,
        );
        let data = self.rows.iter().flatten().copied().collect();
        let mut grid = ElevationGrid::new(height, width, data, self.cell_size, self.cell_size, bounds)?
            .with_coordinate_system(self.coordinate_system)
            .with_linear_unit(self.linear_unit);
        if let Some(no_data) = self.no_data {
            grid = grid.with_no_data(no_data);
        }
        if !grid.has_elevation() {
            return Err(GradingError::validation("terrain has no valid elevation samples"));
        }
        Ok(grid)
    }
}

/// A grading zone as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneSpec {
    BuildingPad {
        geometry: GeometrySpec,
        target_elevation: f64,
        #[serde(default = "default_transition_slope")]
        transition_slope: f64,
        #[serde(default)]
        priority: i32,
    },
    RoadCorridor {
        geometry: GeometrySpec,
        #[serde(default)]
        params: RoadCorridorParams,
        #[serde(default)]
        priority: i32,
    },
    DrainageSwale {
        geometry: GeometrySpec,
        #[serde(default)]
        params: SwaleParams,
        #[serde(default)]
        priority: i32,
    },
    Transition {
        geometry: GeometrySpec,
        #[serde(default)]
        priority: i32,
    },
}

fn default_transition_slope() -> f64 {
    DEFAULT_TRANSITION_SLOPE
}

impl ZoneSpec {
    pub fn to_zone(&self) -> Result<GradingZone> {
        let zone = match self {
            ZoneSpec::BuildingPad {
                geometry,
                target_elevation,
                transition_slope,
                priority,
            } => {
                if !target_elevation.is_finite() {
                    return Err(GradingError::validation("pad target elevation must be finite"));
                }
                if !transition_slope.is_finite() || *transition_slope < 0.0 {
                    return Err(GradingError::validation(format!(
                        "transition slope must be non-negative, got {transition_slope}"
                    )));
                }
                GradingZone::building_pad(geometry.to_geometry()?, *target_elevation, *priority)
                    .with_transition_slope(*transition_slope)
            }
            ZoneSpec::RoadCorridor {
                geometry,
                params,
                priority,
            } => {
                if !params.width.is_finite() || params.width <= 0.0 {
                    return Err(GradingError::validation("road corridor width must be positive"));
                }
                GradingZone::road_corridor(geometry.to_geometry()?, *params, *priority)
            }
            ZoneSpec::DrainageSwale {
                geometry,
                params,
                priority,
            } => {
                if !params.width.is_finite() || params.width <= 0.0 {
                    return Err(GradingError::validation("swale width must be positive"));
                }
                GradingZone::drainage_swale(geometry.to_geometry()?, *params, *priority)
            }
            ZoneSpec::Transition { geometry, priority } => {
                GradingZone::transition(geometry.to_geometry()?, *priority)
            }
        };
        Ok(zone)
    }
}

/// A named destination for the road network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl AssetSpec {
    pub fn position(&self) -> SitePoint {
        SitePoint::new(self.x, self.y)
    }
}

/// Split assets into the parallel position/id lists the road network takes.
pub fn split_assets(assets: &[AssetSpec]) -> (Vec<SitePoint>, Vec<String>) {
    assets.iter().map(|a| (a.position(), a.id.clone())).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_grading::ZoneKind;
    use serde_json::json;

    #[test]
    fn terrain_spec_places_origin_and_metadata() {
        let spec: TerrainSpec = serde_json::from_value(json!({
            "rows": [[1.0, 2.0], [3.0, -9999.0]],
            "cell_size": 5.0,
            "origin": [100.0, 200.0],
            "no_data": -9999.0,
            "linear_unit": "feet"
        }))
        .unwrap();
        let grid = spec.to_grid().unwrap();
        assert_eq!(grid.bounds(), Bounds::new(100.0, 200.0, 110.0, 210.0));
        assert_eq!(grid.value(1, 1), None);
        assert_eq!(grid.linear_unit(), LinearUnit::Feet);
        assert_eq!(spec.cell_count(), 4);
    }

    #[test]
    fn ragged_or_empty_terrain_is_rejected() {
        let ragged = TerrainSpec {
            rows: vec![vec![1.0, 2.0], vec![3.0]],
            cell_size: 1.0,
            origin: [0.0, 0.0],
            no_data: None,
            coordinate_system: CoordinateSystem::Projected,
            linear_unit: LinearUnit::Meters,
        };
        assert!(matches!(ragged.to_grid(), Err(GradingError::Validation(_))));
        let empty = TerrainSpec {
            rows: vec![],
            ..ragged
        };
        assert!(matches!(empty.to_grid(), Err(GradingError::Validation(_))));
    }

    #[test]
    fn zone_specs_deserialize_by_kind() {
        let zones: Vec<ZoneSpec> = serde_json::from_value(json!([
            {
                "kind": "building_pad",
                "geometry": {"type": "rectangle", "min": [0.0, 0.0], "max": [10.0, 10.0]},
                "target_elevation": 12.5,
                "priority": 3
            },
            {
                "kind": "road_corridor",
                "geometry": {"type": "line_string", "coordinates": [[0.0, 5.0], [20.0, 5.0]]},
                "params": {"width": 8.0}
            }
        ]))
        .unwrap();
        let pad = zones[0].to_zone().unwrap();
        assert_eq!(pad.kind, ZoneKind::BuildingPad);
        assert_eq!(pad.priority, 3);
        assert_eq!(pad.transition_slope, DEFAULT_TRANSITION_SLOPE);
        let road = zones[1].to_zone().unwrap();
        assert_eq!(road.width, Some(8.0));
        assert_eq!(road.cross_slope, RoadCorridorParams::default().cross_slope);
    }

    #[test]
    fn degenerate_zone_geometry_is_rejected() {
        let spec = ZoneSpec::Transition {
            geometry: GeometrySpec::LineString {
                coordinates: vec![[0.0, 0.0]],
            },
            priority: 0,
        };
        assert!(matches!(spec.to_zone(), Err(GradingError::Validation(_))));
    }
}
