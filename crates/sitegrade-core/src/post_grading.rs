//! Proposed ("post-grading") surface built from ordered grading zones.
//!
//! Zones are composited through an owner grid: they are applied in ascending
//! `(priority, insertion index)` order and each one overwrites every cell it
//! covers, so a cell ends up owned by the covering zone with the highest
//! priority, and among equal priorities by the zone added last.

use crate::error::GradingError;
use crate::geometry::{CellCoverage, FootprintRasterizer, SiteGeometry, SitePoint};
use crate::pre_grading::PreGradingModel;
use crate::terrain::{ElevationGrid, ElevationSummary};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Horizontal run per unit of rise for transition aprons (3:1).
pub const DEFAULT_TRANSITION_SLOPE: f64 = 3.0;
/// Corridor width used when a line-based zone does not give one.
pub const DEFAULT_CORRIDOR_WIDTH: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    BuildingPad,
    RoadCorridor,
    DrainageSwale,
    Transition,
}

/// Road corridor design parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadCorridorParams {
    /// Corridor width when the geometry is a centerline.
    pub width: f64,
    /// Elevation at the footprint centroid; mean existing elevation when absent.
    pub target_elevation: Option<f64>,
    /// Longitudinal grade in percent along `slope_direction`.
    pub target_slope: Option<f64>,
    /// Compass degrees, 0 = +y, 90 = +x.
    pub slope_direction: Option<f64>,
    /// Rise of the crown above the edges' design line.
    pub crown_height: f64,
    /// Cross slope in percent falling from the crown toward the edges.
    pub cross_slope: f64,
}

impl Default for RoadCorridorParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_CORRIDOR_WIDTH,
            target_elevation: None,
            target_slope: None,
            slope_direction: None,
            crown_height: 0.15,
            cross_slope: 2.0,
        }
    }
}

/// Drainage swale design parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwaleParams {
    pub width: f64,
    /// Depth of the channel invert below the swale's edge line.
    pub depth: f64,
    pub target_elevation: Option<f64>,
    pub target_slope: Option<f64>,
    pub slope_direction: Option<f64>,
}

impl Default for SwaleParams {
    fn default() -> Self {
        Self {
            width: 3.0,
            depth: 0.5,
            target_elevation: None,
            target_slope: None,
            slope_direction: None,
        }
    }
}

/// A planar region with a rule for its target elevation. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingZone {
    pub kind: ZoneKind,
    pub geometry: SiteGeometry,
    pub target_elevation: Option<f64>,
    pub target_slope: Option<f64>,
    pub slope_direction: Option<f64>,
    pub width: Option<f64>,
    pub crown_height: f64,
    pub cross_slope: f64,
    pub depth: f64,
    pub transition_slope: f64,
    pub priority: i32,
}

impl GradingZone {
    fn base(kind: ZoneKind, geometry: SiteGeometry, priority: i32) -> Self {
        Self {
            kind,
            geometry,
            target_elevation: None,
            target_slope: None,
            slope_direction: None,
            width: None,
            crown_height: 0.0,
            cross_slope: 0.0,
            depth: 0.0,
            transition_slope: DEFAULT_TRANSITION_SLOPE,
            priority,
        }
    }

    pub fn building_pad(geometry: SiteGeometry, target_elevation: f64, priority: i32) -> Self {
        Self {
            target_elevation: Some(target_elevation),
            ..Self::base(ZoneKind::BuildingPad, geometry, priority)
        }
    }

    pub fn road_corridor(geometry: SiteGeometry, params: RoadCorridorParams, priority: i32) -> Self {
        Self {
            target_elevation: params.target_elevation,
            target_slope: params.target_slope,
            slope_direction: params.slope_direction,
            width: Some(params.width),
            crown_height: params.crown_height,
            cross_slope: params.cross_slope,
            ..Self::base(ZoneKind::RoadCorridor, geometry, priority)
        }
    }

    pub fn drainage_swale(geometry: SiteGeometry, params: SwaleParams, priority: i32) -> Self {
        Self {
            target_elevation: params.target_elevation,
            target_slope: params.target_slope,
            slope_direction: params.slope_direction,
            width: Some(params.width),
            depth: params.depth,
            ..Self::base(ZoneKind::DrainageSwale, geometry, priority)
        }
    }

    pub fn transition(geometry: SiteGeometry, priority: i32) -> Self {
        Self::base(ZoneKind::Transition, geometry, priority)
    }

    pub fn with_transition_slope(mut self, ratio: f64) -> Self {
        self.transition_slope = ratio;
        self
    }

    fn core_buffer(&self, grid: &ElevationGrid) -> f64 {
        if !self.geometry.is_line() {
            return 0.0;
        }
        match self.kind {
            ZoneKind::Transition => {
                let (w, h) = grid.cell_size();
                self.width.map(|w| w / 2.0).unwrap_or(w.max(h) / 2.0)
            }
            _ => self.width.unwrap_or(DEFAULT_CORRIDOR_WIDTH).max(0.0) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingState {
    Empty,
    HasZones,
    Graded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingStatistics {
    pub state: GradingState,
    pub zone_count: usize,
    pub graded_cells: usize,
    /// Planar area of graded cells in square ground units.
    pub graded_area: f64,
    pub elevation: Option<ElevationSummary>,
}

#[derive(Debug, Clone)]
struct GradedSurface {
    grid: ElevationGrid,
    owners: Vec<Option<usize>>,
    zone_count: usize,
}

/// Accumulates grading zones and rasterizes them over the existing surface.
pub struct PostGradingModel {
    base: ElevationGrid,
    rasterizer: Arc<dyn FootprintRasterizer>,
    zones: Vec<GradingZone>,
    graded: Option<GradedSurface>,
}

impl PostGradingModel {
    pub fn new(pre: &PreGradingModel) -> Self {
        Self {
            base: pre.grid().clone(),
            rasterizer: pre.rasterizer().clone(),
            zones: Vec::new(),
            graded: None,
        }
    }

    pub fn zones(&self) -> &[GradingZone] {
        &self.zones
    }

    pub fn state(&self) -> GradingState {
        match &self.graded {
            Some(surface) if surface.zone_count == self.zones.len() => GradingState::Graded,
            _ if self.zones.is_empty() => GradingState::Empty,
            _ => GradingState::HasZones,
        }
    }

    /// Append a zone; returns its insertion index.
    pub fn add_zone(&mut self, zone: GradingZone) -> usize {
        self.zones.push(zone);
        self.zones.len() - 1
    }

    pub fn add_building_pad(
        &mut self,
        geometry: SiteGeometry,
        target_elevation: f64,
        transition_slope: f64,
        priority: i32,
    ) -> usize {
        self.add_zone(
            GradingZone::building_pad(geometry, target_elevation, priority)
                .with_transition_slope(transition_slope),
        )
    }

    pub fn add_road_corridor(
        &mut self,
        geometry: SiteGeometry,
        params: RoadCorridorParams,
        priority: i32,
    ) -> usize {
        self.add_zone(GradingZone::road_corridor(geometry, params, priority))
    }

    pub fn add_drainage_swale(
        &mut self,
        geometry: SiteGeometry,
        params: SwaleParams,
        priority: i32,
    ) -> usize {
        self.add_zone(GradingZone::drainage_swale(geometry, params, priority))
    }

    pub fn add_transition(&mut self, geometry: SiteGeometry, priority: i32) -> usize {
        self.add_zone(GradingZone::transition(geometry, priority))
    }

    /// Rasterize every zone onto a fresh copy of the existing surface.
    pub fn generate_grading(&mut self) -> Result<&ElevationGrid> {
        self.base.require_projected("grading")?;
        let mut order: Vec<usize> = (0..self.zones.len()).collect();
        order.sort_by_key(|&idx| (self.zones[idx].priority, idx));

        let mut working = self.base.clone();
        let mut owners: Vec<Option<usize>> = vec![None; self.base.rows() * self.base.cols()];
        for idx in order {
            let zone = &self.zones[idx];
            let cells = match zone.kind {
                ZoneKind::Transition => self.transition_cells(zone, &working),
                _ => self.design_cells(zone)?,
            };
            for (row, col, elevation) in cells {
                working.set_value(row, col, elevation);
                owners[working.index(row, col)] = Some(idx);
            }
        }

        let graded = owners.iter().filter(|o| o.is_some()).count();
        tracing::debug!(
            zones = self.zones.len(),
            graded_cells = graded,
            "grading generated"
        );
        let surface = self.graded.insert(GradedSurface {
            grid: working,
            owners,
            zone_count: self.zones.len(),
        });
        Ok(&surface.grid)
    }

    /// The last generated surface, if any.
    pub fn graded_grid(&self) -> Option<&ElevationGrid> {
        self.graded.as_ref().map(|surface| &surface.grid)
    }

    /// Insertion index of the zone that set a cell in the last grading.
    pub fn cell_owner(&self, row: usize, col: usize) -> Option<usize> {
        let surface = self.graded.as_ref()?;
        if row >= self.base.rows() || col >= self.base.cols() {
            return None;
        }
        surface.owners[self.base.index(row, col)]
    }

    pub fn statistics(&self) -> GradingStatistics {
        let (grid, graded_cells) = match &self.graded {
            Some(surface) => (
                &surface.grid,
                surface.owners.iter().filter(|o| o.is_some()).count(),
            ),
            None => (&self.base, 0),
        };
        GradingStatistics {
            state: self.state(),
            zone_count: self.zones.len(),
            graded_cells,
            graded_area: graded_cells as f64 * grid.cell_area(),
            elevation: ElevationSummary::from_values(&grid.valid_values()),
        }
    }

    /// Pads, roads and swales: target surface in the core, linear blend to the
    /// existing surface across the apron.
    fn design_cells(&self, zone: &GradingZone) -> Result<Vec<(usize, usize, f64)>> {
        if !zone.transition_slope.is_finite() || zone.transition_slope < 0.0 {
            return Err(GradingError::validation(format!(
                "transition slope must be non-negative, got {}",
                zone.transition_slope
            )));
        }
        let core_buffer = zone.core_buffer(&self.base);
        let core: Vec<CellCoverage> = self
            .rasterizer
            .coverage(&zone.geometry, &self.base, core_buffer, 0.0)
            .into_iter()
            .filter(|cell| cell.edge_distance <= 0.0)
            .collect();
        let existing_core: Vec<f64> = core
            .iter()
            .filter_map(|cell| self.base.value(cell.row, cell.col))
            .collect();
        if existing_core.is_empty() {
            return Ok(Vec::new());
        }

        let reference = zone
            .target_elevation
            .unwrap_or_else(|| existing_core.iter().sum::<f64>() / existing_core.len() as f64);
        let half_width = if zone.geometry.is_line() {
            core_buffer
        } else {
            core.iter().map(|c| c.lateral_offset).fold(0.0, f64::max)
        };
        let surface = DesignSurface {
            zone,
            reference,
            anchor: zone.geometry.centroid(),
            half_width,
        };

        let change = core
            .iter()
            .filter_map(|cell| {
                let existing = self.base.value(cell.row, cell.col)?;
                let (x, y) = self.base.cell_center(cell.row, cell.col);
                Some((surface.elevation(x, y, cell.lateral_offset) - existing).abs())
            })
            .fold(0.0, f64::max);
        let apron_width = change * zone.transition_slope;

        let cells = self
            .rasterizer
            .coverage(&zone.geometry, &self.base, core_buffer, apron_width)
            .into_iter()
            .filter_map(|cell| {
                let existing = self.base.value(cell.row, cell.col)?;
                let (x, y) = self.base.cell_center(cell.row, cell.col);
                let elevation = if cell.edge_distance <= 0.0 {
                    surface.elevation(x, y, cell.lateral_offset)
                } else {
                    let edge = surface.elevation(x, y, half_width);
                    let t = (cell.edge_distance / apron_width).clamp(0.0, 1.0);
                    edge + (existing - edge) * t
                };
                Some((cell.row, cell.col, elevation))
            })
            .collect();
        Ok(cells)
    }

    /// Transition zones replace each covered cell with its 3x3 neighbourhood mean.
    fn transition_cells(&self, zone: &GradingZone, working: &ElevationGrid) -> Vec<(usize, usize, f64)> {
        let core_buffer = zone.core_buffer(working);
        self.rasterizer
            .coverage(&zone.geometry, working, core_buffer, 0.0)
            .into_iter()
            .filter(|cell| cell.edge_distance <= 0.0)
            .filter_map(|cell| {
                working.value(cell.row, cell.col)?;
                let mut sum = 0.0;
                let mut count = 0usize;
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        let r = cell.row as i64 + dr;
                        let c = cell.col as i64 + dc;
                        if r < 0 || c < 0 {
                            continue;
                        }
                        if let Some(v) = working.value(r as usize, c as usize) {
                            sum += v;
                            count += 1;
                        }
                    }
                }
                Some((cell.row, cell.col, sum / count as f64))
            })
            .collect()
    }
}

struct DesignSurface<'a> {
    zone: &'a GradingZone,
    reference: f64,
    anchor: Option<SitePoint>,
    half_width: f64,
}

impl DesignSurface<'_> {
    fn longitudinal(&self, x: f64, y: f64) -> f64 {
        let (Some(slope), Some(direction), Some(anchor)) =
            (self.zone.target_slope, self.zone.slope_direction, self.anchor)
        else {
            return 0.0;
        };
        let heading = direction.to_radians();
        let along = (x - anchor.x) * heading.sin() + (y - anchor.y) * heading.cos();
        slope / 100.0 * along
    }

    fn elevation(&self, x: f64, y: f64, lateral: f64) -> f64 {
        let lateral = lateral.clamp(0.0, self.half_width);
        let base = self.reference + self.longitudinal(x, y);
        match self.zone.kind {
            ZoneKind::BuildingPad | ZoneKind::Transition => self.reference,
            ZoneKind::RoadCorridor => {
                base + self.zone.crown_height - self.zone.cross_slope / 100.0 * lateral
            }
            ZoneKind::DrainageSwale => {
                if self.half_width <= f64::EPSILON {
                    base - self.zone.depth
                } else {
                    base - self.zone.depth * (1.0 - lateral / self.half_width)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use approx::assert_abs_diff_eq;

    fn flat_model(size: usize, elevation: f64) -> PostGradingModel {
        let grid = ElevationGrid::filled(size, size, elevation, 1.0).unwrap();
        let pre = PreGradingModel::new(grid, &Capabilities::standard()).unwrap();
        PostGradingModel::new(&pre)
    }

    fn cell_at(grid: &ElevationGrid, x: f64, y: f64) -> f64 {
        let (row, col) = grid.world_to_cell(x, y).unwrap();
        grid.value(row, col).unwrap()
    }

    #[test]
    fn building_pad_levels_interior_and_leaves_far_cells() {
        let mut model = flat_model(50, 100.0);
        model.add_building_pad(
            SiteGeometry::rectangle(15.0, 15.0, 35.0, 35.0),
            105.0,
            DEFAULT_TRANSITION_SLOPE,
            10,
        );
        let graded = model.generate_grading().unwrap().clone();
        assert_abs_diff_eq!(cell_at(&graded, 25.5, 25.5), 105.0);
        assert_abs_diff_eq!(cell_at(&graded, 16.5, 33.5), 105.0);
        // Apron is 5 * 3 = 15 units; the midpoint of the apron sits halfway.
        assert_abs_diff_eq!(cell_at(&graded, 42.5, 25.5), 102.5, epsilon = 1e-9);
        assert_abs_diff_eq!(cell_at(&graded, 49.5, 25.5), 105.0 - 5.0 * (14.5 / 15.0), epsilon = 1e-9);
        assert_eq!(cell_at(&graded, 0.5, 0.5), 100.0);
    }

    #[test]
    fn higher_priority_wins_regardless_of_order() {
        let mut model = flat_model(30, 10.0);
        let high = model.add_building_pad(SiteGeometry::rectangle(5.0, 5.0, 15.0, 15.0), 20.0, 0.0, 5);
        let low = model.add_building_pad(SiteGeometry::rectangle(10.0, 10.0, 20.0, 20.0), 12.0, 0.0, 1);
        let graded = model.generate_grading().unwrap().clone();
        assert_eq!(cell_at(&graded, 12.5, 12.5), 20.0);
        assert_eq!(cell_at(&graded, 17.5, 17.5), 12.0);
        let (row, col) = graded.world_to_cell(12.5, 12.5).unwrap();
        assert_eq!(model.cell_owner(row, col), Some(high));
        let (row, col) = graded.world_to_cell(17.5, 17.5).unwrap();
        assert_eq!(model.cell_owner(row, col), Some(low));
    }

    #[test]
    fn equal_priority_ties_go_to_later_zone() {
        let mut model = flat_model(30, 10.0);
        model.add_building_pad(SiteGeometry::rectangle(5.0, 5.0, 15.0, 15.0), 20.0, 0.0, 3);
        let later = model.add_building_pad(SiteGeometry::rectangle(10.0, 10.0, 20.0, 20.0), 12.0, 0.0, 3);
        let graded = model.generate_grading().unwrap().clone();
        assert_eq!(cell_at(&graded, 12.5, 12.5), 12.0);
        let (row, col) = graded.world_to_cell(12.5, 12.5).unwrap();
        assert_eq!(model.cell_owner(row, col), Some(later));
    }

    #[test]
    fn regrading_is_bit_identical_and_tracks_state() {
        let mut model = flat_model(40, 50.0);
        assert_eq!(model.state(), GradingState::Empty);
        model.add_building_pad(SiteGeometry::rectangle(5.0, 5.0, 15.0, 15.0), 53.0, 2.0, 2);
        model.add_road_corridor(
            SiteGeometry::line(&[(0.0, 20.0), (40.0, 20.0)]).unwrap(),
            RoadCorridorParams {
                target_slope: Some(2.0),
                slope_direction: Some(90.0),
                ..RoadCorridorParams::default()
            },
            1,
        );
        assert_eq!(model.state(), GradingState::HasZones);
        let first: Vec<u64> = model
            .generate_grading()
            .unwrap()
            .values()
            .iter()
            .map(|v| v.to_bits())
            .collect();
        let second: Vec<u64> = model
            .generate_grading()
            .unwrap()
            .values()
            .iter()
            .map(|v| v.to_bits())
            .collect();
        assert_eq!(first, second);
        assert_eq!(model.state(), GradingState::Graded);

        model.add_transition(SiteGeometry::rectangle(14.0, 14.0, 18.0, 18.0), 0);
        assert_eq!(model.state(), GradingState::HasZones);
    }

    #[test]
    fn road_crown_is_highest_on_axis_and_follows_grade() {
        let mut model = flat_model(40, 50.0);
        model.add_road_corridor(
            SiteGeometry::line(&[(0.0, 20.0), (40.0, 20.0)]).unwrap(),
            RoadCorridorParams {
                width: 8.0,
                target_elevation: Some(50.0),
                target_slope: Some(5.0),
                slope_direction: Some(90.0),
                crown_height: 0.2,
                cross_slope: 2.0,
            },
            1,
        );
        let graded = model.generate_grading().unwrap().clone();
        let axis = cell_at(&graded, 20.5, 20.5);
        let edge = cell_at(&graded, 20.5, 23.5);
        // 0.5 east of the centroid at 5% and 0.5 off axis at 2%.
        assert_abs_diff_eq!(axis, 50.0 + 0.025 + 0.2 - 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(edge, 50.0 + 0.025 + 0.2 - 0.07, epsilon = 1e-9);
        assert!(cell_at(&graded, 30.5, 20.5) > cell_at(&graded, 10.5, 20.5));
    }

    #[test]
    fn swale_is_deepest_on_axis() {
        let mut model = flat_model(30, 20.0);
        model.add_drainage_swale(
            SiteGeometry::line(&[(0.0, 15.0), (30.0, 15.0)]).unwrap(),
            SwaleParams {
                width: 4.0,
                depth: 1.0,
                target_elevation: Some(20.0),
                ..SwaleParams::default()
            },
            1,
        );
        let graded = model.generate_grading().unwrap().clone();
        let axis = cell_at(&graded, 10.5, 15.5);
        let side = cell_at(&graded, 10.5, 16.5);
        assert_abs_diff_eq!(axis, 20.0 - 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(side, 20.0 - 0.25, epsilon = 1e-9);
    }

    #[test]
    fn transition_smooths_seam_cells() {
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|_| (0..10).map(|c| if c < 5 { 0.0 } else { 9.0 }).collect())
            .collect();
        let grid = ElevationGrid::from_rows(rows, 1.0).unwrap();
        let pre = PreGradingModel::new(grid, &Capabilities::standard()).unwrap();
        let mut model = PostGradingModel::new(&pre);
        model.add_transition(SiteGeometry::rectangle(4.0, 4.0, 6.0, 6.0), 1);
        let graded = model.generate_grading().unwrap().clone();
        assert_abs_diff_eq!(cell_at(&graded, 4.5, 4.5), 3.0);
        assert_abs_diff_eq!(cell_at(&graded, 5.5, 4.5), 6.0);
    }

    #[test]
    fn zones_outside_the_grid_are_clipped() {
        let mut model = flat_model(10, 5.0);
        model.add_building_pad(SiteGeometry::rectangle(100.0, 100.0, 120.0, 120.0), 9.0, 3.0, 1);
        model.add_building_pad(SiteGeometry::rectangle(8.0, 8.0, 14.0, 14.0), 5.0, 3.0, 1);
        let graded = model.generate_grading().unwrap().clone();
        assert!(graded.values().iter().all(|v| *v == 5.0));
        assert_eq!(model.statistics().graded_cells, 4);
    }

    #[test]
    fn geographic_grids_are_rejected() {
        let grid = ElevationGrid::filled(20, 20, 100.0, 0.0001)
            .unwrap()
            .with_coordinate_system(crate::terrain::CoordinateSystem::Geographic);
        let pre = PreGradingModel::new(grid, &crate::capability::Capabilities::standard()).unwrap();
        let mut model = PostGradingModel::new(&pre);
        model.add_building_pad(SiteGeometry::rectangle(0.0009, 0.0009, 0.0011, 0.0011), 102.0, 3.0, 0);
        assert!(matches!(model.generate_grading(), Err(GradingError::Validation(_))));
        assert!(model.graded_grid().is_none());
    }
}
