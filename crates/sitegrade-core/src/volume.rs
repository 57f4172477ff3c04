//! Cut/fill volumes, earthwork costs, balancing and cross-sections.
//!
//! Two sign conventions are in play and both are deliberate:
//! - the volume grid uses `diff = post - pre`; negative is cut, positive is fill
//!   and `net_volume = fill_volume - cut_volume`;
//! - cross-sections report `cut_fill = pre - post`, so positive means cut.

use crate::error::GradingError;
use crate::geometry::SitePoint;
use crate::post_grading::{GradingState, PostGradingModel};
use crate::pre_grading::{sample_profile, PreGradingModel};
use crate::soil::SoilProperties;
use crate::terrain::ElevationGrid;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Cut and fill within this fraction of each other count as balanced.
pub const BALANCE_TOLERANCE: f64 = 0.1;
/// Reported balance ratio when there is fill but no cut.
pub const MAX_BALANCE_RATIO: f64 = 1_000.0;
/// Haul distance (ground units) above which hauling is flagged.
pub const LONG_HAUL_DISTANCE: f64 = 500.0;
/// Cross-section width in ground units.
pub const DEFAULT_SECTION_WIDTH: f64 = 1.0;

/// All volumes are cubic yards, areas are square ground units and depths are
/// ground units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeResult {
    pub cut_volume: f64,
    pub fill_volume: f64,
    pub net_volume: f64,
    pub balanced_volume: f64,
    pub import_volume: f64,
    pub export_volume: f64,
    pub cut_area: f64,
    pub fill_area: f64,
    pub avg_cut_depth: f64,
    pub avg_fill_depth: f64,
    pub shrink_swell_applied: bool,
    /// Volume-weighted center of the cut cells.
    pub cut_centroid: Option<SitePoint>,
    /// Volume-weighted center of the fill cells.
    pub fill_centroid: Option<SitePoint>,
}

/// Unit rates in currency per cubic yard (haul is per cubic yard per ground unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostDatabase {
    pub excavation_rate: f64,
    pub fill_rate: f64,
    pub haul_rate: f64,
    pub import_rate: f64,
    pub export_rate: f64,
    pub compaction_rate: f64,
}

impl Default for CostDatabase {
    fn default() -> Self {
        Self {
            excavation_rate: 3.50,
            fill_rate: 2.75,
            haul_rate: 0.0015,
            import_rate: 15.00,
            export_rate: 10.00,
            compaction_rate: 1.50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthworkCost {
    pub excavation_cost: f64,
    pub fill_cost: f64,
    pub haul_cost: f64,
    pub import_cost: f64,
    pub export_cost: f64,
    pub compaction_cost: f64,
    pub total_cost: f64,
    pub haul_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingResult {
    pub is_balanced: bool,
    /// `fill / cut`; 1.0 when both are zero, capped at [`MAX_BALANCE_RATIO`].
    pub balance_ratio: f64,
    pub optimal_haul_distance: f64,
    pub recommendations: Vec<String>,
}

/// Pre/post elevations sampled along a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    pub points: Vec<SitePoint>,
    pub distances: Vec<f64>,
    pub pre_elevations: Vec<f64>,
    pub post_elevations: Vec<f64>,
    /// `pre - post`: positive is cut. `NaN` where either surface is missing.
    pub cut_fill: Vec<f64>,
    /// Trapezoidal area of the cut part of the section (square ground units).
    pub cut_area: f64,
    pub fill_area: f64,
    pub section_width: f64,
    /// Section area times width, in cubic yards.
    pub approx_cut_volume: f64,
    pub approx_fill_volume: f64,
}

/// Compares the existing and proposed surfaces.
pub struct VolumeCalculator {
    pre: ElevationGrid,
    post: ElevationGrid,
    soil: SoilProperties,
    costs: CostDatabase,
    section_width: f64,
    last_result: Option<VolumeResult>,
}

impl VolumeCalculator {
    /// Both grids must share the same shape.
    pub fn new(pre: ElevationGrid, post: ElevationGrid, soil: SoilProperties) -> Result<Self> {
        if pre.shape() != post.shape() {
            return Err(GradingError::validation(format!(
                "surface shapes differ: {:?} vs {:?}",
                pre.shape(),
                post.shape()
            )));
        }
        if !(soil.shrink_factor.is_finite() && soil.shrink_factor > 0.0)
            || !(soil.swell_factor.is_finite() && soil.swell_factor > 0.0)
        {
            return Err(GradingError::validation(format!(
                "soil '{}' has invalid shrink/swell factors",
                soil.name
            )));
        }
        Ok(Self {
            pre,
            post,
            soil,
            costs: CostDatabase::default(),
            section_width: DEFAULT_SECTION_WIDTH,
            last_result: None,
        })
    }

    /// Fails unless `post` has been graded since its last zone was added.
    pub fn from_models(
        pre: &PreGradingModel,
        post: &PostGradingModel,
        soil: SoilProperties,
    ) -> Result<Self> {
        if post.state() != GradingState::Graded {
            return Err(GradingError::validation(
                "grading is stale; regenerate it after adding zones",
            ));
        }
        let graded = post
            .graded_grid()
            .ok_or_else(|| GradingError::validation("grading has not been generated"))?;
        Self::new(pre.grid().clone(), graded.clone(), soil)
    }

    pub fn with_costs(mut self, costs: CostDatabase) -> Self {
        self.costs = costs;
        self
    }

    pub fn with_section_width(mut self, width: f64) -> Self {
        self.section_width = width;
        self
    }

    pub fn soil(&self) -> &SoilProperties {
        &self.soil
    }

    pub fn costs(&self) -> &CostDatabase {
        &self.costs
    }

    pub fn last_result(&self) -> Option<&VolumeResult> {
        self.last_result.as_ref()
    }

    /// `post - pre` per cell; `NaN` where either surface is missing.
    pub fn difference_grid(&self) -> Result<ElevationGrid> {
        let diff = (0..self.pre.rows())
            .flat_map(|row| (0..self.pre.cols()).map(move |col| (row, col)))
            .map(|(row, col)| match (self.pre.value(row, col), self.post.value(row, col)) {
                (Some(pre), Some(post)) => post - pre,
                _ => f64::NAN,
            })
            .collect();
        self.pre.with_values(diff)
    }

    pub fn calculate_volumes(&mut self, apply_shrink_swell: bool) -> VolumeResult {
        let (cell_w, cell_h) = self.pre.cell_size_ground();
        let cell_area = cell_w * cell_h;

        let mut cut = Accumulator::default();
        let mut fill = Accumulator::default();
        for row in 0..self.pre.rows() {
            for col in 0..self.pre.cols() {
                let (Some(pre), Some(post)) = (self.pre.value(row, col), self.post.value(row, col))
                else {
                    continue;
                };
                let diff = post - pre;
                let center = self.pre.cell_center(row, col);
                if diff < 0.0 {
                    cut.add(-diff, cell_area, center);
                } else if diff > 0.0 {
                    fill.add(diff, cell_area, center);
                }
            }
        }

        let unit = self.pre.linear_unit();
        let mut cut_volume = unit.to_cubic_yards(cut.volume);
        let mut fill_volume = unit.to_cubic_yards(fill.volume);
        if apply_shrink_swell {
            cut_volume *= self.soil.swell_factor;
            fill_volume *= self.soil.shrink_factor;
        }

        let (import_volume, export_volume) = if fill_volume > cut_volume {
            (fill_volume - cut_volume, 0.0)
        } else {
            (0.0, cut_volume - fill_volume)
        };
        let result = VolumeResult {
            cut_volume,
            fill_volume,
            net_volume: fill_volume - cut_volume,
            balanced_volume: cut_volume.min(fill_volume),
            import_volume,
            export_volume,
            cut_area: cut.area,
            fill_area: fill.area,
            avg_cut_depth: cut.mean_depth(),
            avg_fill_depth: fill.mean_depth(),
            shrink_swell_applied: apply_shrink_swell,
            cut_centroid: cut.centroid(),
            fill_centroid: fill.centroid(),
        };
        tracing::debug!(
            cut = result.cut_volume,
            fill = result.fill_volume,
            net = result.net_volume,
            "volumes calculated"
        );
        self.last_result = Some(result.clone());
        result
    }

    pub fn calculate_costs(
        &self,
        result: &VolumeResult,
        avg_haul_distance: f64,
    ) -> Result<EarthworkCost> {
        if !avg_haul_distance.is_finite() || avg_haul_distance < 0.0 {
            return Err(GradingError::validation(format!(
                "haul distance must be non-negative, got {avg_haul_distance}"
            )));
        }
        let rates = &self.costs;
        let excavation_cost = result.cut_volume * rates.excavation_rate;
        let fill_cost = result.fill_volume * rates.fill_rate;
        let haul_cost = result.balanced_volume * rates.haul_rate * avg_haul_distance;
        let import_cost = result.import_volume * rates.import_rate;
        let export_cost = result.export_volume * rates.export_rate;
        let compaction_cost = result.fill_volume * rates.compaction_rate;
        Ok(EarthworkCost {
            excavation_cost,
            fill_cost,
            haul_cost,
            import_cost,
            export_cost,
            compaction_cost,
            total_cost: excavation_cost
                + fill_cost
                + haul_cost
                + import_cost
                + export_cost
                + compaction_cost,
            haul_distance: avg_haul_distance,
        })
    }

    /// Balance of the last volume result, computing one with shrink/swell if needed.
    pub fn calculate_balancing(&mut self) -> BalancingResult {
        let result = match self.last_result.clone() {
            Some(result) => result,
            None => self.calculate_volumes(true),
        };
        let balance_ratio = balance_ratio(result.cut_volume, result.fill_volume);
        let is_balanced = (balance_ratio - 1.0).abs() <= BALANCE_TOLERANCE;
        let optimal_haul_distance = match (result.cut_centroid, result.fill_centroid) {
            (Some(cut), Some(fill)) => self.pre.ground_distance(cut.x, cut.y, fill.x, fill.y),
            _ => 0.0,
        };

        let mut recommendations = Vec::new();
        if result.cut_volume == 0.0 && result.fill_volume == 0.0 {
            recommendations.push("No earthwork required; the design matches existing grade".to_string());
        } else if balance_ratio > 1.0 + BALANCE_TOLERANCE {
            recommendations.push(format!(
                "Import about {:.0} CY of fill material",
                result.import_volume
            ));
            recommendations.push("Consider lowering pad elevations to generate more cut".to_string());
        } else if balance_ratio < 1.0 - BALANCE_TOLERANCE {
            recommendations.push(format!(
                "Export about {:.0} CY of excess material",
                result.export_volume
            ));
            recommendations.push("Consider raising pad elevations to use more cut as fill".to_string());
        } else {
            recommendations.push("Cut and fill are well balanced; reuse excavated material on site".to_string());
        }
        if optimal_haul_distance > LONG_HAUL_DISTANCE {
            recommendations.push(format!(
                "Average haul of {optimal_haul_distance:.0} units is long; stage stockpiles near fill areas"
            ));
        }

        BalancingResult {
            is_balanced,
            balance_ratio,
            optimal_haul_distance,
            recommendations,
        }
    }

    pub fn generate_cross_section(
        &self,
        start: SitePoint,
        end: SitePoint,
        samples: usize,
    ) -> Result<CrossSection> {
        if !self.section_width.is_finite() || self.section_width <= 0.0 {
            return Err(GradingError::validation("section width must be positive"));
        }
        let pre = sample_profile(&self.pre, start, end, samples)?;
        let post = sample_profile(&self.post, start, end, samples)?;
        let cut_fill: Vec<f64> = pre
            .elevations
            .iter()
            .zip(&post.elevations)
            .map(|(pre, post)| pre - post)
            .collect();

        let mut cut_area = 0.0;
        let mut fill_area = 0.0;
        for i in 1..cut_fill.len() {
            let dx = pre.distances[i] - pre.distances[i - 1];
            let (a, b) = (finite_or_zero(cut_fill[i - 1]), finite_or_zero(cut_fill[i]));
            cut_area += 0.5 * (a.max(0.0) + b.max(0.0)) * dx;
            fill_area += 0.5 * ((-a).max(0.0) + (-b).max(0.0)) * dx;
        }

        let unit = self.pre.linear_unit();
        Ok(CrossSection {
            points: pre.points,
            distances: pre.distances,
            pre_elevations: pre.elevations,
            post_elevations: post.elevations,
            cut_fill,
            cut_area,
            fill_area,
            section_width: self.section_width,
            approx_cut_volume: unit.to_cubic_yards(cut_area * self.section_width),
            approx_fill_volume: unit.to_cubic_yards(fill_area * self.section_width),
        })
    }
}

fn balance_ratio(cut: f64, fill: f64) -> f64 {
    if cut <= 0.0 {
        return if fill <= 0.0 { 1.0 } else { MAX_BALANCE_RATIO };
    }
    (fill / cut).min(MAX_BALANCE_RATIO)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Default)]
struct Accumulator {
    volume: f64,
    area: f64,
    depth_sum: f64,
    cells: usize,
    weighted_x: f64,
    weighted_y: f64,
}

impl Accumulator {
    fn add(&mut self, depth: f64, cell_area: f64, (x, y): (f64, f64)) {
        let volume = depth * cell_area;
        self.volume += volume;
        self.area += cell_area;
        self.depth_sum += depth;
        self.cells += 1;
        self.weighted_x += x * volume;
        self.weighted_y += y * volume;
    }

    fn mean_depth(&self) -> f64 {
        if self.cells == 0 {
            0.0
        } else {
            self.depth_sum / self.cells as f64
        }
    }

    fn centroid(&self) -> Option<SitePoint> {
        (self.volume > 0.0).then(|| {
            SitePoint::new(self.weighted_x / self.volume, self.weighted_y / self.volume)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{LinearUnit, CUBIC_YARDS_PER_CUBIC_METER};
    use approx::assert_abs_diff_eq;

    fn flat(elevation: f64) -> ElevationGrid {
        ElevationGrid::filled(10, 10, elevation, 1.0).unwrap()
    }

    fn split_grid() -> ElevationGrid {
        // West half cut by 1, east half filled by 3.
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|_| (0..10).map(|c| if c < 5 { 99.0 } else { 103.0 }).collect())
            .collect();
        ElevationGrid::from_rows(rows, 1.0).unwrap()
    }

    #[test]
    fn uniform_fill_has_no_cut() {
        let mut calc = VolumeCalculator::new(flat(100.0), flat(102.0), SoilProperties::neutral()).unwrap();
        let result = calc.calculate_volumes(false);
        assert_eq!(result.cut_volume, 0.0);
        assert_abs_diff_eq!(result.fill_volume, 200.0 * CUBIC_YARDS_PER_CUBIC_METER, epsilon = 1e-9);
        assert_eq!(result.net_volume, result.fill_volume - result.cut_volume);
        assert_eq!(result.export_volume, 0.0);
        assert_eq!(result.import_volume, result.fill_volume);
        assert_abs_diff_eq!(result.fill_area, 100.0);
        assert_abs_diff_eq!(result.avg_fill_depth, 2.0);
    }

    #[test]
    fn feet_grids_convert_by_27() {
        let pre = flat(100.0).with_linear_unit(LinearUnit::Feet);
        let post = flat(102.7).with_linear_unit(LinearUnit::Feet);
        let mut calc = VolumeCalculator::new(pre, post, SoilProperties::neutral()).unwrap();
        assert_abs_diff_eq!(calc.calculate_volumes(false).fill_volume, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn shrink_and_swell_scale_volumes() {
        let soil = SoilProperties {
            shrink_factor: 1.1,
            swell_factor: 1.25,
            ..SoilProperties::neutral()
        };
        let mut calc = VolumeCalculator::new(flat(100.0), split_grid(), soil).unwrap();
        let raw = calc.calculate_volumes(false);
        let adjusted = calc.calculate_volumes(true);
        assert_abs_diff_eq!(adjusted.cut_volume, raw.cut_volume * 1.25, epsilon = 1e-9);
        assert_abs_diff_eq!(adjusted.fill_volume, raw.fill_volume * 1.1, epsilon = 1e-9);
        assert!(adjusted.import_volume == 0.0 || adjusted.export_volume == 0.0);
        assert_eq!(adjusted.balanced_volume, adjusted.cut_volume.min(adjusted.fill_volume));
    }

    #[test]
    fn no_data_cells_are_ignored() {
        let mut pre_rows = vec![vec![100.0; 4]; 4];
        pre_rows[0][0] = -9999.0;
        let pre = ElevationGrid::from_rows(pre_rows, 1.0).unwrap().with_no_data(-9999.0);
        let post = ElevationGrid::filled(4, 4, 101.0, 1.0).unwrap();
        let mut calc = VolumeCalculator::new(pre, post, SoilProperties::neutral()).unwrap();
        let result = calc.calculate_volumes(false);
        assert_abs_diff_eq!(result.fill_area, 15.0);
        assert!(calc.difference_grid().unwrap().values()[0].is_nan());
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let post = ElevationGrid::filled(5, 10, 100.0, 1.0).unwrap();
        assert!(matches!(
            VolumeCalculator::new(flat(100.0), post, SoilProperties::neutral()),
            Err(GradingError::Validation(_))
        ));
    }

    #[test]
    fn costs_sum_components() {
        let mut calc = VolumeCalculator::new(flat(100.0), split_grid(), SoilProperties::neutral()).unwrap();
        let result = calc.calculate_volumes(false);
        let cost = calc.calculate_costs(&result, 120.0).unwrap();
        let rates = CostDatabase::default();
        assert_abs_diff_eq!(cost.excavation_cost, result.cut_volume * rates.excavation_rate);
        assert_abs_diff_eq!(
            cost.haul_cost,
            result.balanced_volume * rates.haul_rate * 120.0,
            epsilon = 1e-9
        );
        let sum = cost.excavation_cost
            + cost.fill_cost
            + cost.haul_cost
            + cost.import_cost
            + cost.export_cost
            + cost.compaction_cost;
        assert_abs_diff_eq!(cost.total_cost, sum, epsilon = 1e-9);
        assert!(calc.calculate_costs(&result, -1.0).is_err());
    }

    #[test]
    fn balancing_handles_degenerate_ratios() {
        let mut unchanged = VolumeCalculator::new(flat(100.0), flat(100.0), SoilProperties::neutral()).unwrap();
        let balance = unchanged.calculate_balancing();
        assert!(balance.is_balanced);
        assert_eq!(balance.balance_ratio, 1.0);
        assert_eq!(balance.optimal_haul_distance, 0.0);

        let mut fill_only = VolumeCalculator::new(flat(100.0), flat(101.0), SoilProperties::neutral()).unwrap();
        let balance = fill_only.calculate_balancing();
        assert!(!balance.is_balanced);
        assert_eq!(balance.balance_ratio, MAX_BALANCE_RATIO);
        assert!(balance.recommendations[0].starts_with("Import"));
    }

    #[test]
    fn balancing_measures_haul_between_cut_and_fill() {
        let mut calc = VolumeCalculator::new(flat(100.0), split_grid(), SoilProperties::neutral()).unwrap();
        calc.calculate_volumes(false);
        let balance = calc.calculate_balancing();
        // Cut centered at x = 2.5, fill at x = 7.5.
        assert_abs_diff_eq!(balance.optimal_haul_distance, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(balance.balance_ratio, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn cross_section_reports_positive_cut() {
        let calc = VolumeCalculator::new(flat(100.0), split_grid(), SoilProperties::neutral())
            .unwrap()
            .with_section_width(2.0);
        let section = calc
            .generate_cross_section(SitePoint::new(0.5, 5.0), SitePoint::new(9.5, 5.0), 10)
            .unwrap();
        assert!(section.distances.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(section.cut_fill[0], 1.0);
        assert_eq!(section.cut_fill[9], -3.0);
        // Cut: 4 full steps at 1.0 plus the crossing trapezoid (1.0 + 0) / 2.
        assert_abs_diff_eq!(section.cut_area, 4.5, epsilon = 1e-9);
        assert_abs_diff_eq!(section.fill_area, 13.5, epsilon = 1e-9);
        assert_abs_diff_eq!(
            section.approx_cut_volume,
            9.0 * CUBIC_YARDS_PER_CUBIC_METER,
            epsilon = 1e-9
        );
    }

    #[test]
    fn cross_section_sample_count_is_bounded() {
        let calc = VolumeCalculator::new(flat(100.0), split_grid(), SoilProperties::neutral()).unwrap();
        let err = calc
            .generate_cross_section(SitePoint::new(0.5, 5.0), SitePoint::new(9.5, 5.0), 1usize << 42)
            .unwrap_err();
        assert!(matches!(err, GradingError::Validation(_)));
    }

    #[test]
    fn stale_grading_is_rejected() {
        use crate::capability::Capabilities;
        use crate::geometry::SiteGeometry;

        let pre = PreGradingModel::new(flat(100.0), &Capabilities::standard()).unwrap();
        let mut post = PostGradingModel::new(&pre);
        post.add_building_pad(SiteGeometry::rectangle(4.0, 4.0, 6.0, 6.0), 101.0, 0.0, 0);
        post.generate_grading().unwrap();
        assert!(VolumeCalculator::from_models(&pre, &post, SoilProperties::neutral()).is_ok());

        post.add_building_pad(SiteGeometry::rectangle(1.0, 1.0, 3.0, 3.0), 99.0, 0.0, 0);
        assert!(matches!(
            VolumeCalculator::from_models(&pre, &post, SoilProperties::neutral()),
            Err(GradingError::Validation(_))
        ));

        post.generate_grading().unwrap();
        let mut calc = VolumeCalculator::from_models(&pre, &post, SoilProperties::neutral()).unwrap();
        let result = calc.calculate_volumes(false);
        assert!(result.cut_area > 0.0);
        assert!(result.fill_area > 0.0);
    }
}
