//! Elevation grids, pixel/world transforms and slope calculation.

use crate::error::GradingError;
use crate::spatial::{haversine_distance, meters_per_deg_lat, meters_per_deg_lon, planar_distance};
use crate::Result;
use serde::{Deserialize, Serialize};

pub const CUBIC_FEET_PER_CUBIC_YARD: f64 = 27.0;
pub const CUBIC_YARDS_PER_CUBIC_METER: f64 = 1.307_950_619_3;

/// Axis-aligned rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when all edges are finite and the rectangle has positive area.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.max_x > self.min_x
            && self.max_y > self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Affine pixel-to-world transform.
///
/// `x = a*col + b*row + c`, `y = d*col + e*row + f`. Pixel centers sit at
/// `(col + 0.5, row + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform with the top-left corner at `(origin_x, origin_y)`.
    pub fn north_up(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            a: cell_width,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -cell_height,
            f: origin_y,
        }
    }

    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Fractional `(col, row)` for a world coordinate, `None` when singular.
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (-self.d * dx + self.a * dy) / det;
        Some((col, row))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    /// Planar coordinates in ground units.
    #[default]
    Projected,
    /// Longitude (x) / latitude (y) in decimal degrees.
    Geographic,
}

/// Ground unit of the grid's horizontal and vertical axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnit {
    #[default]
    Meters,
    Feet,
}

impl LinearUnit {
    /// Convert a volume in cubic ground units to cubic yards.
    pub fn to_cubic_yards(self, cubic_units: f64) -> f64 {
        match self {
            LinearUnit::Meters => cubic_units * CUBIC_YARDS_PER_CUBIC_METER,
            LinearUnit::Feet => cubic_units / CUBIC_FEET_PER_CUBIC_YARD,
        }
    }
}

/// A 2D elevation raster with its georeferencing.
///
/// Samples are stored row-major, row 0 at the top (north) edge. No-data cells
/// are excluded from every statistic and never read as zero.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    cell_width: f64,
    cell_height: f64,
    bounds: Bounds,
    transform: Option<GeoTransform>,
    no_data: Option<f64>,
    coordinate_system: CoordinateSystem,
    linear_unit: LinearUnit,
}

impl ElevationGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        data: Vec<f64>,
        cell_width: f64,
        cell_height: f64,
        bounds: Bounds,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(GradingError::validation("elevation grid is empty"));
        }
        if data.len() != rows * cols {
            return Err(GradingError::validation(format!(
                "elevation grid has {} samples, expected {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        if !(cell_width.is_finite() && cell_width > 0.0 && cell_height.is_finite() && cell_height > 0.0)
        {
            return Err(GradingError::validation(format!(
                "invalid cell size ({cell_width}, {cell_height})"
            )));
        }
        if !bounds.is_valid() {
            return Err(GradingError::validation("elevation grid bounds are degenerate"));
        }
        Ok(Self {
            rows,
            cols,
            data,
            cell_width,
            cell_height,
            bounds,
            transform: None,
            no_data: None,
            coordinate_system: CoordinateSystem::Projected,
            linear_unit: LinearUnit::Meters,
        })
    }

    /// Build a grid from nested rows with square cells and the lower-left corner at the origin.
    pub fn from_rows(rows: Vec<Vec<f64>>, cell_size: f64) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|row| row.len()).unwrap_or(0);
        if rows.iter().any(|row| row.len() != width) {
            return Err(GradingError::validation("elevation rows have differing lengths"));
        }
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        let bounds = Bounds::new(0.0, 0.0, width as f64 * cell_size, height as f64 * cell_size);
        Self::new(height, width, data, cell_size, cell_size, bounds)
    }

    /// A constant-elevation grid, lower-left corner at the origin.
    pub fn filled(rows: usize, cols: usize, elevation: f64, cell_size: f64) -> Result<Self> {
        let bounds = Bounds::new(0.0, 0.0, cols as f64 * cell_size, rows as f64 * cell_size);
        Self::new(rows, cols, vec![elevation; rows * cols], cell_size, cell_size, bounds)
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = Some(no_data);
        self
    }

    pub fn with_coordinate_system(mut self, coordinate_system: CoordinateSystem) -> Self {
        self.coordinate_system = coordinate_system;
        self
    }

    pub fn with_linear_unit(mut self, linear_unit: LinearUnit) -> Self {
        self.linear_unit = linear_unit;
        self
    }

    /// Same frame and metadata, different samples.
    pub fn with_values(&self, data: Vec<f64>) -> Result<Self> {
        if data.len() != self.data.len() {
            return Err(GradingError::validation(format!(
                "replacement data has {} samples, expected {}",
                data.len(),
                self.data.len()
            )));
        }
        let mut grid = self.clone();
        grid.data = data;
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_width, self.cell_height)
    }

    /// Planar area of one cell in square ground units.
    pub fn cell_area(&self) -> f64 {
        self.cell_width * self.cell_height
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn transform(&self) -> Option<GeoTransform> {
        self.transform
    }

    /// The explicit transform, or the north-up one implied by bounds and resolution.
    pub fn effective_transform(&self) -> GeoTransform {
        self.transform.unwrap_or_else(|| {
            GeoTransform::north_up(
                self.bounds.min_x,
                self.bounds.max_y,
                self.cell_width,
                self.cell_height,
            )
        })
    }

    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    /// Rejects geographic grids for work that mixes world offsets with
    /// ground lengths (aprons, widths, lattice spacing).
    pub fn require_projected(&self, operation: &str) -> Result<()> {
        match self.coordinate_system {
            CoordinateSystem::Projected => Ok(()),
            CoordinateSystem::Geographic => Err(GradingError::validation(format!(
                "{operation} needs a projected grid; reproject geographic terrain first"
            ))),
        }
    }

    pub fn linear_unit(&self) -> LinearUnit {
        self.linear_unit
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn is_valid_value(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.no_data {
            Some(no_data) => (value - no_data).abs() > 1e-9,
            None => true,
        }
    }

    /// Elevation of a cell, `None` when outside the grid or no-data.
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let value = self.data[self.index(row, col)];
        self.is_valid_value(value).then_some(value)
    }

    pub(crate) fn set_value(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.index(row, col);
        self.data[idx] = value;
    }

    pub fn valid_values(&self) -> Vec<f64> {
        self.data
            .iter()
            .copied()
            .filter(|v| self.is_valid_value(*v))
            .collect()
    }

    pub fn has_elevation(&self) -> bool {
        self.data.iter().any(|v| self.is_valid_value(*v))
    }

    /// World coordinate of a cell center.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        match self.transform {
            Some(transform) => transform.apply(col as f64 + 0.5, row as f64 + 0.5),
            None => (
                self.bounds.min_x + (col as f64 + 0.5) * self.cell_width,
                self.bounds.max_y - (row as f64 + 0.5) * self.cell_height,
            ),
        }
    }

    /// Fractional `(col, row)` of a world coordinate, unclamped.
    fn fractional_cell(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        match self.transform {
            Some(transform) => transform.invert(x, y),
            None => Some((
                (x - self.bounds.min_x) / self.cell_width,
                (self.bounds.max_y - y) / self.cell_height,
            )),
        }
    }

    /// Cell `(row, col)` containing a world coordinate, `None` when outside the grid.
    pub fn world_to_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.fractional_cell(x, y)?;
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 || col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Nearest cell to a world coordinate, clamped to the grid edges.
    pub fn nearest_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.fractional_cell(x, y)?;
        let col = col.floor().clamp(0.0, (self.cols - 1) as f64);
        let row = row.floor().clamp(0.0, (self.rows - 1) as f64);
        Some((row as usize, col as usize))
    }

    /// Elevation at a world coordinate (nearest-cell lookup).
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let (row, col) = self.world_to_cell(x, y)?;
        self.value(row, col)
    }

    /// Ground distance between two world coordinates in linear ground units.
    ///
    /// Geographic grids return meters along the great circle.
    pub fn ground_distance(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
        match self.coordinate_system {
            CoordinateSystem::Projected => planar_distance(x1, y1, x2, y2),
            CoordinateSystem::Geographic => haversine_distance(y1, x1, y2, x2),
        }
    }

    /// Cell width and height in linear ground units (meters for geographic grids).
    pub fn cell_size_ground(&self) -> (f64, f64) {
        match self.coordinate_system {
            CoordinateSystem::Projected => (self.cell_width, self.cell_height),
            CoordinateSystem::Geographic => {
                let mid_lat = (self.bounds.min_y + self.bounds.max_y) / 2.0;
                (
                    self.cell_width * meters_per_deg_lon(mid_lat).max(1.0),
                    self.cell_height * meters_per_deg_lat(mid_lat),
                )
            }
        }
    }
}

/// Summary statistics over valid elevations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl ElevationSummary {
    /// `None` when no finite values are given.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std: variance.sqrt(),
        })
    }
}

/// Slope capability: per-cell slope in degrees, `None` for no-data cells.
pub trait SlopeCalculator: Send + Sync {
    fn slope_degrees(&self, grid: &ElevationGrid) -> Result<Vec<Option<f64>>>;
}

/// Central-difference slope, one-sided at grid edges and next to no-data cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiniteDifferenceSlope;

impl SlopeCalculator for FiniteDifferenceSlope {
    fn slope_degrees(&self, grid: &ElevationGrid) -> Result<Vec<Option<f64>>> {
        if !grid.has_elevation() {
            return Err(GradingError::validation("slope requested for grid without elevations"));
        }
        let (cell_w, cell_h) = grid.cell_size_ground();
        let (rows, cols) = grid.shape();
        let mut slopes = vec![None; rows * cols];

        for row in 0..rows {
            for col in 0..cols {
                let Some(center) = grid.value(row, col) else {
                    continue;
                };
                let west = col.checked_sub(1).and_then(|c| grid.value(row, c));
                let east = grid.value(row, col + 1);
                let north = row.checked_sub(1).and_then(|r| grid.value(r, col));
                let south = grid.value(row + 1, col);

                let dz_dx = gradient(west, center, east, cell_w);
                // Rows grow southward, so north minus south is the +y gradient.
                let dz_dy = gradient(south, center, north, cell_h);
                let rise = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();
                slopes[grid.index(row, col)] = Some(rise.atan().to_degrees());
            }
        }
        Ok(slopes)
    }
}

fn gradient(before: Option<f64>, center: f64, after: Option<f64>, spacing: f64) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (a - b) / (2.0 * spacing),
        (None, Some(a)) => (a - center) / spacing,
        (Some(b), None) => (center - b) / spacing,
        (None, None) => 0.0,
    }
}

/// Convert a slope angle in degrees to percent grade.
pub fn degrees_to_percent(degrees: f64) -> f64 {
    degrees.to_radians().tan() * 100.0
}
