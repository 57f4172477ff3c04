//! Planar site geometry and footprint rasterization.

use crate::error::GradingError;
use crate::terrain::{Bounds, ElevationGrid};
use crate::Result;
use geo::{BoundingRect, Centroid, Contains, Coord, EuclideanDistance, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// A world-space point in the grid's planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SitePoint {
    pub x: f64,
    pub y: f64,
}

impl SitePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for SitePoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Serializable geometry input, validated into a [`SiteGeometry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometrySpec {
    Polygon {
        exterior: Vec<[f64; 2]>,
        #[serde(default)]
        interiors: Vec<Vec<[f64; 2]>>,
    },
    Rectangle {
        min: [f64; 2],
        max: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
}

impl GeometrySpec {
    pub fn to_geometry(&self) -> Result<SiteGeometry> {
        match self {
            GeometrySpec::Polygon {
                exterior,
                interiors,
            } => {
                let exterior = ring(exterior)?;
                let interiors = interiors
                    .iter()
                    .map(|hole| ring(hole))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SiteGeometry::Polygon(Polygon::new(exterior, interiors)))
            }
            GeometrySpec::Rectangle { min, max } => {
                let coords = [min[0], min[1], max[0], max[1]];
                if coords.iter().any(|v| !v.is_finite()) || max[0] <= min[0] || max[1] <= min[1] {
                    return Err(GradingError::validation("rectangle must have positive extent"));
                }
                Ok(SiteGeometry::rectangle(min[0], min[1], max[0], max[1]))
            }
            GeometrySpec::LineString { coordinates } => {
                let points: Vec<(f64, f64)> = coordinates.iter().map(|c| (c[0], c[1])).collect();
                SiteGeometry::line(&points)
            }
        }
    }
}

fn ring(points: &[[f64; 2]]) -> Result<LineString<f64>> {
    if points.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(GradingError::validation("polygon has non-finite coordinates"));
    }
    let mut distinct: Vec<(f64, f64)> = points.iter().map(|p| (p[0], p[1])).collect();
    if distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(GradingError::validation(
            "polygon ring needs at least 3 distinct vertices",
        ));
    }
    Ok(LineString::from(distinct))
}

/// A planar shape used for zone boundaries, pads and road corridors.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteGeometry {
    Polygon(Polygon<f64>),
    Line(LineString<f64>),
}

impl SiteGeometry {
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let exterior = LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
        ]);
        SiteGeometry::Polygon(Polygon::new(exterior, vec![]))
    }

    pub fn polygon(points: &[(f64, f64)]) -> Result<Self> {
        let coords: Vec<[f64; 2]> = points.iter().map(|(x, y)| [*x, *y]).collect();
        Ok(SiteGeometry::Polygon(Polygon::new(ring(&coords)?, vec![])))
    }

    pub fn line(points: &[(f64, f64)]) -> Result<Self> {
        if points.len() < 2 {
            return Err(GradingError::validation("line string needs at least 2 points"));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(GradingError::validation("line string has non-finite coordinates"));
        }
        Ok(SiteGeometry::Line(LineString::from(points.to_vec())))
    }

    pub fn is_line(&self) -> bool {
        matches!(self, SiteGeometry::Line(_))
    }

    pub fn bounding_box(&self) -> Option<Bounds> {
        let rect = match self {
            SiteGeometry::Polygon(polygon) => polygon.bounding_rect(),
            SiteGeometry::Line(line) => line.bounding_rect(),
        }?;
        Some(Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    pub fn centroid(&self) -> Option<SitePoint> {
        let point = match self {
            SiteGeometry::Polygon(polygon) => polygon.centroid(),
            SiteGeometry::Line(line) => line.centroid(),
        }?;
        Some(SitePoint::new(point.x(), point.y()))
    }

    /// Distance from a point to the shape; 0 inside a polygon.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        let point = Point::new(x, y);
        match self {
            SiteGeometry::Polygon(polygon) => point.euclidean_distance(polygon),
            SiteGeometry::Line(line) => point.euclidean_distance(line),
        }
    }

    /// Distance to the nearest polygon ring for points inside the polygon.
    pub fn depth_inside(&self, x: f64, y: f64) -> Option<f64> {
        let SiteGeometry::Polygon(polygon) = self else {
            return None;
        };
        let point = Point::new(x, y);
        if !polygon.contains(&point) {
            return None;
        }
        let exterior = point.euclidean_distance(polygon.exterior());
        Some(
            polygon
                .interiors()
                .iter()
                .map(|hole| point.euclidean_distance(hole))
                .fold(exterior, f64::min),
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            SiteGeometry::Polygon(polygon) => polygon.contains(&Coord { x, y }),
            SiteGeometry::Line(_) => false,
        }
    }

    /// Exterior (or line) vertices in order.
    pub fn coordinates(&self) -> Vec<SitePoint> {
        let line = match self {
            SiteGeometry::Polygon(polygon) => polygon.exterior(),
            SiteGeometry::Line(line) => line,
        };
        line.coords().map(|c| SitePoint::new(c.x, c.y)).collect()
    }
}

/// One grid cell touched by a footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellCoverage {
    pub row: usize,
    pub col: usize,
    /// Signed distance from the cell center to the core footprint edge:
    /// `<= 0` inside the core, `> 0` in the apron.
    pub edge_distance: f64,
    /// Distance of the cell center from the footprint axis. For lines this is
    /// the distance to the line; for polygons it is the deepest interior depth
    /// minus this cell's depth (0 on the spine, growing toward the edge).
    pub lateral_offset: f64,
}

/// Geometry rasterization capability.
pub trait FootprintRasterizer: Send + Sync {
    /// Cells whose centers lie within the core footprint (the shape buffered
    /// by `core_buffer`) or within `apron_width` outside it.
    fn coverage(
        &self,
        geometry: &SiteGeometry,
        grid: &ElevationGrid,
        core_buffer: f64,
        apron_width: f64,
    ) -> Vec<CellCoverage>;

    /// Boolean mask of the footprint at the grid's resolution. Lines are
    /// buffered by half a cell so they mark the cells they cross.
    fn mask(&self, geometry: &SiteGeometry, grid: &ElevationGrid) -> Vec<bool> {
        let (cell_w, cell_h) = grid.cell_size();
        let buffer = if geometry.is_line() {
            cell_w.max(cell_h) / 2.0
        } else {
            0.0
        };
        let mut mask = vec![false; grid.rows() * grid.cols()];
        for cell in self.coverage(geometry, grid, buffer, 0.0) {
            if cell.edge_distance <= 0.0 {
                mask[grid.index(cell.row, cell.col)] = true;
            }
        }
        mask
    }
}

/// Standard rasterizer backed by the `geo` crate's distance predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoRasterizer;

impl FootprintRasterizer for GeoRasterizer {
    fn coverage(
        &self,
        geometry: &SiteGeometry,
        grid: &ElevationGrid,
        core_buffer: f64,
        apron_width: f64,
    ) -> Vec<CellCoverage> {
        let Some(bbox) = geometry.bounding_box() else {
            return Vec::new();
        };
        let reach = core_buffer.max(0.0) + apron_width.max(0.0);
        let Some((row_range, col_range)) = cell_window(grid, &bbox, reach) else {
            return Vec::new();
        };

        let mut cells = Vec::new();
        let mut max_depth: f64 = 0.0;
        for row in row_range {
            for col in col_range.clone() {
                let (x, y) = grid.cell_center(row, col);
                let (signed, depth) = match geometry.depth_inside(x, y) {
                    Some(depth) => (-depth, Some(depth)),
                    None => (geometry.distance_to(x, y), None),
                };
                let edge_distance = signed - core_buffer;
                if edge_distance > apron_width {
                    continue;
                }
                let lateral = match (geometry, depth) {
                    (SiteGeometry::Line(_), _) => signed,
                    (_, Some(depth)) => {
                        max_depth = max_depth.max(depth);
                        depth
                    }
                    (_, None) => 0.0,
                };
                cells.push(CellCoverage {
                    row,
                    col,
                    edge_distance,
                    lateral_offset: lateral,
                });
            }
        }

        if let SiteGeometry::Polygon(_) = geometry {
            // Convert interior depth into an offset from the spine.
            for cell in &mut cells {
                cell.lateral_offset = if cell.edge_distance <= -core_buffer {
                    max_depth - cell.lateral_offset
                } else {
                    max_depth
                };
            }
        }
        cells
    }
}

/// Inclusive row/column ranges of cells whose centers may fall in `bbox` grown by `reach`.
fn cell_window(
    grid: &ElevationGrid,
    bbox: &Bounds,
    reach: f64,
) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let transform = grid.effective_transform();
    let corners = [
        (bbox.min_x - reach, bbox.min_y - reach),
        (bbox.max_x + reach, bbox.min_y - reach),
        (bbox.min_x - reach, bbox.max_y + reach),
        (bbox.max_x + reach, bbox.max_y + reach),
    ];
    let mut min_col = f64::INFINITY;
    let mut max_col = f64::NEG_INFINITY;
    let mut min_row = f64::INFINITY;
    let mut max_row = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (col, row) = transform.invert(x, y)?;
        min_col = min_col.min(col);
        max_col = max_col.max(col);
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    }
    if !(min_col.is_finite() && max_col.is_finite() && min_row.is_finite() && max_row.is_finite())
    {
        return None;
    }
    let col_start = (min_col.floor() - 1.0).max(0.0) as usize;
    let row_start = (min_row.floor() - 1.0).max(0.0) as usize;
    let col_end = ((max_col.ceil() + 1.0).max(0.0) as usize).min(grid.cols());
    let row_end = ((max_row.ceil() + 1.0).max(0.0) as usize).min(grid.rows());
    if col_start >= col_end || row_start >= row_end {
        return None;
    }
    Some((row_start..row_end, col_start..col_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validation_rejects_degenerate_shapes() {
        let triangle = GeometrySpec::Polygon {
            exterior: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]],
            interiors: vec![],
        };
        assert!(matches!(triangle.to_geometry(), Err(GradingError::Validation(_))));

        let line = GeometrySpec::LineString {
            coordinates: vec![[0.0, 0.0]],
        };
        assert!(line.to_geometry().is_err());

        let rect = GeometrySpec::Rectangle {
            min: [5.0, 5.0],
            max: [5.0, 9.0],
        };
        assert!(rect.to_geometry().is_err());
    }

    #[test]
    fn geometry_spec_parses_tagged_json() {
        let spec: GeometrySpec = serde_json::from_str(
            r#"{"type":"rectangle","min":[0.0,0.0],"max":[10.0,5.0]}"#,
        )
        .unwrap();
        let geometry = spec.to_geometry().unwrap();
        let bbox = geometry.bounding_box().unwrap();
        assert_eq!((bbox.max_x, bbox.max_y), (10.0, 5.0));
    }

    #[test]
    fn mask_marks_cells_with_centers_inside_polygon() {
        let grid = ElevationGrid::filled(10, 10, 0.0, 1.0).unwrap();
        let geometry = SiteGeometry::rectangle(2.0, 2.0, 6.0, 5.0);
        let mask = GeoRasterizer.mask(&geometry, &grid);
        assert_eq!(mask.iter().filter(|m| **m).count(), 12);
        // Row 5 has center y = 4.5, column 2 has center x = 2.5.
        assert!(mask[grid.index(5, 2)]);
        assert!(!mask[grid.index(5, 6)]);
    }

    #[test]
    fn coverage_reports_apron_distance_outside_core() {
        let grid = ElevationGrid::filled(20, 20, 0.0, 1.0).unwrap();
        let geometry = SiteGeometry::rectangle(8.0, 8.0, 12.0, 12.0);
        let cells = GeoRasterizer.coverage(&geometry, &grid, 0.0, 3.0);
        let core = cells.iter().filter(|c| c.edge_distance <= 0.0).count();
        assert_eq!(core, 16);
        assert!(cells.iter().all(|c| c.edge_distance <= 3.0));
        let apron = cells
            .iter()
            .find(|c| grid.cell_center(c.row, c.col) == (13.5, 10.5))
            .expect("apron cell");
        assert!((apron.edge_distance - 1.5).abs() < 1e-9);
    }

    #[test]
    fn line_coverage_uses_distance_from_axis() {
        let grid = ElevationGrid::filled(10, 20, 0.0, 1.0).unwrap();
        let geometry = SiteGeometry::line(&[(0.0, 5.0), (20.0, 5.0)]).unwrap();
        let cells = GeoRasterizer.coverage(&geometry, &grid, 2.0, 0.0);
        // Centers at y = 3.5, 4.5, 5.5, 6.5 are within 2 units of the axis.
        assert_eq!(cells.len(), 4 * 20);
        assert!(cells.iter().all(|c| c.lateral_offset <= 1.5 + 1e-9));
    }
}
