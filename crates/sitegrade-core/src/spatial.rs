//! Spatial math shared by the grading and routing modules.
//!
//! Planar helpers work in the grid's ground units. Geographic helpers take
//! decimal degrees and return meters.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Straight-line distance in the plane.
pub fn planar_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// Compass heading from the first point to the second, in degrees.
/// 0 = +y (north), 90 = +x (east). Returns `None` for coincident points.
pub fn compass_heading_deg(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<f64> {
    let dx = x2 - x1;
    let dy = y2 - y1;
    if dx.abs() <= f64::EPSILON && dy.abs() <= f64::EPSILON {
        return None;
    }
    Some(dx.atan2(dy).to_degrees().rem_euclid(360.0))
}

/// Absolute change of heading between two compass headings, in `[0, 180]`.
pub fn heading_change_deg(from_deg: f64, to_deg: f64) -> f64 {
    let delta = (to_deg - from_deg).rem_euclid(360.0);
    if delta > 180.0 {
        360.0 - delta
    } else {
        delta
    }
}

/// Minimum distance from a point to a line segment, plus the projection
/// parameter `t` in `[0, 1]` of the closest point along the segment.
pub fn distance_to_segment(
    px: f64,
    py: f64,
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
) -> (f64, f64) {
    let sx = bx - ax;
    let sy = by - ay;
    let seg_len_sq = sx * sx + sy * sy;

    if seg_len_sq < 1e-12 {
        // Segment is essentially a point
        return (planar_distance(px, py, ax, ay), 0.0);
    }

    // Project point onto segment line: t = ((P-A) · (B-A)) / |B-A|²
    let t = (((px - ax) * sx + (py - ay) * sy) / seg_len_sq).clamp(0.0, 1.0);
    let closest_x = ax + t * sx;
    let closest_y = ay + t * sy;
    (planar_distance(px, py, closest_x, closest_y), t)
}
