//! Geodesic math over lat/lon points and polylines.
//!
//! Uses the Haversine formula for distances on Earth's surface. Polyline
//! helpers work on vertex indices so callers can slice shapes without
//! re-deriving positions.

use geo::{HaversineBearing, HaversineDestination, HaversineDistance, LineString, Point};

/// Haversine distance between two points, in meters.
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Initial great-circle bearing from `from` to `to`, in degrees [0, 360).
pub fn bearing(from: Point, to: Point) -> f64 {
    let deg = from.haversine_bearing(to);
    (deg % 360.0 + 360.0) % 360.0
}

/// Move `from` toward `to` along the great circle by up to `meters`,
/// never overshooting the target.
pub fn move_towards(from: Point, to: Point, meters: f64) -> Point {
    let total = haversine_distance(from, to);
    if meters <= 0.0 || total == 0.0 {
        return from;
    }
    if meters >= total {
        return to;
    }
    from.haversine_destination(from.haversine_bearing(to), meters)
}

/// Index of the polyline vertex nearest to `point` by Haversine distance.
/// Returns `None` for an empty polyline.
pub fn nearest_vertex_index(shape: &LineString, point: Point) -> Option<usize> {
    shape
        .points()
        .enumerate()
        .map(|(i, v)| (i, haversine_distance(v, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Running Haversine distance from the first vertex to each vertex, in
/// meters. Entry 0 is always 0; an empty polyline yields an empty vec.
pub fn cumulative_distances(shape: &LineString) -> Vec<f64> {
    let mut out = Vec::with_capacity(shape.0.len());
    let mut total = 0.0;
    let mut prev: Option<Point> = None;
    for vertex in shape.points() {
        if let Some(p) = prev {
            total += haversine_distance(p, vertex);
        }
        out.push(total);
        prev = Some(vertex);
    }
    out
}

/// Convert meters to degrees at the equator (for bounding box queries)
pub fn meters_to_degrees_approx(meters: f64) -> f64 {
    meters / 111_320.0
}
