//! Distance helpers on the WGS84 sphere.
//!
//! Uses the Haversine formula, which is accurate to well under a percent at
//! the scale of a city's transit network.

use geo::{HaversineDistance, LineString, Point};

/// Mean Earth radius in meters, as used by geo's haversine.
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = EARTH_RADIUS * std::f64::consts::PI / 180.0;

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Distance in meters from the first point of `line` to each of its points.
pub fn cumulative_distances(line: &LineString) -> Vec<f64> {
    let mut total = 0.0;
    let mut previous: Option<Point> = None;
    line.points()
        .map(|p| {
            if let Some(prev) = previous {
                total += haversine_distance(prev, p);
            }
            previous = Some(p);
            total
        })
        .collect()
}

/// A radius in degrees covering at least `meters` in every direction around
/// `latitude`, for bounding-box searches.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    // Longitude degrees shrink towards the poles. Great circles bow away from
    // the parallel, so pad by 1% to keep points at exactly `meters` inside.
    let cos_lat = latitude.to_radians().cos().max(0.01);
    1.01 * meters / (METERS_PER_DEGREE * cos_lat)
}
