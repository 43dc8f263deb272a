//! R-tree over stops for nearby-stop queries.
//!
//! ## Two-Stage Filtering
//!
//! [`StopIndex::stops_near`] filters in two stages:
//! 1. **R-tree filter**: a Euclidean search in degrees, with a radius wide
//!    enough to cover the requested meters at the query latitude
//! 2. **Haversine filter**: exact geodesic distance on the candidates
//!
//! Euclidean distance in degrees is distorted away from the equator, so the
//! first stage only narrows the search and never decides the result.

use geo::Point;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::feed::Feed;
use crate::models::records::Stop;
use crate::spatial::queries::{haversine_distance, meters_to_degrees};

// ============================================================================
// Stop Spatial Node
// ============================================================================

#[derive(Clone, Debug)]
pub struct StopNode {
    pub stop: Stop,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(stop: Stop) -> Self {
        let point = [stop.stop_lon, stop.stop_lat];
        Self { stop, point }
    }

    pub fn location(&self) -> Point {
        Point::new(self.point[0], self.point[1])
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ============================================================================
// Stop Index
// ============================================================================

/// Spatial index over a snapshot of a feed's stops.
#[derive(Clone, Debug, Default)]
pub struct StopIndex {
    tree: RTree<StopNode>,
}

impl StopIndex {
    pub fn new(stops: &[Stop]) -> Self {
        Self {
            tree: RTree::bulk_load(stops.iter().cloned().map(StopNode::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Stops within `radius_m` meters of `point`, nearest first.
    pub fn stops_near(&self, point: Point, radius_m: f64) -> Vec<&Stop> {
        // Validate radius is positive
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }

        self.ranked_within(point, radius_m)
            .into_iter()
            .map(|(_, stop)| stop)
            .collect()
    }

    /// The `n` stops closest to `point` by haversine distance.
    ///
    /// The R-tree's nearest neighbors in degrees only bound the search: the
    /// farthest of them sets a radius, and everything inside it is re-ranked.
    pub fn nearest_stops(&self, point: Point, n: usize) -> Vec<&Stop> {
        let reach = self
            .tree
            .nearest_neighbor_iter(&[point.x(), point.y()])
            .take(n)
            .map(|node| haversine_distance(point, node.location()))
            .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))));
        let Some(reach) = reach else {
            return Vec::new();
        };

        let mut ranked = self.ranked_within(point, reach);
        ranked.truncate(n);
        ranked.into_iter().map(|(_, stop)| stop).collect()
    }

    /// Stops within `radius_m` with their distances, nearest first.
    fn ranked_within(&self, point: Point, radius_m: f64) -> Vec<(f64, &Stop)> {
        let radius_deg = meters_to_degrees(radius_m, point.y());
        let mut found: Vec<(f64, &Stop)> = self
            .tree
            .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
            .map(|node| (haversine_distance(point, node.location()), &node.stop))
            .filter(|(dist, _)| *dist <= radius_m)
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found
    }
}

impl Feed {
    /// Index the feed's current stops. Later edits to the feed are not seen.
    pub fn stop_index(&self) -> StopIndex {
        StopIndex::new(self.stops.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::StopId;
    use crate::spatial::queries::EARTH_RADIUS;
    use crate::testing::{sample_feed, stop};

    fn ids(stops: Vec<&Stop>) -> Vec<StopId> {
        stops.into_iter().map(|s| s.stop_id.clone()).collect()
    }

    #[test]
    fn test_empty_index() {
        let index = StopIndex::default();
        assert!(index.is_empty());
        assert!(index.stops_near(Point::new(140.7, 41.7), 1000.0).is_empty());
        assert!(index.nearest_stops(Point::new(140.7, 41.7), 3).is_empty());
    }

    #[test]
    fn test_stops_near() {
        let index = sample_feed().stop_index();
        assert_eq!(index.len(), 4);

        // Just north of 十字街; s1 is about 1.3 km away, s3 about 1 km
        let near_jujigai = Point::new(140.7138, 41.7650);
        assert_eq!(ids(index.stops_near(near_jujigai, 200.0)), vec![StopId::new("s2")]);

        let found = ids(index.stops_near(near_jujigai, 5000.0));
        assert_eq!(found.len(), 4);
        assert_eq!(found[0], StopId::new("s2"));

        assert!(index.stops_near(near_jujigai, 0.0).is_empty());
        assert!(index.stops_near(near_jujigai, f64::NAN).is_empty());
    }

    #[test]
    fn test_stops_near_covers_longitude() {
        let index = sample_feed().stop_index();
        // 800 m due east of 谷地頭; east-west degrees are short at this latitude
        let east = Point::new(140.7168 + 800.0 / 83_000.0, 41.7561);
        assert_eq!(ids(index.stops_near(east, 1000.0)), vec![StopId::new("s3")]);
    }

    /// A point `meters` from `origin` along a bearing of 0 (north) or 90 (east).
    fn offset(origin: Point, meters: f64, east: bool) -> (f64, f64) {
        let angle = meters / EARTH_RADIUS;
        if east {
            // Solve the haversine formula for the longitude difference
            let lat = origin.y().to_radians();
            let h = (angle / 2.0).sin() / lat.cos();
            let dlon = 2.0 * h.asin();
            (origin.y(), origin.x() + dlon.to_degrees())
        } else {
            (origin.y() + angle.to_degrees(), origin.x())
        }
    }

    #[test]
    fn test_stops_near_at_radius_edge() {
        let origin = Point::new(140.7168, 41.7561);
        let index = StopIndex::new(&[stop("e", "東", offset(origin, 999.5, true), Some("z1"), None)]);

        let found = index.stops_near(origin, 1000.0);
        assert_eq!(ids(found), vec![StopId::new("e")]);
        assert!(index.stops_near(origin, 999.0).is_empty());
    }

    #[test]
    fn test_nearest_stops_uses_meters() {
        // 1 km east spans more degrees than 1.1 km north at this latitude
        let origin = Point::new(140.7168, 41.7561);
        let index = StopIndex::new(&[
            stop("east", "東", offset(origin, 1000.0, true), Some("z1"), None),
            stop("north", "北", offset(origin, 1100.0, false), Some("z1"), None),
        ]);

        assert_eq!(ids(index.nearest_stops(origin, 1)), vec![StopId::new("east")]);
        assert_eq!(
            ids(index.nearest_stops(origin, 5)),
            vec![StopId::new("east"), StopId::new("north")]
        );
        assert!(index.nearest_stops(origin, 0).is_empty());
    }

    #[test]
    fn test_nearest_stops() {
        let index = sample_feed().stop_index();
        let at_yachigashira = Point::new(140.7168, 41.7561);
        assert_eq!(ids(index.nearest_stops(at_yachigashira, 2)), vec![StopId::new("s3"), StopId::new("s2")]);
    }
}
