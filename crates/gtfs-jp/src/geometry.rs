//! Stop and shape geometries, and distances along them.
//!
//! Coordinates are WGS84 with `x = lon` and `y = lat`. Distances written back
//! to the feed are in [`Feed::dist_units`].

use std::collections::{BTreeMap, HashMap};

use geo::{BoundingRect, Centroid, LineLocatePoint, LineString, MultiPoint, Point, Rect};
use log::debug;

use crate::feed::Feed;
use crate::identifiers::{ShapeId, StopId, TripId};
use crate::schema::DistUnits;
use crate::spatial::queries::{cumulative_distances, haversine_distance};

impl Feed {
    /// Point geometry of every stop.
    pub fn build_geometry_by_stop(&self) -> BTreeMap<StopId, Point> {
        self.stops
            .iter()
            .flatten()
            .map(|s| (s.stop_id.clone(), s.point()))
            .collect()
    }

    /// Line geometry of every shape, following `shape_pt_sequence`.
    pub fn build_geometry_by_shape(&self) -> BTreeMap<ShapeId, LineString> {
        let mut points: BTreeMap<ShapeId, Vec<(u32, Point)>> = BTreeMap::new();
        for row in self.shapes.iter().flatten() {
            points
                .entry(row.shape_id.clone())
                .or_default()
                .push((row.shape_pt_sequence, Point::new(row.shape_pt_lon, row.shape_pt_lat)));
        }

        points
            .into_iter()
            .map(|(id, mut pts)| {
                pts.sort_by_key(|(seq, _)| *seq);
                (id, pts.into_iter().map(|(_, p)| p).collect())
            })
            .collect()
    }

    fn stop_points(&self) -> Option<MultiPoint> {
        let points: Vec<Point> = self.stops.iter().flatten().map(|s| s.point()).collect();
        (!points.is_empty()).then(|| MultiPoint::new(points))
    }

    /// Bounding box of all stops.
    pub fn compute_bounds(&self) -> Option<Rect> {
        self.stop_points()?.bounding_rect()
    }

    /// Centroid of all stops.
    pub fn compute_centroid(&self) -> Option<Point> {
        self.stop_points()?.centroid()
    }

    /// Fill `shape_dist_traveled` in shapes with the distance along each shape
    /// from its first point.
    pub fn append_dist_to_shapes(&mut self) {
        let units = self.dist_units();
        let Some(shapes) = self.shapes.as_mut() else {
            return;
        };

        let mut by_shape: HashMap<ShapeId, Vec<usize>> = HashMap::new();
        for (i, row) in shapes.iter().enumerate() {
            by_shape.entry(row.shape_id.clone()).or_default().push(i);
        }

        for rows in by_shape.values_mut() {
            rows.sort_by_key(|&i| shapes[i].shape_pt_sequence);
            let line: LineString = rows
                .iter()
                .map(|&i| Point::new(shapes[i].shape_pt_lon, shapes[i].shape_pt_lat))
                .collect();
            for (&i, meters) in rows.iter().zip(cumulative_distances(&line)) {
                shapes[i].shape_dist_traveled = Some(DistUnits::M.convert(meters, units));
            }
        }
        debug!("Measured {} shapes", by_shape.len());
    }

    /// Fill `shape_dist_traveled` in stop_times with the distance travelled
    /// along each trip.
    ///
    /// Stops of a trip with a usable shape are projected onto it, and the
    /// projection is scaled to the shape's length. Other trips get the
    /// cumulative straight-line distance between consecutive stops. Either
    /// way the distances never decrease along a trip. Stop times whose stop
    /// has no location are left untouched.
    pub fn append_dist_to_stop_times(&mut self) {
        let units = self.dist_units();
        let stop_points = self.build_geometry_by_stop();
        let shape_lines = self.build_geometry_by_shape();
        let trip_shapes: HashMap<TripId, ShapeId> = self
            .trips
            .iter()
            .flatten()
            .filter_map(|t| Some((t.trip_id.clone(), t.shape_id.clone()?)))
            .collect();

        let Some(stop_times) = self.stop_times.as_mut() else {
            return;
        };

        let mut by_trip: HashMap<TripId, Vec<usize>> = HashMap::new();
        for (i, row) in stop_times.iter().enumerate() {
            by_trip.entry(row.trip_id.clone()).or_default().push(i);
        }

        for (trip_id, rows) in by_trip.iter_mut() {
            rows.sort_by_key(|&i| stop_times[i].stop_sequence);

            let shape = trip_shapes
                .get(trip_id)
                .and_then(|id| shape_lines.get(id))
                .filter(|line| line.0.len() >= 2)
                .map(|line| (line, cumulative_distances(line).last().copied().unwrap_or(0.0)));

            let mut travelled = 0.0_f64;
            let mut previous: Option<Point> = None;
            for &i in rows.iter() {
                let Some(&point) = stop_points.get(&stop_times[i].stop_id) else {
                    continue;
                };

                let meters = match shape {
                    Some((line, length)) => line
                        .line_locate_point(&point)
                        .map_or(travelled, |fraction| fraction * length),
                    None => travelled + previous.map_or(0.0, |p| haversine_distance(p, point)),
                };
                previous = Some(point);
                travelled = travelled.max(meters);

                stop_times[i].shape_dist_traveled = Some(DistUnits::M.convert(travelled, units));
            }
        }
        debug!("Measured stop times of {} trips", by_trip.len());
    }
}
