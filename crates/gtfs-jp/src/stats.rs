//! Per-trip indicators.

use std::collections::{BTreeMap, HashMap, HashSet};

use geo::LineString;
use log::debug;
use serde::Serialize;

use crate::feed::Feed;
use crate::identifiers::{RouteId, ShapeId, StopId, TripId};
use crate::models::records::StopTime;
use crate::models::types::GtfsTime;
use crate::schema::DistUnits;
use crate::spatial::queries::cumulative_distances;

/// Indicators for one trip, as returned by [`Feed::compute_trip_stats`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripStats {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub route_short_name: Option<String>,
    pub route_type: Option<u16>,
    pub direction_id: Option<u8>,
    pub shape_id: Option<ShapeId>,
    pub num_stops: usize,
    /// Departure from the first stop.
    pub start_time: Option<GtfsTime>,
    /// Arrival at the last stop.
    pub end_time: Option<GtfsTime>,
    pub start_stop_id: Option<StopId>,
    pub end_stop_id: Option<StopId>,
    /// The trip ends where it started.
    pub is_loop: bool,
    pub duration_secs: Option<u32>,
    /// Length of the trip in the feed's distance units.
    pub distance: Option<f64>,
    /// Distance units per hour.
    pub speed: Option<f64>,
}

impl Feed {
    /// Stop times grouped by trip, each group in `stop_sequence` order.
    pub(crate) fn stop_times_by_trip(&self) -> HashMap<&TripId, Vec<&StopTime>> {
        let mut by_trip: HashMap<&TripId, Vec<&StopTime>> = HashMap::new();
        for st in self.stop_times.iter().flatten() {
            by_trip.entry(&st.trip_id).or_default().push(st);
        }
        for rows in by_trip.values_mut() {
            rows.sort_by_key(|st| st.stop_sequence);
        }
        by_trip
    }

    /// Stats for the listed trips, or for every trip, sorted by route, direction
    /// and start time.
    ///
    /// The distance is the span of `shape_dist_traveled` when the stop times
    /// carry it, else the length of the trip's shape, else the straight-line
    /// path through its stops.
    pub fn compute_trip_stats(&self, trip_ids: Option<&[TripId]>) -> Vec<TripStats> {
        let wanted: Option<HashSet<&TripId>> = trip_ids.map(|ids| ids.iter().collect());
        let units = self.dist_units();
        let by_trip = self.stop_times_by_trip();
        let routes: HashMap<&RouteId, _> = self.routes.iter().flatten().map(|r| (&r.route_id, r)).collect();
        let stops = self.build_geometry_by_stop();
        let shapes: BTreeMap<ShapeId, LineString> = self.build_geometry_by_shape();

        let shape_length = |id: &ShapeId| {
            shapes
                .get(id)
                .filter(|line| line.0.len() >= 2)
                .and_then(|line| cumulative_distances(line).last().copied())
        };

        let mut stats: Vec<TripStats> = self
            .trips
            .iter()
            .flatten()
            .filter(|t| wanted.as_ref().map_or(true, |w| w.contains(&t.trip_id)))
            .map(|trip| {
                let rows = by_trip.get(&trip.trip_id).map(Vec::as_slice).unwrap_or_default();
                let first = rows.first();
                let last = rows.last();
                let route = routes.get(&trip.route_id);

                let start_time = first.and_then(|st| st.departure_time.or(st.arrival_time));
                let end_time = last.and_then(|st| st.arrival_time.or(st.departure_time));
                let duration_secs = start_time
                    .zip(end_time)
                    .and_then(|(s, e)| e.seconds().checked_sub(s.seconds()));

                let measured = {
                    let dists: Vec<f64> = rows.iter().filter_map(|st| st.shape_dist_traveled).collect();
                    match (dists.first(), dists.last()) {
                        (Some(a), Some(b)) if dists.len() >= 2 => Some(b - a),
                        _ => None,
                    }
                };
                let distance = measured.or_else(|| {
                    let meters = trip.shape_id.as_ref().and_then(shape_length).or_else(|| {
                        let line: LineString = rows.iter().filter_map(|st| stops.get(&st.stop_id).copied()).collect();
                        (line.0.len() >= 2)
                            .then(|| cumulative_distances(&line).last().copied())
                            .flatten()
                    })?;
                    Some(DistUnits::M.convert(meters, units))
                });

                let speed = distance
                    .zip(duration_secs)
                    .filter(|(_, secs)| *secs > 0)
                    .map(|(d, secs)| d / (f64::from(secs) / 3600.0));

                let start_stop_id = first.map(|st| st.stop_id.clone());
                let end_stop_id = last.map(|st| st.stop_id.clone());

                TripStats {
                    trip_id: trip.trip_id.clone(),
                    route_id: trip.route_id.clone(),
                    route_short_name: route.and_then(|r| r.route_short_name.clone()),
                    route_type: route.map(|r| r.route_type),
                    direction_id: trip.direction_id,
                    shape_id: trip.shape_id.clone(),
                    num_stops: rows.len(),
                    start_time,
                    end_time,
                    is_loop: rows.len() > 1 && start_stop_id == end_stop_id,
                    start_stop_id,
                    end_stop_id,
                    duration_secs,
                    distance,
                    speed,
                }
            })
            .collect();

        stats.sort_by(|a, b| {
            (&a.route_id, a.direction_id, a.start_time, &a.trip_id)
                .cmp(&(&b.route_id, b.direction_id, b.start_time, &b.trip_id))
        });
        debug!("Computed stats for {} trips", stats.len());
        stats
    }
}
