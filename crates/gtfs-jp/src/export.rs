//! GeoJSON export of stops, shapes, routes and stop times.

use std::collections::{BTreeSet, HashMap, HashSet};

use geo::{LineString, MultiLineString, Point};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};
use log::debug;
use serde::Serialize;

use crate::feed::Feed;
use crate::identifiers::{RouteId, ShapeId, StopId, TripId};
use crate::models::types::{FeedError, Result};

fn point_to_geojson(point: Point) -> Value {
    Value::Point(vec![point.x(), point.y()])
}

fn line_to_geojson(line: &LineString) -> Value {
    Value::LineString(line.0.iter().map(|c| vec![c.x, c.y]).collect())
}

fn multi_line_to_geojson(lines: &MultiLineString) -> Value {
    Value::MultiLineString(
        lines
            .0
            .iter()
            .map(|line| line.0.iter().map(|c| vec![c.x, c.y]).collect())
            .collect(),
    )
}

/// Serialize a record into GeoJSON properties.
fn properties<T: Serialize>(row: &T) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(row) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(FeedError::InvalidData(format!(
            "Expected a record to serialize as an object, got {}",
            other
        ))),
        Err(e) => Err(FeedError::InvalidData(e.to_string())),
    }
}

fn feature(id: &str, value: Value, properties: serde_json::Map<String, serde_json::Value>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

impl Feed {
    /// One Point feature per stop, carrying every stops.txt column as a
    /// property. Only the listed stops when `stop_ids` is given.
    pub fn stops_to_geojson(&self, stop_ids: Option<&[StopId]>) -> Result<FeatureCollection> {
        let wanted: Option<HashSet<&StopId>> = stop_ids.map(|ids| ids.iter().collect());

        let features = self
            .stops
            .iter()
            .flatten()
            .filter(|s| wanted.as_ref().map_or(true, |w| w.contains(&s.stop_id)))
            .map(|s| Ok(feature(s.stop_id.as_str(), point_to_geojson(s.point()), properties(s)?)))
            .collect::<Result<Vec<_>>>()?;

        debug!("Exported {} stops", features.len());
        Ok(collection(features))
    }

    /// One LineString feature per shape, with `shape_id` as its only property.
    /// Only the listed shapes when `shape_ids` is given.
    pub fn shapes_to_geojson(&self, shape_ids: Option<&[ShapeId]>) -> FeatureCollection {
        let wanted: Option<HashSet<&ShapeId>> = shape_ids.map(|ids| ids.iter().collect());

        let features: Vec<Feature> = self
            .build_geometry_by_shape()
            .iter()
            .filter(|(id, _)| wanted.as_ref().map_or(true, |w| w.contains(id)))
            .map(|(id, line)| {
                let mut props = serde_json::Map::new();
                props.insert("shape_id".to_string(), serde_json::json!(id.as_str()));
                feature(id.as_str(), line_to_geojson(line), props)
            })
            .collect();

        debug!("Exported {} shapes", features.len());
        collection(features)
    }

    /// One MultiLineString feature per route, carrying every routes.txt column
    /// as a property. The lines are the shapes of the route's trips; trips
    /// without a shape contribute the straight path through their stops.
    /// Routes with no geometry at all are left out.
    pub fn routes_to_geojson(&self, route_ids: Option<&[RouteId]>) -> Result<FeatureCollection> {
        let wanted: Option<HashSet<&RouteId>> = route_ids.map(|ids| ids.iter().collect());
        let shapes = self.build_geometry_by_shape();
        let stops = self.build_geometry_by_stop();
        let by_trip = self.stop_times_by_trip();

        let mut shape_ids: HashMap<&RouteId, BTreeSet<&ShapeId>> = HashMap::new();
        let mut stop_paths: HashMap<&RouteId, BTreeSet<Vec<&StopId>>> = HashMap::new();
        for trip in self.trips.iter().flatten() {
            match &trip.shape_id {
                Some(shape_id) if shapes.contains_key(shape_id) => {
                    shape_ids.entry(&trip.route_id).or_default().insert(shape_id);
                }
                _ => {
                    let path: Vec<&StopId> = by_trip
                        .get(&trip.trip_id)
                        .into_iter()
                        .flatten()
                        .map(|st| &st.stop_id)
                        .filter(|id| stops.contains_key(*id))
                        .collect();
                    if path.len() >= 2 {
                        stop_paths.entry(&trip.route_id).or_default().insert(path);
                    }
                }
            }
        }

        let mut features = Vec::new();
        for route in self.routes.iter().flatten() {
            if wanted.as_ref().is_some_and(|w| !w.contains(&route.route_id)) {
                continue;
            }
            let mut lines: Vec<LineString> = shape_ids
                .get(&route.route_id)
                .into_iter()
                .flatten()
                .filter_map(|id| shapes.get(*id).cloned())
                .collect();
            lines.extend(stop_paths.get(&route.route_id).into_iter().flatten().map(|path| {
                path.iter().filter_map(|id| stops.get(*id).copied()).collect::<LineString>()
            }));

            if lines.is_empty() {
                debug!("Route {} has no geometry", route.route_id);
                continue;
            }
            features.push(feature(
                route.route_id.as_str(),
                multi_line_to_geojson(&MultiLineString::new(lines)),
                properties(route)?,
            ));
        }

        debug!("Exported {} routes", features.len());
        Ok(collection(features))
    }

    /// One Point feature per stop time, at its stop, carrying every
    /// stop_times.txt column and the stop's name. Only the listed trips when
    /// `trip_ids` is given. Stop times at unknown stops are left out.
    pub fn stop_times_to_geojson(&self, trip_ids: Option<&[TripId]>) -> Result<FeatureCollection> {
        let wanted: Option<HashSet<&TripId>> = trip_ids.map(|ids| ids.iter().collect());
        let stops: HashMap<&StopId, _> = self.stops.iter().flatten().map(|s| (&s.stop_id, s)).collect();

        let mut by_trip: Vec<_> = self
            .stop_times_by_trip()
            .into_iter()
            .filter(|(trip_id, _)| wanted.as_ref().map_or(true, |w| w.contains(trip_id)))
            .collect();
        by_trip.sort_by(|a, b| a.0.cmp(b.0));

        let mut features = Vec::new();
        for (trip_id, stop_times) in by_trip {
            for st in stop_times {
                let Some(stop) = stops.get(&st.stop_id) else {
                    continue;
                };
                let mut props = properties(st)?;
                props.insert("stop_name".to_string(), serde_json::json!(stop.stop_name));
                let id = format!("{}-{}", trip_id, st.stop_sequence);
                features.push(feature(&id, point_to_geojson(stop.point()), props));
            }
        }

        debug!("Exported {} stop times", features.len());
        Ok(collection(features))
    }
}
