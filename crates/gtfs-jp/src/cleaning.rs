//! Removing rows nothing refers to.

use std::collections::HashSet;

use log::info;

use crate::feed::Feed;
use crate::identifiers::*;

fn retain<T>(table: &mut Option<Vec<T>>, keep: impl Fn(&T) -> bool) -> usize {
    let Some(rows) = table.as_mut() else {
        return 0;
    };
    let before = rows.len();
    rows.retain(|r| keep(r));
    before - rows.len()
}

impl Feed {
    /// Drop trips without stop times, then the stops, shapes, routes and
    /// services no remaining trip uses.
    ///
    /// Stations stay while one of their stops does. Stop times, frequencies
    /// and transfers pointing at dropped rows go too, as do fare rules naming
    /// a dropped route.
    pub fn drop_zombies(&mut self) {
        let timed: HashSet<TripId> = self.stop_times.iter().flatten().map(|st| st.trip_id.clone()).collect();
        let trips = retain(&mut self.trips, |t| timed.contains(&t.trip_id));

        let trip_ids: HashSet<TripId> = self.trips.iter().flatten().map(|t| t.trip_id.clone()).collect();
        retain(&mut self.stop_times, |st| trip_ids.contains(&st.trip_id));
        retain(&mut self.frequencies, |f| trip_ids.contains(&f.trip_id));

        let mut used_stops: HashSet<StopId> =
            self.stop_times.iter().flatten().map(|st| st.stop_id.clone()).collect();
        let parents: Vec<StopId> = self
            .stops
            .iter()
            .flatten()
            .filter(|s| used_stops.contains(&s.stop_id))
            .filter_map(|s| s.parent_station.clone())
            .collect();
        used_stops.extend(parents);
        let stops = retain(&mut self.stops, |s| used_stops.contains(&s.stop_id));
        retain(&mut self.transfers, |t| {
            used_stops.contains(&t.from_stop_id) && used_stops.contains(&t.to_stop_id)
        });

        let used_shapes: HashSet<ShapeId> = self.trips.iter().flatten().filter_map(|t| t.shape_id.clone()).collect();
        let shape_points = retain(&mut self.shapes, |s| used_shapes.contains(&s.shape_id));

        let used_routes: HashSet<RouteId> = self.trips.iter().flatten().map(|t| t.route_id.clone()).collect();
        let routes = retain(&mut self.routes, |r| used_routes.contains(&r.route_id));
        retain(&mut self.fare_rules, |f| f.route_id.as_ref().map_or(true, |r| used_routes.contains(r)));

        let used_services: HashSet<ServiceId> =
            self.trips.iter().flatten().map(|t| t.service_id.clone()).collect();
        let services = retain(&mut self.calendar, |c| used_services.contains(&c.service_id));
        retain(&mut self.calendar_dates, |c| used_services.contains(&c.service_id));

        info!(
            "Dropped {} trips, {} stops, {} shape points, {} routes, {} services",
            trips, stops, shape_points, routes, services
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_feed, stop};

    #[test]
    fn test_clean_feed_is_unchanged() {
        let original = sample_feed();
        let mut feed = original.clone();
        feed.drop_zombies();
        assert_eq!(feed, original);
    }

    #[test]
    fn test_drop_zombies() {
        let mut feed = sample_feed();
        // t3 loses its stop times, leaving r2 and its frequency unused
        feed.stop_times.as_mut().unwrap().retain(|st| st.trip_id.as_str() != "t3");
        feed.stops.as_mut().unwrap().push(stop("s4", "宝来町", (41.7600, 140.7150), Some("z2"), None));

        feed.drop_zombies();

        let trips: Vec<&str> = feed.trips.iter().flatten().map(|t| t.trip_id.as_str()).collect();
        assert_eq!(trips, vec!["t1", "t2"]);
        let routes: Vec<&str> = feed.routes.iter().flatten().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["r1"]);
        assert_eq!(feed.frequencies, Some(vec![]));

        // s4 is unused; the station st1 stays with its stop s1
        let stops: Vec<&str> = feed.stops.iter().flatten().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(stops, vec!["s1", "s2", "s3", "st1"]);

        // Both services still run r1 trips
        assert_eq!(feed.calendar.as_ref().unwrap().len(), 2);
        assert_eq!(feed.fare_rules.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_drop_zombies_without_stop_times() {
        let mut feed = sample_feed();
        feed.stop_times = None;
        feed.drop_zombies();

        assert_eq!(feed.trips, Some(vec![]));
        assert_eq!(feed.stops, Some(vec![]));
        assert_eq!(feed.shapes, Some(vec![]));
        assert_eq!(feed.calendar, Some(vec![]));
        assert!(feed.stop_times.is_none());
        assert_eq!(feed.agency.as_ref().map(Vec::len), Some(1));
    }
}
