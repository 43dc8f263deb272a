//! Cutting a feed down to a set of routes, trips, agencies or dates.

use std::collections::HashSet;
use std::hash::Hash;

use chrono::NaiveDate;
use log::info;

use crate::feed::Feed;
use crate::identifiers::*;
use crate::models::records::Trip;

/// Rows of `table` satisfying `keep`. Absent tables stay absent.
fn filter_table<T: Clone>(table: &Option<Vec<T>>, keep: impl Fn(&T) -> bool) -> Option<Vec<T>> {
    table
        .as_ref()
        .map(|rows| rows.iter().filter(|r| keep(r)).cloned().collect())
}

fn collect_ids<'a, T: 'a, K: Clone + Eq + Hash + 'a>(
    rows: impl IntoIterator<Item = &'a T>,
    key: impl Fn(&'a T) -> Option<&'a K>,
) -> HashSet<K> {
    rows.into_iter().filter_map(key).cloned().collect()
}

impl Feed {
    /// A new feed holding only the given routes and everything they use.
    ///
    /// Kept: the routes' trips, stop times and frequencies; the stops those
    /// stop times visit and their parent stations; the shapes, services,
    /// offices and patterns of the kept trips; the routes' agencies; fare
    /// rules naming one of the routes and their fare attributes; transfers
    /// between kept stops. feed_info and translations are copied as is.
    pub fn restrict_to_routes(&self, route_ids: &[RouteId]) -> Feed {
        let routes: HashSet<&RouteId> = route_ids.iter().collect();
        self.restrict(&routes, |_| true)
    }

    /// A new feed holding only the given trips, their routes, and everything
    /// they use. Other trips of those routes are dropped.
    pub fn restrict_to_trips(&self, trip_ids: &[TripId]) -> Feed {
        let wanted: HashSet<&TripId> = trip_ids.iter().collect();
        let routes: HashSet<&RouteId> = self
            .trips
            .iter()
            .flatten()
            .filter(|t| wanted.contains(&t.trip_id))
            .map(|t| &t.route_id)
            .collect();
        self.restrict(&routes, |t| wanted.contains(&t.trip_id))
    }

    /// A new feed holding the trips running on at least one of `dates`.
    pub fn restrict_to_dates(&self, dates: &[NaiveDate]) -> Feed {
        let calendars = self.service_calendars();
        let active: HashSet<&ServiceId> = calendars
            .values()
            .filter(|c| dates.iter().any(|&d| c.runs_on(d)))
            .map(|c| &c.service_id)
            .collect();
        let trip_ids: Vec<TripId> = self
            .trips
            .iter()
            .flatten()
            .filter(|t| active.contains(&t.service_id))
            .map(|t| t.trip_id.clone())
            .collect();
        self.restrict_to_trips(&trip_ids)
    }

    /// A new feed holding the routes of the given agencies.
    pub fn restrict_to_agencies(&self, agency_ids: &[AgencyId]) -> Feed {
        let agencies: HashSet<&AgencyId> = agency_ids.iter().collect();
        let route_ids: Vec<RouteId> = self
            .routes
            .iter()
            .flatten()
            .filter(|r| agencies.contains(&r.agency_id))
            .map(|r| r.route_id.clone())
            .collect();
        self.restrict_to_routes(&route_ids)
    }

    fn restrict(&self, routes: &HashSet<&RouteId>, keep_trip: impl Fn(&Trip) -> bool) -> Feed {
        let mut feed = Feed::new(self.dist_units());

        feed.routes = filter_table(&self.routes, |r| routes.contains(&r.route_id));
        feed.trips = filter_table(&self.trips, |t| routes.contains(&t.route_id) && keep_trip(t));

        let trips = feed.trips.as_deref().unwrap_or_default();
        let trip_ids: HashSet<TripId> = collect_ids(trips, |t| Some(&t.trip_id));
        let shape_ids: HashSet<ShapeId> = collect_ids(trips, |t| t.shape_id.as_ref());
        let service_ids: HashSet<ServiceId> = collect_ids(trips, |t| Some(&t.service_id));
        let office_ids: HashSet<OfficeId> = collect_ids(trips, |t| t.jp_office_id.as_ref());
        let pattern_ids: HashSet<PatternId> = collect_ids(trips, |t| t.jp_pattern_id.as_ref());

        feed.stop_times = filter_table(&self.stop_times, |st| trip_ids.contains(&st.trip_id));
        feed.frequencies = filter_table(&self.frequencies, |f| trip_ids.contains(&f.trip_id));

        let mut stop_ids: HashSet<StopId> =
            collect_ids(feed.stop_times.iter().flatten(), |st| Some(&st.stop_id));
        let parents: HashSet<StopId> = collect_ids(
            self.stops.iter().flatten().filter(|s| stop_ids.contains(&s.stop_id)),
            |s| s.parent_station.as_ref(),
        );
        stop_ids.extend(parents);
        feed.stops = filter_table(&self.stops, |s| stop_ids.contains(&s.stop_id));

        feed.shapes = filter_table(&self.shapes, |s| shape_ids.contains(&s.shape_id));
        feed.calendar = filter_table(&self.calendar, |c| service_ids.contains(&c.service_id));
        feed.calendar_dates = filter_table(&self.calendar_dates, |c| service_ids.contains(&c.service_id));
        feed.office_jp = filter_table(&self.office_jp, |o| office_ids.contains(&o.office_id));
        feed.pattern_jp = filter_table(&self.pattern_jp, |p| pattern_ids.contains(&p.jp_pattern_id));

        let agency_ids: HashSet<AgencyId> =
            collect_ids(feed.routes.iter().flatten(), |r| Some(&r.agency_id));
        feed.agency = filter_table(&self.agency, |a| agency_ids.contains(&a.agency_id));
        feed.agency_jp = filter_table(&self.agency_jp, |a| agency_ids.contains(&a.agency_id));

        feed.fare_rules = filter_table(&self.fare_rules, |f| {
            f.route_id.as_ref().is_some_and(|r| routes.contains(r))
        });
        let fare_ids: HashSet<FareId> = collect_ids(feed.fare_rules.iter().flatten(), |f| Some(&f.fare_id));
        feed.fare_attributes = filter_table(&self.fare_attributes, |f| fare_ids.contains(&f.fare_id));

        feed.transfers = filter_table(&self.transfers, |t| {
            stop_ids.contains(&t.from_stop_id) && stop_ids.contains(&t.to_stop_id)
        });

        feed.feed_info = self.feed_info.clone();
        feed.translations = self.translations.clone();

        info!(
            "Restricted feed to {} routes, {} trips, {} stops",
            feed.routes.as_ref().map_or(0, Vec::len),
            trip_ids.len(),
            stop_ids.len()
        );
        feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableName;
    use crate::testing::{sample_feed, ymd};

    fn ids<T, K: Clone>(rows: &Option<Vec<T>>, key: impl Fn(&T) -> &K) -> Vec<K> {
        rows.iter().flatten().map(|r| key(r).clone()).collect()
    }

    #[test]
    fn test_restrict_to_single_route() {
        let feed = sample_feed().restrict_to_routes(&[RouteId::new("r2")]);

        assert_eq!(ids(&feed.routes, |r| &r.route_id), vec![RouteId::new("r2")]);
        assert_eq!(ids(&feed.trips, |t| &t.trip_id), vec![TripId::new("t3")]);
        assert_eq!(feed.stop_times.as_ref().unwrap().len(), 2);
        assert_eq!(feed.frequencies.as_ref().unwrap().len(), 1);

        // s1, s2 and s1's parent station
        assert_eq!(
            ids(&feed.stops, |s| &s.stop_id),
            vec![StopId::new("s1"), StopId::new("s2"), StopId::new("st1")]
        );
        assert_eq!(feed.transfers.as_ref().unwrap().len(), 1);

        // t3 has no shape and r2 has no fare rules
        assert_eq!(feed.shapes, Some(vec![]));
        assert_eq!(feed.fare_rules, Some(vec![]));
        assert_eq!(feed.fare_attributes, Some(vec![]));

        assert_eq!(ids(&feed.calendar, |c| &c.service_id), vec![ServiceId::new("weekday")]);
        assert_eq!(feed.calendar_dates.as_ref().unwrap().len(), 1);
        assert_eq!(feed.agency.as_ref().unwrap().len(), 1);
        assert_eq!(feed.office_jp.as_ref().unwrap().len(), 1);
        assert_eq!(feed.feed_info, sample_feed().feed_info);
    }

    #[test]
    fn test_restrict_to_all_routes_is_identity() {
        let original = sample_feed();
        let restricted = original.restrict_to_routes(&[RouteId::new("r1"), RouteId::new("r2")]);
        assert_eq!(restricted, original);
    }

    #[test]
    fn test_restrict_to_trips() {
        let feed = sample_feed().restrict_to_trips(&[TripId::new("t2"), TripId::new("t9")]);

        assert_eq!(ids(&feed.routes, |r| &r.route_id), vec![RouteId::new("r1")]);
        assert_eq!(ids(&feed.trips, |t| &t.trip_id), vec![TripId::new("t2")]);
        assert_eq!(feed.stop_times.as_ref().unwrap().len(), 3);
        assert_eq!(feed.frequencies, Some(vec![]));
        assert_eq!(ids(&feed.calendar, |c| &c.service_id), vec![ServiceId::new("weekend")]);
        // r1 keeps its fare rule
        assert_eq!(feed.fare_rules.as_ref().unwrap().len(), 1);
        assert_eq!(feed.shapes.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_restrict_to_dates() {
        let feed = sample_feed();

        // A Saturday runs only the weekend service
        let saturday = feed.restrict_to_dates(&[ymd(2024, 4, 6)]);
        assert_eq!(ids(&saturday.trips, |t| &t.trip_id), vec![TripId::new("t2")]);

        let both = feed.restrict_to_dates(&[ymd(2024, 4, 6), ymd(2024, 4, 8)]);
        assert_eq!(both, feed);

        let none = feed.restrict_to_dates(&[ymd(2025, 1, 1)]);
        assert_eq!(none.trips, Some(vec![]));
        assert_eq!(none.routes, Some(vec![]));
    }

    #[test]
    fn test_restrict_to_agencies() {
        let feed = sample_feed();
        assert_eq!(feed.restrict_to_agencies(&[AgencyId::new("a1")]), feed);

        let other = feed.restrict_to_agencies(&[AgencyId::new("a2")]);
        assert_eq!(other.routes, Some(vec![]));
        assert_eq!(other.agency, Some(vec![]));
    }

    #[test]
    fn test_restrict_keeps_absent_tables_absent() {
        let mut original = sample_feed();
        original.transfers = None;
        let restricted = original.restrict_to_routes(&[RouteId::new("unknown")]);

        assert!(restricted.transfers.is_none());
        assert_eq!(restricted.trips, Some(vec![]));
        assert!(restricted.has_table(TableName::Stops));
        assert_eq!(restricted.stops, Some(vec![]));
    }
}
