//! Route and stop timetables for given dates.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::feed::Feed;
use crate::identifiers::{RouteId, ServiceId, StopId, TripId};
use crate::models::records::{StopTime, Trip};
use crate::models::types::{gtfs_date, GtfsTime};

/// One stop time of a trip running on `date`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimetableRow {
    #[serde(with = "gtfs_date")]
    pub date: NaiveDate,
    pub route_id: RouteId,
    pub trip_id: TripId,
    pub direction_id: Option<u8>,
    pub trip_headsign: Option<String>,
    pub stop_id: StopId,
    pub stop_sequence: u32,
    pub arrival_time: Option<GtfsTime>,
    pub departure_time: Option<GtfsTime>,
    pub shape_dist_traveled: Option<f64>,
}

impl TimetableRow {
    fn new(date: NaiveDate, trip: &Trip, st: &StopTime) -> Self {
        Self {
            date,
            route_id: trip.route_id.clone(),
            trip_id: trip.trip_id.clone(),
            direction_id: trip.direction_id,
            trip_headsign: trip.trip_headsign.clone(),
            stop_id: st.stop_id.clone(),
            stop_sequence: st.stop_sequence,
            arrival_time: st.arrival_time,
            departure_time: st.departure_time,
            shape_dist_traveled: st.shape_dist_traveled,
        }
    }
}

impl Feed {
    /// Feed dates among `dates`, sorted and without repeats, each with the
    /// services running on it.
    fn active_services_by_date(&self, dates: &[NaiveDate]) -> Vec<(NaiveDate, HashSet<ServiceId>)> {
        let calendars = self.service_calendars();
        let dates: BTreeSet<NaiveDate> = self.subset_dates(dates).into_iter().collect();
        dates
            .into_iter()
            .map(|date| {
                let active = calendars
                    .values()
                    .filter(|c| c.runs_on(date))
                    .map(|c| c.service_id.clone())
                    .collect();
                (date, active)
            })
            .collect()
    }

    /// Every stop time of the route's trips on each of `dates`, ordered by
    /// date, trip departure and stop sequence. Dates outside the feed are
    /// ignored.
    pub fn build_route_timetable(&self, route_id: &RouteId, dates: &[NaiveDate]) -> Vec<TimetableRow> {
        let by_trip = self.stop_times_by_trip();
        let trips: Vec<&Trip> = self.trips.iter().flatten().filter(|t| &t.route_id == route_id).collect();

        let mut rows = Vec::new();
        for (date, active) in self.active_services_by_date(dates) {
            let mut running: Vec<(Option<GtfsTime>, &Trip)> = trips
                .iter()
                .filter(|t| active.contains(&t.service_id))
                .map(|&t| {
                    let start = by_trip
                        .get(&t.trip_id)
                        .and_then(|sts| sts.iter().filter_map(|st| st.departure_time).min());
                    (start, t)
                })
                .collect();
            running.sort_by(|a, b| (a.0, &a.1.trip_id).cmp(&(b.0, &b.1.trip_id)));

            for (_, trip) in running {
                let stop_times = by_trip.get(&trip.trip_id).map(Vec::as_slice).unwrap_or_default();
                rows.extend(stop_times.iter().map(|st| TimetableRow::new(date, trip, st)));
            }
        }
        rows
    }

    /// Every departure from the stop on each of `dates`, ordered by date and
    /// departure time. Dates outside the feed are ignored.
    pub fn build_stop_timetable(&self, stop_id: &StopId, dates: &[NaiveDate]) -> Vec<TimetableRow> {
        let trips: HashMap<&TripId, &Trip> = self.trips.iter().flatten().map(|t| (&t.trip_id, t)).collect();
        let visits: Vec<(&Trip, &StopTime)> = self
            .stop_times
            .iter()
            .flatten()
            .filter(|st| &st.stop_id == stop_id)
            .filter_map(|st| Some((*trips.get(&st.trip_id)?, st)))
            .collect();

        let mut rows = Vec::new();
        for (date, active) in self.active_services_by_date(dates) {
            let mut day: Vec<TimetableRow> = visits
                .iter()
                .filter(|(trip, _)| active.contains(&trip.service_id))
                .map(|(trip, st)| TimetableRow::new(date, trip, st))
                .collect();
            day.sort_by(|a, b| {
                (a.departure_time.or(a.arrival_time), &a.trip_id)
                    .cmp(&(b.departure_time.or(b.arrival_time), &b.trip_id))
            });
            rows.extend(day);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hms, sample_feed, ymd};

    fn trips_and_stops(rows: &[TimetableRow]) -> Vec<(&str, &str)> {
        rows.iter().map(|r| (r.trip_id.as_str(), r.stop_id.as_str())).collect()
    }

    #[test]
    fn test_route_timetable() {
        let feed = sample_feed();
        // Monday, Saturday and Showa Day (weekend service)
        let dates = [ymd(2024, 4, 6), ymd(2024, 4, 1), ymd(2024, 4, 29)];
        let rows = feed.build_route_timetable(&RouteId::new("r1"), &dates);

        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0].date, ymd(2024, 4, 1));
        assert_eq!(
            trips_and_stops(&rows[..3]),
            vec![("t1", "s1"), ("t1", "s2"), ("t1", "s3")]
        );
        assert_eq!(rows[3].date, ymd(2024, 4, 6));
        assert_eq!(trips_and_stops(&rows[3..6]), vec![("t2", "s3"), ("t2", "s2"), ("t2", "s1")]);
        assert!(rows[6..].iter().all(|r| r.date == ymd(2024, 4, 29) && r.trip_id.as_str() == "t2"));
    }

    #[test]
    fn test_route_timetable_ignores_other_dates() {
        let feed = sample_feed();
        let rows = feed.build_route_timetable(&RouteId::new("r2"), &[ymd(2024, 5, 1), ymd(2024, 4, 6)]);
        assert!(rows.is_empty());
        assert!(feed.build_route_timetable(&RouteId::new("r9"), &[ymd(2024, 4, 1)]).is_empty());
    }

    #[test]
    fn test_stop_timetable() {
        let feed = sample_feed();
        let rows = feed.build_stop_timetable(&StopId::new("s2"), &[ymd(2024, 4, 1), ymd(2024, 4, 1)]);

        let times: Vec<(&str, Option<GtfsTime>)> =
            rows.iter().map(|r| (r.trip_id.as_str(), r.departure_time)).collect();
        assert_eq!(times, vec![("t1", Some(hms(6, 5, 0))), ("t3", Some(hms(8, 6, 0)))]);
        assert_eq!(rows[1].route_id, RouteId::new("r2"));

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["date"], "20240401");
        assert_eq!(json["departure_time"], "06:05:00");
    }
}
