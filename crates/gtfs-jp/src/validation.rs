//! Referential integrity and value checks.
//!
//! [`validate`] never fails; everything it finds goes into the
//! [`ValidationReport`]. Rows are numbered from 1, not counting the header.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::feed::Feed;
use crate::models::records::*;
use crate::models::types::{GtfsTime, SERVICE_ADDED, SERVICE_REMOVED};
use crate::schema::TableName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One problem found in a feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub table: TableName,
    /// 1-based data row, if the problem belongs to one row.
    pub row: Option<usize>,
    pub column: Option<&'static str>,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.table.file_name())?;
        if let Some(row) = self.row {
            write!(f, " row {}", row)?;
        }
        if let Some(column) = self.column {
            write!(f, " [{}]", column)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// True when there are no errors. Warnings are allowed.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        write!(
            f,
            "{} errors, {} warnings",
            self.errors().count(),
            self.warnings().count()
        )
    }
}

fn rows<T>(table: &Option<Vec<T>>) -> &[T] {
    table.as_deref().unwrap_or_default()
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit())
}

struct Checker {
    issues: Vec<Issue>,
}

impl Checker {
    fn push(
        &mut self,
        severity: Severity,
        table: TableName,
        row: Option<usize>,
        column: Option<&'static str>,
        message: String,
    ) {
        self.issues.push(Issue {
            severity,
            table,
            row,
            column,
            message,
        });
    }

    fn error(&mut self, table: TableName, index: usize, column: &'static str, message: String) {
        self.push(Severity::Error, table, Some(index + 1), Some(column), message);
    }

    fn warning(&mut self, table: TableName, index: usize, column: &'static str, message: String) {
        self.push(Severity::Warning, table, Some(index + 1), Some(column), message);
    }

    fn require_table<T>(&mut self, table: TableName, rows: &Option<Vec<T>>) {
        if rows.as_ref().map_or(true, Vec::is_empty) {
            self.push(
                Severity::Error,
                table,
                None,
                None,
                format!("Missing required table {}", table.file_name()),
            );
        }
    }

    /// Flag every row whose key was already seen.
    fn unique<T: Record>(&mut self, rows: &[T], column: &'static str, key: impl Fn(&T) -> String) {
        let mut seen = HashSet::new();
        for (i, row) in rows.iter().enumerate() {
            let k = key(row);
            if !seen.insert(k.clone()) {
                self.error(T::TABLE, i, column, format!("Duplicate key {}", k));
            }
        }
    }

    /// Flag every reference not found in `known`.
    fn references<'a, T: Record + 'a>(
        &mut self,
        rows: &'a [T],
        column: &'static str,
        target: TableName,
        known: &HashSet<&str>,
        get: impl Fn(&'a T) -> Option<&'a str>,
    ) {
        for (i, row) in rows.iter().enumerate() {
            if let Some(value) = get(row) {
                if !known.contains(value) {
                    self.error(
                        T::TABLE,
                        i,
                        column,
                        format!("{} {:?} not found in {}", column, value, target.file_name()),
                    );
                }
            }
        }
    }

    fn flag<T: Record>(&mut self, rows: &[T], column: &'static str, allowed: &[u8], get: impl Fn(&T) -> Option<u8>) {
        for (i, row) in rows.iter().enumerate() {
            if let Some(value) = get(row) {
                if !allowed.contains(&value) {
                    self.error(
                        T::TABLE,
                        i,
                        column,
                        format!("Invalid value {} (expected one of {:?})", value, allowed),
                    );
                }
            }
        }
    }
}

fn check_required_tables(c: &mut Checker, feed: &Feed) {
    c.require_table(TableName::Agency, &feed.agency);
    c.require_table(TableName::Stops, &feed.stops);
    c.require_table(TableName::Routes, &feed.routes);
    c.require_table(TableName::Trips, &feed.trips);
    c.require_table(TableName::StopTimes, &feed.stop_times);
    c.require_table(TableName::FeedInfo, &feed.feed_info);

    let has_rows = |n: Option<usize>| n.is_some_and(|n| n > 0);
    if !has_rows(feed.calendar.as_ref().map(Vec::len))
        && !has_rows(feed.calendar_dates.as_ref().map(Vec::len))
    {
        c.push(
            Severity::Error,
            TableName::Calendar,
            None,
            None,
            "Missing both calendar.txt and calendar_dates.txt".to_string(),
        );
    }
}

fn check_primary_keys(c: &mut Checker, feed: &Feed) {
    c.unique(rows(&feed.agency), "agency_id", |r| r.agency_id.to_string());
    c.unique(rows(&feed.agency_jp), "agency_id", |r| r.agency_id.to_string());
    c.unique(rows(&feed.stops), "stop_id", |r| r.stop_id.to_string());
    c.unique(rows(&feed.routes), "route_id", |r| r.route_id.to_string());
    c.unique(rows(&feed.trips), "trip_id", |r| r.trip_id.to_string());
    c.unique(rows(&feed.office_jp), "office_id", |r| r.office_id.to_string());
    c.unique(rows(&feed.pattern_jp), "jp_pattern_id", |r| r.jp_pattern_id.to_string());
    c.unique(rows(&feed.stop_times), "stop_sequence", |r| {
        format!("({}, {})", r.trip_id, r.stop_sequence)
    });
    c.unique(rows(&feed.calendar), "service_id", |r| r.service_id.to_string());
    c.unique(rows(&feed.calendar_dates), "date", |r| {
        format!("({}, {})", r.service_id, r.date.format("%Y%m%d"))
    });
    c.unique(rows(&feed.fare_attributes), "fare_id", |r| r.fare_id.to_string());
    c.unique(rows(&feed.fare_rules), "fare_id", |r| format!("{:?}", r));
    c.unique(rows(&feed.shapes), "shape_pt_sequence", |r| {
        format!("({}, {})", r.shape_id, r.shape_pt_sequence)
    });
    c.unique(rows(&feed.frequencies), "start_time", |r| {
        format!("({}, {})", r.trip_id, r.start_time)
    });
    c.unique(rows(&feed.transfers), "to_stop_id", |r| {
        format!("({}, {})", r.from_stop_id, r.to_stop_id)
    });
    c.unique(rows(&feed.feed_info), "feed_publisher_name", |r| r.feed_publisher_name.clone());
    c.unique(rows(&feed.translations), "record_id", |r| {
        format!(
            "({}, {}, {}, {:?}, {:?}, {:?})",
            r.table_name, r.field_name, r.language, r.record_id, r.record_sub_id, r.field_value
        )
    });
}

fn check_foreign_keys(c: &mut Checker, feed: &Feed) {
    let agencies: HashSet<&str> = rows(&feed.agency).iter().map(|r| r.agency_id.as_str()).collect();
    let stops: HashSet<&str> = rows(&feed.stops).iter().map(|r| r.stop_id.as_str()).collect();
    let routes: HashSet<&str> = rows(&feed.routes).iter().map(|r| r.route_id.as_str()).collect();
    let trips: HashSet<&str> = rows(&feed.trips).iter().map(|r| r.trip_id.as_str()).collect();
    let shapes: HashSet<&str> = rows(&feed.shapes).iter().map(|r| r.shape_id.as_str()).collect();
    let offices: HashSet<&str> = rows(&feed.office_jp).iter().map(|r| r.office_id.as_str()).collect();
    let patterns: HashSet<&str> = rows(&feed.pattern_jp).iter().map(|r| r.jp_pattern_id.as_str()).collect();
    let fares: HashSet<&str> = rows(&feed.fare_attributes).iter().map(|r| r.fare_id.as_str()).collect();
    let zones: HashSet<&str> = rows(&feed.stops).iter().filter_map(|r| r.zone_id.as_deref()).collect();
    let services: HashSet<&str> = rows(&feed.calendar)
        .iter()
        .map(|r| r.service_id.as_str())
        .chain(rows(&feed.calendar_dates).iter().map(|r| r.service_id.as_str()))
        .collect();

    use TableName as T;
    c.references(rows(&feed.agency_jp), "agency_id", T::Agency, &agencies, |r| Some(r.agency_id.as_str()));
    c.references(rows(&feed.routes), "agency_id", T::Agency, &agencies, |r| Some(r.agency_id.as_str()));
    c.references(rows(&feed.stops), "parent_station", T::Stops, &stops, |r| r.parent_station.as_deref());

    let trip_rows = rows(&feed.trips);
    c.references(trip_rows, "route_id", T::Routes, &routes, |r| Some(r.route_id.as_str()));
    c.references(trip_rows, "service_id", T::Calendar, &services, |r| Some(r.service_id.as_str()));
    c.references(trip_rows, "shape_id", T::Shapes, &shapes, |r| r.shape_id.as_deref());
    c.references(trip_rows, "jp_office_id", T::OfficeJp, &offices, |r| r.jp_office_id.as_deref());
    c.references(trip_rows, "jp_pattern_id", T::PatternJp, &patterns, |r| r.jp_pattern_id.as_deref());

    let stop_time_rows = rows(&feed.stop_times);
    c.references(stop_time_rows, "trip_id", T::Trips, &trips, |r| Some(r.trip_id.as_str()));
    c.references(stop_time_rows, "stop_id", T::Stops, &stops, |r| Some(r.stop_id.as_str()));

    c.references(rows(&feed.frequencies), "trip_id", T::Trips, &trips, |r| Some(r.trip_id.as_str()));
    c.references(rows(&feed.fare_attributes), "agency_id", T::Agency, &agencies, |r| r.agency_id.as_deref());

    let fare_rule_rows = rows(&feed.fare_rules);
    c.references(fare_rule_rows, "fare_id", T::FareAttributes, &fares, |r| Some(r.fare_id.as_str()));
    c.references(fare_rule_rows, "route_id", T::Routes, &routes, |r| r.route_id.as_deref());
    c.references(fare_rule_rows, "origin_id", T::Stops, &zones, |r| r.origin_id.as_deref());
    c.references(fare_rule_rows, "destination_id", T::Stops, &zones, |r| r.destination_id.as_deref());
    c.references(fare_rule_rows, "contains_id", T::Stops, &zones, |r| r.contains_id.as_deref());

    let transfer_rows = rows(&feed.transfers);
    c.references(transfer_rows, "from_stop_id", T::Stops, &stops, |r| Some(r.from_stop_id.as_str()));
    c.references(transfer_rows, "to_stop_id", T::Stops, &stops, |r| Some(r.to_stop_id.as_str()));
}

fn check_values(c: &mut Checker, feed: &Feed) {
    for (i, stop) in rows(&feed.stops).iter().enumerate() {
        if !(-90.0..=90.0).contains(&stop.stop_lat) {
            c.error(TableName::Stops, i, "stop_lat", format!("Latitude {} out of range", stop.stop_lat));
        }
        if !(-180.0..=180.0).contains(&stop.stop_lon) {
            c.error(TableName::Stops, i, "stop_lon", format!("Longitude {} out of range", stop.stop_lon));
        }
    }
    c.flag(rows(&feed.stops), "location_type", &[0, 1, 2, 3, 4], |r| r.location_type);
    c.flag(rows(&feed.trips), "direction_id", &[0, 1], |r| r.direction_id);
    c.flag(rows(&feed.calendar_dates), "exception_type", &[SERVICE_ADDED, SERVICE_REMOVED], |r| {
        Some(r.exception_type)
    });

    const DAYS: [&str; 7] = ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];
    for (i, row) in rows(&feed.calendar).iter().enumerate() {
        for (&day, flag) in DAYS.iter().zip(row.day_flags()) {
            if flag > 1 {
                c.error(TableName::Calendar, i, day, format!("Invalid value {} (expected 0 or 1)", flag));
            }
        }
        if row.start_date > row.end_date {
            c.error(
                TableName::Calendar,
                i,
                "end_date",
                format!("end_date {} is before start_date {}", row.end_date, row.start_date),
            );
        }
    }

    for (i, route) in rows(&feed.routes).iter().enumerate() {
        if route.display_name().is_none() {
            c.error(
                TableName::Routes,
                i,
                "route_short_name",
                "Route has neither a short nor a long name".to_string(),
            );
        }
        if route.route_type().is_none() {
            c.warning(TableName::Routes, i, "route_type", format!("Unknown route_type {}", route.route_type));
        }
        for (column, color) in [("route_color", &route.route_color), ("route_text_color", &route.route_text_color)] {
            if let Some(color) = color.as_deref().filter(|v| !is_hex_color(v)) {
                c.warning(TableName::Routes, i, column, format!("{:?} is not a 6 digit hex color", color));
            }
        }
    }

    let timezones: HashSet<&str> = rows(&feed.agency).iter().map(|a| a.agency_timezone.as_str()).collect();
    if timezones.len() > 1 {
        let mut timezones: Vec<&str> = timezones.into_iter().collect();
        timezones.sort_unstable();
        c.push(
            Severity::Error,
            TableName::Agency,
            None,
            Some("agency_timezone"),
            format!("Agencies use more than one timezone: {}", timezones.join(", ")),
        );
    }
}

fn check_stop_times(c: &mut Checker, feed: &Feed) {
    let stop_times = rows(&feed.stop_times);
    let mut by_trip: HashMap<&str, Vec<usize>> = HashMap::new();

    for (i, st) in stop_times.iter().enumerate() {
        by_trip.entry(st.trip_id.as_str()).or_default().push(i);
        if let (Some(arrival), Some(departure)) = (st.arrival_time, st.departure_time) {
            if departure < arrival {
                c.error(
                    TableName::StopTimes,
                    i,
                    "departure_time",
                    format!("Departure {} is before arrival {}", departure, arrival),
                );
            }
        }
    }

    let mut trip_ids: Vec<&str> = by_trip.keys().copied().collect();
    trip_ids.sort_unstable();
    for trip_id in trip_ids {
        let mut indices = by_trip[trip_id].clone();
        indices.sort_by_key(|&i| stop_times[i].stop_sequence);

        let mut ends: Vec<usize> = indices.first().into_iter().chain(indices.last()).copied().collect();
        ends.dedup();
        for i in ends {
            let st = &stop_times[i];
            if st.arrival_time.is_none() || st.departure_time.is_none() {
                c.error(
                    TableName::StopTimes,
                    i,
                    "arrival_time",
                    format!("First and last stops of trip {} need arrival and departure times", trip_id),
                );
            }
        }

        let mut latest: Option<GtfsTime> = None;
        for &i in indices.iter() {
            let st = &stop_times[i];
            let times = [("arrival_time", st.arrival_time), ("departure_time", st.departure_time)];
            for (column, time) in times {
                let Some(time) = time else { continue };
                if latest.is_some_and(|l| time < l) {
                    c.warning(
                        TableName::StopTimes,
                        i,
                        column,
                        format!("Time {} goes back in time along trip {}", time, trip_id),
                    );
                }
                latest = latest.max(Some(time));
            }
        }
    }

    for (i, trip) in rows(&feed.trips).iter().enumerate() {
        let count = by_trip.get(trip.trip_id.as_str()).map_or(0, Vec::len);
        if count < 2 {
            c.warning(
                TableName::Trips,
                i,
                "trip_id",
                format!("Trip {} has {} stop times", trip.trip_id, count),
            );
        }
    }
}

fn check_frequencies(c: &mut Checker, feed: &Feed) {
    for (i, f) in rows(&feed.frequencies).iter().enumerate() {
        if f.end_time <= f.start_time {
            c.error(
                TableName::Frequencies,
                i,
                "end_time",
                format!("end_time {} is not after start_time {}", f.end_time, f.start_time),
            );
        }
        if f.headway_secs == 0 {
            c.error(TableName::Frequencies, i, "headway_secs", "Headway must be positive".to_string());
        }
    }
}

fn check_zones(c: &mut Checker, feed: &Feed) {
    if !rows(&feed.fare_rules).iter().any(FareRule::uses_zones) {
        return;
    }
    for (i, stop) in rows(&feed.stops).iter().enumerate() {
        if stop.zone_id.is_none() && !stop.is_station() {
            c.warning(
                TableName::Stops,
                i,
                "zone_id",
                format!("Stop {} has no zone_id but fare rules use zones", stop.stop_id),
            );
        }
    }
}

/// Check `feed` and report every problem found.
pub fn validate(feed: &Feed) -> ValidationReport {
    let mut checker = Checker { issues: Vec::new() };

    check_required_tables(&mut checker, feed);
    check_primary_keys(&mut checker, feed);
    check_foreign_keys(&mut checker, feed);
    check_values(&mut checker, feed);
    check_stop_times(&mut checker, feed);
    check_frequencies(&mut checker, feed);
    check_zones(&mut checker, feed);

    let report = ValidationReport {
        issues: checker.issues,
    };
    debug!(
        "Validation found {} errors and {} warnings",
        report.errors().count(),
        report.warnings().count()
    );
    report
}

impl Feed {
    pub fn validate(&self) -> ValidationReport {
        validate(self)
    }
}
