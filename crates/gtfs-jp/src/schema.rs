//! Table and column schema for GTFS-JP feeds, plus distance units.
//!
//! Column lists follow the MLIT GTFS-JP guideline
//! (<https://www.mlit.go.jp/sogoseisaku/transport/content/001419163.pdf>).
//! The order of each list matches the order the columns are written in.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::models::types::{FeedError, Result};

/// Every GTFS-JP file this crate understands.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    Display, EnumIter, EnumString, AsRefStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Agency,
    AgencyJp,
    Stops,
    Routes,
    Trips,
    OfficeJp,
    PatternJp,
    StopTimes,
    Calendar,
    CalendarDates,
    FareAttributes,
    FareRules,
    Shapes,
    Frequencies,
    Transfers,
    FeedInfo,
    Translations,
}

/// Storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    /// `YYYYMMDD`
    Date,
    /// `HH:MM:SS`, hours may exceed 23
    Time,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn req(name: &'static str, kind: FieldKind) -> Column {
    Column { name, kind, required: true }
}

const fn opt(name: &'static str, kind: FieldKind) -> Column {
    Column { name, kind, required: false }
}

use FieldKind::{Date, Float, Integer, Text, Time};

const AGENCY: &[Column] = &[
    req("agency_id", Text),
    req("agency_name", Text),
    req("agency_url", Text),
    opt("agency_timezone", Text),
    opt("agency_lang", Text),
    opt("agency_phone", Text),
    opt("agency_fare_url", Text),
    opt("agency_email", Text),
];

const AGENCY_JP: &[Column] = &[
    req("agency_id", Text),
    opt("agency_official_name", Text),
    opt("agency_zip_number", Text),
    opt("agency_address", Text),
    opt("agency_president_pos", Text),
    opt("agency_president_name", Text),
];

const STOPS: &[Column] = &[
    req("stop_id", Text),
    opt("stop_code", Text),
    req("stop_name", Text),
    opt("stop_desc", Text),
    req("stop_lat", Float),
    req("stop_lon", Float),
    opt("zone_id", Text),
    opt("stop_url", Text),
    opt("location_type", Integer),
    opt("parent_station", Text),
    opt("stop_timezone", Text),
    opt("wheelchair_boarding", Integer),
    opt("platform_code", Text),
];

const ROUTES: &[Column] = &[
    req("route_id", Text),
    req("agency_id", Text),
    opt("route_short_name", Text),
    opt("route_long_name", Text),
    opt("route_desc", Text),
    opt("route_type", Integer),
    opt("route_url", Text),
    opt("route_color", Text),
    opt("route_text_color", Text),
    opt("jp_parent_route_id", Text),
];

const TRIPS: &[Column] = &[
    req("route_id", Text),
    req("service_id", Text),
    req("trip_id", Text),
    opt("trip_headsign", Text),
    opt("trip_short_name", Text),
    opt("direction_id", Integer),
    opt("block_id", Text),
    opt("shape_id", Text),
    opt("wheelchair_accessible", Integer),
    opt("bikes_allowed", Integer),
    opt("jp_trip_desc", Text),
    opt("jp_trip_desc_symbol", Text),
    opt("jp_office_id", Text),
    opt("jp_pattern_id", Text),
];

const OFFICE_JP: &[Column] = &[
    req("office_id", Text),
    req("office_name", Text),
    opt("office_url", Text),
    opt("office_phone", Text),
];

const PATTERN_JP: &[Column] = &[
    req("jp_pattern_id", Text),
    opt("route_update_date", Text),
    opt("origin_stop", Text),
    opt("via_stop", Text),
    opt("destination_stop", Text),
];

const STOP_TIMES: &[Column] = &[
    req("trip_id", Text),
    opt("arrival_time", Time),
    opt("departure_time", Time),
    req("stop_id", Text),
    req("stop_sequence", Integer),
    opt("stop_headsign", Text),
    opt("pickup_type", Integer),
    opt("drop_off_type", Integer),
    opt("shape_dist_traveled", Float),
    opt("timepoint", Integer),
];

const CALENDAR: &[Column] = &[
    req("service_id", Text),
    req("monday", Integer),
    req("tuesday", Integer),
    req("wednesday", Integer),
    req("thursday", Integer),
    req("friday", Integer),
    req("saturday", Integer),
    req("sunday", Integer),
    req("start_date", Date),
    req("end_date", Date),
];

const CALENDAR_DATES: &[Column] = &[
    req("service_id", Text),
    req("date", Date),
    req("exception_type", Integer),
];

const FARE_ATTRIBUTES: &[Column] = &[
    req("fare_id", Text),
    req("price", Float),
    opt("currency_type", Text),
    req("payment_method", Integer),
    opt("transfers", Integer),
    opt("agency_id", Text),
    opt("transfer_duration", Integer),
];

const FARE_RULES: &[Column] = &[
    req("fare_id", Text),
    opt("route_id", Text),
    opt("origin_id", Text),
    opt("destination_id", Text),
    opt("contains_id", Text),
];

const SHAPES: &[Column] = &[
    req("shape_id", Text),
    req("shape_pt_lat", Float),
    req("shape_pt_lon", Float),
    req("shape_pt_sequence", Integer),
    opt("shape_dist_traveled", Float),
];

const FREQUENCIES: &[Column] = &[
    req("trip_id", Text),
    req("start_time", Time),
    req("end_time", Time),
    req("headway_secs", Integer),
    opt("exact_times", Integer),
];

const TRANSFERS: &[Column] = &[
    req("from_stop_id", Text),
    req("to_stop_id", Text),
    req("transfer_type", Integer),
    opt("min_transfer_time", Integer),
];

const FEED_INFO: &[Column] = &[
    req("feed_publisher_name", Text),
    req("feed_publisher_url", Text),
    opt("feed_lang", Text),
    opt("feed_start_date", Date),
    opt("feed_end_date", Date),
    opt("feed_version", Text),
];

const TRANSLATIONS: &[Column] = &[
    req("table_name", Text),
    req("field_name", Text),
    req("language", Text),
    req("translation", Text),
    opt("record_id", Text),
    opt("record_sub_id", Text),
    opt("field_value", Text),
];

impl TableName {
    pub fn all() -> impl Iterator<Item = TableName> {
        Self::iter()
    }

    /// File name inside a feed, e.g. `stop_times.txt`.
    pub fn file_name(self) -> String {
        format!("{}.txt", self.as_ref())
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        name.strip_suffix(".txt")?.parse().ok()
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::Agency => AGENCY,
            Self::AgencyJp => AGENCY_JP,
            Self::Stops => STOPS,
            Self::Routes => ROUTES,
            Self::Trips => TRIPS,
            Self::OfficeJp => OFFICE_JP,
            Self::PatternJp => PATTERN_JP,
            Self::StopTimes => STOP_TIMES,
            Self::Calendar => CALENDAR,
            Self::CalendarDates => CALENDAR_DATES,
            Self::FareAttributes => FARE_ATTRIBUTES,
            Self::FareRules => FARE_RULES,
            Self::Shapes => SHAPES,
            Self::Frequencies => FREQUENCIES,
            Self::Transfers => TRANSFERS,
            Self::FeedInfo => FEED_INFO,
            Self::Translations => TRANSLATIONS,
        }
    }

    pub fn column(self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Files defined by GTFS-JP on top of plain GTFS.
    pub fn is_jp_extension(self) -> bool {
        matches!(self, Self::AgencyJp | Self::OfficeJp | Self::PatternJp)
    }
}

// ============================================================================
// Distance units
// ============================================================================

/// Units for `shape_dist_traveled` and other distances in a feed.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash,
    Display, EnumIter, EnumString, AsRefStr, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DistUnits {
    Ft,
    Mi,
    #[default]
    M,
    Km,
}

impl DistUnits {
    /// Parse a unit name, failing with the list of valid units.
    pub fn from_name(name: &str) -> Result<Self> {
        name.trim().parse().map_err(|_| FeedError::InvalidDistUnits {
            given: name.to_string(),
            valid: Self::valid_names(),
        })
    }

    pub fn valid_names() -> String {
        let names: Vec<String> = Self::iter().map(|u| u.to_string()).collect();
        format!("[{}]", names.join(", "))
    }

    pub fn meters_per_unit(self) -> f64 {
        match self {
            Self::Ft => 0.3048,
            Self::Mi => 1609.344,
            Self::M => 1.0,
            Self::Km => 1000.0,
        }
    }

    /// Convert a distance expressed in `self` into `to`.
    pub fn convert(self, value: f64, to: DistUnits) -> f64 {
        if self == to {
            return value;
        }
        value * self.meters_per_unit() / to.meters_per_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_file_names() {
        assert_eq!(TableName::StopTimes.file_name(), "stop_times.txt");
        assert_eq!(TableName::AgencyJp.file_name(), "agency_jp.txt");
        assert_eq!(TableName::from_file_name("office_jp.txt"), Some(TableName::OfficeJp));
        assert_eq!(TableName::from_file_name("office_jp.csv"), None);
        assert_eq!(TableName::from_file_name("readme.txt"), None);
        assert_eq!(TableName::all().count(), 17);
    }

    #[test]
    fn test_columns() {
        let trips = TableName::Trips.columns();
        assert_eq!(trips[0].name, "route_id");
        assert!(TableName::Trips.column("jp_pattern_id").is_some());
        assert_eq!(
            TableName::Stops.column("stop_lat").map(|c| c.kind),
            Some(FieldKind::Float)
        );
        assert!(TableName::PatternJp.is_jp_extension());
        assert!(!TableName::Trips.is_jp_extension());
    }

    #[test]
    fn test_dist_units_parse() {
        assert_eq!(DistUnits::from_name("km").unwrap(), DistUnits::Km);
        assert_eq!(DistUnits::from_name(" m ").unwrap(), DistUnits::M);

        let err = DistUnits::from_name("yards").unwrap_err();
        assert!(err.to_string().contains("[ft, mi, m, km]"));
    }

    #[test]
    fn test_dist_units_convert() {
        assert_relative_eq!(DistUnits::Km.convert(1.5, DistUnits::M), 1500.0);
        assert_relative_eq!(DistUnits::Mi.convert(1.0, DistUnits::Ft), 5280.0, epsilon = 1e-9);
        assert_relative_eq!(DistUnits::M.convert(42.0, DistUnits::M), 42.0);
    }
}
