//! One serde record per GTFS-JP file.
//!
//! Field names are the CSV column names. Columns that GTFS-JP marks optional
//! are `Option`s; an empty cell (or `nan`/`null`, see [`crate::io`]) reads as
//! `None`. Required columns that are missing or blank fail the whole row; columns
//! with a default take it when absent or blank.

use std::fmt::{Debug, Display};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::identifiers::*;
use crate::models::types::{gtfs_date, non_empty, DirectionId, GtfsTime, RouteType};
use crate::schema::TableName;

/// A row of one GTFS-JP table.
pub trait Record: Serialize + DeserializeOwned + Clone + Debug + PartialEq {
    const TABLE: TableName;

    /// Round every float field to `ndigits` decimal places.
    fn round_floats(&mut self, _ndigits: u32) {}
}

pub(crate) fn round_to(value: f64, ndigits: u32) -> f64 {
    let factor = 10f64.powi(ndigits as i32);
    (value * factor).round() / factor
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_lang() -> String {
    "ja".to_string()
}

fn default_currency() -> String {
    "JPY".to_string()
}

fn default_route_type() -> u16 {
    3
}

/// A blank cell in a column with a default takes the default, like an absent
/// column does.
fn blank_or<'de, D, T>(deserializer: D, default: fn() -> T) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s.trim().parse().map_err(de::Error::custom),
        _ => Ok(default()),
    }
}

fn timezone_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    blank_or(d, default_timezone)
}

fn lang_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    blank_or(d, default_lang)
}

fn currency_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    blank_or(d, default_currency)
}

fn route_type_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u16, D::Error> {
    blank_or(d, default_route_type)
}

// ============================================================================
// Agencies
// ============================================================================

/// agency.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub agency_id: AgencyId,
    #[serde(deserialize_with = "non_empty")]
    pub agency_name: String,
    #[serde(deserialize_with = "non_empty")]
    pub agency_url: String,
    #[serde(default = "default_timezone", deserialize_with = "timezone_or_default")]
    pub agency_timezone: String,
    #[serde(default = "default_lang", deserialize_with = "lang_or_default")]
    pub agency_lang: String,
    #[serde(default)]
    pub agency_phone: Option<String>,
    #[serde(default)]
    pub agency_fare_url: Option<String>,
    #[serde(default)]
    pub agency_email: Option<String>,
}

impl Record for Agency {
    const TABLE: TableName = TableName::Agency;
}

/// agency_jp.txt (GTFS-JP)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgencyJp {
    pub agency_id: AgencyId,
    #[serde(default)]
    pub agency_official_name: Option<String>,
    #[serde(default)]
    pub agency_zip_number: Option<String>,
    #[serde(default)]
    pub agency_address: Option<String>,
    #[serde(default)]
    pub agency_president_pos: Option<String>,
    #[serde(default)]
    pub agency_president_name: Option<String>,
}

impl Record for AgencyJp {
    const TABLE: TableName = TableName::AgencyJp;
}

// ============================================================================
// Stops
// ============================================================================

/// stops.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopId,
    #[serde(default)]
    pub stop_code: Option<String>,
    #[serde(deserialize_with = "non_empty")]
    pub stop_name: String,
    #[serde(default)]
    pub stop_desc: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
    #[serde(default)]
    pub stop_url: Option<String>,
    #[serde(default)]
    pub location_type: Option<u8>,
    #[serde(default)]
    pub parent_station: Option<StopId>,
    #[serde(default)]
    pub stop_timezone: Option<String>,
    #[serde(default)]
    pub wheelchair_boarding: Option<u8>,
    #[serde(default)]
    pub platform_code: Option<String>,
}

impl Stop {
    /// Stations (location_type 1) group platforms and are not boarded directly.
    pub fn is_station(&self) -> bool {
        self.location_type == Some(1)
    }

    pub fn point(&self) -> geo::Point {
        geo::Point::new(self.stop_lon, self.stop_lat)
    }
}

impl Record for Stop {
    const TABLE: TableName = TableName::Stops;

    fn round_floats(&mut self, ndigits: u32) {
        self.stop_lat = round_to(self.stop_lat, ndigits);
        self.stop_lon = round_to(self.stop_lon, ndigits);
    }
}

// ============================================================================
// Routes and trips
// ============================================================================

/// routes.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: RouteId,
    pub agency_id: AgencyId,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_desc: Option<String>,
    #[serde(default = "default_route_type", deserialize_with = "route_type_or_default")]
    pub route_type: u16,
    #[serde(default)]
    pub route_url: Option<String>,
    #[serde(default)]
    pub route_color: Option<String>,
    #[serde(default)]
    pub route_text_color: Option<String>,
    #[serde(default)]
    pub jp_parent_route_id: Option<String>,
}

impl Route {
    pub fn route_type(&self) -> Option<RouteType> {
        RouteType::from_gtfs(self.route_type)
    }

    /// Short name if present, else long name.
    pub fn display_name(&self) -> Option<&str> {
        self.route_short_name
            .as_deref()
            .or(self.route_long_name.as_deref())
    }
}

impl Record for Route {
    const TABLE: TableName = TableName::Routes;
}

/// trips.txt, including the GTFS-JP `jp_*` columns
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub route_id: RouteId,
    pub service_id: ServiceId,
    pub trip_id: TripId,
    #[serde(default)]
    pub trip_headsign: Option<String>,
    #[serde(default)]
    pub trip_short_name: Option<String>,
    #[serde(default)]
    pub direction_id: Option<u8>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub shape_id: Option<ShapeId>,
    #[serde(default)]
    pub wheelchair_accessible: Option<u8>,
    #[serde(default)]
    pub bikes_allowed: Option<u8>,
    #[serde(default)]
    pub jp_trip_desc: Option<String>,
    #[serde(default)]
    pub jp_trip_desc_symbol: Option<String>,
    #[serde(default)]
    pub jp_office_id: Option<OfficeId>,
    #[serde(default)]
    pub jp_pattern_id: Option<PatternId>,
}

impl Trip {
    pub fn direction(&self) -> Option<DirectionId> {
        self.direction_id.and_then(DirectionId::from_gtfs)
    }
}

impl Record for Trip {
    const TABLE: TableName = TableName::Trips;
}

/// office_jp.txt (GTFS-JP)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfficeJp {
    pub office_id: OfficeId,
    #[serde(deserialize_with = "non_empty")]
    pub office_name: String,
    #[serde(default)]
    pub office_url: Option<String>,
    #[serde(default)]
    pub office_phone: Option<String>,
}

impl Record for OfficeJp {
    const TABLE: TableName = TableName::OfficeJp;
}

/// pattern_jp.txt (GTFS-JP)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternJp {
    pub jp_pattern_id: PatternId,
    #[serde(default)]
    pub route_update_date: Option<String>,
    #[serde(default)]
    pub origin_stop: Option<String>,
    #[serde(default)]
    pub via_stop: Option<String>,
    #[serde(default)]
    pub destination_stop: Option<String>,
}

impl Record for PatternJp {
    const TABLE: TableName = TableName::PatternJp;
}

/// stop_times.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: TripId,
    #[serde(default)]
    pub arrival_time: Option<GtfsTime>,
    #[serde(default)]
    pub departure_time: Option<GtfsTime>,
    pub stop_id: StopId,
    pub stop_sequence: u32,
    #[serde(default)]
    pub stop_headsign: Option<String>,
    #[serde(default)]
    pub pickup_type: Option<u8>,
    #[serde(default)]
    pub drop_off_type: Option<u8>,
    #[serde(default)]
    pub shape_dist_traveled: Option<f64>,
    #[serde(default)]
    pub timepoint: Option<u8>,
}

impl Record for StopTime {
    const TABLE: TableName = TableName::StopTimes;

    fn round_floats(&mut self, ndigits: u32) {
        self.shape_dist_traveled = self.shape_dist_traveled.map(|d| round_to(d, ndigits));
    }
}

// ============================================================================
// Calendars
// ============================================================================

/// calendar.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: ServiceId,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    #[serde(with = "gtfs_date")]
    pub start_date: NaiveDate,
    #[serde(with = "gtfs_date")]
    pub end_date: NaiveDate,
}

impl Calendar {
    /// Weekday flags in Monday-first order.
    pub fn day_flags(&self) -> [u8; 7] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
    }
}

impl Record for Calendar {
    const TABLE: TableName = TableName::Calendar;
}

/// calendar_dates.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub service_id: ServiceId,
    #[serde(with = "gtfs_date")]
    pub date: NaiveDate,
    pub exception_type: u8,
}

impl Record for CalendarDate {
    const TABLE: TableName = TableName::CalendarDates;
}

// ============================================================================
// Fares
// ============================================================================

/// fare_attributes.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FareAttribute {
    pub fare_id: FareId,
    pub price: f64,
    #[serde(default = "default_currency", deserialize_with = "currency_or_default")]
    pub currency_type: String,
    pub payment_method: u8,
    /// `None` means unlimited transfers.
    #[serde(default)]
    pub transfers: Option<u8>,
    #[serde(default)]
    pub agency_id: Option<AgencyId>,
    #[serde(default)]
    pub transfer_duration: Option<u32>,
}

impl Record for FareAttribute {
    const TABLE: TableName = TableName::FareAttributes;

    fn round_floats(&mut self, ndigits: u32) {
        self.price = round_to(self.price, ndigits);
    }
}

/// fare_rules.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FareRule {
    pub fare_id: FareId,
    #[serde(default)]
    pub route_id: Option<RouteId>,
    #[serde(default)]
    pub origin_id: Option<ZoneId>,
    #[serde(default)]
    pub destination_id: Option<ZoneId>,
    #[serde(default)]
    pub contains_id: Option<ZoneId>,
}

impl FareRule {
    pub fn uses_zones(&self) -> bool {
        self.origin_id.is_some() || self.destination_id.is_some() || self.contains_id.is_some()
    }
}

impl Record for FareRule {
    const TABLE: TableName = TableName::FareRules;
}

// ============================================================================
// Shapes, frequencies, transfers
// ============================================================================

/// shapes.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub shape_id: ShapeId,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    #[serde(default)]
    pub shape_dist_traveled: Option<f64>,
}

impl Record for Shape {
    const TABLE: TableName = TableName::Shapes;

    fn round_floats(&mut self, ndigits: u32) {
        self.shape_pt_lat = round_to(self.shape_pt_lat, ndigits);
        self.shape_pt_lon = round_to(self.shape_pt_lon, ndigits);
        self.shape_dist_traveled = self.shape_dist_traveled.map(|d| round_to(d, ndigits));
    }
}

/// frequencies.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub trip_id: TripId,
    pub start_time: GtfsTime,
    pub end_time: GtfsTime,
    pub headway_secs: u32,
    #[serde(default)]
    pub exact_times: Option<u8>,
}

impl Record for Frequency {
    const TABLE: TableName = TableName::Frequencies;
}

/// transfers.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_stop_id: StopId,
    pub to_stop_id: StopId,
    pub transfer_type: u8,
    #[serde(default)]
    pub min_transfer_time: Option<u32>,
}

impl Record for Transfer {
    const TABLE: TableName = TableName::Transfers;
}

// ============================================================================
// Feed metadata
// ============================================================================

/// feed_info.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    #[serde(deserialize_with = "non_empty")]
    pub feed_publisher_name: String,
    #[serde(deserialize_with = "non_empty")]
    pub feed_publisher_url: String,
    #[serde(default = "default_lang", deserialize_with = "lang_or_default")]
    pub feed_lang: String,
    #[serde(default, with = "gtfs_date::option")]
    pub feed_start_date: Option<NaiveDate>,
    #[serde(default, with = "gtfs_date::option")]
    pub feed_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub feed_version: Option<String>,
}

impl Record for FeedInfo {
    const TABLE: TableName = TableName::FeedInfo;
}

/// translations.txt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(deserialize_with = "non_empty")]
    pub table_name: String,
    #[serde(deserialize_with = "non_empty")]
    pub field_name: String,
    #[serde(deserialize_with = "non_empty")]
    pub language: String,
    #[serde(deserialize_with = "non_empty")]
    pub translation: String,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub record_sub_id: Option<String>,
    #[serde(default)]
    pub field_value: Option<String>,
}

impl Record for Translation {
    const TABLE: TableName = TableName::Translations;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse<T: Record>(csv_text: &str) -> std::result::Result<Vec<T>, csv::Error> {
        csv::Reader::from_reader(csv_text.as_bytes())
            .deserialize()
            .collect()
    }

    #[test]
    fn test_agency_defaults() {
        let rows: Vec<Agency> = parse(
            "agency_id,agency_name,agency_url\n\
             8000020130001,函館市企業局交通部,https://www.city.hakodate.hokkaido.jp/\n",
        )
        .unwrap();

        assert_eq!(rows[0].agency_timezone, "Asia/Tokyo");
        assert_eq!(rows[0].agency_lang, "ja");
        assert_eq!(rows[0].agency_phone, None);
    }

    #[test]
    fn test_required_fields() {
        // Blank stop name
        assert!(parse::<Stop>("stop_id,stop_name,stop_lat,stop_lon\ns1,,41.77,140.72\n").is_err());
        // Missing latitude column
        assert!(parse::<Stop>("stop_id,stop_name,stop_lon\ns1,函館駅前,140.72\n").is_err());
        // Blank id
        assert!(parse::<Stop>("stop_id,stop_name,stop_lat,stop_lon\n,函館駅前,41.77,140.72\n").is_err());
    }

    #[test]
    fn test_trip_jp_columns() {
        let rows: Vec<Trip> = parse(
            "route_id,service_id,trip_id,direction_id,jp_trip_desc,jp_office_id,jp_pattern_id\n\
             r1,平日,t1,1,急行,o1,\n",
        )
        .unwrap();

        let trip = &rows[0];
        assert_eq!(trip.direction(), Some(DirectionId::Inbound));
        assert_eq!(trip.jp_trip_desc.as_deref(), Some("急行"));
        assert_eq!(trip.jp_office_id, Some(OfficeId::new("o1")));
        assert_eq!(trip.jp_pattern_id, None);
        assert_eq!(trip.shape_id, None);
    }

    #[test]
    fn test_stop_times_with_blank_times() {
        let rows: Vec<StopTime> = parse(
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
             t1,06:00:00,06:00:30,s1,1\n\
             t1,,,s2,2\n\
             t1,24:10:00,24:10:00,s3,3\n",
        )
        .unwrap();

        assert_eq!(rows[0].departure_time, Some(GtfsTime::from_hms(6, 0, 30)));
        assert_eq!(rows[1].arrival_time, None);
        assert_eq!(rows[2].arrival_time.map(|t| t.seconds()), Some(87_000));
    }

    #[test]
    fn test_calendar_dates_round_trip_format() {
        let rows: Vec<Calendar> = parse(
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             平日,1,1,1,1,1,0,0,20240401,20250331\n",
        )
        .unwrap();
        assert_eq!(rows[0].day_flags(), [1, 1, 1, 1, 1, 0, 0]);
        assert_eq!(rows[0].start_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(&rows[0]).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert!(text.ends_with("平日,1,1,1,1,1,0,0,20240401,20250331\n"));
    }

    #[test]
    fn test_route_names() {
        let rows: Vec<Route> = parse(
            "route_id,agency_id,route_short_name,route_long_name\n\
             r1,a1,,本線\n",
        )
        .unwrap();
        assert_eq!(rows[0].display_name(), Some("本線"));
        assert_eq!(rows[0].route_type(), Some(RouteType::Bus));
    }

    #[test]
    fn test_round_floats() {
        let mut shape = Shape {
            shape_id: ShapeId::new("sh1"),
            shape_pt_lat: 41.773_456_789,
            shape_pt_lon: 140.726_543_21,
            shape_pt_sequence: 1,
            shape_dist_traveled: Some(12.345_678),
        };
        shape.round_floats(3);

        assert_relative_eq!(shape.shape_pt_lat, 41.773);
        assert_relative_eq!(shape.shape_pt_lon, 140.727);
        assert_relative_eq!(shape.shape_dist_traveled.unwrap(), 12.346);
    }
}
