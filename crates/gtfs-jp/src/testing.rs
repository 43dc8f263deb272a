//! Fixtures shared by the unit tests.
//!
//! `sample_feed` is a tiny tram network modelled on Hakodate: two routes,
//! three trips, a weekday and a weekend service in April 2024, and one of
//! every GTFS-JP table. April 1, 2024 is a Monday; April 29 (Showa Day)
//! swaps the weekday service for the weekend one.

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::feed::Feed;
use crate::identifiers::*;
use crate::models::records::*;
use crate::models::types::{GtfsTime, SERVICE_ADDED, SERVICE_REMOVED};
use crate::schema::DistUnits;

pub(crate) fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn hms(h: u32, m: u32, s: u32) -> GtfsTime {
    GtfsTime::from_hms(h, m, s)
}

/// An in-memory zip archive holding the given files.
pub(crate) fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub(crate) const S1: (f64, f64) = (41.7737, 140.7266); // 函館駅前
pub(crate) const S2: (f64, f64) = (41.7645, 140.7138); // 十字街
pub(crate) const S3: (f64, f64) = (41.7561, 140.7168); // 谷地頭

pub(crate) fn stop(id: &str, name: &str, (lat, lon): (f64, f64), zone: Option<&str>, parent: Option<&str>) -> Stop {
    Stop {
        stop_id: StopId::new(id),
        stop_code: None,
        stop_name: name.to_string(),
        stop_desc: None,
        stop_lat: lat,
        stop_lon: lon,
        zone_id: zone.map(ZoneId::new),
        stop_url: None,
        location_type: Some(if parent.is_none() && zone.is_none() { 1 } else { 0 }),
        parent_station: parent.map(StopId::new),
        stop_timezone: None,
        wheelchair_boarding: None,
        platform_code: None,
    }
}

fn trip(id: &str, route: &str, service: &str, shape: Option<&str>, direction: u8) -> Trip {
    Trip {
        route_id: RouteId::new(route),
        service_id: ServiceId::new(service),
        trip_id: TripId::new(id),
        trip_headsign: Some("谷地頭".to_string()),
        trip_short_name: None,
        direction_id: Some(direction),
        block_id: None,
        shape_id: shape.map(ShapeId::new),
        wheelchair_accessible: None,
        bikes_allowed: None,
        jp_trip_desc: None,
        jp_trip_desc_symbol: None,
        jp_office_id: Some(OfficeId::new("o1")),
        jp_pattern_id: Some(PatternId::new("p1")),
    }
}

fn stop_time(trip: &str, stop: &str, seq: u32, time: GtfsTime) -> StopTime {
    StopTime {
        trip_id: TripId::new(trip),
        arrival_time: Some(time),
        departure_time: Some(time),
        stop_id: StopId::new(stop),
        stop_sequence: seq,
        stop_headsign: None,
        pickup_type: None,
        drop_off_type: None,
        shape_dist_traveled: None,
        timepoint: Some(1),
    }
}

fn calendar(service: &str, weekdays: bool) -> Calendar {
    let (wd, we) = if weekdays { (1, 0) } else { (0, 1) };
    Calendar {
        service_id: ServiceId::new(service),
        monday: wd,
        tuesday: wd,
        wednesday: wd,
        thursday: wd,
        friday: wd,
        saturday: we,
        sunday: we,
        start_date: ymd(2024, 4, 1),
        end_date: ymd(2024, 4, 30),
    }
}

fn shape_point(seq: u32, (lat, lon): (f64, f64)) -> Shape {
    Shape {
        shape_id: ShapeId::new("sh1"),
        shape_pt_lat: lat,
        shape_pt_lon: lon,
        shape_pt_sequence: seq,
        shape_dist_traveled: None,
    }
}

pub(crate) fn sample_feed() -> Feed {
    let mut feed = Feed::new(DistUnits::M);

    feed.agency = Some(vec![Agency {
        agency_id: AgencyId::new("a1"),
        agency_name: "函館市企業局交通部".to_string(),
        agency_url: "https://www.city.hakodate.hokkaido.jp/".to_string(),
        agency_timezone: "Asia/Tokyo".to_string(),
        agency_lang: "ja".to_string(),
        agency_phone: Some("0138-52-1273".to_string()),
        agency_fare_url: None,
        agency_email: None,
    }]);
    feed.agency_jp = Some(vec![AgencyJp {
        agency_id: AgencyId::new("a1"),
        agency_official_name: Some("函館市企業局".to_string()),
        agency_zip_number: Some("0400011".to_string()),
        agency_address: Some("北海道函館市".to_string()),
        agency_president_pos: None,
        agency_president_name: None,
    }]);
    feed.stops = Some(vec![
        stop("s1", "函館駅前", S1, Some("z1"), Some("st1")),
        stop("s2", "十字街", S2, Some("z1"), None),
        stop("s3", "谷地頭", S3, Some("z2"), None),
        stop("st1", "函館駅前", S1, None, None),
    ]);
    feed.routes = Some(vec![
        Route {
            route_id: RouteId::new("r1"),
            agency_id: AgencyId::new("a1"),
            route_short_name: Some("2".to_string()),
            route_long_name: Some("谷地頭線".to_string()),
            route_desc: None,
            route_type: 0,
            route_url: None,
            route_color: Some("E60012".to_string()),
            route_text_color: Some("FFFFFF".to_string()),
            jp_parent_route_id: None,
        },
        Route {
            route_id: RouteId::new("r2"),
            agency_id: AgencyId::new("a1"),
            route_short_name: Some("5".to_string()),
            route_long_name: Some("函館どつく線".to_string()),
            route_desc: None,
            route_type: 0,
            route_url: None,
            route_color: None,
            route_text_color: None,
            jp_parent_route_id: None,
        },
    ]);
    feed.trips = Some(vec![
        trip("t1", "r1", "weekday", Some("sh1"), 0),
        trip("t2", "r1", "weekend", Some("sh1"), 1),
        trip("t3", "r2", "weekday", None, 0),
    ]);
    feed.office_jp = Some(vec![OfficeJp {
        office_id: OfficeId::new("o1"),
        office_name: "駒場車庫".to_string(),
        office_url: None,
        office_phone: None,
    }]);
    feed.pattern_jp = Some(vec![PatternJp {
        jp_pattern_id: PatternId::new("p1"),
        route_update_date: Some("20240401".to_string()),
        origin_stop: Some("函館駅前".to_string()),
        via_stop: Some("十字街".to_string()),
        destination_stop: Some("谷地頭".to_string()),
    }]);
    feed.stop_times = Some(vec![
        stop_time("t1", "s1", 1, hms(6, 0, 0)),
        stop_time("t1", "s2", 2, hms(6, 5, 0)),
        stop_time("t1", "s3", 3, hms(6, 10, 0)),
        stop_time("t2", "s3", 1, hms(7, 0, 0)),
        stop_time("t2", "s2", 2, hms(7, 5, 0)),
        stop_time("t2", "s1", 3, hms(7, 10, 0)),
        stop_time("t3", "s1", 1, hms(8, 0, 0)),
        stop_time("t3", "s2", 2, hms(8, 6, 0)),
    ]);
    feed.calendar = Some(vec![calendar("weekday", true), calendar("weekend", false)]);
    feed.calendar_dates = Some(vec![
        CalendarDate {
            service_id: ServiceId::new("weekday"),
            date: ymd(2024, 4, 29),
            exception_type: SERVICE_REMOVED,
        },
        CalendarDate {
            service_id: ServiceId::new("weekend"),
            date: ymd(2024, 4, 29),
            exception_type: SERVICE_ADDED,
        },
    ]);
    feed.fare_attributes = Some(vec![FareAttribute {
        fare_id: FareId::new("f1"),
        price: 230.0,
        currency_type: "JPY".to_string(),
        payment_method: 0,
        transfers: Some(0),
        agency_id: None,
        transfer_duration: None,
    }]);
    feed.fare_rules = Some(vec![FareRule {
        fare_id: FareId::new("f1"),
        route_id: Some(RouteId::new("r1")),
        origin_id: Some(ZoneId::new("z1")),
        destination_id: Some(ZoneId::new("z2")),
        contains_id: None,
    }]);
    feed.shapes = Some(vec![
        shape_point(1, S1),
        shape_point(2, S2),
        shape_point(3, S3),
    ]);
    feed.frequencies = Some(vec![Frequency {
        trip_id: TripId::new("t3"),
        start_time: hms(8, 0, 0),
        end_time: hms(10, 0, 0),
        headway_secs: 1200,
        exact_times: Some(1),
    }]);
    feed.transfers = Some(vec![Transfer {
        from_stop_id: StopId::new("s1"),
        to_stop_id: StopId::new("s2"),
        transfer_type: 2,
        min_transfer_time: Some(120),
    }]);
    feed.feed_info = Some(vec![FeedInfo {
        feed_publisher_name: "函館市企業局交通部".to_string(),
        feed_publisher_url: "https://www.city.hakodate.hokkaido.jp/".to_string(),
        feed_lang: "ja".to_string(),
        feed_start_date: Some(ymd(2024, 4, 1)),
        feed_end_date: Some(ymd(2024, 4, 30)),
        feed_version: Some("2024.04".to_string()),
    }]);
    feed.translations = Some(vec![Translation {
        table_name: "stops".to_string(),
        field_name: "stop_name".to_string(),
        language: "ja-Hrkt".to_string(),
        translation: "はこだてえきまえ".to_string(),
        record_id: Some("s1".to_string()),
        record_sub_id: None,
        field_value: None,
    }]);

    feed
}
