//! A one-screen overview of a feed.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::feed::Feed;
use crate::schema::DistUnits;

/// Indicators describing a feed, as returned by [`Feed::describe`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedSummary {
    pub agencies: Vec<String>,
    pub timezone: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub dist_units: DistUnits,
    pub num_routes: usize,
    pub num_trips: usize,
    pub num_stops: usize,
    pub num_shapes: usize,
    pub num_offices: usize,
    pub num_patterns: usize,
    /// Busiest date of the first week.
    pub sample_date: Option<NaiveDate>,
    pub num_trips_on_sample_date: usize,
}

fn len<T>(table: &Option<Vec<T>>) -> usize {
    table.as_ref().map_or(0, Vec::len)
}

impl Feed {
    pub fn describe(&self) -> FeedSummary {
        let dates = self.get_dates();
        let sample_date = self.compute_busiest_date(&self.get_first_week());

        let mut shape_ids: Vec<_> = self.shapes.iter().flatten().map(|s| &s.shape_id).collect();
        shape_ids.sort();
        shape_ids.dedup();

        FeedSummary {
            agencies: self
                .agency
                .iter()
                .flatten()
                .map(|a| a.agency_name.clone())
                .collect(),
            timezone: self
                .agency
                .iter()
                .flatten()
                .next()
                .map(|a| a.agency_timezone.clone()),
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
            dist_units: self.dist_units(),
            num_routes: len(&self.routes),
            num_trips: len(&self.trips),
            num_stops: len(&self.stops),
            num_shapes: shape_ids.len(),
            num_offices: len(&self.office_jp),
            num_patterns: len(&self.pattern_jp),
            sample_date,
            num_trips_on_sample_date: sample_date.map_or(0, |d| self.get_trips(Some(d)).len()),
        }
    }
}

impl fmt::Display for FeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.format("%Y%m%d").to_string());

        let rows: [(&str, String); 13] = [
            ("agencies", self.agencies.join(", ")),
            ("timezone", self.timezone.clone().unwrap_or_else(|| "-".to_string())),
            ("start_date", date(self.start_date)),
            ("end_date", date(self.end_date)),
            ("dist_units", self.dist_units.to_string()),
            ("num_routes", self.num_routes.to_string()),
            ("num_trips", self.num_trips.to_string()),
            ("num_stops", self.num_stops.to_string()),
            ("num_shapes", self.num_shapes.to_string()),
            ("num_offices", self.num_offices.to_string()),
            ("num_patterns", self.num_patterns.to_string()),
            ("sample_date", date(self.sample_date)),
            ("num_trips_on_sample_date", self.num_trips_on_sample_date.to_string()),
        ];

        let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        writeln!(f, "{:<width$}  value", "indicator")?;
        for (name, value) in rows {
            writeln!(f, "{:<width$}  {}", name, value)?;
        }
        Ok(())
    }
}
