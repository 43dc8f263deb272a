//! Dates covered by a feed and the services and trips active on them.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};

use crate::feed::Feed;
use crate::identifiers::ServiceId;
use crate::models::calendar::ServiceCalendar;
use crate::models::records::Trip;
use crate::models::types::{FeedError, GtfsTime, Result};

impl Feed {
    /// Every date from the first to the last date mentioned in calendar or
    /// calendar_dates, inclusive.
    pub fn get_dates(&self) -> Vec<NaiveDate> {
        let calendar_bounds = self
            .calendar
            .iter()
            .flatten()
            .flat_map(|c| [c.start_date, c.end_date]);
        let exception_dates = self.calendar_dates.iter().flatten().map(|d| d.date);

        let mut mentioned = calendar_bounds.chain(exception_dates);
        let Some(first) = mentioned.next() else {
            return Vec::new();
        };
        let (start, end) = mentioned.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));

        start.iter_days().take_while(|d| *d <= end).collect()
    }

    /// The `k`-th Monday to Sunday week of [`get_dates`](Self::get_dates),
    /// counting from 1 at the first Monday.
    ///
    /// The last week of the range may be cut short. Weeks past the end of the
    /// range are empty.
    pub fn get_week(&self, k: usize) -> Result<Vec<NaiveDate>> {
        if k < 1 {
            return Err(FeedError::InvalidData(format!(
                "Week number must be at least 1; got {}",
                k
            )));
        }

        let dates = self.get_dates();
        let Some(first_monday) = dates.iter().position(|d| d.weekday() == Weekday::Mon) else {
            return Ok(Vec::new());
        };

        let start = first_monday + 7 * (k - 1);
        if start >= dates.len() {
            return Ok(Vec::new());
        }
        let end = (start + 7).min(dates.len());
        Ok(dates[start..end].to_vec())
    }

    pub fn get_first_week(&self) -> Vec<NaiveDate> {
        // k = 1 is always accepted
        self.get_week(1).unwrap_or_default()
    }

    /// The given dates that fall within the feed's date range, in input order.
    pub fn subset_dates(&self, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        let covered: HashSet<NaiveDate> = self.get_dates().into_iter().collect();
        dates.iter().copied().filter(|d| covered.contains(d)).collect()
    }

    /// One [`ServiceCalendar`] per service id found in either calendar table.
    pub fn service_calendars(&self) -> BTreeMap<ServiceId, ServiceCalendar> {
        ServiceCalendar::from_tables(
            self.calendar.as_deref().unwrap_or_default(),
            self.calendar_dates.as_deref().unwrap_or_default(),
        )
    }

    /// Service ids running on `date`, sorted.
    pub fn get_active_services(&self, date: NaiveDate) -> Vec<ServiceId> {
        self.service_calendars()
            .into_values()
            .filter(|c| c.runs_on(date))
            .map(|c| c.service_id)
            .collect()
    }

    /// Trips running on `date`, or every trip if no date is given.
    pub fn get_trips(&self, date: Option<NaiveDate>) -> Vec<&Trip> {
        let trips = self.trips.iter().flatten();
        match date {
            None => trips.collect(),
            Some(date) => {
                let active: HashSet<ServiceId> = self.get_active_services(date).into_iter().collect();
                trips.filter(|t| active.contains(&t.service_id)).collect()
            }
        }
    }

    /// The date with the most active trips; ties go to the earliest date.
    pub fn compute_busiest_date(&self, dates: &[NaiveDate]) -> Option<NaiveDate> {
        let calendars = self.service_calendars();
        let trips = self.trips.as_deref().unwrap_or_default();

        let trip_count = |date: NaiveDate| {
            trips
                .iter()
                .filter(|t| calendars.get(&t.service_id).is_some_and(|c| c.runs_on(date)))
                .count()
        };

        dates
            .iter()
            .map(|&d| (trip_count(d), d))
            .max_by(|(na, da), (nb, db)| na.cmp(nb).then(db.cmp(da)))
            .map(|(_, d)| d)
    }

    /// Earliest departure and latest arrival over the stop times of the trips
    /// active on `date` (or of all trips).
    pub fn get_start_and_end_times(&self, date: Option<NaiveDate>) -> Option<(GtfsTime, GtfsTime)> {
        let active: HashSet<_> = self.get_trips(date).into_iter().map(|t| &t.trip_id).collect();
        let stop_times = self
            .stop_times
            .iter()
            .flatten()
            .filter(|st| active.contains(&st.trip_id));

        let mut start: Option<GtfsTime> = None;
        let mut end: Option<GtfsTime> = None;
        for st in stop_times {
            if let Some(departure) = st.departure_time {
                start = Some(start.map_or(departure, |s| s.min(departure)));
            }
            if let Some(arrival) = st.arrival_time {
                end = Some(end.map_or(arrival, |e| e.max(arrival)));
            }
        }
        start.zip(end)
    }
}
