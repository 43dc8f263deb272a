//! Service calendar for determining when trips run.
//!
//! Implements GTFS calendar.txt and calendar_dates.txt logic.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashSet};

use crate::identifiers::ServiceId;
use crate::models::records::{Calendar, CalendarDate};
use crate::models::types::{SERVICE_ADDED, SERVICE_REMOVED};

/// Determines which days a transit service operates
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceCalendar {
    pub service_id: ServiceId,

    // Regular schedule; `None` when the service only exists in calendar_dates.txt
    pub period: Option<(NaiveDate, NaiveDate)>,
    pub weekdays: WeekdayFlags,

    // Exception dates
    pub added_dates: HashSet<NaiveDate>,   // Service runs on these dates
    pub removed_dates: HashSet<NaiveDate>, // Service does not run on these dates
}

/// Compact representation of which weekdays a service runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdayFlags {
    pub(crate) flags: u8,
}

impl WeekdayFlags {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn set(&mut self, weekday: Weekday) {
        self.flags |= 1 << weekday.number_from_monday();
    }

    pub fn unset(&mut self, weekday: Weekday) {
        self.flags &= !(1 << weekday.number_from_monday());
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.flags & (1 << weekday.number_from_monday())) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.flags == 0
    }

    pub fn from_bools(mon: bool, tue: bool, wed: bool, thu: bool, fri: bool, sat: bool, sun: bool) -> Self {
        let mut flags = Self::new();
        if mon { flags.set(Weekday::Mon); }
        if tue { flags.set(Weekday::Tue); }
        if wed { flags.set(Weekday::Wed); }
        if thu { flags.set(Weekday::Thu); }
        if fri { flags.set(Weekday::Fri); }
        if sat { flags.set(Weekday::Sat); }
        if sun { flags.set(Weekday::Sun); }
        flags
    }
}

impl From<&Calendar> for WeekdayFlags {
    fn from(row: &Calendar) -> Self {
        let [mon, tue, wed, thu, fri, sat, sun] = row.day_flags().map(|f| f == 1);
        Self::from_bools(mon, tue, wed, thu, fri, sat, sun)
    }
}

impl ServiceCalendar {
    /// A service with no regular schedule and no exceptions.
    pub fn empty(service_id: ServiceId) -> Self {
        Self {
            service_id,
            period: None,
            weekdays: WeekdayFlags::new(),
            added_dates: HashSet::new(),
            removed_dates: HashSet::new(),
        }
    }

    /// Check if the service runs on a given date
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        // Check explicit additions first
        if self.added_dates.contains(&date) {
            return true;
        }

        // Check explicit removals
        if self.removed_dates.contains(&date) {
            return false;
        }

        // Check regular schedule
        match self.period {
            Some((start, end)) if start <= date && date <= end => {
                self.weekdays.contains(date.weekday())
            }
            _ => false,
        }
    }

    /// Build one calendar per service id from both calendar tables.
    ///
    /// Exception rows with an unknown `exception_type` are ignored.
    pub fn from_tables(
        calendar: &[Calendar],
        calendar_dates: &[CalendarDate],
    ) -> BTreeMap<ServiceId, ServiceCalendar> {
        let mut services: BTreeMap<ServiceId, ServiceCalendar> = BTreeMap::new();

        for row in calendar {
            let entry = services
                .entry(row.service_id.clone())
                .or_insert_with(|| Self::empty(row.service_id.clone()));
            entry.period = Some((row.start_date, row.end_date));
            entry.weekdays = WeekdayFlags::from(row);
        }

        for row in calendar_dates {
            let entry = services
                .entry(row.service_id.clone())
                .or_insert_with(|| Self::empty(row.service_id.clone()));
            match row.exception_type {
                SERVICE_ADDED => {
                    entry.added_dates.insert(row.date);
                }
                SERVICE_REMOVED => {
                    entry.removed_dates.insert(row.date);
                }
                _ => {}
            }
        }

        services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekday_flags() {
        let mut flags = WeekdayFlags::new();
        flags.set(Weekday::Mon);
        flags.set(Weekday::Wed);
        flags.set(Weekday::Sun);

        assert!(flags.contains(Weekday::Mon));
        assert!(!flags.contains(Weekday::Tue));
        assert!(flags.contains(Weekday::Sun));

        flags.unset(Weekday::Sun);
        assert!(!flags.contains(Weekday::Sun));
    }

    #[test]
    fn test_service_calendar() {
        let calendar = ServiceCalendar {
            service_id: ServiceId::new("平日"),
            period: Some((ymd(2024, 1, 1), ymd(2024, 12, 31))),
            weekdays: WeekdayFlags::from_bools(true, true, true, true, true, false, false),
            added_dates: HashSet::from([
                ymd(2024, 1, 6), // Add a Saturday
            ]),
            removed_dates: HashSet::from([
                ymd(2024, 1, 1), // Remove New Year's Day (Monday)
            ]),
        };

        // Regular weekday
        assert!(calendar.runs_on(ymd(2024, 1, 2))); // Tuesday

        // Weekend
        assert!(!calendar.runs_on(ymd(2024, 1, 7))); // Sunday

        // Removed date
        assert!(!calendar.runs_on(ymd(2024, 1, 1))); // Monday but removed

        // Added date
        assert!(calendar.runs_on(ymd(2024, 1, 6))); // Saturday and added

        // Out of range
        assert!(!calendar.runs_on(ymd(2025, 1, 1)));
    }

    #[test]
    fn test_from_tables() {
        let calendar = vec![Calendar {
            service_id: ServiceId::new("weekday"),
            monday: 1,
            tuesday: 1,
            wednesday: 1,
            thursday: 1,
            friday: 1,
            saturday: 0,
            sunday: 0,
            start_date: ymd(2024, 4, 1),
            end_date: ymd(2024, 4, 30),
        }];
        let calendar_dates = vec![
            CalendarDate {
                service_id: ServiceId::new("weekday"),
                date: ymd(2024, 4, 29), // Showa Day
                exception_type: SERVICE_REMOVED,
            },
            CalendarDate {
                service_id: ServiceId::new("holiday"),
                date: ymd(2024, 4, 29),
                exception_type: SERVICE_ADDED,
            },
        ];

        let services = ServiceCalendar::from_tables(&calendar, &calendar_dates);
        assert_eq!(services.len(), 2);

        let weekday = &services[&ServiceId::new("weekday")];
        assert!(weekday.runs_on(ymd(2024, 4, 30)));
        assert!(!weekday.runs_on(ymd(2024, 4, 29)));

        let holiday = &services[&ServiceId::new("holiday")];
        assert_eq!(holiday.period, None);
        assert!(holiday.runs_on(ymd(2024, 4, 29)));
        assert!(!holiday.runs_on(ymd(2024, 4, 30)));
    }
}
