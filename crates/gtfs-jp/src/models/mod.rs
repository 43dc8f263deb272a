//! GTFS-JP records, value types, and the service calendar.

pub mod calendar;
pub mod records;
pub mod types;

// Re-exports for convenience
pub use calendar::{ServiceCalendar, WeekdayFlags};
pub use records::*;
pub use types::{gtfs_date, DirectionId, FeedError, GtfsTime, Result, RouteType};
