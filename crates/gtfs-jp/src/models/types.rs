//! Core data types, enums, and errors for GTFS-JP data.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::schema::TableName;

// ============================================================================
// Enums
// ============================================================================

/// GTFS route types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RouteType {
    Tram = 0,
    Subway = 1,
    Rail = 2,
    Bus = 3,
    Ferry = 4,
    CableTram = 5,
    AerialLift = 6,
    Funicular = 7,
    Trolleybus = 11,
    Monorail = 12,
}

impl RouteType {
    pub fn from_gtfs(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Tram),
            1 => Some(Self::Subway),
            2 => Some(Self::Rail),
            3 => Some(Self::Bus),
            4 => Some(Self::Ferry),
            5 => Some(Self::CableTram),
            6 => Some(Self::AerialLift),
            7 => Some(Self::Funicular),
            11 => Some(Self::Trolleybus),
            12 => Some(Self::Monorail),
            _ => None,
        }
    }
}

/// Trip direction (0 = outbound, 1 = inbound per GTFS)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectionId {
    Outbound = 0,
    Inbound = 1,
}

impl DirectionId {
    pub fn from_gtfs(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Outbound),
            1 => Some(Self::Inbound),
            _ => None,
        }
    }
}

/// calendar_dates.txt exception_type values
pub const SERVICE_ADDED: u8 = 1;
pub const SERVICE_REMOVED: u8 = 2;

// ============================================================================
// Times and dates
// ============================================================================

/// A GTFS clock time, stored as seconds since the start of the service day.
///
/// Times can exceed 24 hours for trips past midnight
/// (e.g., 25:30:00 = 91800 seconds for 1:30am the next day).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GtfsTime(u32);

impl GtfsTime {
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }
}

impl FromStr for GtfsTime {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FeedError::InvalidData(format!("Invalid GTFS time: {:?}", s));

        let mut parts = s.trim().split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let hours: u32 = h.parse().map_err(|_| invalid())?;
        let minutes: u32 = m.parse().map_err(|_| invalid())?;
        let seconds: u32 = sec.parse().map_err(|_| invalid())?;
        if m.len() != 2 || sec.len() != 2 || minutes > 59 || seconds > 59 {
            return Err(invalid());
        }

        Ok(Self::from_hms(hours, minutes, seconds))
    }
}

impl fmt::Display for GtfsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0 / 3600,
            (self.0 % 3600) / 60,
            self.0 % 60
        )
    }
}

impl Serialize for GtfsTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GtfsTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Serde adapter for `YYYYMMDD` dates.
pub mod gtfs_date {
    use chrono::NaiveDate;
    use serde::de::{self, Deserialize, Deserializer};
    use serde::Serializer;

    pub const FORMAT: &str = "%Y%m%d";

    pub fn parse(s: &str) -> Result<NaiveDate, chrono::ParseError> {
        NaiveDate::parse_from_str(s.trim(), FORMAT)
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(|e| de::Error::custom(format!("invalid date {:?}: {}", s, e)))
    }

    /// Same format for optional columns; an empty cell is `None`.
    pub mod option {
        use chrono::NaiveDate;
        use serde::de::{self, Deserialize, Deserializer};
        use serde::Serializer;

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if !s.trim().is_empty() => super::parse(&s)
                    .map(Some)
                    .map_err(|e| de::Error::custom(format!("invalid date {:?}: {}", s, e))),
                _ => Ok(None),
            }
        }
    }
}

/// Rejects blank cells in required text columns.
pub(crate) fn non_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    if s.trim().is_empty() {
        return Err(de::Error::custom("required value is empty"));
    }
    Ok(s)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Path {0} does not exist")]
    PathNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to parse {table}: {message}")]
    Csv {
        table: TableName,
        line: Option<u64>,
        message: String,
    },

    #[error("Distance units are required and must lie in {valid}; got {given:?}")]
    InvalidDistUnits { given: String, valid: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
}

impl FeedError {
    pub(crate) fn csv(table: TableName, err: &csv::Error) -> Self {
        Self::Csv {
            table,
            line: err.position().map(|p| p.line()),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
