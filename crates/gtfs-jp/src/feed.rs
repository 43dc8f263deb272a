//! The [`Feed`] container: one optional table per GTFS-JP file.
//!
//! A `Feed` need not be a valid GTFS-JP feed; use
//! [`validate`](crate::validation::validate) to check it. Beware that
//! stop_times can be large (millions of rows for a week of bus service).
//!
//! Analysis operations are spread over several modules as extra `impl Feed`
//! blocks: [`schedule`](crate::schedule), [`geometry`](crate::geometry),
//! [`subset`](crate::subset), [`summary`](crate::summary) and
//! [`export`](crate::export).

use std::fmt;

use serde::Serialize;

use crate::io::table::{encode_rows, populated_columns};
use crate::models::records::*;
use crate::models::types::Result;
use crate::schema::{DistUnits, FieldKind, TableName};

/// Rows shown per table by `Display`.
const PREVIEW_ROWS: usize = 5;

#[derive(Clone, Debug, Default)]
pub struct Feed {
    dist_units: DistUnits,

    pub agency: Option<Vec<Agency>>,
    pub agency_jp: Option<Vec<AgencyJp>>,
    pub stops: Option<Vec<Stop>>,
    pub routes: Option<Vec<Route>>,
    pub trips: Option<Vec<Trip>>,
    pub office_jp: Option<Vec<OfficeJp>>,
    pub pattern_jp: Option<Vec<PatternJp>>,
    pub stop_times: Option<Vec<StopTime>>,
    pub calendar: Option<Vec<Calendar>>,
    pub calendar_dates: Option<Vec<CalendarDate>>,
    pub fare_attributes: Option<Vec<FareAttribute>>,
    pub fare_rules: Option<Vec<FareRule>>,
    pub shapes: Option<Vec<Shape>>,
    pub frequencies: Option<Vec<Frequency>>,
    pub transfers: Option<Vec<Transfer>>,
    pub feed_info: Option<Vec<FeedInfo>>,
    pub translations: Option<Vec<Translation>>,
}

/// Visits every table of a feed in [`TableName`] order.
pub trait TableVisitor {
    fn visit<T: Record>(&mut self, rows: Option<&[T]>) -> Result<()>;
}

/// One column of a present table, as reported by [`Feed::list_fields`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldInfo {
    pub table: TableName,
    pub column: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// At least one row has a value in this column.
    pub populated: bool,
}

impl Feed {
    /// An empty feed with the given distance units.
    pub fn new(dist_units: DistUnits) -> Self {
        Self {
            dist_units,
            ..Self::default()
        }
    }

    pub fn dist_units(&self) -> DistUnits {
        self.dist_units
    }

    /// Set the distance units by name, without converting any distances.
    pub fn set_dist_units(&mut self, name: &str) -> Result<()> {
        self.dist_units = DistUnits::from_name(name)?;
        Ok(())
    }

    pub fn visit_tables<V: TableVisitor>(&self, visitor: &mut V) -> Result<()> {
        visitor.visit(self.agency.as_deref())?;
        visitor.visit(self.agency_jp.as_deref())?;
        visitor.visit(self.stops.as_deref())?;
        visitor.visit(self.routes.as_deref())?;
        visitor.visit(self.trips.as_deref())?;
        visitor.visit(self.office_jp.as_deref())?;
        visitor.visit(self.pattern_jp.as_deref())?;
        visitor.visit(self.stop_times.as_deref())?;
        visitor.visit(self.calendar.as_deref())?;
        visitor.visit(self.calendar_dates.as_deref())?;
        visitor.visit(self.fare_attributes.as_deref())?;
        visitor.visit(self.fare_rules.as_deref())?;
        visitor.visit(self.shapes.as_deref())?;
        visitor.visit(self.frequencies.as_deref())?;
        visitor.visit(self.transfers.as_deref())?;
        visitor.visit(self.feed_info.as_deref())?;
        visitor.visit(self.translations.as_deref())?;
        Ok(())
    }

    /// (table, row count) for every present table.
    pub fn table_row_counts(&self) -> Vec<(TableName, usize)> {
        struct Counter(Vec<(TableName, usize)>);

        impl TableVisitor for Counter {
            fn visit<T: Record>(&mut self, rows: Option<&[T]>) -> Result<()> {
                if let Some(rows) = rows {
                    self.0.push((T::TABLE, rows.len()));
                }
                Ok(())
            }
        }

        let mut counter = Counter(Vec::new());
        // Counting never fails
        let _ = self.visit_tables(&mut counter);
        counter.0
    }

    pub fn has_table(&self, table: TableName) -> bool {
        self.table_row_counts().iter().any(|(t, _)| *t == table)
    }

    /// Describe every column of every present table.
    pub fn list_fields(&self) -> Result<Vec<FieldInfo>> {
        struct Lister(Vec<FieldInfo>);

        impl TableVisitor for Lister {
            fn visit<T: Record>(&mut self, rows: Option<&[T]>) -> Result<()> {
                let Some(rows) = rows else {
                    return Ok(());
                };
                let populated = populated_columns(rows)?;
                self.0.extend(T::TABLE.columns().iter().map(|c| FieldInfo {
                    table: T::TABLE,
                    column: c.name,
                    kind: c.kind,
                    required: c.required,
                    populated: populated.contains(c.name),
                }));
                Ok(())
            }
        }

        let mut lister = Lister(Vec::new());
        self.visit_tables(&mut lister)?;
        Ok(lister.0)
    }

    /// Rescale every `shape_dist_traveled` into `new_units`.
    pub fn convert_dist(&mut self, new_units: DistUnits) {
        let old_units = self.dist_units;
        if old_units == new_units {
            return;
        }

        let convert = |d: &mut Option<f64>| {
            if let Some(value) = d {
                *value = old_units.convert(*value, new_units);
            }
        };
        for shape in self.shapes.iter_mut().flatten() {
            convert(&mut shape.shape_dist_traveled);
        }
        for stop_time in self.stop_times.iter_mut().flatten() {
            convert(&mut stop_time.shape_dist_traveled);
        }
        self.dist_units = new_units;
    }
}

/// Compare tables ignoring row order.
fn same_rows<T: Record>(a: &Option<Vec<T>>, b: &Option<Vec<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return false;
            }
            fn canonical<T: Record>(rows: &[T]) -> Vec<(String, &T)> {
                let mut keyed: Vec<(String, &T)> =
                    rows.iter().map(|r| (format!("{:?}", r), r)).collect();
                keyed.sort_by(|x, y| x.0.cmp(&y.0));
                keyed
            }
            canonical(a)
                .iter()
                .zip(canonical(b).iter())
                .all(|(x, y)| x.1 == y.1)
        }
        _ => false,
    }
}

impl PartialEq for Feed {
    fn eq(&self, other: &Self) -> bool {
        self.dist_units == other.dist_units
            && same_rows(&self.agency, &other.agency)
            && same_rows(&self.agency_jp, &other.agency_jp)
            && same_rows(&self.stops, &other.stops)
            && same_rows(&self.routes, &other.routes)
            && same_rows(&self.trips, &other.trips)
            && same_rows(&self.office_jp, &other.office_jp)
            && same_rows(&self.pattern_jp, &other.pattern_jp)
            && same_rows(&self.stop_times, &other.stop_times)
            && same_rows(&self.calendar, &other.calendar)
            && same_rows(&self.calendar_dates, &other.calendar_dates)
            && same_rows(&self.fare_attributes, &other.fare_attributes)
            && same_rows(&self.fare_rules, &other.fare_rules)
            && same_rows(&self.shapes, &other.shapes)
            && same_rows(&self.frequencies, &other.frequencies)
            && same_rows(&self.transfers, &other.transfers)
            && same_rows(&self.feed_info, &other.feed_info)
            && same_rows(&self.translations, &other.translations)
    }
}

impl fmt::Display for Feed {
    /// The first five rows of each table, as CSV.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Preview<'a, 'b>(&'a mut fmt::Formatter<'b>);

        impl TableVisitor for Preview<'_, '_> {
            fn visit<T: Record>(&mut self, rows: Option<&[T]>) -> Result<()> {
                let body = match rows {
                    Some(rows) => {
                        let head = &rows[..rows.len().min(PREVIEW_ROWS)];
                        let text = String::from_utf8_lossy(&encode_rows(head)?).into_owned();
                        format!("{} rows\n\t{}", rows.len(), text.trim_end().replace('\n', "\n\t"))
                    }
                    None => "None".to_string(),
                };
                writeln!(self.0, "* {} --------------------\n\t{}", T::TABLE, body)
                    .map_err(|e| crate::models::types::FeedError::InvalidData(e.to_string()))
            }
        }

        self.visit_tables(&mut Preview(f)).map_err(|_| fmt::Error)?;
        write!(f, "* dist_units --------------------\n\t{}", self.dist_units)
    }
}
