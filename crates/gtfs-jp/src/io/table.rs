//! CSV encoding and decoding of a single table.

use std::collections::HashSet;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim, Writer};

use crate::models::records::Record;
use crate::models::types::{FeedError, Result};

/// Cell values read as missing (after trimming, so `" "` is covered by `""`).
pub const NA_VALUES: &[&str] = &["", "nan", "NaN", "null"];

fn is_na(value: &str) -> bool {
    NA_VALUES.contains(&value)
}

/// Strip a UTF-8 byte order mark and surrounding whitespace.
pub(crate) fn clean_column_name(name: &str) -> &str {
    name.trim_start_matches('\u{feff}').trim()
}

/// Decode every row of a table.
pub(crate) fn read_rows<T: Record>(reader: impl Read) -> Result<Vec<T>> {
    let table = T::TABLE;
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: StringRecord = rdr
        .headers()
        .map_err(|e| FeedError::csv(table, &e))?
        .iter()
        .map(clean_column_name)
        .collect();
    rdr.set_headers(headers.clone());

    let mut rows = Vec::new();
    let mut raw = StringRecord::new();
    while rdr.read_record(&mut raw).map_err(|e| FeedError::csv(table, &e))? {
        if raw.iter().all(is_na) {
            continue;
        }
        let cleaned: StringRecord = raw
            .iter()
            .map(|field| if is_na(field) { "" } else { field })
            .collect();

        let row = cleaned.deserialize(Some(&headers)).map_err(|e| {
            let line = raw.position().map(|p| p.line());
            FeedError::Csv {
                table,
                line,
                message: match line {
                    Some(line) => format!("line {}: {}", line, e),
                    None => e.to_string(),
                },
            }
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Encode rows as CSV text with a header line. No rows gives no bytes.
pub(crate) fn encode_rows<T: Record>(rows: &[T]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut wtr = Writer::from_writer(&mut buf);
        for row in rows {
            wtr.serialize(row).map_err(|e| FeedError::csv(T::TABLE, &e))?;
        }
        wtr.flush()?;
    }
    Ok(buf)
}

/// Names of the columns holding a value in at least one row.
pub(crate) fn populated_columns<T: Record>(rows: &[T]) -> Result<HashSet<&'static str>> {
    let encoded = encode_rows(rows)?;
    let mut rdr = ReaderBuilder::new().from_reader(encoded.as_slice());
    let headers = rdr.headers().map_err(|e| FeedError::csv(T::TABLE, &e))?.clone();

    let mut populated = vec![false; headers.len()];
    for record in rdr.records() {
        let record = record.map_err(|e| FeedError::csv(T::TABLE, &e))?;
        for (i, field) in record.iter().enumerate() {
            if !field.is_empty() {
                populated[i] = true;
            }
        }
    }

    Ok(T::TABLE
        .columns()
        .iter()
        .filter(|c| {
            headers
                .iter()
                .position(|h| h == c.name)
                .is_some_and(|i| populated[i])
        })
        .map(|c| c.name)
        .collect())
}
