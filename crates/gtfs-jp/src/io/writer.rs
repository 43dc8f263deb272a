//! Writing a [`Feed`] back out as GTFS-JP text files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::feed::{Feed, TableVisitor};
use crate::io::table::encode_rows;
use crate::models::records::Record;
use crate::models::types::Result;

/// Encodes every non-empty table, rounding floats if asked to.
struct Encoder {
    ndigits: Option<u32>,
    files: Vec<(String, Vec<u8>)>,
}

impl TableVisitor for Encoder {
    fn visit<T: Record>(&mut self, rows: Option<&[T]>) -> Result<()> {
        let Some(rows) = rows.filter(|r| !r.is_empty()) else {
            return Ok(());
        };

        let bytes = match self.ndigits {
            Some(ndigits) => {
                let mut rounded = rows.to_vec();
                rounded.iter_mut().for_each(|r| r.round_floats(ndigits));
                encode_rows(&rounded)?
            }
            None => encode_rows(rows)?,
        };

        debug!("Encoded {} rows of {}", rows.len(), T::TABLE);
        self.files.push((T::TABLE.file_name(), bytes));
        Ok(())
    }
}

impl Feed {
    /// Write this feed to `path`.
    ///
    /// A path ending in `.zip` gets a zip archive; any other path is treated
    /// as a directory (created if missing) that receives one file per table.
    /// Absent and empty tables are not written. Floats are rounded to
    /// `ndigits` decimal places when given; distances stay in
    /// [`Feed::dist_units`].
    pub fn to_file(&self, path: impl AsRef<Path>, ndigits: Option<u32>) -> Result<()> {
        let path = path.as_ref();
        let mut encoder = Encoder {
            ndigits,
            files: Vec::new(),
        };
        self.visit_tables(&mut encoder)?;

        let zipped = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

        if zipped {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, bytes) in &encoder.files {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(bytes)?;
            }
            zip.finish()?.flush()?;
        } else {
            fs::create_dir_all(path)?;
            for (name, bytes) in &encoder.files {
                fs::write(path.join(name), bytes)?;
            }
        }

        info!("Wrote {} tables to {}", encoder.files.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::io::reader::{read_feed_from_path, ReadOptions};
    use crate::io::source::list_feed;
    use crate::schema::DistUnits;
    use crate::testing::sample_feed;
    use approx::assert_relative_eq;
    use std::fs;

    #[test]
    fn test_write_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("feed");
        let mut feed = sample_feed();
        feed.transfers = Some(Vec::new());
        feed.translations = None;

        feed.to_file(&out, None).unwrap();

        let names: Vec<String> = list_feed(&out).unwrap().into_iter().map(|e| e.file_name).collect();
        assert_eq!(names.len(), 15);
        assert!(names.contains(&"pattern_jp.txt".to_string()));
        assert!(!names.contains(&"transfers.txt".to_string()));
        assert!(!names.contains(&"translations.txt".to_string()));

        let trips = fs::read_to_string(out.join("trips.txt")).unwrap();
        assert!(trips.starts_with("route_id,service_id,trip_id,trip_headsign"));
        assert!(trips.lines().next().unwrap().ends_with("jp_office_id,jp_pattern_id"));
    }

    #[test]
    fn test_write_rounds_floats() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rounded");
        let mut feed = sample_feed();
        feed.stops.as_mut().unwrap()[0].stop_lat = 41.773_712_345;

        feed.to_file(&out, Some(4)).unwrap();
        let again = read_feed_from_path(&out, &ReadOptions::new(DistUnits::M)).unwrap();

        assert_relative_eq!(again.stops.as_ref().unwrap()[0].stop_lat, 41.7737);
        // The in-memory feed is untouched
        assert_relative_eq!(feed.stops.as_ref().unwrap()[0].stop_lat, 41.773_712_345);
    }

    #[test]
    fn test_write_zip_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("keifuku_rosen.zip");

        sample_feed().to_file(&out, None).unwrap();

        let entries = list_feed(&out).unwrap();
        assert_eq!(entries.len(), 17);
        assert!(entries.iter().all(|e| e.file_name.ends_with(".txt") && e.file_size > 0));
    }
}
