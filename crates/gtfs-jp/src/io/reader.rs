//! Building a [`Feed`] from a directory, zip archive, or URL.

use std::path::Path;

use log::{debug, info, warn};

use crate::feed::Feed;
use crate::io::source::FeedSource;
use crate::io::table::read_rows;
use crate::models::records::Record;
use crate::models::types::{FeedError, Result};
use crate::network::DataFetcher;
use crate::schema::DistUnits;

/// How to read a feed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Units of `shape_dist_traveled` in the source files.
    pub dist_units: DistUnits,
    /// Fail on the first unparsable table instead of skipping it.
    pub strict: bool,
}

impl ReadOptions {
    pub fn new(dist_units: DistUnits) -> Self {
        Self {
            dist_units,
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

fn load_table<T: Record>(source: &mut FeedSource, options: &ReadOptions) -> Result<Option<Vec<T>>> {
    match source.read_table(T::TABLE, |r| read_rows::<T>(r)) {
        Ok(Some(rows)) if rows.is_empty() => {
            debug!("{} has no rows", T::TABLE);
            Ok(None)
        }
        Ok(Some(rows)) => {
            debug!("Read {} rows from {}", rows.len(), T::TABLE.file_name());
            Ok(Some(rows))
        }
        Ok(None) => Ok(None),
        Err(e @ FeedError::Csv { .. }) if !options.strict => {
            warn!("Skipping {}: {}", T::TABLE.file_name(), e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn load(mut source: FeedSource, options: &ReadOptions) -> Result<Feed> {
    let src = &mut source;
    let mut feed = Feed::new(options.dist_units);

    feed.agency = load_table(src, options)?;
    feed.agency_jp = load_table(src, options)?;
    feed.stops = load_table(src, options)?;
    feed.routes = load_table(src, options)?;
    feed.trips = load_table(src, options)?;
    feed.office_jp = load_table(src, options)?;
    feed.pattern_jp = load_table(src, options)?;
    feed.stop_times = load_table(src, options)?;
    feed.calendar = load_table(src, options)?;
    feed.calendar_dates = load_table(src, options)?;
    feed.fare_attributes = load_table(src, options)?;
    feed.fare_rules = load_table(src, options)?;
    feed.shapes = load_table(src, options)?;
    feed.frequencies = load_table(src, options)?;
    feed.transfers = load_table(src, options)?;
    feed.feed_info = load_table(src, options)?;
    feed.translations = load_table(src, options)?;

    info!("Loaded {} tables", feed.table_row_counts().len());
    Ok(feed)
}

/// Read a feed from a directory of GTFS-JP text files, or from a zip archive
/// holding them at its top level.
///
/// Files that are not GTFS-JP tables are ignored, as are empty files.
pub fn read_feed_from_path(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Feed> {
    let path = path.as_ref();
    info!("Reading feed from {}", path.display());
    load(FeedSource::open(path)?, options)
}

/// Read a feed from the bytes of a zip archive.
pub fn read_feed_from_bytes(bytes: Vec<u8>, options: &ReadOptions) -> Result<Feed> {
    info!("Reading feed from {} byte archive", bytes.len());
    load(FeedSource::from_bytes(bytes)?, options)
}

/// Read a feed from a local path if it exists, otherwise download it.
pub async fn read_feed(
    path_or_url: &str,
    options: &ReadOptions,
    fetcher: &dyn DataFetcher,
) -> Result<Feed> {
    let path = Path::new(path_or_url);
    if path.exists() {
        return read_feed_from_path(path, options);
    }

    info!("Fetching feed from {}", path_or_url);
    let bytes = fetcher.fetch(path_or_url).await?;
    read_feed_from_bytes(bytes, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::*;
    use crate::network::testing::MemoryFetcher;
    use crate::schema::TableName;
    use crate::testing::{sample_feed, zip_bytes};
    use std::fs;

    const STOPS: &str = "stop_id,stop_name,stop_lat,stop_lon\n\
                         s1,函館駅前,41.7737,140.7266\n";

    #[test]
    fn test_read_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stops.txt"), STOPS).unwrap();
        fs::write(dir.path().join("routes.txt"), "").unwrap();
        fs::write(dir.path().join("trips.txt"), "route_id,service_id,trip_id\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a table").unwrap();

        let feed = read_feed_from_path(dir.path(), &ReadOptions::new(DistUnits::Km)).unwrap();

        assert_eq!(feed.dist_units(), DistUnits::Km);
        assert_eq!(feed.stops.as_ref().map(Vec::len), Some(1));
        assert!(feed.routes.is_none());
        assert!(feed.trips.is_none()); // header only
        assert_eq!(feed.table_row_counts(), vec![(TableName::Stops, 1)]);
    }

    #[test]
    fn test_read_archive() {
        let bytes = zip_bytes(&[
            ("stops.txt", STOPS),
            ("office_jp.txt", "office_id,office_name\no1,函館営業所\n"),
        ]);
        let feed = read_feed_from_bytes(bytes, &ReadOptions::default()).unwrap();

        assert_eq!(feed.dist_units(), DistUnits::M);
        let office = &feed.office_jp.as_ref().unwrap()[0];
        assert_eq!(office.office_id, OfficeId::new("o1"));
        assert_eq!(office.office_name, "函館営業所");
    }

    #[test]
    fn test_lenient_skips_bad_tables() {
        let bytes = zip_bytes(&[
            ("stops.txt", STOPS),
            ("routes.txt", "route_id,agency_id,route_type\nr1,a1,tram\n"),
        ]);

        let feed = read_feed_from_bytes(bytes.clone(), &ReadOptions::default()).unwrap();
        assert!(feed.stops.is_some());
        assert!(feed.routes.is_none());

        let err = read_feed_from_bytes(bytes, &ReadOptions::default().strict(true)).unwrap_err();
        assert!(matches!(err, FeedError::Csv { table: TableName::Routes, line: Some(2), .. }));
    }

    #[test]
    fn test_blank_defaulted_cells_keep_tables() {
        let bytes = zip_bytes(&[
            (
                "agency.txt",
                "agency_id,agency_name,agency_url,agency_timezone,agency_lang\n\
                 a1,函館市企業局交通部,https://www.city.hakodate.hokkaido.jp/,Asia/Tokyo,\n",
            ),
            ("routes.txt", "route_id,agency_id,route_long_name,route_type\nr2,a1,支線,\n"),
        ]);

        let feed = read_feed_from_bytes(bytes, &ReadOptions::default().strict(true)).unwrap();
        assert_eq!(feed.agency.as_ref().unwrap()[0].agency_lang, "ja");
        assert_eq!(feed.routes.as_ref().unwrap()[0].route_type, 3);
    }

    #[test]
    fn test_missing_path() {
        let err = read_feed_from_path("/no/such/feed.zip", &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, FeedError::PathNotFound(_)));
    }

    #[test]
    fn test_round_trip_through_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keifuku_rosen.zip");
        let feed = sample_feed();

        feed.to_file(&path, None).unwrap();
        let again = read_feed_from_path(&path, &ReadOptions::default()).unwrap();

        assert_eq!(feed, again);
    }

    #[tokio::test]
    async fn test_read_feed_prefers_local_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stops.txt"), STOPS).unwrap();
        let fetcher = MemoryFetcher::default();

        let path = dir.path().to_string_lossy().into_owned();
        let feed = read_feed(&path, &ReadOptions::default(), &fetcher).await.unwrap();

        assert!(feed.stops.is_some());
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn test_read_feed_downloads_url() {
        let url = "https://example.com/gtfs/hakodate_shiden.zip";
        let fetcher = MemoryFetcher::default().with(url, zip_bytes(&[("stops.txt", STOPS)]));

        let feed = read_feed(url, &ReadOptions::default(), &fetcher).await.unwrap();

        assert_eq!(feed.stops.as_ref().map(Vec::len), Some(1));
        assert_eq!(fetcher.requested(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn test_read_feed_propagates_fetch_errors() {
        let fetcher = MemoryFetcher::default();
        let err = read_feed("https://example.com/missing.zip", &ReadOptions::default(), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Fetch { .. }));
    }
}
