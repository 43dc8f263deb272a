use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use geo::Point;
use gtfs_jp_kit::models::gtfs_date;
use gtfs_jp_kit::prelude::*;
use std::path::{Path, PathBuf};

mod output;

use output::{print_json, write_geojson};

#[derive(Parser, Debug)]
#[command(
    name = "gtfs-jp",
    author,
    version,
    about = "Inspect, validate, and convert GTFS-JP feeds",
    long_about = "Reads GTFS-JP feeds (the Japanese extension of GTFS) from a directory, \
                  a zip archive, or a URL, and reports on their contents.\n\n\
                  Feed arguments that do not exist relative to the working directory are \
                  looked up in the data directory. Anything else that looks like a URL is \
                  downloaded."
)]
struct Cli {
    /// Directory searched for feeds given by name
    #[arg(long, global = true, env = "GTFS_JP_DATA_DIR", default_value = "japan_data")]
    data_dir: PathBuf,

    /// Units of shape_dist_traveled in the feed (ft, mi, m, km)
    #[arg(long, global = true, default_value = "m")]
    dist_units: String,

    /// Fail on unparsable tables instead of skipping them
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files in a feed with their sizes
    List { feed: String },

    /// Summarise a feed
    Describe {
        feed: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the columns of every table and whether they hold values
    Fields { feed: String },

    /// Check keys, references and values
    Validate {
        feed: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the dates a feed covers and its busiest day
    Dates {
        feed: String,
        /// Week to show, counting from 1 at the first Monday
        #[arg(long, default_value_t = 1)]
        week: usize,
    },

    /// Per-trip stats: times, stops, distance and speed
    Trips {
        feed: String,
        /// Only trips running on this date (YYYYMMDD)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Timetable of a route or a stop
    #[command(group(ArgGroup::new("target").required(true).args(["route", "stop"])))]
    Timetable {
        feed: String,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        stop: Option<String>,
        /// Dates (YYYYMMDD); the feed's first week if not given
        #[arg(long, value_delimiter = ',', value_parser = parse_date)]
        dates: Vec<NaiveDate>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a feed back out, optionally cut down or with distances added
    Convert {
        feed: String,
        /// Output directory, or a path ending in .zip
        output: PathBuf,
        /// Keep only these routes (and what they use)
        #[arg(long, value_delimiter = ',')]
        routes: Vec<String>,
        /// Keep only these trips
        #[arg(long, value_delimiter = ',')]
        trips: Vec<String>,
        /// Keep only the routes of these agencies
        #[arg(long, value_delimiter = ',')]
        agencies: Vec<String>,
        /// Keep only trips running on one of these dates (YYYYMMDD)
        #[arg(long, value_delimiter = ',', value_parser = parse_date)]
        dates: Vec<NaiveDate>,
        /// Drop trips, stops, shapes, routes and services nothing uses
        #[arg(long)]
        drop_zombies: bool,
        /// Fill shape_dist_traveled in shapes and stop_times
        #[arg(long)]
        append_dist: bool,
        /// Convert distances to these units before writing
        #[arg(long)]
        to_units: Option<String>,
        /// Round floats to this many decimal places
        #[arg(long)]
        ndigits: Option<u32>,
    },

    /// Export stops or shapes as GeoJSON
    Geojson {
        feed: String,
        /// Output GeoJSON file
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Layer::Stops)]
        layer: Layer,
        /// Only these stop, shape, route or trip ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Find the stops near a point
    Nearby {
        feed: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in meters
        #[arg(long, default_value_t = 500.0)]
        radius: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Layer {
    Stops,
    Shapes,
    Routes,
    StopTimes,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    gtfs_date::parse(s).map_err(|e| format!("expected a date like 20240401: {}", e))
}

fn or_none(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_timetable(rows: &[TimetableRow]) {
    for row in rows {
        println!(
            "{}  {:<12} {:<12} {:>3}  {:<12} {:>8} {:>8}",
            row.date.format("%Y%m%d"),
            row.route_id,
            row.trip_id,
            row.stop_sequence,
            row.stop_id,
            or_none(row.arrival_time),
            or_none(row.departure_time),
        );
    }
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Where to read `feed` from: as given, or inside the data directory.
fn resolve_feed(feed: &str, data_dir: &Path) -> String {
    if is_url(feed) || Path::new(feed).exists() {
        return feed.to_string();
    }
    let in_data_dir = data_dir.join(feed);
    if in_data_dir.exists() {
        return in_data_dir.to_string_lossy().into_owned();
    }
    feed.to_string()
}

async fn load(cli: &Cli, feed: &str) -> Result<Feed> {
    let dist_units = DistUnits::from_name(&cli.dist_units)?;
    let options = ReadOptions::new(dist_units).strict(cli.strict);
    let location = resolve_feed(feed, &cli.data_dir);

    if !is_url(&location) && !Path::new(&location).exists() {
        bail!(
            "Feed {} not found (also looked in {})",
            feed,
            cli.data_dir.display()
        );
    }

    let fetcher = HttpFetcher::default();
    read_feed(&location, &options, &fetcher)
        .await
        .with_context(|| format!("Failed to read feed {}", location))
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::List { feed } => {
            let location = resolve_feed(feed, &cli.data_dir);
            let entries = list_feed(&location).with_context(|| format!("Failed to list {}", location))?;
            for entry in entries {
                println!("{:>12}  {}", entry.file_size, entry.file_name);
            }
        }

        Command::Describe { feed, json } => {
            let summary = load(cli, feed).await?.describe();
            if *json {
                print_json(&summary)?;
            } else {
                print!("{}", summary);
            }
        }

        Command::Fields { feed } => {
            let fields = load(cli, feed).await?.list_fields()?;
            for field in fields {
                println!(
                    "{:<16} {:<24} {:<8} {}{}",
                    field.table.to_string(),
                    field.column,
                    format!("{:?}", field.kind),
                    if field.required { "required" } else { "optional" },
                    if field.populated { "" } else { ", empty" },
                );
            }
        }

        Command::Validate { feed, json } => {
            let report = validate(&load(cli, feed).await?);
            if *json {
                print_json(&report)?;
            } else {
                println!("{}", report);
            }
            if !report.is_valid() {
                bail!("Feed {} has {} errors", feed, report.errors().count());
            }
        }

        Command::Dates { feed, week } => {
            let feed = load(cli, feed).await?;
            let dates = feed.get_dates();
            let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
                bail!("Feed has no calendar dates");
            };
            println!("Dates: {} to {} ({} days)", first, last, dates.len());

            let days = feed.get_week(*week)?;
            if days.is_empty() {
                log::warn!("Week {} is outside the feed's dates", week);
                return Ok(());
            }
            println!("Week {}:", week);
            for day in &days {
                let services = feed.get_active_services(*day);
                println!(
                    "  {} {}  {:>5} trips  {}",
                    day,
                    day.format("%a"),
                    feed.get_trips(Some(*day)).len(),
                    services.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
                );
            }

            if let Some(busiest) = feed.compute_busiest_date(&days) {
                println!("Busiest: {}", busiest);
                if let Some((start, end)) = feed.get_start_and_end_times(Some(busiest)) {
                    println!("Service: {} to {}", start, end);
                }
            }
        }

        Command::Trips { feed, date, json } => {
            let feed = load(cli, feed).await?;
            let trip_ids: Option<Vec<TripId>> =
                date.map(|d| feed.get_trips(Some(d)).into_iter().map(|t| t.trip_id.clone()).collect());
            let stats = feed.compute_trip_stats(trip_ids.as_deref());

            if *json {
                print_json(&stats)?;
            } else {
                let units = feed.dist_units();
                println!(
                    "{:<12} {:<12} {:>3} {:>8} {:>8} {:>5} {:>10} {:>8}",
                    "trip_id", "route_id", "dir", "start", "end", "stops",
                    format!("dist ({})", units), format!("{}/h", units)
                );
                for s in &stats {
                    println!(
                        "{:<12} {:<12} {:>3} {:>8} {:>8} {:>5} {:>10} {:>8}",
                        s.trip_id,
                        s.route_id,
                        or_none(s.direction_id),
                        or_none(s.start_time),
                        or_none(s.end_time),
                        s.num_stops,
                        or_none(s.distance.map(|d| format!("{:.2}", d))),
                        or_none(s.speed.map(|v| format!("{:.1}", v))),
                    );
                }
            }
        }

        Command::Timetable {
            feed,
            route,
            stop,
            dates,
            json,
        } => {
            let feed = load(cli, feed).await?;
            let dates = if dates.is_empty() { feed.get_first_week() } else { dates.clone() };
            let rows = match (route, stop) {
                (Some(route), _) => feed.build_route_timetable(&RouteId::new(route), &dates),
                (None, Some(stop)) => feed.build_stop_timetable(&StopId::new(stop), &dates),
                (None, None) => bail!("Give --route or --stop"),
            };
            if rows.is_empty() {
                log::warn!("Nothing runs on the given dates");
            }

            if *json {
                print_json(&rows)?;
            } else {
                print_timetable(&rows);
            }
        }

        Command::Convert {
            feed,
            output,
            routes,
            trips,
            agencies,
            dates,
            drop_zombies,
            append_dist,
            to_units,
            ndigits,
        } => {
            let mut feed = load(cli, feed).await?;

            if !routes.is_empty() {
                let route_ids: Vec<RouteId> = routes.iter().map(RouteId::new).collect();
                feed = feed.restrict_to_routes(&route_ids);
            }
            if !trips.is_empty() {
                let trip_ids: Vec<TripId> = trips.iter().map(TripId::new).collect();
                feed = feed.restrict_to_trips(&trip_ids);
            }
            if !agencies.is_empty() {
                let agency_ids: Vec<AgencyId> = agencies.iter().map(AgencyId::new).collect();
                feed = feed.restrict_to_agencies(&agency_ids);
            }
            if !dates.is_empty() {
                feed = feed.restrict_to_dates(dates);
            }
            if *drop_zombies {
                feed.drop_zombies();
            }
            if *append_dist {
                feed.append_dist_to_shapes();
                feed.append_dist_to_stop_times();
            }
            if let Some(units) = to_units {
                feed.convert_dist(DistUnits::from_name(units)?);
            }

            feed.to_file(output, *ndigits)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }

        Command::Geojson {
            feed,
            output,
            layer,
            ids,
        } => {
            let feed = load(cli, feed).await?;
            let collection = match layer {
                Layer::Stops => {
                    let ids: Vec<StopId> = ids.iter().map(StopId::new).collect();
                    feed.stops_to_geojson((!ids.is_empty()).then_some(ids.as_slice()))?
                }
                Layer::Shapes => {
                    let ids: Vec<ShapeId> = ids.iter().map(ShapeId::new).collect();
                    feed.shapes_to_geojson((!ids.is_empty()).then_some(ids.as_slice()))
                }
                Layer::Routes => {
                    let ids: Vec<RouteId> = ids.iter().map(RouteId::new).collect();
                    feed.routes_to_geojson((!ids.is_empty()).then_some(ids.as_slice()))?
                }
                Layer::StopTimes => {
                    let ids: Vec<TripId> = ids.iter().map(TripId::new).collect();
                    feed.stop_times_to_geojson((!ids.is_empty()).then_some(ids.as_slice()))?
                }
            };
            write_geojson(&collection, output).context("Failed to write GeoJSON")?;
        }

        Command::Nearby {
            feed,
            lat,
            lon,
            radius,
        } => {
            let feed = load(cli, feed).await?;
            let index = feed.stop_index();
            let point = Point::new(*lon, *lat);

            let found = index.stops_near(point, *radius);
            if found.is_empty() {
                log::info!("No stops within {} m; showing the nearest", radius);
            }
            let stops = if found.is_empty() { index.nearest_stops(point, 1) } else { found };
            for stop in stops {
                let dist = gtfs_jp_kit::spatial::haversine_distance(point, stop.point());
                println!("{:>8.0} m  {}  {}", dist, stop.stop_id, stop.stop_name);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    run(&cli).await
}
