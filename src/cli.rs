use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::DATETIME_FORMAT;

#[derive(Parser, Debug)]
#[command(name = "quake-analytics")]
#[command(version, about = "Store earthquake records and run analytical queries over them")]
pub struct Cli {
    /// SQLite database path (defaults to the platform data directory)
    #[arg(long, global = true, env = "QUAKE_DB")]
    pub db: Option<PathBuf>,

    /// Maximum number of pooled connections
    #[arg(long, global = true, default_value_t = 4)]
    pub pool_size: usize,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create missing tables and seed reference regions and zones
    Init,

    /// List all table names in creation order
    ListTables,

    /// List reference regions
    Regions,

    /// List reference seismic zones
    Zones,

    /// Insert one earthquake record
    AddQuake(AddQuakeArgs),

    /// Run one of the analytical queries and print JSON
    #[command(subcommand)]
    Query(QueryCommand),
}

#[derive(Args, Debug)]
pub struct AddQuakeArgs {
    /// UTC timestamp, "YYYY-MM-DD HH:MM:SS"
    #[arg(long, value_parser = parse_datetime)]
    pub datetime: NaiveDateTime,

    #[arg(long, allow_negative_numbers = true)]
    pub magnitude: f64,

    #[arg(long)]
    pub depth_km: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    #[arg(long)]
    pub place: String,

    /// Region id (classified from the coordinates if omitted)
    #[arg(long)]
    pub region_id: Option<i64>,

    /// Zone id (classified from the coordinates if omitted)
    #[arg(long)]
    pub zone_id: Option<i64>,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Earthquakes in a region, oldest first
    RegionQuakes { region_id: i64 },

    /// Average magnitude of a region's earthquakes
    AvgMagnitude { region_id: i64 },

    /// Earthquakes within a great-circle radius
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, default_value_t = 100.0)]
        radius_km: f64,
    },

    /// Regions with the most earthquakes
    MostActive {
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Earthquakes at or above a magnitude
    HighMagnitude {
        #[arg(long, default_value_t = 6.0)]
        min_magnitude: f64,
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Regions with at least a number of earthquakes
    MinQuakes {
        #[arg(long, default_value_t = 10)]
        min_count: u32,
    },

    /// Regions with above-average activity
    AboveAverage,

    /// Earthquakes matching all supplied criteria
    Search {
        #[arg(long)]
        min_magnitude: Option<f64>,
        #[arg(long)]
        max_depth_km: Option<f64>,
        #[arg(long)]
        region_id: Option<i64>,
        #[arg(long)]
        min_risk_level: Option<i32>,
        #[arg(long)]
        min_population: Option<i64>,
    },

    /// Earthquakes in regions with a minimum population
    HighPopulation {
        #[arg(long, default_value_t = 10_000_000)]
        min_population: i64,
    },

    /// Risk summary for a region
    RiskSummary { region_id: i64 },
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM:SS\": {e}"))
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
