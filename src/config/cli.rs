use crate::config::{LoadSettings, TrafficSettings, WeatherSettings};
use crate::domain::model::{GeoPoint, Location};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "traffic-etl")]
#[command(about = "Extract TomTom traffic flow and weather data, stage it as Parquet and load it into DuckDB")]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run extraction, transformation and loading for the route
    Run(RunArgs),
    /// Extract traffic data only and print the staged files
    Extract(TrafficArgs),
    /// Extract current weather for one or more locations
    Weather(WeatherArgs),
    /// Print the rows of a loaded table
    Query(QueryArgs),
    /// Parse a dependency manifest and list its requirements
    Deps(DepsArgs),
}

fn parse_point(value: &str) -> Result<GeoPoint, String> {
    value.parse().map_err(|e: crate::EtlError| e.to_string())
}

#[derive(Debug, Clone, Default, Args)]
pub struct TrafficArgs {
    /// Route point as LAT,LON (repeatable)
    #[arg(long = "point", value_name = "LAT,LON", value_parser = parse_point, allow_hyphen_values = true)]
    pub points: Vec<GeoPoint>,

    #[arg(long)]
    pub output_folder: Option<String>,

    #[arg(long)]
    pub zoom: Option<u8>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl TrafficArgs {
    pub fn apply(&self, settings: &mut TrafficSettings) {
        if !self.points.is_empty() {
            settings.points = self.points.clone();
        }
        if let Some(folder) = &self.output_folder {
            settings.output_folder = folder.clone();
        }
        if let Some(zoom) = self.zoom {
            settings.zoom = zoom;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_seconds = timeout;
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct LoadArgs {
    /// DuckDB database file
    #[arg(long)]
    pub database: Option<String>,

    #[arg(long)]
    pub table: Option<String>,
}

impl LoadArgs {
    pub fn apply(&self, settings: &mut LoadSettings) {
        if let Some(database) = &self.database {
            settings.database_path = database.clone();
        }
        if let Some(table) = &self.table {
            settings.table_name = table.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub traffic: TrafficArgs,

    /// Known route length in meters, used for the travel time estimate
    #[arg(long)]
    pub route_distance: Option<f64>,

    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct WeatherArgs {
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub output_folder: Option<String>,
}

impl WeatherArgs {
    pub fn apply(&self, settings: &mut WeatherSettings) {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            settings.locations = vec![Location::new(lat, lon, self.name.clone())];
        }
        if let Some(folder) = &self.output_folder {
            settings.output_folder = folder.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct DepsArgs {
    /// Manifest file to read
    #[arg(default_value = "requirements.txt")]
    pub manifest: PathBuf,
}
