use crate::history::DEFAULT_HISTORY_CAP;
use crate::series::DEFAULT_SERIES_CAPACITY;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FEED_URL: &str = "ws://192.168.0.113/ws";

/// Weather forecast viewer and ESP32 sensor dashboard
#[derive(Debug, Parser)]
#[command(name = "dashboard", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch and render an hourly forecast
    Forecast(ForecastArgs),
    /// Follow the live sensor feed
    Sensors(SensorsArgs),
    /// Write the persisted sensor history as CSV
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Latitude in degrees, -90..=90
    #[arg(long, allow_hyphen_values = true, requires = "longitude", conflicts_with = "place")]
    pub latitude: Option<f64>,

    /// Longitude in degrees, -180..=180
    #[arg(long, allow_hyphen_values = true, requires = "latitude")]
    pub longitude: Option<f64>,

    /// Place name resolved through the geocoding API
    #[arg(long, required_unless_present = "latitude")]
    pub place: Option<String>,

    /// First day, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD (defaults to the start date)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    #[arg(long)]
    pub no_temperature: bool,

    #[arg(long)]
    pub no_humidity: bool,

    #[arg(long)]
    pub no_dewpoint: bool,

    #[arg(long, env = "FORECAST_URL", default_value = DEFAULT_FORECAST_URL)]
    pub forecast_url: String,

    #[arg(long, env = "GEOCODING_URL", default_value = DEFAULT_GEOCODING_URL)]
    pub geocoding_url: String,
}

#[derive(Debug, Args)]
pub struct SensorsArgs {
    /// WebSocket address of the sensor node
    #[arg(long, env = "FEED_URL", default_value = DEFAULT_FEED_URL)]
    pub url: String,

    /// Samples kept per chart
    #[arg(long, env = "SERIES_CAPACITY", default_value_t = DEFAULT_SERIES_CAPACITY)]
    pub series_capacity: usize,

    /// Directory for the local sample history; history is off when unset
    #[arg(long, env = "HISTORY_DIR")]
    pub history_dir: Option<PathBuf>,

    /// Samples kept per metric in the local history
    #[arg(long, env = "HISTORY_CAP", default_value_t = DEFAULT_HISTORY_CAP)]
    pub history_cap: usize,

    /// Serve the dashboard state, CSV export and metrics over HTTP
    #[arg(long, env = "HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,

    /// Buffered decoded messages between the feed and the dashboard
    #[arg(long, env = "CHANNEL_CAPACITY", default_value_t = 1024)]
    pub channel_capacity: usize,

    /// Only log, do not print the status card and charts
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(long, env = "HISTORY_DIR")]
    pub history_dir: PathBuf,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Empty the history after a successful export
    #[arg(long)]
    pub clear: bool,
}
