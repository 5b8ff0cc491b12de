use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single timestamped reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Time-of-day label used on chart axes
    pub fn label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// Metrics reported by the sensor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Co2,
    Temperature,
    Humidity,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Co2, Metric::Temperature, Metric::Humidity];

    /// Field name in the feed's JSON messages
    pub fn field(self) -> &'static str {
        match self {
            Metric::Co2 => "co2",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
        }
    }

    /// Key of the persisted history log
    pub fn storage_key(self) -> &'static str {
        match self {
            Metric::Co2 => "co2History",
            Metric::Temperature => "tempHistory",
            Metric::Humidity => "humidityHistory",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Co2 => "CO2 Level",
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Co2 => "ppm",
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
        }
    }

    fn index(self) -> usize {
        match self {
            Metric::Co2 => 0,
            Metric::Temperature => 1,
            Metric::Humidity => 2,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Fixed-size table with one slot per metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerMetric<T> {
    pub co2: T,
    pub temperature: T,
    pub humidity: T,
}

impl<T> PerMetric<T> {
    pub fn from_fn(mut f: impl FnMut(Metric) -> T) -> Self {
        Self {
            co2: f(Metric::Co2),
            temperature: f(Metric::Temperature),
            humidity: f(Metric::Humidity),
        }
    }

    pub fn get(&self, metric: Metric) -> &T {
        match metric {
            Metric::Co2 => &self.co2,
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut T {
        match metric {
            Metric::Co2 => &mut self.co2,
            Metric::Temperature => &mut self.temperature,
            Metric::Humidity => &mut self.humidity,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &T)> {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// Binary indicator reported by the node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedState {
    On,
    #[default]
    Off,
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedState::On => f.write_str("ON"),
            LedState::Off => f.write_str("OFF"),
        }
    }
}

/// A decoded feed message; `None` means the field was absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorMessage {
    pub received_at: DateTime<Utc>,
    pub readings: [Option<f64>; 3],
    pub led_state: Option<LedState>,
}

impl SensorMessage {
    pub fn new(received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            readings: [None; 3],
            led_state: None,
        }
    }

    pub fn reading(&self, metric: Metric) -> Option<f64> {
        self.readings[metric.index()]
    }

    pub fn set_reading(&mut self, metric: Metric, value: f64) {
        self.readings[metric.index()] = Some(value);
    }

    /// Present readings in metric order
    pub fn samples(&self) -> impl Iterator<Item = (Metric, Sample)> + '_ {
        Metric::ALL.into_iter().filter_map(move |m| {
            self.reading(m)
                .map(|value| (m, Sample::new(self.received_at, value)))
        })
    }
}

/// Forecast request after place resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Geocoding hit for a place name
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    #[serde(default)]
    pub results: Vec<Place>,
}

/// Forecast API response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Forecast {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub generationtime_ms: f64,
    #[serde(default)]
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub timezone_abbreviation: String,
    #[serde(default)]
    pub elevation: f64,
    pub hourly_units: HourlyUnits,
    pub hourly: Hourly,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyUnits {
    pub time: String,
    pub temperature_2m: String,
    pub relative_humidity_2m: String,
    pub dewpoint_2m: String,
}

/// Time-aligned hourly arrays; `None` marks a missing value
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hourly {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub relative_humidity_2m: Vec<Option<f64>>,
    pub dewpoint_2m: Vec<Option<f64>>,
}

/// Error body returned by the weather API
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub reason: String,
}

/// Hourly series the viewer can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourlySeries {
    Temperature,
    Humidity,
    Dewpoint,
}

impl HourlySeries {
    pub const ALL: [HourlySeries; 3] = [
        HourlySeries::Temperature,
        HourlySeries::Humidity,
        HourlySeries::Dewpoint,
    ];

    /// Names passed in the `hourly` query parameter
    pub const QUERY_FIELDS: &'static str = "temperature_2m,relative_humidity_2m,dewpoint_2m";

    pub fn title(self) -> &'static str {
        match self {
            HourlySeries::Temperature => "Temperature",
            HourlySeries::Humidity => "Relative Humidity",
            HourlySeries::Dewpoint => "Dewpoint",
        }
    }
}

impl Forecast {
    pub fn values(&self, series: HourlySeries) -> &[Option<f64>] {
        match series {
            HourlySeries::Temperature => &self.hourly.temperature_2m,
            HourlySeries::Humidity => &self.hourly.relative_humidity_2m,
            HourlySeries::Dewpoint => &self.hourly.dewpoint_2m,
        }
    }

    pub fn unit(&self, series: HourlySeries) -> &str {
        match series {
            HourlySeries::Temperature => &self.hourly_units.temperature_2m,
            HourlySeries::Humidity => &self.hourly_units.relative_humidity_2m,
            HourlySeries::Dewpoint => &self.hourly_units.dewpoint_2m,
        }
    }

    /// Number of hourly entries returned
    pub fn hours(&self) -> usize {
        self.hourly.time.len()
    }
}
