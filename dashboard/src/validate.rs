use crate::errors::{Error, Result};
use crate::model::{Forecast, HourlySeries, Metric, SensorMessage};
use chrono::NaiveDate;

const LATITUDE_MIN: f64 = -90.0;
const LATITUDE_MAX: f64 = 90.0;
const LONGITUDE_MIN: f64 = -180.0;
const LONGITUDE_MAX: f64 = 180.0;

const CO2_MIN: f64 = 0.0;
const CO2_MAX: f64 = 100_000.0;
const TEMP_MIN: f64 = -50.0;
const TEMP_MAX: f64 = 100.0;
const HUMIDITY_MIN: f64 = 0.0;
const HUMIDITY_MAX: f64 = 100.0;

/// Rejects coordinates outside the valid globe range; NaN never passes
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(LATITUDE_MIN..=LATITUDE_MAX).contains(&latitude) {
        return Err(Error::Validation(format!(
            "Latitude {} out of range [{}, {}]",
            latitude, LATITUDE_MIN, LATITUDE_MAX
        )));
    }

    if !(LONGITUDE_MIN..=LONGITUDE_MAX).contains(&longitude) {
        return Err(Error::Validation(format!(
            "Longitude {} out of range [{}, {}]",
            longitude, LONGITUDE_MIN, LONGITUDE_MAX
        )));
    }

    Ok(())
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(Error::Validation(format!(
            "Start date {} is after end date {}",
            start, end
        )));
    }
    Ok(())
}

fn metric_range(metric: Metric) -> (f64, f64) {
    match metric {
        Metric::Co2 => (CO2_MIN, CO2_MAX),
        Metric::Temperature => (TEMP_MIN, TEMP_MAX),
        Metric::Humidity => (HUMIDITY_MIN, HUMIDITY_MAX),
    }
}

/// Validates every reading present in a feed message
pub fn validate(message: &SensorMessage) -> Result<()> {
    for metric in Metric::ALL {
        let Some(value) = message.reading(metric) else {
            continue;
        };

        let (min, max) = metric_range(metric);
        if !value.is_finite() || value < min || value > max {
            return Err(Error::Validation(format!(
                "{} {} out of range [{}, {}]",
                metric.label(),
                value,
                min,
                max
            )));
        }
    }

    Ok(())
}

/// Every hourly array has to line up with the `time` axis
pub fn validate_forecast(forecast: &Forecast) -> Result<()> {
    let hours = forecast.hours();
    for series in HourlySeries::ALL {
        let len = forecast.values(series).len();
        if len != hours {
            return Err(Error::Validation(format!(
                "{} has {} entries but time has {}",
                series.title(),
                len,
                hours
            )));
        }
    }
    Ok(())
}
