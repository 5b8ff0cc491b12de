use crate::chart;
use crate::errors::{Error, Result};
use crate::metrics::{FORECAST_FAILURES_TOTAL, FORECAST_REQUESTS_TOTAL};
use crate::model::{
    ApiErrorBody, Forecast, ForecastRequest, GeocodingResponse, HourlySeries, Place,
};
use crate::validate::{validate_coordinates, validate_date_range, validate_forecast};
use reqwest::Client;
use tracing::{debug, error, info};

/// Client for the forecast and geocoding endpoints
#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: Client,
    forecast_url: String,
    geocoding_url: String,
}

impl ForecastClient {
    pub fn new(forecast_url: impl Into<String>, geocoding_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            forecast_url: forecast_url.into(),
            geocoding_url: geocoding_url.into(),
        }
    }

    /// Resolve a place name to its first geocoding hit
    pub async fn geocode(&self, place: &str) -> Result<Place> {
        let place = place.trim();
        if place.is_empty() {
            return Err(Error::Validation("Place name cannot be empty".to_string()));
        }

        info!("Geocoding {:?}", place);
        let response = self
            .http
            .get(&self.geocoding_url)
            .query(&[("name", place), ("count", "1")])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let hit = parse_geocoding(place, &body)?;
        debug!("Resolved {:?} to {:?}", place, hit);
        Ok(hit)
    }

    /// One forecast request; coordinates are checked before anything is sent
    pub async fn fetch(&self, request: &ForecastRequest) -> Result<Forecast> {
        validate_coordinates(request.latitude, request.longitude)?;
        validate_date_range(request.start_date, request.end_date)?;

        FORECAST_REQUESTS_TOTAL.inc();
        let result = self.fetch_inner(request).await;
        if result.is_err() {
            FORECAST_FAILURES_TOTAL.inc();
        }
        result
    }

    async fn fetch_inner(&self, request: &ForecastRequest) -> Result<Forecast> {
        info!(
            "Requesting forecast for {}, {} from {} to {}",
            request.latitude, request.longitude, request.start_date, request.end_date
        );

        let response = self
            .http
            .get(&self.forecast_url)
            .query(&query_params(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        parse_forecast(&body)
    }
}

pub fn query_params(request: &ForecastRequest) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", request.latitude.to_string()),
        ("longitude", request.longitude.to_string()),
        ("hourly", HourlySeries::QUERY_FIELDS.to_string()),
        ("start_date", request.start_date.format("%Y-%m-%d").to_string()),
        ("end_date", request.end_date.format("%Y-%m-%d").to_string()),
    ]
}

/// Parse and check a forecast body
pub fn parse_forecast(body: &[u8]) -> Result<Forecast> {
    if let Ok(err) = serde_json::from_slice::<ApiErrorBody>(body) {
        if err.error {
            return Err(Error::Api(err.reason));
        }
    }

    let forecast: Forecast = serde_json::from_slice(body)?;
    validate_forecast(&forecast)?;
    Ok(forecast)
}

/// First hit of a geocoding body; no hits means the place is unknown
pub fn parse_geocoding(place: &str, body: &[u8]) -> Result<Place> {
    let parsed: GeocodingResponse = serde_json::from_slice(body)?;
    parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| Error::PlaceNotFound(place.to_string()))
}

fn api_error(status: reqwest::StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(err) if !err.reason.is_empty() => Error::Api(format!("{}: {}", status, err.reason)),
        _ => Error::Api(format!("{}", status)),
    }
}

/// Which hourly series are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesToggles {
    pub temperature: bool,
    pub humidity: bool,
    pub dewpoint: bool,
}

impl Default for SeriesToggles {
    fn default() -> Self {
        Self {
            temperature: true,
            humidity: true,
            dewpoint: true,
        }
    }
}

impl SeriesToggles {
    pub fn enabled(&self, series: HourlySeries) -> bool {
        match series {
            HourlySeries::Temperature => self.temperature,
            HourlySeries::Humidity => self.humidity,
            HourlySeries::Dewpoint => self.dewpoint,
        }
    }
}

/// Display state of the forecast viewer
#[derive(Debug, Clone, Default)]
pub struct ForecastView {
    forecast: Option<Forecast>,
    last_error: Option<String>,
    pub toggles: SeriesToggles,
}

impl ForecastView {
    pub fn new(toggles: SeriesToggles) -> Self {
        Self {
            toggles,
            ..Self::default()
        }
    }

    /// Success replaces the forecast wholesale; failure keeps it
    pub fn apply(&mut self, result: Result<Forecast>) {
        match result {
            Ok(forecast) => {
                info!("Forecast received with {} hourly entries", forecast.hours());
                self.forecast = Some(forecast);
                self.last_error = None;
            }
            Err(e) => {
                error!("Forecast request failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    pub fn forecast(&self) -> Option<&Forecast> {
        self.forecast.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(err) = &self.last_error {
            out.push_str(&format!("Error: {}\n\n", err));
        }

        let Some(forecast) = &self.forecast else {
            out.push_str("No forecast loaded\n");
            return out;
        };

        out.push_str(&format!("Latitude: {}\n", forecast.latitude));
        out.push_str(&format!("Longitude: {}\n", forecast.longitude));
        out.push_str(&format!(
            "Elevation: {} m, timezone {}\n",
            forecast.elevation, forecast.timezone
        ));

        for series in HourlySeries::ALL {
            if !self.toggles.enabled(series) {
                continue;
            }

            let unit = forecast.unit(series);
            let values = forecast.values(series);

            out.push('\n');
            out.push_str(&chart::render(series.title(), unit, &forecast.hourly.time, values));
            for (time, value) in forecast.hourly.time.iter().zip(values) {
                match value {
                    Some(v) => out.push_str(&format!("{}: {}{}\n", time, v, unit)),
                    None => out.push_str(&format!("{}: -\n", time)),
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BODY: &str = r#"{
        "latitude": 52.52,
        "longitude": 13.419998,
        "generationtime_ms": 0.05,
        "utc_offset_seconds": 0,
        "timezone": "GMT",
        "timezone_abbreviation": "GMT",
        "elevation": 38.0,
        "hourly_units": {
            "time": "iso8601",
            "temperature_2m": "°C",
            "relative_humidity_2m": "%",
            "dewpoint_2m": "°C"
        },
        "hourly": {
            "time": ["2024-10-04T00:00", "2024-10-04T01:00", "2024-10-04T02:00"],
            "temperature_2m": [11.2, 10.8, null],
            "relative_humidity_2m": [88, 90, 91],
            "dewpoint_2m": [9.3, 9.2, 9.0]
        }
    }"#;

    fn request(latitude: f64, longitude: f64) -> ForecastRequest {
        let day = NaiveDate::from_ymd_opt(2024, 10, 4).unwrap();
        ForecastRequest {
            latitude,
            longitude,
            start_date: day,
            end_date: day,
        }
    }

    #[test]
    fn test_parse_forecast() {
        let forecast = parse_forecast(BODY.as_bytes()).unwrap();
        assert_eq!(forecast.hours(), 3);
        assert_eq!(forecast.hourly.temperature_2m, vec![Some(11.2), Some(10.8), None]);
        assert_eq!(forecast.hourly.relative_humidity_2m.len(), 3);
        assert_eq!(forecast.unit(HourlySeries::Humidity), "%");
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"error": true, "reason": "Latitude must be in range of -90 to 90°."}"#;
        match parse_forecast(body.as_bytes()) {
            Err(Error::Api(reason)) => assert!(reason.contains("Latitude")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(parse_forecast(b"<html>"), Err(Error::Json(_))));
    }

    #[test]
    fn test_query_params() {
        let params = query_params(&request(52.52, 13.41));
        assert_eq!(
            params,
            vec![
                ("latitude", "52.52".to_string()),
                ("longitude", "13.41".to_string()),
                ("hourly", "temperature_2m,relative_humidity_2m,dewpoint_2m".to_string()),
                ("start_date", "2024-10-04".to_string()),
                ("end_date", "2024-10-04".to_string()),
            ]
        );
    }

    #[test]
    fn test_out_of_range_rejected_before_request() {
        // Unroutable endpoint: reaching the network would surface an HTTP error
        let client = ForecastClient::new("http://127.0.0.1:9/forecast", "http://127.0.0.1:9/search");
        tokio_test::block_on(async {
            let before = FORECAST_REQUESTS_TOTAL.get();
            let err = client.fetch(&request(91.0, 0.0)).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            let err = client.fetch(&request(0.0, -180.5)).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            assert_eq!(FORECAST_REQUESTS_TOTAL.get(), before);
        });
    }

    #[test]
    fn test_empty_place_rejected() {
        let client = ForecastClient::new("http://127.0.0.1:9/forecast", "http://127.0.0.1:9/search");
        tokio_test::block_on(async {
            assert!(matches!(client.geocode("  ").await, Err(Error::Validation(_))));
        });
    }

    #[test]
    fn test_parse_geocoding_first_hit_wins() {
        let body = r#"{
            "results": [
                {"id": 2950159, "name": "Berlin", "latitude": 52.52437, "longitude": 13.41053, "country": "Germany"},
                {"id": 5083330, "name": "Berlin", "latitude": 44.46867, "longitude": -71.18508, "country": "United States"}
            ],
            "generationtime_ms": 0.9
        }"#;

        let place = parse_geocoding("Berlin", body.as_bytes()).unwrap();
        assert_eq!(place.name, "Berlin");
        assert_eq!(place.latitude, 52.52437);
        assert_eq!(place.longitude, 13.41053);
        assert_eq!(place.country.as_deref(), Some("Germany"));
    }

    #[test]
    fn test_parse_geocoding_no_results() {
        for body in [r#"{"results": []}"#, r#"{"generationtime_ms": 0.4}"#, "{}"] {
            match parse_geocoding("Atlantis", body.as_bytes()) {
                Err(Error::PlaceNotFound(name)) => assert_eq!(name, "Atlantis"),
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[test]
    fn test_view_success_replaces_state() {
        let mut view = ForecastView::default();
        view.apply(parse_forecast(BODY.as_bytes()));

        let forecast = view.forecast().unwrap();
        assert_eq!(forecast.hourly.time.len(), forecast.hours());
        assert_eq!(forecast.hourly.temperature_2m.len(), 3);
        assert_eq!(forecast.hourly.dewpoint_2m.len(), 3);
        assert!(view.last_error().is_none());
    }

    #[test]
    fn test_view_failure_keeps_prior_state() {
        let mut view = ForecastView::default();
        view.apply(parse_forecast(BODY.as_bytes()));
        let before = view.forecast().cloned();

        view.apply(Err(Error::Api("503 Service Unavailable".to_string())));

        assert_eq!(view.forecast().cloned(), before);
        assert_eq!(view.last_error(), Some("Weather API error: 503 Service Unavailable"));
    }

    #[test]
    fn test_render_respects_toggles() {
        let mut view = ForecastView::new(SeriesToggles {
            temperature: true,
            humidity: false,
            dewpoint: true,
        });
        view.apply(parse_forecast(BODY.as_bytes()));

        let text = view.render();
        assert!(text.contains("Temperature (°C)"));
        assert!(text.contains("2024-10-04T00:00: 11.2°C"));
        assert!(text.contains("2024-10-04T02:00: -"));
        assert!(!text.contains("Relative Humidity"));
        assert!(text.contains("Dewpoint"));
    }
}
