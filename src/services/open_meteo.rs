//! Open-Meteo forecast client.
//!
//! Fetches the hourly series for one city per request.
//! See: https://open-meteo.com/en/docs

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{Instrument, Span};

use crate::errors::AppError;
use crate::models::{CityLocation, HourlyReading, HourlySeries};

/// Hourly variables requested from the provider.
pub const HOURLY_VARIABLES: [&str; 4] = [
    "temperature_2m",
    "relative_humidity_2m",
    "weather_code",
    "wind_speed_10m",
];

/// Query string for one forecast request. Built fresh for every city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub hourly: String,
    pub timezone: &'static str,
    pub wind_speed_unit: &'static str,
    pub past_days: u8,
}

impl ForecastQuery {
    pub fn for_city(city: &CityLocation, past_days: u8) -> Self {
        Self {
            latitude: city.latitude,
            longitude: city.longitude,
            hourly: HOURLY_VARIABLES.join(","),
            timezone: "GMT",
            wind_speed_unit: "ms",
            past_days,
        }
    }
}

// --- Open-Meteo JSON response types ---

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    timezone: String,
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    weather_code: Vec<Option<i64>>,
    wind_speed_10m: Vec<Option<f64>>,
}

impl HourlyBlock {
    /// Zip the parallel arrays into readings, rejecting arrays of unequal length.
    fn into_readings(self) -> Result<Vec<HourlyReading>, AppError> {
        let expected = self.time.len();
        let lengths = [
            ("temperature_2m", self.temperature_2m.len()),
            ("relative_humidity_2m", self.relative_humidity_2m.len()),
            ("weather_code", self.weather_code.len()),
            ("wind_speed_10m", self.wind_speed_10m.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != expected) {
            return Err(AppError::MalformedResponse(format!(
                "hourly.{} has {} values but hourly.time has {}",
                name, len, expected
            )));
        }

        Ok(self
            .time
            .into_iter()
            .zip(self.temperature_2m)
            .zip(self.relative_humidity_2m)
            .zip(self.weather_code)
            .zip(self.wind_speed_10m)
            .map(
                |((((time, temperature_c), relative_humidity_pct), weather_code), wind_speed_ms)| {
                    HourlyReading {
                        time,
                        temperature_c,
                        relative_humidity_pct,
                        weather_code,
                        wind_speed_ms,
                    }
                },
            )
            .collect())
    }
}

/// Parse and validate a raw forecast response body.
pub fn parse_forecast(body: &str) -> Result<HourlySeries, AppError> {
    let response: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| AppError::MalformedResponse(format!("forecast response: {}", e)))?;

    Ok(HourlySeries {
        latitude: response.latitude,
        longitude: response.longitude,
        timezone: response.timezone,
        hours: response.hourly.into_readings()?,
    })
}

/// Client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    past_days: u8,
    span: Span,
}

impl OpenMeteoClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        past_days: u8,
        parent: &Span,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            past_days,
            span: tracing::info_span!(parent: parent, "fetcher"),
        })
    }

    /// Fetch the hourly series for one city.
    ///
    /// Any non-success status is an error; nothing is retried.
    pub async fn fetch_hourly(&self, city: &CityLocation) -> Result<HourlySeries, AppError> {
        let query = ForecastQuery::for_city(city, self.past_days);

        async {
            tracing::info!("Fetching hourly weather for {}", city.name);

            let response = self
                .client
                .get(&self.base_url)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    AppError::ExternalServiceError(format!("Open-Meteo request failed: {}", e))
                })?;

            if !response.status().is_success() {
                return Err(AppError::ExternalServiceError(format!(
                    "Open-Meteo returned HTTP {}",
                    response.status()
                )));
            }

            let body = response.text().await.map_err(|e| {
                AppError::ExternalServiceError(format!("Open-Meteo body read failed: {}", e))
            })?;
            let series = parse_forecast(&body)?;

            tracing::debug!(
                "Open-Meteo returned {} hours for {} ({}, {}, {})",
                series.hours.len(),
                city.name,
                series.latitude,
                series.longitude,
                series.timezone
            );
            Ok(series)
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "latitude": 51.5,
            "longitude": -0.120000124,
            "generationtime_ms": 0.05,
            "utc_offset_seconds": 0,
            "timezone": "GMT",
            "timezone_abbreviation": "GMT",
            "hourly_units": {"time": "iso8601", "temperature_2m": "°C"},
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [7.5, 7.1],
                "relative_humidity_2m": [81, 83],
                "weather_code": [3, 61],
                "wind_speed_10m": [4.2, null]
            }
        })
    }

    fn client(server: &MockServer) -> OpenMeteoClient {
        OpenMeteoClient::new(
            &format!("{}/v1/forecast", server.uri()),
            Duration::from_secs(5),
            3,
            &Span::none(),
        )
        .unwrap()
    }

    #[test]
    fn test_query_is_built_per_city() {
        let london = CityLocation::new("London", 51.5074, -0.1278);
        let tokyo = CityLocation::new("Tokyo", 35.6895, 139.6917);

        let q1 = ForecastQuery::for_city(&london, 3);
        let q2 = ForecastQuery::for_city(&tokyo, 3);

        assert_eq!(q1.latitude, 51.5074);
        assert_eq!(q2.latitude, 35.6895);
        assert_eq!(
            q1.hourly,
            "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m"
        );
        assert_eq!(q1.timezone, "GMT");
        assert_eq!(q1.wind_speed_unit, "ms");
        assert_eq!(q1.past_days, 3);
    }

    #[test]
    fn test_parse_forecast() {
        let series = parse_forecast(&sample_body().to_string()).unwrap();
        assert_eq!(series.timezone, "GMT");
        assert_eq!(series.hours.len(), 2);
        assert_eq!(series.hours[0].time, "2024-01-01T00:00");
        assert_eq!(series.hours[0].temperature_c, Some(7.5));
        assert_eq!(series.hours[1].relative_humidity_pct, Some(83.0));
        assert_eq!(series.hours[1].weather_code, Some(61));
        assert_eq!(series.hours[1].wind_speed_ms, None);
    }

    #[test]
    fn test_parse_forecast_missing_array() {
        let mut body = sample_body();
        body["hourly"]
            .as_object_mut()
            .unwrap()
            .remove("relative_humidity_2m");
        let err = parse_forecast(&body.to_string()).unwrap_err();
        assert!(
            matches!(&err, AppError::MalformedResponse(msg) if msg.contains("relative_humidity_2m")),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_parse_forecast_unequal_lengths() {
        let mut body = sample_body();
        body["hourly"]["temperature_2m"] = serde_json::json!([7.5]);
        let err = parse_forecast(&body.to_string()).unwrap_err();
        assert!(
            matches!(&err, AppError::MalformedResponse(msg) if msg.contains("temperature_2m")),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_parse_forecast_missing_hourly_block() {
        let body = serde_json::json!({"latitude": 1.0, "longitude": 2.0, "timezone": "GMT"});
        assert!(matches!(
            parse_forecast(&body.to_string()),
            Err(AppError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_hourly_sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "51.5074"))
            .and(query_param("longitude", "-0.1278"))
            .and(query_param(
                "hourly",
                "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m",
            ))
            .and(query_param("timezone", "GMT"))
            .and(query_param("wind_speed_unit", "ms"))
            .and(query_param("past_days", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let city = CityLocation::new("London", 51.5074, -0.1278);
        let series = client(&server).fetch_hourly(&city).await.unwrap();

        assert_eq!(series.hours.len(), 2);
        assert_eq!(series.latitude, 51.5);
    }

    #[tokio::test]
    async fn test_fetch_hourly_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": true,
                "reason": "Latitude must be in range of -90 to 90°."
            })))
            .mount(&server)
            .await;

        let city = CityLocation::new("Nowhere", 123.0, 0.0);
        let err = client(&server).fetch_hourly(&city).await.unwrap_err();

        assert!(
            matches!(&err, AppError::ExternalServiceError(msg) if msg.contains("400")),
            "unexpected error: {}",
            err
        );
    }
}
