//! Record types shared by the fetcher, the accumulator and the processor.
//!
//! CSV column names are part of the on-disk contract, so every field carries
//! an explicit `serde(rename)`.

use serde::{Deserialize, Serialize};

/// Header of a day dataset, in the exact order rows are written.
pub const DATASET_HEADER: [&str; 9] = [
    "City",
    "Latitude",
    "Longitude",
    "Weather Code",
    "Timezone",
    "Time",
    "Relative Humidity (%)",
    "Temperature (°C)",
    "Wind Speed (m/s)",
];

/// A city with the coordinates used to query the forecast provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CityLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CityLocation {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
        }
    }
}

/// One hour of provider data. Values are `None` where the provider has a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyReading {
    pub time: String,
    pub temperature_c: Option<f64>,
    pub relative_humidity_pct: Option<f64>,
    pub weather_code: Option<i64>,
    pub wind_speed_ms: Option<f64>,
}

/// A validated hourly series for one city, in provider index order.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    /// Latitude echoed by the provider (snapped to its grid)
    pub latitude: f64,
    /// Longitude echoed by the provider
    pub longitude: f64,
    /// Timezone label echoed by the provider (e.g. "GMT")
    pub timezone: String,
    pub hours: Vec<HourlyReading>,
}

/// One row of a day dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Weather Code")]
    pub weather_code: Option<i64>,
    #[serde(rename = "Timezone")]
    pub timezone: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Relative Humidity (%)")]
    pub relative_humidity_pct: Option<f64>,
    #[serde(rename = "Temperature (°C)")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "Wind Speed (m/s)")]
    pub wind_speed_ms: Option<f64>,
}

impl ObservationRecord {
    pub fn from_reading(city: &str, series: &HourlySeries, reading: &HourlyReading) -> Self {
        Self {
            city: city.to_string(),
            latitude: series.latitude,
            longitude: series.longitude,
            weather_code: reading.weather_code,
            timezone: series.timezone.clone(),
            time: reading.time.clone(),
            relative_humidity_pct: reading.relative_humidity_pct,
            temperature_c: reading.temperature_c,
            wind_speed_ms: reading.wind_speed_ms,
        }
    }
}

/// One row of the processed observation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedObservation {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Temperature (°C)")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "Temperature (°F)")]
    pub temperature_f: Option<f64>,
    #[serde(rename = "Relative Humidity (%)")]
    pub relative_humidity_pct: Option<f64>,
    #[serde(rename = "Wind Speed (m/s)")]
    pub wind_speed_ms: Option<f64>,
    #[serde(rename = "Wind Speed (mph)")]
    pub wind_speed_mph: Option<f64>,
    #[serde(rename = "Time")]
    pub time: String,
}

/// The warmest city for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighestTemperatureRecord {
    #[serde(rename = "Hour")]
    pub hour: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Temperature (°C)")]
    pub temperature_c: Option<f64>,
}

/// The driest city for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowestHumidityRecord {
    #[serde(rename = "Hour")]
    pub hour: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Relative Humidity (%)")]
    pub relative_humidity_pct: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_header_matches_dataset_header() {
        let record = ObservationRecord {
            city: "London".to_string(),
            latitude: 51.5,
            longitude: -0.12,
            weather_code: Some(3),
            timezone: "GMT".to_string(),
            time: "2024-01-01T00:00".to_string(),
            relative_humidity_pct: Some(80.0),
            temperature_c: Some(7.5),
            wind_speed_ms: Some(4.2),
        };
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(&record).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(header, DATASET_HEADER.join(","));
    }

    #[test]
    fn test_missing_values_are_empty_cells() {
        let record = ObservationRecord {
            city: "Oslo".to_string(),
            latitude: 59.9,
            longitude: 10.75,
            weather_code: None,
            timezone: "GMT".to_string(),
            time: "2024-01-01T01:00".to_string(),
            relative_humidity_pct: None,
            temperature_c: Some(-3.0),
            wind_speed_ms: None,
        };
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(vec![]);
        wtr.serialize(&record).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(out.trim_end(), "Oslo,59.9,10.75,,GMT,2024-01-01T01:00,,-3.0,");
    }
}
