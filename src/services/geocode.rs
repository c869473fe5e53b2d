//! City name → coordinates.
//!
//! The predefined city list carries fixed coordinates. User-supplied names are
//! resolved through the API Ninjas geocoding endpoint, taking the first
//! candidate returned for each name.

use reqwest::header::{HeaderValue, ACCEPT};
use serde::Deserialize;
use std::time::Duration;
use tracing::{Instrument, Span};

use crate::errors::AppError;
use crate::models::CityLocation;

const API_KEY_HEADER: &str = "X-Api-Key";

/// The cities collected when no names are given on the command line.
pub fn default_cities() -> Vec<CityLocation> {
    vec![
        CityLocation::new("New York", 40.7128, -74.0060),
        CityLocation::new("Tokyo", 35.6895, 139.6917),
        CityLocation::new("London", 51.5074, -0.1278),
        CityLocation::new("Paris", 48.8566, 2.3522),
        CityLocation::new("Berlin", 52.5200, 13.4050),
        CityLocation::new("Sydney", -33.8688, 151.2093),
        CityLocation::new("Mumbai", 19.0760, 72.8777),
        CityLocation::new("Cape Town", -33.9249, 18.4241),
        CityLocation::new("Moscow", 55.7558, 37.6173),
        CityLocation::new("Rio de Janeiro", -22.9068, -43.1729),
    ]
}

#[derive(Debug, Deserialize)]
struct GeocodingCandidate {
    latitude: f64,
    longitude: f64,
}

/// Client for the geocoding service.
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    span: Span,
}

impl GeocodingClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        parent: &Span,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
            span: tracing::info_span!(parent: parent, "geocoder"),
        })
    }

    /// Resolve each name to coordinates, skipping names that cannot be resolved.
    ///
    /// Without an API key nothing can be resolved: the problem is logged and an
    /// empty list is returned instead of failing the run.
    pub async fn resolve(&self, names: &[String]) -> Vec<CityLocation> {
        async {
            let Some(api_key) = self.api_key.as_deref() else {
                tracing::error!(
                    "NINJAS_API_KEY is not set, cannot resolve {} cities",
                    names.len()
                );
                return Vec::new();
            };

            let mut resolved = Vec::with_capacity(names.len());
            for name in names {
                match self.lookup(name, api_key).await {
                    Ok(Some(city)) => {
                        tracing::info!(
                            "Resolved {} to ({}, {})",
                            city.name,
                            city.latitude,
                            city.longitude
                        );
                        resolved.push(city);
                    }
                    Ok(None) => tracing::warn!("No geocoding result for city: {}", name),
                    Err(e) => tracing::warn!("Failed to geocode {}: {}", name, e),
                }
            }
            resolved
        }
        .instrument(self.span.clone())
        .await
    }

    async fn lookup(&self, name: &str, api_key: &str) -> Result<Option<CityLocation>, AppError> {
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| AppError::Config(format!("Invalid API key header: {}", e)))?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("city", name)])
            .header(API_KEY_HEADER, key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("geocoding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "geocoding returned HTTP {}",
                response.status()
            )));
        }

        let candidates: Vec<GeocodingCandidate> = response.json().await.map_err(|e| {
            AppError::MalformedResponse(format!("geocoding JSON parse error: {}", e))
        })?;

        Ok(candidates
            .into_iter()
            .next()
            .map(|c| CityLocation::new(name, c.latitude, c.longitude)))
    }
}
