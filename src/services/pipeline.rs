//! Batch pipeline: resolve → fetch → append → process → render.
//!
//! Cities are handled one at a time in list order. A city that cannot be
//! fetched is logged and left out of the day dataset; it never stops the
//! batch. Processing is the only stage whose failure is returned.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{Instrument, Span};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::CityLocation;
use crate::services::charts::ChartRenderer;
use crate::services::dataset::DayDataset;
use crate::services::geocode::{default_cities, GeocodingClient};
use crate::services::open_meteo::OpenMeteoClient;
use crate::services::processor::{ProcessingSummary, Processor};

/// Outcome of one city in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CityRunStatus {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// "appended" or "error: <cause>"
    pub result: String,
    pub rows_appended: usize,
}

/// Summary of one pipeline run, persisted as `last_run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Path of the day dataset the run appended to
    pub dataset: String,
    pub cities: Vec<CityRunStatus>,
    /// Present when processing succeeded
    pub processing: Option<ProcessingSummary>,
    /// Present when processing failed
    pub processing_error: Option<String>,
    pub charts_rendered: usize,
}

impl RunReport {
    pub fn rows_appended(&self) -> usize {
        self.cities.iter().map(|c| c.rows_appended).sum()
    }

    pub fn failed_cities(&self) -> usize {
        self.cities.iter().filter(|c| c.result != "appended").count()
    }
}

/// Owns every pipeline component for one configuration.
pub struct Pipeline {
    config: AppConfig,
    geocoder: GeocodingClient,
    fetcher: OpenMeteoClient,
    processor: Processor,
    charts: ChartRenderer,
    span: Span,
}

impl Pipeline {
    pub fn new(config: AppConfig, parent: &Span) -> Result<Self, AppError> {
        let span = tracing::info_span!(parent: parent, "pipeline");
        let geocoder = GeocodingClient::new(
            &config.geocoding_api_url,
            config.ninjas_api_key.clone(),
            config.request_timeout,
            &span,
        )?;
        let fetcher = OpenMeteoClient::new(
            &config.forecast_api_url,
            config.request_timeout,
            config.past_days,
            &span,
        )?;
        let processor = Processor::new(config.output_paths(), config.duplicate_policy, &span);
        let charts = ChartRenderer::new(&config.graphs_dir, &span);

        Ok(Self {
            config,
            geocoder,
            fetcher,
            processor,
            charts,
            span,
        })
    }

    /// Run the pipeline against today's dataset.
    pub async fn run(&self, cities: &[String]) -> Result<RunReport, AppError> {
        self.run_for_date(cities, Local::now().date_naive()).await
    }

    /// Run the pipeline against the dataset of `date`.
    pub async fn run_for_date(
        &self,
        cities: &[String],
        date: NaiveDate,
    ) -> Result<RunReport, AppError> {
        async {
            let started_at = Utc::now();
            let dataset = DayDataset::for_date(&self.config.raw_data_dir, date, &self.span);

            let locations = self.resolve_cities(cities).await;
            let statuses = self.collect(&dataset, &locations).await;

            let mut report = RunReport {
                started_at,
                finished_at: None,
                dataset: dataset.path().display().to_string(),
                cities: statuses,
                processing: None,
                processing_error: None,
                charts_rendered: 0,
            };
            tracing::info!(
                "Collected {} rows from {} cities ({} failed)",
                report.rows_appended(),
                report.cities.len(),
                report.failed_cities()
            );

            match self.processor.run(dataset.path()) {
                Ok(summary) => report.processing = Some(summary),
                Err(e) => {
                    tracing::error!("Processing stage failed: {}", e);
                    report.processing_error = Some(e.to_string());
                    report.finished_at = Some(Utc::now());
                    self.save_report(&report);
                    return Err(e);
                }
            }

            match self.charts.render_all(self.processor.outputs()) {
                Ok(paths) => report.charts_rendered = paths.len(),
                Err(e) => tracing::error!("Chart stage failed: {}", e),
            }

            report.finished_at = Some(Utc::now());
            self.save_report(&report);
            Ok(report)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn resolve_cities(&self, names: &[String]) -> Vec<CityLocation> {
        if names.is_empty() {
            tracing::info!("No cities provided, using predefined cities");
            return default_cities();
        }
        tracing::info!("Fetching data for provided cities: {}", names.join(", "));
        self.geocoder.resolve(names).await
    }

    /// Fetch and append each city in order, skipping failures.
    async fn collect(&self, dataset: &DayDataset, cities: &[CityLocation]) -> Vec<CityRunStatus> {
        let mut statuses = Vec::with_capacity(cities.len());
        for city in cities {
            let outcome = match self.fetcher.fetch_hourly(city).await {
                Ok(series) => dataset.append(&city.name, &series),
                Err(e) => Err(e),
            };
            let (result, rows_appended) = match outcome {
                Ok(rows) => ("appended".to_string(), rows),
                Err(e) => {
                    tracing::error!("Skipping {}: {}", city.name, e);
                    (format!("error: {}", e), 0)
                }
            };
            statuses.push(CityRunStatus {
                city: city.name.clone(),
                latitude: city.latitude,
                longitude: city.longitude,
                result,
                rows_appended,
            });
        }
        statuses
    }

    fn save_report(&self, report: &RunReport) {
        if let Err(e) = write_report(&self.config.run_report_path(), report) {
            tracing::warn!("Failed to write run report: {}", e);
        }
    }
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

/// Load the report written by the last pipeline run.
pub fn read_report(path: &Path) -> Result<RunReport, AppError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("No pipeline run recorded yet".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::read_observations;
    use crate::services::processor::OutputPaths;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn forecast_body(times: &[&str], temps: &[f64]) -> serde_json::Value {
        serde_json::json!({
            "latitude": 0.0,
            "longitude": 0.0,
            "timezone": "GMT",
            "hourly": {
                "time": times,
                "temperature_2m": temps,
                "relative_humidity_2m": temps.iter().map(|t| 100.0 - t).collect::<Vec<_>>(),
                "weather_code": vec![0; times.len()],
                "wind_speed_10m": vec![2.0; times.len()]
            }
        })
    }

    fn config(dir: &TempDir, server: &MockServer, extra: &[(&str, &str)]) -> AppConfig {
        let mut vars: HashMap<String, String> = HashMap::new();
        let root = dir.path().display().to_string();
        vars.insert("RAW_DATA_DIR".into(), format!("{}/weather_data", root));
        vars.insert("OUTPUT_DIR".into(), format!("{}/Data", root));
        vars.insert("GRAPHS_DIR".into(), format!("{}/Graphs", root));
        vars.insert("FORECAST_API_URL".into(), format!("{}/v1/forecast", server.uri()));
        vars.insert("GEOCODING_API_URL".into(), format!("{}/v1/geocoding", server.uri()));
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    async fn mount_city(server: &MockServer, city: &str, lat: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/geocoding"))
            .and(query_param("city", city))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"latitude": lat.parse::<f64>().unwrap(), "longitude": 1.0}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", lat))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_failed_city_is_skipped() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let hours = ["2024-01-01T00:00", "2024-01-01T01:00"];

        mount_city(&server, "Warm", "10.5", forecast_body(&hours, &[30.0, 31.0])).await;
        mount_city(&server, "Cool", "30.5", forecast_body(&hours, &[25.0, 20.0])).await;
        Mock::given(method("GET"))
            .and(path("/v1/geocoding"))
            .and(query_param("city", "Broken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"latitude": 20.5, "longitude": 1.0}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "20.5"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = config(&dir, &server, &[("NINJAS_API_KEY", "k")]);
        let report_path = config.run_report_path();
        let outputs = config.output_paths();
        let pipeline = Pipeline::new(config, &Span::none()).unwrap();

        let names = vec!["Warm".to_string(), "Broken".to_string(), "Cool".to_string()];
        let report = pipeline.run_for_date(&names, date()).await.unwrap();

        assert_eq!(report.cities.len(), 3);
        assert_eq!(report.cities[0].result, "appended");
        assert!(report.cities[1].result.starts_with("error:"));
        assert!(report.cities[1].result.contains("503"));
        assert_eq!(report.rows_appended(), 4);
        assert_eq!(report.failed_cities(), 1);

        let rows = read_observations(Path::new(&report.dataset)).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.city != "Broken"));

        let summary = report.processing.clone().unwrap();
        assert_eq!(summary.distinct_hours, 2);
        assert_eq!(report.charts_rendered, 6);
        assert!(outputs.highest_temperature.exists());
        let saved = read_report(&report_path).unwrap();
        assert_eq!(saved.cities.len(), 3);
        assert_eq!(saved.charts_rendered, 6);
    }

    #[tokio::test]
    async fn test_runs_accumulate_across_the_day() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let hours = ["2024-01-01T00:00", "2024-01-01T01:00", "2024-01-01T02:00"];

        mount_city(&server, "A", "10.5", forecast_body(&hours, &[1.0, 2.0, 3.0])).await;
        mount_city(&server, "B", "30.5", forecast_body(&hours[..2], &[4.0, 5.0])).await;

        let config = config(&dir, &server, &[("NINJAS_API_KEY", "k")]);
        let pipeline = Pipeline::new(config, &Span::none()).unwrap();

        let first = pipeline
            .run_for_date(&["A".to_string()], date())
            .await
            .unwrap();
        let second = pipeline
            .run_for_date(&["B".to_string()], date())
            .await
            .unwrap();

        assert_eq!(first.dataset, second.dataset);
        let rows = read_observations(Path::new(&second.dataset)).unwrap();
        assert_eq!(rows.len(), first.rows_appended() + second.rows_appended());
        assert_eq!(rows.len(), 5);
        assert_eq!(second.processing.unwrap().rows_kept, 5);
    }

    #[tokio::test]
    async fn test_no_data_fails_processing_and_leaves_no_tables() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = config(&dir, &server, &[]);
        let outputs: OutputPaths = config.output_paths();
        let report_path = config.run_report_path();
        let pipeline = Pipeline::new(config, &Span::none()).unwrap();

        let err = pipeline.run_for_date(&[], date()).await.unwrap_err();

        assert!(matches!(err, AppError::NoInputData(_)));
        assert!(!outputs.processed.exists());
        assert!(!outputs.highest_temperature.exists());
        assert!(!outputs.lowest_humidity.exists());

        let report = read_report(&report_path).unwrap();
        assert_eq!(report.cities.len(), 10);
        assert_eq!(report.failed_cities(), 10);
        assert!(report.processing_error.is_some());
    }

    #[tokio::test]
    async fn test_missing_api_key_yields_no_cities() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let pipeline = Pipeline::new(config(&dir, &server, &[]), &Span::none()).unwrap();
        let err = pipeline
            .run_for_date(&["Paris".to_string()], date())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoInputData(_)));
    }

    #[test]
    fn test_read_report_missing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_report(&dir.path().join("last_run.json")),
            Err(AppError::NotFound(_))
        ));
    }
}
