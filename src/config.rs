use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;
use crate::services::processor::{DuplicatePolicy, OutputPaths};

const DEFAULT_FORECAST_API_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_GEOCODING_API_URL: &str = "https://api.api-ninjas.com/v1/geocoding";

/// File name of the pipeline run report, written next to the derived tables.
pub const RUN_REPORT_FILE: &str = "last_run.json";

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding one `weather_YYYY-MM-DD.csv` day dataset per day.
    pub raw_data_dir: PathBuf,
    /// Directory holding the processed and ranking tables.
    pub output_dir: PathBuf,
    /// Directory holding rendered charts.
    pub graphs_dir: PathBuf,
    pub log_dir: PathBuf,
    pub forecast_api_url: String,
    pub geocoding_api_url: String,
    /// API key for the geocoding service. Only needed for user-supplied cities.
    pub ninjas_api_key: Option<String>,
    pub request_timeout: Duration,
    /// Provider lookback window in days.
    pub past_days: u8,
    pub duplicate_policy: DuplicatePolicy,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let dedupe: bool = parse_or(&lookup, "DEDUPLICATE", false)?;
        let timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;

        Ok(Self {
            raw_data_dir: PathBuf::from(string_or("RAW_DATA_DIR", "weather_data")),
            output_dir: PathBuf::from(string_or("OUTPUT_DIR", "Data")),
            graphs_dir: PathBuf::from(string_or("GRAPHS_DIR", "Graphs")),
            log_dir: PathBuf::from(string_or("LOG_DIR", "logs")),
            forecast_api_url: string_or("FORECAST_API_URL", DEFAULT_FORECAST_API_URL),
            geocoding_api_url: string_or("GEOCODING_API_URL", DEFAULT_GEOCODING_API_URL),
            ninjas_api_key: lookup("NINJAS_API_KEY").filter(|k| !k.trim().is_empty()),
            request_timeout: Duration::from_secs(timeout_secs),
            past_days: parse_or(&lookup, "PAST_DAYS", 3)?,
            duplicate_policy: if dedupe {
                DuplicatePolicy::LastWins
            } else {
                DuplicatePolicy::KeepAll
            },
            port: parse_or(&lookup, "PORT", 8000)?,
        })
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::in_dir(&self.output_dir)
    }

    pub fn run_report_path(&self) -> PathBuf {
        self.output_dir.join(RUN_REPORT_FILE)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", key, raw))),
    }
}
