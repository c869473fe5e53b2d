//! Subscriber setup for the two binaries.
//!
//! The pipeline keeps a full log file and only surfaces warnings on the
//! console; the API server logs everything to the console.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::AppError;

/// Name of the pipeline log file inside the log directory.
pub const PIPELINE_LOG_FILE: &str = "weather_scrapper.log";

/// Initialise logging for the batch pipeline.
pub fn init_pipeline(log_dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(PIPELINE_LOG_FILE))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "weather_scrap=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialise logging: {}", e)))
}

/// Initialise logging for the HTTP server.
pub fn init_api() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_scrap=debug,weather_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialise logging: {}", e)))
}
