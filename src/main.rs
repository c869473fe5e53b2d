// Weather Scrap pipeline v0.1
use clap::Parser;
use std::process::ExitCode;

use weather_scrap::config::AppConfig;
use weather_scrap::logging;
use weather_scrap::services::pipeline::Pipeline;

/// Fetch hourly weather for a set of cities, append it to today's dataset
/// and rebuild the derived tables and charts.
#[derive(Parser)]
#[command(name = "weather-scrap")]
#[command(version)]
struct Cli {
    /// City names to fetch (default: the built-in list of ten cities)
    cities: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_pipeline(&config.log_dir) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let root = tracing::info_span!("weather_scrap");
    let pipeline = match Pipeline::new(config, &root) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Failed to set up pipeline: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match pipeline.run(&cli.cities).await {
        Ok(report) => {
            tracing::info!(
                "Run finished: {} rows appended, {} cities failed, {} charts rendered",
                report.rows_appended(),
                report.failed_cities(),
                report.charts_rendered
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
