// Weather Scrap API v0.1
use std::net::SocketAddr;

use weather_scrap::config::AppConfig;
use weather_scrap::errors::AppError;
use weather_scrap::logging;
use weather_scrap::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_api()?;

    let config = AppConfig::from_env()?;
    let app = routes::router(AppState::from_config(&config));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );
    tracing::info!(
        "Serving tables from {} and charts from {}",
        config.output_dir.display(),
        config.graphs_dir.display()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
