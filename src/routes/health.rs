use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::AppState;
use crate::services::charts::ChartKind;

/// Which pipeline outputs are present on disk.
#[derive(Debug, Serialize, ToSchema)]
pub struct ArtifactStatus {
    pub weather_data: bool,
    pub highest_temp: bool,
    pub lowest_humidity: bool,
    /// Number of rendered charts found
    pub graphs: usize,
    pub last_run: bool,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when every table exists, "degraded" otherwise
    pub status: String,
    /// API version
    pub version: String,
    pub artifacts: ArtifactStatus,
}

/// Health check endpoint.
///
/// Always 200. Reports "degraded" until the pipeline has produced its
/// tables, so callers can tell a fresh deployment from a broken one.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let artifacts = ArtifactStatus {
        weather_data: state.tables.processed.exists(),
        highest_temp: state.tables.highest_temperature.exists(),
        lowest_humidity: state.tables.lowest_humidity.exists(),
        graphs: ChartKind::ALL
            .iter()
            .filter(|kind| state.graphs_dir.join(kind.file_name()).exists())
            .count(),
        last_run: state.report_path.exists(),
    };
    let healthy = artifacts.weather_data && artifacts.highest_temp && artifacts.lowest_humidity;

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        artifacts,
    })
}
