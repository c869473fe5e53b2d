//! Last pipeline run.
//!
//! GET /api/v1/status — the report written by the most recent
//! `weather-scrap` run.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::pipeline::{read_report, RunReport};

/// Get the outcome of the last pipeline run.
///
/// Per-city fetch results, processing summary (or error) and number of
/// charts rendered.
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "Status",
    responses(
        (status = 200, description = "Last run report", body = RunReport),
        (status = 404, description = "No run recorded yet", body = ErrorResponse),
    )
)]
pub async fn get_status(State(state): State<AppState>) -> Result<Json<RunReport>, AppError> {
    let path = state.report_path.clone();
    let report = tokio::task::spawn_blocking(move || read_report(&path))
        .await
        .map_err(|e| AppError::InternalError(format!("Status task failed: {}", e)))??;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get, state, write};
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_run_yet_is_404() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = get(&state(&dir), "/api/v1/status").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("No pipeline run recorded yet"));
    }

    #[tokio::test]
    async fn test_returns_saved_report() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let report = serde_json::json!({
            "started_at": "2024-01-01T10:00:00Z",
            "finished_at": "2024-01-01T10:00:05Z",
            "dataset": "weather_data/weather_2024-01-01.csv",
            "cities": [{
                "city": "London",
                "latitude": 51.5074,
                "longitude": -0.1278,
                "result": "appended",
                "rows_appended": 168
            }],
            "processing": {"rows_read": 168, "rows_kept": 168, "distinct_hours": 168},
            "processing_error": null,
            "charts_rendered": 6
        });
        write(&state.report_path, &report.to_string());

        let (status, _, body) = get(&state, "/api/v1/status").await;

        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["cities"][0]["city"], "London");
        assert_eq!(parsed["processing"]["distinct_hours"], 168);
    }

    #[tokio::test]
    async fn test_corrupt_report_is_500() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        write(&state.report_path, "{not json");

        let (status, _, _) = get(&state, "/api/v1/status").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
