//! CSV table download.
//!
//! GET /data?type=weather|highest_temp|lowest_humidity

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use std::path::PathBuf;
use utoipa::IntoParams;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::{serve_file, AppState};

const DATA_TYPES: [&str; 3] = ["weather", "highest_temp", "lowest_humidity"];

#[derive(Debug, Deserialize, IntoParams)]
pub struct DataQuery {
    /// Required. One of `weather`, `highest_temp`, `lowest_humidity`
    #[serde(rename = "type")]
    pub data_type: Option<String>,
}

fn table_path(state: &AppState, data_type: &str) -> Option<PathBuf> {
    let path = match data_type {
        "weather" => &state.tables.processed,
        "highest_temp" => &state.tables.highest_temperature,
        "lowest_humidity" => &state.tables.lowest_humidity,
        _ => return None,
    };
    Some(path.clone())
}

/// Download one of the derived tables as CSV.
#[utoipa::path(
    get,
    path = "/data",
    tag = "Data",
    params(DataQuery),
    responses(
        (status = 200, description = "CSV table", content_type = "text/csv", body = String),
        (status = 400, description = "Missing or unknown data type", body = ErrorResponse),
        (status = 404, description = "Table not produced yet", body = ErrorResponse),
    )
)]
pub async fn get_data(
    State(state): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Result<Response, AppError> {
    let allowed = DATA_TYPES.join(", ");
    let data_type = query.data_type.as_deref().ok_or_else(|| {
        AppError::BadRequest(format!("Missing data type. Use one of: {}", allowed))
    })?;
    let path = table_path(&state, data_type).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid data type '{}'. Use one of: {}",
            data_type, allowed
        ))
    })?;

    let file_name = format!("{}_data.csv", data_type);
    serve_file(
        &path,
        "text/csv",
        Some(&file_name),
        format!("{} data not found", data_type),
    )
    .await
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get, state, write};
    use axum::http::{header, StatusCode};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_streams_each_table() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        write(&state.tables.processed, "City,Time\nLondon,2024-01-01T00:00\n");
        write(&state.tables.highest_temperature, "Hour,City\nh,Tokyo\n");
        write(&state.tables.lowest_humidity, "Hour,City\nh,Cairo\n");

        let (status, headers, body) = get(&state, "/data?type=weather").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"weather_data.csv\""
        );
        assert!(body.contains("London"));

        let (_, headers, body) = get(&state, "/data?type=highest_temp").await;
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"highest_temp_data.csv\""
        );
        assert!(body.contains("Tokyo"));

        let (_, _, body) = get(&state, "/data?type=lowest_humidity").await;
        assert!(body.contains("Cairo"));
    }

    #[tokio::test]
    async fn test_missing_type_is_400() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        write(&state.tables.processed, "City\nLima\n");

        let (status, _, body) = get(&state, "/data").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("weather, highest_temp, lowest_humidity"));
    }

    #[tokio::test]
    async fn test_unknown_type_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = get(&state(&dir), "/data?type=pressure").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("weather, highest_temp, lowest_humidity"));
    }

    #[tokio::test]
    async fn test_missing_table_is_404() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = get(&state(&dir), "/data?type=lowest_humidity").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("lowest_humidity data not found"));
    }
}
