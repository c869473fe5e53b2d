//! Chart download.
//!
//! GET /graphs?type=<chart>&download=bool

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::{serve_file, AppState};
use crate::services::charts::ChartKind;

#[derive(Debug, Deserialize, IntoParams)]
pub struct GraphQuery {
    /// Required chart key, e.g. `temperature_city` or `highest_temperature_time`
    #[serde(rename = "type")]
    pub chart: Option<String>,
    /// Serve as an attachment instead of inline
    #[serde(default)]
    pub download: bool,
}

/// Fetch one rendered chart as SVG.
#[utoipa::path(
    get,
    path = "/graphs",
    tag = "Graphs",
    params(GraphQuery),
    responses(
        (status = 200, description = "SVG chart", content_type = "image/svg+xml", body = String),
        (status = 400, description = "Missing or unknown chart type", body = ErrorResponse),
        (status = 404, description = "Chart not rendered yet", body = ErrorResponse),
    )
)]
pub async fn get_graph(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> Result<Response, AppError> {
    let allowed: Vec<&str> = ChartKind::ALL.iter().map(|k| k.key()).collect();
    let key = query.chart.as_deref().ok_or_else(|| {
        AppError::BadRequest(format!("Missing graph type. Use one of: {}", allowed.join(", ")))
    })?;
    let kind = ChartKind::from_key(key).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid graph type '{}'. Use one of: {}",
            key,
            allowed.join(", ")
        ))
    })?;

    let path = state.graphs_dir.join(kind.file_name());
    let attachment = query.download.then(|| format!("{}.svg", key));
    serve_file(
        &path,
        "image/svg+xml",
        attachment.as_deref(),
        format!("{} graph not found", key),
    )
    .await
}
