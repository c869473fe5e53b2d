//! Read-only HTTP façade over the pipeline artifacts.

pub mod data;
pub mod graphs;
pub mod health;
pub mod home;
pub mod status;

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::{routing::get, Router};
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::processor::OutputPaths;

/// Where the pipeline leaves the files this API serves.
#[derive(Debug, Clone)]
pub struct AppState {
    pub tables: OutputPaths,
    pub graphs_dir: PathBuf,
    pub report_path: PathBuf,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tables: config.output_paths(),
            graphs_dir: config.graphs_dir.clone(),
            report_path: config.run_report_path(),
        }
    }
}

/// Weather Scrap API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Scrap API",
        version = "0.1.0",
        description = "Read-only access to the hourly weather collected for a set of cities: \
            the processed dataset, the per-hour highest-temperature and lowest-humidity \
            rankings, the rendered charts and the outcome of the last pipeline run.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Home", description = "Endpoint index"),
        (name = "Data", description = "Processed CSV tables"),
        (name = "Graphs", description = "Rendered SVG charts"),
        (name = "Health", description = "Service health check"),
        (name = "Status", description = "Last pipeline run"),
    ),
    paths(
        home::index,
        data::get_data,
        graphs::get_graph,
        health::health_check,
        status::get_status,
    ),
    components(
        schemas(
            home::EndpointIndex,
            home::EndpointInfo,
            health::HealthResponse,
            health::ArtifactStatus,
            crate::services::pipeline::RunReport,
            crate::services::pipeline::CityRunStatus,
            crate::services::processor::ProcessingSummary,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // Read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(home::index))
        .route("/data", get(data::get_data))
        .route("/graphs", get(graphs::get_graph))
        .route("/api/v1/health", get(health::health_check))
        .route("/api/v1/status", get(status::get_status))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Stream a file from disk with the given content type.
///
/// A missing file is a 404 carrying `missing`. With `attachment` set the
/// response also carries `Content-Disposition: attachment`.
pub(crate) async fn serve_file(
    path: &Path,
    content_type: &'static str,
    attachment: Option<&str>,
    missing: String,
) -> Result<Response, AppError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("{} does not exist", path.display());
            return Err(AppError::NotFound(missing));
        }
        Err(e) => return Err(e.into()),
    };

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(name) = attachment {
        let value = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
            .map_err(|e| AppError::InternalError(format!("Invalid file name {}: {}", name, e)))?;
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub(crate) fn state(dir: &TempDir) -> AppState {
        let output = dir.path().join("Data");
        AppState {
            tables: OutputPaths::in_dir(&output),
            graphs_dir: dir.path().join("Graphs"),
            report_path: output.join("last_run.json"),
        }
    }

    pub(crate) fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Issue a GET against a fresh router.
    pub(crate) async fn get(
        state: &AppState,
        uri: &str,
    ) -> (StatusCode, axum::http::HeaderMap, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }
}
