use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// One entry of the endpoint index.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointInfo {
    pub path: String,
    pub description: String,
}

/// Index of the endpoints served by this API.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointIndex {
    pub message: String,
    pub endpoints: Vec<EndpointInfo>,
}

/// List the available endpoints.
#[utoipa::path(
    get,
    path = "/",
    tag = "Home",
    responses(
        (status = 200, description = "Endpoint index", body = EndpointIndex),
    )
)]
pub async fn index() -> Json<EndpointIndex> {
    let endpoints = [
        ("/data?type=weather", "Processed hourly observations (CSV)"),
        ("/data?type=highest_temp", "Warmest city per hour (CSV)"),
        ("/data?type=lowest_humidity", "Driest city per hour (CSV)"),
        ("/graphs?type=<chart>&download=false", "Rendered chart (SVG)"),
        ("/api/v1/health", "Service health and artifact presence"),
        ("/api/v1/status", "Outcome of the last pipeline run"),
        ("/swagger-ui", "Interactive API documentation"),
    ];

    Json(EndpointIndex {
        message: "Welcome to the Weather Scrap API".to_string(),
        endpoints: endpoints
            .iter()
            .map(|(path, description)| EndpointInfo {
                path: path.to_string(),
                description: description.to_string(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_lists_data_and_graphs() {
        let Json(index) = index().await;
        let paths: Vec<&str> = index.endpoints.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/data?type=weather"));
        assert!(paths.iter().any(|p| p.starts_with("/graphs")));
        assert!(paths.contains(&"/api/v1/status"));
    }
}
