//! HTTP request handlers.

use super::AppState;
use crate::config::{ConfigError, EndpointEntry};
use crate::probe::{check_all, CheckResult, EndpointSpec};
use crate::scheduler::{RegistryError, CONCURRENCY_THRESHOLD};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{MonitorStats, PushAlert};

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match self {
            RegistryError::DuplicateName(_) | RegistryError::DuplicateUrl(_) => StatusCode::CONFLICT,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::LastEndpoint => StatusCode::BAD_REQUEST,
        };
        error_response(status, self.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<EndpointEntry>,
}

impl MutationResponse {
    fn ok(message: &str, api: Option<&EndpointSpec>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            api: api.map(EndpointEntry::from),
        })
    }
}

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let endpoints = state.registry.len().await;
    let stats = state.monitor.stats().await;

    let page = DASHBOARD_TEMPLATE
        .replace("{{endpoint_count}}", &endpoints.to_string())
        .replace("{{total_checks}}", &stats.total_checks.to_string())
        .replace("{{start_time}}", &stats.start_time.to_rfc3339());

    Html(page)
}

// ============================================================================
// API: Monitoring data
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub results: Vec<CheckResult>,
    pub stats: MonitorStats,
    pub timestamp: DateTime<Utc>,
}

pub async fn handle_get_data(State(state): State<AppState>) -> Json<DataResponse> {
    Json(DataResponse {
        results: state.monitor.results().await,
        stats: state.monitor.stats().await,
        timestamp: Utc::now(),
    })
}

pub async fn handle_get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.stats().await)
}

pub async fn handle_get_history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.history().await)
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub alert: Option<PushAlert>,
}

pub async fn handle_get_alerts(State(state): State<AppState>) -> Json<AlertResponse> {
    Json(AlertResponse {
        alert: state.monitor.take_alert().await,
    })
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub results_count: usize,
}

/// Check every endpoint now, bypassing the cache, and record the cycle.
pub async fn handle_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let endpoints = state.registry.snapshot().await;
    let concurrent = endpoints.len() > CONCURRENCY_THRESHOLD;
    let results = check_all(state.client.clone(), &endpoints, None, concurrent).await;
    state.monitor.record(&results).await;

    tracing::info!("Manual refresh checked {} endpoints", results.len());
    Json(RefreshResponse {
        success: true,
        message: "Monitoring refreshed".to_string(),
        results_count: results.len(),
    })
}

// ============================================================================
// API: Endpoints
// ============================================================================

pub async fn handle_get_endpoints(State(state): State<AppState>) -> Json<Vec<EndpointEntry>> {
    let endpoints = state.registry.snapshot().await;
    Json(endpoints.iter().map(EndpointEntry::from).collect())
}

pub async fn handle_create_endpoint(
    State(state): State<AppState>,
    Json(req): Json<EndpointEntry>,
) -> Response {
    let spec = match req.into_spec() {
        Ok(spec) => spec,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    if let Err(e) = state.registry.add(spec.clone()).await {
        return e.into_response();
    }

    if let Err(e) = state.save_endpoints().await {
        // Keep memory and disk in agreement
        if let Err(rollback) = state.registry.remove(&spec.name).await {
            tracing::error!("Failed to roll back endpoint {}: {}", spec.name, rollback);
        }
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save config: {}", e),
        );
    }

    tracing::info!("Added endpoint {} ({})", spec.name, spec.url);
    (
        StatusCode::CREATED,
        MutationResponse::ok("API added successfully", Some(&spec)),
    )
        .into_response()
}

/// Partial endpoint update; absent fields keep their current values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEndpointRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub timeout: Option<f64>,
    pub expected_status: Option<u16>,
    pub headers: Option<BTreeMap<String, String>>,
}

impl UpdateEndpointRequest {
    fn apply(self, current: &EndpointSpec) -> EndpointEntry {
        let current = EndpointEntry::from(current);
        EndpointEntry {
            name: self.name.unwrap_or(current.name),
            url: self.url.unwrap_or(current.url),
            method: self.method.unwrap_or(current.method),
            timeout: self.timeout.unwrap_or(current.timeout),
            expected_status: self.expected_status.unwrap_or(current.expected_status),
            headers: self.headers.unwrap_or(current.headers),
        }
    }
}

pub async fn handle_update_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<UpdateEndpointRequest>,
) -> Response {
    let Some(current) = state.registry.get(&name).await else {
        return RegistryError::NotFound(name).into_response();
    };

    let spec = match req.apply(&current).into_spec() {
        Ok(spec) => spec,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    if let Err(e) = state.registry.update(&name, spec.clone()).await {
        return e.into_response();
    }

    if let Err(e) = state.save_endpoints().await {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save config: {}", e),
        );
    }

    tracing::info!("Updated endpoint {}", name);
    MutationResponse::ok("API updated successfully", Some(&spec)).into_response()
}

pub async fn handle_delete_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if let Err(e) = state.registry.remove(&name).await {
        return e.into_response();
    }

    if let Err(e) = state.save_endpoints().await {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save config: {}", e),
        );
    }

    tracing::info!("Deleted endpoint {}", name);
    MutationResponse::ok("API deleted successfully", None).into_response()
}

impl AppState {
    /// Write the current endpoint list back to the config file, if any.
    async fn save_endpoints(&self) -> Result<(), ConfigError> {
        match &self.config_file {
            Some(file) => file.save_endpoints(&self.registry.snapshot().await),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, MonitorConfig};
    use crate::probe::{HttpClient, ProbeError, ProbeRequest};
    use crate::scheduler::EndpointRegistry;
    use crate::web::MonitorState;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Every URL containing "orders" is down.
    struct FixedClient;

    #[async_trait]
    impl HttpClient for FixedClient {
        async fn send(&self, request: ProbeRequest<'_>) -> Result<u16, ProbeError> {
            if request.url.contains("orders") {
                Ok(503)
            } else {
                Ok(200)
            }
        }
    }

    fn state() -> AppState {
        AppState {
            registry: EndpointRegistry::new(vec![
                EndpointSpec::new("users", "http://api/users"),
                EndpointSpec::new("orders", "http://api/orders"),
            ]),
            monitor: Arc::new(MonitorState::new()),
            client: Arc::new(FixedClient),
            config_file: None,
        }
    }

    fn entry(name: &str, url: &str) -> EndpointEntry {
        EndpointEntry::from(&EndpointSpec::new(name, url))
    }

    #[tokio::test]
    async fn test_create_endpoint() {
        let state = state();

        let resp = handle_create_endpoint(State(state.clone()), Json(entry("billing", "http://api/billing"))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(state.registry.len().await, 3);

        let resp = handle_create_endpoint(State(state.clone()), Json(entry("users", "http://elsewhere"))).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = handle_create_endpoint(State(state.clone()), Json(entry("other", "http://api/orders"))).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let mut invalid = entry("bad", "http://api/bad");
        invalid.timeout = 0.0;
        let resp = handle_create_endpoint(State(state.clone()), Json(invalid)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_update_endpoint() {
        let state = state();

        let req = UpdateEndpointRequest {
            expected_status: Some(204),
            method: Some("head".to_string()),
            ..Default::default()
        };
        let resp = handle_update_endpoint(State(state.clone()), Path("users".to_string()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let updated = state.registry.get("users").await.unwrap();
        assert_eq!(updated.expected_status, 204);
        assert_eq!(updated.method, "HEAD");
        assert_eq!(updated.url, "http://api/users");

        let resp = handle_update_endpoint(
            State(state.clone()),
            Path("missing".to_string()),
            Json(UpdateEndpointRequest::default()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = UpdateEndpointRequest {
            name: Some("orders".to_string()),
            ..Default::default()
        };
        let resp = handle_update_endpoint(State(state.clone()), Path("users".to_string()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_endpoint() {
        let state = state();

        let resp = handle_delete_endpoint(State(state.clone()), Path("missing".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = handle_delete_endpoint(State(state.clone()), Path("users".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = handle_delete_endpoint(State(state.clone()), Path("orders".to_string())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let base = MonitorConfig::from_yaml("apis:\n  - name: users\n    url: http://api/users\n").unwrap();

        let mut state = state();
        state.config_file = Some(Arc::new(ConfigFile::new(path.clone(), base)));

        let resp = handle_create_endpoint(State(state.clone()), Json(entry("billing", "http://api/billing"))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let saved = MonitorConfig::load(&path).unwrap();
        let names: Vec<&str> = saved.endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders", "billing"]);
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_add() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("config.yaml");
        let base = MonitorConfig::from_yaml("apis:\n  - name: users\n    url: http://api/users\n").unwrap();

        let mut state = state();
        state.config_file = Some(Arc::new(ConfigFile::new(path, base)));

        let resp = handle_create_endpoint(State(state.clone()), Json(entry("billing", "http://api/billing"))).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.registry.get("billing").await.is_none());
        assert_eq!(state.registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_data_and_alerts() {
        let state = state();
        let results = vec![CheckResult::failure(
            &EndpointSpec::new("users", "http://api/users"),
            1.0,
            "Connection error".to_string(),
        )];
        state.monitor.record(&results).await;

        let Json(data) = handle_get_data(State(state.clone())).await;
        assert_eq!(data.results, results);
        assert_eq!(data.stats.failed_checks, 1);

        let Json(alerts) = handle_get_alerts(State(state.clone())).await;
        assert!(alerts.alert.is_none());
    }

    #[tokio::test]
    async fn test_list_endpoints() {
        let Json(endpoints) = handle_get_endpoints(State(state())).await;
        let names: Vec<&str> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
    }

    #[tokio::test]
    async fn test_refresh_records_a_cycle() {
        let state = state();

        let Json(resp) = handle_refresh(State(state.clone())).await;
        assert!(resp.success);
        assert_eq!(resp.results_count, 2);

        let results = state.monitor.results().await;
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
        assert!(results[0].success);
        assert_eq!(results[1].status_code, Some(503));

        let stats = state.monitor.stats().await;
        assert_eq!(stats.total_checks, 1);
        assert_eq!(stats.failed_checks, 1);
        assert_eq!(state.monitor.history().await.len(), 1);
    }
}
