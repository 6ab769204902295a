//! HTTP API for the collector, health checks and Prometheus metrics

use crate::config::AgentConfig;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cinder_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::CollectorMetrics,
    CinderCollector, CollectorError, ConfigSchema, ConnectionConfig, MetricPath, MetricRecord,
    MetricRequest,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: CollectorMetrics,
    pub collector: Arc<CinderCollector>,
    pub config: AgentConfig,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: CollectorMetrics,
        collector: Arc<CinderCollector>,
        config: AgentConfig,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            collector,
            config,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub metrics: Vec<MetricPath>,
}

/// One requested metric; connection settings default to the agent's own
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestedMetric {
    pub path: MetricPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConnectionConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectRequest {
    pub metrics: Vec<RequestedMetric>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectResponse {
    pub records: Vec<MetricRecord>,
}

/// Collector error rendered as a JSON response
pub struct ApiError(CollectorError);

impl From<CollectorError> for ApiError {
    fn from(err: CollectorError) -> Self {
        Self(err)
    }
}

fn status_for(err: &CollectorError) -> StatusCode {
    match err {
        CollectorError::Config(_)
        | CollectorError::UnknownTenant(_)
        | CollectorError::RequestFormat { .. } => StatusCode::BAD_REQUEST,
        CollectorError::Auth { .. } => StatusCode::UNAUTHORIZED,
        CollectorError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CollectorError::UnknownField { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        CollectorError::Multiple(errors) => errors
            .first()
            .map(status_for)
            .unwrap_or(StatusCode::BAD_GATEWAY),
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status_for(&self.0), Json(body)).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %err, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn schema(State(state): State<Arc<AppState>>) -> Json<ConfigSchema> {
    Json(state.collector.config_schema())
}

/// Enumerate metric paths; an empty body uses the agent's credentials
async fn discover(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DiscoverResponse>, ApiError> {
    let requested = if body.is_empty() {
        ConnectionConfig::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| CollectorError::Config(format!("invalid connection settings: {e}")))?
    };
    let config = state.config.complete(requested);

    match state.collector.discover(&config).await {
        Ok(metrics) => {
            state.health_registry.record_success().await;
            Ok(Json(DiscoverResponse { metrics }))
        }
        Err(err) => {
            state.health_registry.record_error(&err).await;
            Err(err.into())
        }
    }
}

async fn collect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CollectRequest>,
) -> Result<Json<CollectResponse>, ApiError> {
    let requests: Vec<MetricRequest> = request
        .metrics
        .into_iter()
        .map(|metric| MetricRequest {
            path: metric.path,
            config: state.config.complete(metric.config.unwrap_or_default()),
        })
        .collect();

    match state.collector.collect(&requests).await {
        Ok(records) => {
            state.health_registry.record_cycle(records.len()).await;
            Ok(Json(CollectResponse { records }))
        }
        Err(err) => {
            state.health_registry.record_error(&err).await;
            Err(err.into())
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/schema", get(schema))
        .route("/v1/discover", post(discover))
        .route("/v1/collect", post(collect))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_for_error_kinds() {
        assert_eq!(
            status_for(&CollectorError::UnknownTenant("ghost".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&CollectorError::Timeout {
                operation: "volumes".into(),
                timeout: Duration::from_secs(1),
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&CollectorError::NoRecognizedVersion),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&CollectorError::Multiple(vec![
                CollectorError::UnsupportedVersion("v3.0".into()),
                CollectorError::Config("missing".into()),
            ])),
            StatusCode::BAD_GATEWAY
        );
    }
}
