//! Health tracking for the collector agent
//!
//! Component health is derived from the outcome of identity and block storage
//! calls, since the collector has no background loop of its own.

use crate::error::CollectorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still operational, with issues
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Summary of the most recent successful collect call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub completed_at: DateTime<Utc>,
    pub records: usize,
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleSummary>,
}

impl HealthResponse {
    /// Worst status over all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const IDENTITY: &str = "identity";
    pub const BLOCK_STORAGE: &str = "block_storage";
    pub const COLLECTOR: &str = "collector";

    pub const ALL: [&str; 3] = [IDENTITY, BLOCK_STORAGE, COLLECTOR];
}

/// Component affected by an error, if any
fn component_for(error: &CollectorError) -> Option<&'static str> {
    match error {
        CollectorError::Auth { .. } | CollectorError::Directory(_) => Some(components::IDENTITY),
        CollectorError::Probe(_)
        | CollectorError::NoRecognizedVersion
        | CollectorError::UnsupportedVersion(_)
        | CollectorError::Adapter { .. }
        | CollectorError::Timeout { .. } => Some(components::BLOCK_STORAGE),
        CollectorError::UnknownField { .. } | CollectorError::TaskFailed(_) => {
            Some(components::COLLECTOR)
        }
        CollectorError::Multiple(errors) => errors.iter().find_map(component_for),
        CollectorError::Config(_)
        | CollectorError::UnknownTenant(_)
        | CollectorError::RequestFormat { .. } => None,
    }
}

#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    last_cycle: Arc<RwLock<Option<CycleSummary>>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            last_cycle: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Mark the cloud-facing components healthy after a successful call
    pub async fn record_success(&self) {
        self.set_healthy(components::IDENTITY).await;
        self.set_healthy(components::BLOCK_STORAGE).await;
    }

    /// Record a successful collect call
    pub async fn record_cycle(&self, records: usize) {
        self.record_success().await;
        self.set_healthy(components::COLLECTOR).await;
        *self.last_cycle.write().await = Some(CycleSummary {
            completed_at: Utc::now(),
            records,
        });
    }

    /// Mark the components an error points at as unhealthy
    ///
    /// Request-side errors leave health untouched.
    pub async fn record_error(&self, error: &CollectorError) {
        let mut pending = vec![error];
        while let Some(error) = pending.pop() {
            match error {
                CollectorError::Multiple(errors) => pending.extend(errors.iter().rev()),
                other => {
                    if let Some(component) = component_for(other) {
                        self.set_unhealthy(component, other.to_string()).await;
                    }
                }
            }
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        let last_cycle = self.last_cycle.read().await.clone();
        HealthResponse {
            status,
            components,
            last_cycle,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Agent not yet initialized".to_string()),
            }
        } else if !health.status.is_operational() {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::time::Duration;

    async fn registered() -> HealthRegistry {
        let registry = HealthRegistry::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        registry
    }

    fn forbidden() -> TransportError {
        TransportError::Http {
            url: "http://keystone:5000/v2.0/tokens".to_string(),
            status: 401,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert!(health.last_cycle.is_none());
    }

    #[tokio::test]
    async fn test_auth_error_marks_identity_unhealthy() {
        let registry = registered().await;
        registry
            .record_error(&CollectorError::Auth {
                scope: "tenant \"admin\"".to_string(),
                source: forbidden(),
            })
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::IDENTITY].status,
            ComponentStatus::Unhealthy
        );
        assert_eq!(
            health.components[components::BLOCK_STORAGE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_multiple_errors_mark_each_component() {
        let registry = registered().await;
        registry
            .record_error(&CollectorError::Multiple(vec![
                CollectorError::Directory(forbidden()),
                CollectorError::Timeout {
                    operation: "volumes".to_string(),
                    timeout: Duration::from_secs(30),
                },
            ]))
            .await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::IDENTITY].status,
            ComponentStatus::Unhealthy
        );
        assert_eq!(
            health.components[components::BLOCK_STORAGE].status,
            ComponentStatus::Unhealthy
        );
    }

    fn adapter_failure(operation: &'static str) -> CollectorError {
        CollectorError::adapter(
            operation,
            TransportError::Http {
                url: format!("http://cinder:8776/v2/admin_id123/{operation}"),
                status: 503,
                body: String::new(),
            },
        )
    }

    #[test]
    fn test_component_for_multiple_uses_first_attributable_error() {
        let concurrent = CollectorError::Multiple(vec![
            adapter_failure("volumes"),
            adapter_failure("snapshots"),
        ]);
        assert_eq!(component_for(&concurrent), Some(components::BLOCK_STORAGE));

        let mixed = CollectorError::Multiple(vec![
            CollectorError::UnknownTenant("ghost".to_string()),
            CollectorError::Directory(forbidden()),
        ]);
        assert_eq!(component_for(&mixed), Some(components::IDENTITY));

        assert_eq!(component_for(&CollectorError::Multiple(vec![])), None);
    }

    #[tokio::test]
    async fn test_concurrent_adapter_failures_mark_block_storage() {
        let registry = registered().await;
        registry
            .record_error(&CollectorError::Multiple(vec![CollectorError::Multiple(vec![
                adapter_failure("volumes"),
                adapter_failure("snapshots"),
            ])]))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::BLOCK_STORAGE].status,
            ComponentStatus::Unhealthy
        );
        assert_eq!(
            health.components[components::IDENTITY].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_request_errors_leave_health_untouched() {
        let registry = registered().await;
        registry
            .record_error(&CollectorError::RequestFormat {
                path: "intel/openstack".to_string(),
                reason: "too short".to_string(),
            })
            .await;
        registry
            .record_error(&CollectorError::UnknownTenant("ghost".to_string()))
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_cycle_recovers_health_and_records_summary() {
        let registry = registered().await;
        registry
            .set_unhealthy(components::BLOCK_STORAGE, "probe failed")
            .await;

        registry.record_cycle(12).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.last_cycle.map(|c| c.records), Some(12));
    }

    #[tokio::test]
    async fn test_readiness_transitions() {
        let registry = registered().await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry.set_degraded(components::COLLECTOR, "slow").await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::IDENTITY, "down").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }
}
