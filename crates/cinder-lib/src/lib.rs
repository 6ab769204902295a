//! Multi-tenant OpenStack block storage metrics collector
//!
//! This crate provides the core functionality for:
//! - Keystone v2 sessions and the tenant directory
//! - Cinder v1/v2 API version detection and version adapters
//! - The `intel/openstack/cinder/<tenant>/<category>/<field>` namespace
//! - Concurrent, cached collection across tenants
//! - Health checks and observability

pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod namespace;
pub mod observability;
pub mod openstack;

pub use collector::{CinderCollector, CollectorSettings};
pub use error::{CollectorError, Result, TransportError};
pub use health::{
    ComponentHealth, ComponentStatus, CycleSummary, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use namespace::{Category, MetricPath};
pub use observability::{CollectorMetrics, StructuredLogger};
pub use openstack::{CloudTransport, HttpTransport};
