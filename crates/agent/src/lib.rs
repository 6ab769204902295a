//! Cinder collector agent
//!
//! Serves the collector over JSON HTTP next to health and Prometheus
//! endpoints.

pub mod api;
pub mod config;
