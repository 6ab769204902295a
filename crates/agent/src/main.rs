//! Cinder Collector Agent
//!
//! Serves multi-tenant OpenStack block storage metrics over HTTP.

use anyhow::Result;
use cinder_agent::{api, config::AgentConfig};
use cinder_lib::{
    health::{components, HealthRegistry},
    observability::{CollectorMetrics, StructuredLogger},
    CinderCollector, HttpTransport,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AgentConfig::load()?;
    info!(
        identity_endpoint = %config.identity_endpoint,
        tenant = %config.tenant,
        api_port = config.api_port,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    for component in components::ALL {
        health_registry.register(component).await;
    }

    let metrics = CollectorMetrics::new();
    let logger = StructuredLogger::new(config.source_host.clone());
    logger.log_startup(AGENT_VERSION, &config.identity_endpoint);

    let transport = Arc::new(HttpTransport::new(config.http_timeout())?);
    let collector = Arc::new(CinderCollector::new(
        transport,
        config.collector_settings(),
    ));

    let state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        collector,
        config.clone(),
    ));

    health_registry.set_ready(true).await;
    info!("Agent initialization complete");

    let server = tokio::spawn(api::serve(config.api_port, state));

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("api server stopped"),
                Ok(Err(err)) => {
                    error!(error = %err, "API server failed");
                    logger.log_shutdown("api server failed");
                    return Err(err);
                }
                Err(err) => {
                    error!(error = %err, "API server task aborted");
                    logger.log_shutdown("api server aborted");
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            health_registry.set_ready(false).await;
            logger.log_shutdown("SIGINT received");
        }
    }

    Ok(())
}
