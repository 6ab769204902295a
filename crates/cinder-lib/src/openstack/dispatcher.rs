//! Per-session selection of the block storage adapter

use super::session::Session;
use super::transport::CloudTransport;
use super::v1::CinderV1;
use super::v2::CinderV2;
use super::versions::{choose_version, discover_versions};
use super::{ApiVersion, BlockStorageAdapter};
use crate::error::{CollectorError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Create the adapter for an advertised version id
pub fn adapter_for_version(
    version: &str,
    transport: Arc<dyn CloudTransport>,
) -> Result<Arc<dyn BlockStorageAdapter>> {
    match ApiVersion::from_id(version) {
        Some(ApiVersion::V2) => {
            info!("Detected block storage v2.0, using all-tenants adapter");
            Ok(Arc::new(CinderV2::new(transport)))
        }
        Some(ApiVersion::V1) => {
            info!("Detected block storage v1.0, using per-tenant adapter");
            Ok(Arc::new(CinderV1::new(transport)))
        }
        None => Err(CollectorError::UnsupportedVersion(version.to_string())),
    }
}

/// Resolves and memoizes the adapter of each session scope
pub struct ServiceDispatcher {
    transport: Arc<dyn CloudTransport>,
    adapters: DashMap<String, Arc<dyn BlockStorageAdapter>>,
}

impl ServiceDispatcher {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self {
            transport,
            adapters: DashMap::new(),
        }
    }

    /// Adapter for the version the session's storage endpoint speaks
    ///
    /// The probe runs once per session scope; later calls reuse its result.
    pub async fn dispatch(&self, session: &Session) -> Result<Arc<dyn BlockStorageAdapter>> {
        if let Some(adapter) = self.adapters.get(session.scope_key()) {
            return Ok(Arc::clone(adapter.value()));
        }

        let candidates = discover_versions(self.transport.as_ref(), session).await?;
        let version = choose_version(&candidates)?;
        debug!(
            scope = %session.scope_key(),
            candidates = ?candidates,
            chosen = %version,
            "Selected block storage API version"
        );

        let adapter = adapter_for_version(&version, Arc::clone(&self.transport))?;
        self.adapters
            .insert(session.scope_key().to_string(), Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Drop the memoized adapter of a session scope
    pub fn forget(&self, session: &Session) {
        self.adapters.remove(session.scope_key());
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
