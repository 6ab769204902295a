//! Cinder v1.0 adapter
//!
//! v1 listings only cover the tenant the token is scoped to, so callers fan
//! out one session per tenant.

use super::resources::{aggregate, fetch_limits, list_sized, listing_url, service_base};
use super::session::Session;
use super::transport::CloudTransport;
use super::{ApiVersion, BlockStorageAdapter, ListingScope, VOLUME_SERVICE_V1};
use crate::error::{CollectorError, Result, TransportError};
use crate::models::{Limits, TenantAggregates};
use async_trait::async_trait;
use std::sync::Arc;

pub struct CinderV1 {
    transport: Arc<dyn CloudTransport>,
}

impl CinderV1 {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }

    async fn own_aggregate(
        &self,
        session: &Session,
        collection: &str,
    ) -> std::result::Result<TenantAggregates, TransportError> {
        let base = service_base(session, VOLUME_SERVICE_V1)?;
        let url = listing_url(base, collection, false)?;
        let resources = list_sized(self.transport.as_ref(), session, &url, collection, None).await?;
        Ok(TenantAggregates::Scoped(aggregate(&resources)?))
    }
}

#[async_trait]
impl BlockStorageAdapter for CinderV1 {
    fn version(&self) -> ApiVersion {
        ApiVersion::V1
    }

    fn listing_scope(&self) -> ListingScope {
        ListingScope::OwnTenant
    }

    async fn get_limits(&self, session: &Session) -> Result<Limits> {
        let base = service_base(session, VOLUME_SERVICE_V1)
            .map_err(|e| CollectorError::adapter("limits", e))?;
        fetch_limits(self.transport.as_ref(), session, base)
            .await
            .map_err(|e| CollectorError::adapter("limits", e))
    }

    async fn get_volume_aggregate(&self, session: &Session) -> Result<TenantAggregates> {
        self.own_aggregate(session, "volumes")
            .await
            .map_err(|e| CollectorError::adapter("volumes", e))
    }

    async fn get_snapshot_aggregate(&self, session: &Session) -> Result<TenantAggregates> {
        self.own_aggregate(session, "snapshots")
            .await
            .map_err(|e| CollectorError::adapter("snapshots", e))
    }
}
