//! Cinder v2.0 adapter
//!
//! Uses the privileged `all_tenants` detail listings, so one call covers
//! every tenant. Resources are keyed by their owner attribute.

use super::resources::{
    aggregate_by_owner, fetch_limits, list_sized, listing_url, service_base,
};
use super::session::Session;
use super::transport::CloudTransport;
use super::{ApiVersion, BlockStorageAdapter, ListingScope, VOLUME_SERVICE_V2};
use crate::error::{CollectorError, Result, TransportError};
use crate::models::{Limits, TenantAggregates};
use async_trait::async_trait;
use std::sync::Arc;

const VOLUME_OWNER_ATTR: &str = "os-vol-tenant-attr:tenant_id";
const SNAPSHOT_OWNER_ATTR: &str = "os-extended-snapshot-attributes:project_id";

pub struct CinderV2 {
    transport: Arc<dyn CloudTransport>,
}

impl CinderV2 {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }

    async fn all_tenant_aggregates(
        &self,
        session: &Session,
        collection: &str,
        owner_attribute: &str,
    ) -> std::result::Result<TenantAggregates, TransportError> {
        let base = service_base(session, VOLUME_SERVICE_V2)?;
        let url = listing_url(base, &format!("{collection}/detail"), true)?;
        let resources = list_sized(
            self.transport.as_ref(),
            session,
            &url,
            collection,
            Some(owner_attribute),
        )
        .await?;

        Ok(TenantAggregates::AllTenants(aggregate_by_owner(
            &resources,
            session.scope_key(),
        )?))
    }
}

#[async_trait]
impl BlockStorageAdapter for CinderV2 {
    fn version(&self) -> ApiVersion {
        ApiVersion::V2
    }

    fn listing_scope(&self) -> ListingScope {
        ListingScope::AllTenants
    }

    async fn get_limits(&self, session: &Session) -> Result<Limits> {
        let base = service_base(session, VOLUME_SERVICE_V2)
            .map_err(|e| CollectorError::adapter("limits", e))?;
        fetch_limits(self.transport.as_ref(), session, base)
            .await
            .map_err(|e| CollectorError::adapter("limits", e))
    }

    async fn get_volume_aggregate(&self, session: &Session) -> Result<TenantAggregates> {
        self.all_tenant_aggregates(session, "volumes", VOLUME_OWNER_ATTR)
            .await
            .map_err(|e| CollectorError::adapter("volumes", e))
    }

    async fn get_snapshot_aggregate(&self, session: &Session) -> Result<TenantAggregates> {
        self.all_tenant_aggregates(session, "snapshots", SNAPSHOT_OWNER_ATTR)
            .await
            .map_err(|e| CollectorError::adapter("snapshots", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregate, Tenant, GIB};
    use crate::openstack::CatalogEntry;
    use serde_json::{json, Value};

    const BASE: &str = "http://cinder:8776/v2/admin_id123";

    struct V2Stub;

    #[async_trait]
    impl CloudTransport for V2Stub {
        async fn get(
            &self,
            url: &str,
            _token: Option<&str>,
        ) -> std::result::Result<Value, TransportError> {
            match url.strip_prefix(BASE) {
                Some("/volumes/detail?all_tenants=true") => Ok(json!({
                    "volumes": [
                        {"id": "v1", "size": 11, "os-vol-tenant-attr:tenant_id": "admin_id123"},
                        {"id": "v2", "size": 22, "os-vol-tenant-attr:tenant_id": "demo_id123"}
                    ]
                })),
                Some("/snapshots/detail?all_tenants=true") => Ok(json!({
                    "snapshots": [
                        {"id": "s1", "size": 5, "os-extended-snapshot-attributes:project_id": "demo_id123"}
                    ]
                })),
                Some("/limits") => Err(TransportError::Http {
                    url: url.to_string(),
                    status: 503,
                    body: "maintenance".to_string(),
                }),
                _ => panic!("unexpected GET {url}"),
            }
        }

        async fn post(&self, url: &str, _body: &Value) -> std::result::Result<Value, TransportError> {
            panic!("unexpected POST {url}")
        }
    }

    fn admin_session() -> Session {
        Session::new(
            "tok-admin",
            Some(Tenant {
                id: "admin_id123".to_string(),
                name: "admin".to_string(),
            }),
            vec![CatalogEntry {
                service_type: VOLUME_SERVICE_V2.to_string(),
                name: "cinderv2".to_string(),
                public_url: BASE.to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn test_v2_volumes_keyed_by_owner() {
        let adapter = CinderV2::new(Arc::new(V2Stub));

        let volumes = adapter.get_volume_aggregate(&admin_session()).await.unwrap();

        let TenantAggregates::AllTenants(map) = volumes else {
            panic!("expected all-tenant aggregates");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map["admin_id123"], Aggregate { count: 1, bytes: 11 * GIB });
        assert_eq!(map["demo_id123"], Aggregate { count: 1, bytes: 22 * GIB });
    }

    #[tokio::test]
    async fn test_v2_snapshots_omit_tenants_without_any() {
        let adapter = CinderV2::new(Arc::new(V2Stub));

        let snapshots = adapter
            .get_snapshot_aggregate(&admin_session())
            .await
            .unwrap()
            .into_map("admin_id123");

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots["demo_id123"], Aggregate { count: 1, bytes: 5 * GIB });
    }

    #[tokio::test]
    async fn test_v2_limits_error_is_adapter_error() {
        let adapter = CinderV2::new(Arc::new(V2Stub));

        let err = adapter.get_limits(&admin_session()).await.unwrap_err();

        assert_eq!(err.kind(), "adapter");
        assert!(err.to_string().contains("503"));
        assert!(!err.is_unauthorized());
    }
}
