//! OpenStack identity and block storage access
//!
//! This module provides the cloud session, API version probing and the
//! version-specific block storage adapters. Cinder v1.0 and v2.0 are
//! supported; the version a cluster speaks is detected per session and the
//! matching adapter is selected by the [`ServiceDispatcher`].

mod dispatcher;
mod pagination;
mod resources;
mod session;
mod transport;
mod v1;
mod v2;
mod versions;

pub use dispatcher::{adapter_for_version, ServiceDispatcher};
pub use session::{authenticate, list_tenants, CatalogEntry, Session};
pub use transport::{CloudTransport, HttpTransport, AUTH_TOKEN_HEADER};
pub use v1::CinderV1;
pub use v2::CinderV2;
pub use versions::{choose_version, discover_versions};

use crate::error::Result;
use crate::models::{Limits, TenantAggregates};
use async_trait::async_trait;
use std::fmt;

/// Catalog service type of the Cinder v1 API
pub const VOLUME_SERVICE_V1: &str = "volume";
/// Catalog service type of the Cinder v2 API
pub const VOLUME_SERVICE_V2: &str = "volumev2";

/// Block storage API versions with an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    /// Exact match on the advertised version id
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "v1.0" => Some(ApiVersion::V1),
            "v2.0" => Some(ApiVersion::V2),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1.0",
            ApiVersion::V2 => "v2.0",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Which tenants one aggregate listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// Only the session's own tenant
    OwnTenant,
    /// Every tenant in one call (privileged `all_tenants` listing)
    AllTenants,
}

/// Trait for version-specific block storage collection
#[async_trait]
pub trait BlockStorageAdapter: Send + Sync {
    /// API version this adapter speaks
    fn version(&self) -> ApiVersion;

    /// Coverage of the aggregate operations
    fn listing_scope(&self) -> ListingScope;

    /// Quota of the session's tenant
    async fn get_limits(&self, session: &Session) -> Result<Limits>;

    /// Volume count and total bytes
    async fn get_volume_aggregate(&self, session: &Session) -> Result<TenantAggregates>;

    /// Snapshot count and total bytes
    async fn get_snapshot_aggregate(&self, session: &Session) -> Result<TenantAggregates>;
}
