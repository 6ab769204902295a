//! Core data models for the Cinder collector

use crate::error::{CollectorError, Result};
use crate::namespace::MetricPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Bytes per GiB, the unit Cinder reports volume and snapshot sizes in
pub const GIB: i64 = 1024 * 1024 * 1024;

/// Billing/isolation unit of the cloud account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
}

/// Tenants visible to the privileged identity, keyed both ways
#[derive(Debug, Clone, Default)]
pub struct TenantDirectory {
    names_by_id: HashMap<String, String>,
    ids_by_name: HashMap<String, String>,
}

impl TenantDirectory {
    pub fn from_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let mut directory = Self::default();
        for tenant in tenants {
            directory
                .ids_by_name
                .insert(tenant.name.clone(), tenant.id.clone());
            directory.names_by_id.insert(tenant.id, tenant.name);
        }
        directory
    }

    /// Resolve a tenant name to its id
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.ids_by_name.get(name).map(String::as_str)
    }

    /// Resolve a tenant id to its name
    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.names_by_id.get(id).map(String::as_str)
    }

    /// Tenant lookup by name
    pub fn tenant(&self, name: &str) -> Option<Tenant> {
        self.id_for(name).map(|id| Tenant {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    /// All tenant names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ids_by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.names_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names_by_id.is_empty()
    }
}

/// Per-tenant block storage quota
///
/// Quotas are assumed static for the process lifetime. `-1` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_total_volumes: i64,
    pub max_total_volume_gigabytes: i64,
}

/// Count and byte total over all resources of one kind for a tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: i64,
    pub bytes: i64,
}

pub type VolumeAggregate = Aggregate;
pub type SnapshotAggregate = Aggregate;

impl Aggregate {
    /// Account for one resource of `size_gib` GiB
    ///
    /// Returns `None` and leaves the totals untouched for a negative size or
    /// when either total would overflow.
    pub fn add_gib(&mut self, size_gib: i64) -> Option<()> {
        if size_gib < 0 {
            return None;
        }
        let bytes = self.bytes.checked_add(size_gib.checked_mul(GIB)?)?;
        let count = self.count.checked_add(1)?;
        self.bytes = bytes;
        self.count = count;
        Some(())
    }
}

/// Aggregates as returned by one adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantAggregates {
    /// Only the session's own tenant is covered
    Scoped(Aggregate),
    /// Every tenant, keyed by tenant id
    AllTenants(HashMap<String, Aggregate>),
}

impl TenantAggregates {
    /// Key the result by tenant id, attributing a scoped result to `own_tenant_id`
    pub fn into_map(self, own_tenant_id: &str) -> HashMap<String, Aggregate> {
        match self {
            TenantAggregates::Scoped(aggregate) => {
                HashMap::from([(own_tenant_id.to_string(), aggregate)])
            }
            TenantAggregates::AllTenants(map) => map,
        }
    }
}

/// Everything known about one tenant in a collection cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantMetrics {
    pub limits: Limits,
    pub volumes: VolumeAggregate,
    pub snapshots: SnapshotAggregate,
}

/// One collected metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub path: MetricPath,
    pub value: i64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Identity endpoint and credentials carried by every request
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Privileged tenant used for cross-tenant listings; required for collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user: user.into(),
            password: password.into(),
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Check the identity fields and return the credentials they describe
    pub fn credentials(&self) -> Result<Credentials> {
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("user", &self.user),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(CollectorError::Config(format!(
                    "missing required item {name:?}"
                )));
            }
        }

        Ok(Credentials {
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }

    /// The privileged tenant name, required for collection
    pub fn privileged_tenant(&self) -> Result<&str> {
        match self.tenant.as_deref().map(str::trim) {
            Some(tenant) if !tenant.is_empty() => Ok(tenant),
            _ => Err(CollectorError::Config(
                "missing required item \"tenant\"".to_string(),
            )),
        }
    }
}

/// Validated identity credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// A metric requested by the host together with its connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRequest {
    pub path: MetricPath,
    pub config: ConnectionConfig,
}

/// Description of one configuration item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
    pub description: String,
}

/// Configuration items understood by the collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub fields: Vec<ConfigField>,
}
