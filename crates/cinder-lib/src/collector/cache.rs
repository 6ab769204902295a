//! Process-lifetime caches of the collector
//!
//! Every entry is scoped by the identity endpoint and user it was obtained
//! with, so calls against different clouds never share sessions, quotas or
//! tenant directories. Within a scope, sessions and quotas are keyed by
//! tenant id. Aggregates are never cached.

use crate::error::Result;
use crate::models::{Credentials, Limits, TenantDirectory};
use crate::openstack::Session;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

type SessionCell = Arc<OnceCell<Arc<Session>>>;

/// Identity endpoint and user a cache entry belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudScope {
    endpoint: String,
    user: String,
}

impl CloudScope {
    pub fn new(endpoint: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            user: user.into(),
        }
    }

    pub fn of(credentials: &Credentials) -> Self {
        Self::new(credentials.endpoint.as_str(), credentials.user.as_str())
    }
}

type TenantKey = (CloudScope, String);

fn key(scope: &CloudScope, tenant_id: &str) -> TenantKey {
    (scope.clone(), tenant_id.to_string())
}

#[derive(Default)]
pub struct TenantCache {
    sessions: DashMap<TenantKey, SessionCell>,
    limits: DashMap<TenantKey, Limits>,
    directories: RwLock<HashMap<CloudScope, TenantDirectory>>,
}

impl TenantCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached session of `tenant_id`, created with `authenticate` on a miss
    ///
    /// Concurrent callers for the same tenant share one authentication. A
    /// failed authentication leaves the slot empty for the next caller.
    pub async fn session<F, Fut>(
        &self,
        scope: &CloudScope,
        tenant_id: &str,
        authenticate: F,
    ) -> Result<Arc<Session>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session>>,
    {
        let cell: SessionCell = Arc::clone(&self.sessions.entry(key(scope, tenant_id)).or_default());

        if let Some(session) = cell.get() {
            debug!(tenant_id = %tenant_id, "Session cache hit");
            return Ok(Arc::clone(session));
        }

        cell.get_or_try_init(|| async move { authenticate().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// Drop the cached session of `tenant_id`; returns whether one was cached
    pub fn evict_session(&self, scope: &CloudScope, tenant_id: &str) -> bool {
        self.sessions
            .remove(&key(scope, tenant_id))
            .map(|(_, cell)| cell.initialized())
            .unwrap_or(false)
    }

    pub fn has_session(&self, scope: &CloudScope, tenant_id: &str) -> bool {
        self.sessions
            .get(&key(scope, tenant_id))
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    pub fn limits(&self, scope: &CloudScope, tenant_id: &str) -> Option<Limits> {
        self.limits
            .get(&key(scope, tenant_id))
            .map(|entry| *entry.value())
    }

    /// Store a tenant's quota; an existing entry is kept
    pub fn store_limits(&self, scope: &CloudScope, tenant_id: &str, limits: Limits) {
        self.limits.entry(key(scope, tenant_id)).or_insert(limits);
    }

    /// Number of tenants with a cached quota, over all scopes
    pub fn cached_limits(&self) -> usize {
        self.limits.len()
    }

    pub async fn directory(&self, scope: &CloudScope) -> Option<TenantDirectory> {
        self.directories.read().await.get(scope).cloned()
    }

    pub async fn replace_directory(&self, scope: &CloudScope, directory: TenantDirectory) {
        self.directories
            .write()
            .await
            .insert(scope.clone(), directory);
    }
}
