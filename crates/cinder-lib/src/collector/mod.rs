//! Collection orchestration
//!
//! [`CinderCollector`] turns a batch of metric requests into the smallest set
//! of identity and block storage calls that answers it, runs those calls
//! concurrently and maps the results back onto the requested paths.
//!
//! Quotas and sessions are cached per tenant for the lifetime of the
//! collector; volume and snapshot aggregates are fetched on every call.

mod cache;
mod plan;


pub use cache::{CloudScope, TenantCache};
pub use plan::{AggregateKind, CollectionPlan, PlannedMetric};

use crate::error::{CollectorError, Result};
use crate::models::{
    Aggregate, ConfigField, ConfigSchema, ConnectionConfig, Credentials, Limits, MetricRecord,
    MetricRequest, Tenant, TenantDirectory, TenantMetrics,
};
use crate::namespace::{enumerate, resolve, MetricPath};
use crate::observability::{CollectorMetrics, StructuredLogger};
use crate::openstack::{
    authenticate, list_tenants, BlockStorageAdapter, CloudTransport, ListingScope,
    ServiceDispatcher, Session,
};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::debug;

/// Default deadline of a single cloud call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Host name of this machine, reported as the source of every record
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Deadline of each concurrent task
    pub call_timeout: Duration,
    /// Value of [`MetricRecord::source`]
    pub source_host: String,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            source_host: local_hostname(),
        }
    }
}

/// Multi-tenant block storage metrics collector
pub struct CinderCollector {
    transport: Arc<dyn CloudTransport>,
    dispatcher: Arc<ServiceDispatcher>,
    cache: Arc<TenantCache>,
    settings: CollectorSettings,
    metrics: CollectorMetrics,
    logger: StructuredLogger,
}

impl CinderCollector {
    pub fn new(transport: Arc<dyn CloudTransport>, settings: CollectorSettings) -> Self {
        Self {
            dispatcher: Arc::new(ServiceDispatcher::new(Arc::clone(&transport))),
            transport,
            cache: Arc::new(TenantCache::new()),
            logger: StructuredLogger::new(settings.source_host.clone()),
            metrics: CollectorMetrics::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Configuration items accepted in [`ConnectionConfig`]
    pub fn config_schema(&self) -> ConfigSchema {
        let field = |name: &str, required: bool, description: &str| ConfigField {
            name: name.to_string(),
            kind: "string".to_string(),
            required,
            description: description.to_string(),
        };

        ConfigSchema {
            fields: vec![
                field(
                    "endpoint",
                    true,
                    "Keystone v2 identity endpoint, e.g. http://keystone:5000/v2.0",
                ),
                field("user", true, "User name to authenticate with"),
                field("password", true, "Password of the user"),
                field(
                    "tenant",
                    false,
                    "Privileged tenant used for cross-tenant listings; required for collect",
                ),
            ],
        }
    }

    /// Enumerate every metric path of every tenant visible to the credentials
    ///
    /// Always refreshes the tenant directory.
    pub async fn discover(&self, config: &ConnectionConfig) -> Result<Vec<MetricPath>> {
        let started = Instant::now();
        let result = self.discover_paths(config).await;
        self.metrics
            .observe_discovery_latency(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            self.record_failure("discover", err);
        }
        result
    }

    async fn discover_paths(&self, config: &ConnectionConfig) -> Result<Vec<MetricPath>> {
        let ctx = self.context(config.credentials()?);
        let directory = self.refresh_directory(&ctx).await?;

        let paths = enumerate(directory.names());
        self.logger.log_discovery(directory.len(), paths.len());
        Ok(paths)
    }

    /// Collect the requested metrics
    ///
    /// Records are returned in request order. Connection settings are taken
    /// from the first request. Any failure fails the whole batch.
    pub async fn collect(&self, requests: &[MetricRequest]) -> Result<Vec<MetricRecord>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let result = self.collect_records(requests).await;
        let elapsed = started.elapsed();
        self.metrics.observe_collection_latency(elapsed.as_secs_f64());
        self.metrics
            .set_cached_limits(self.cache.cached_limits() as i64);

        match &result {
            Ok(records) => {
                self.metrics.add_records_emitted(records.len() as u64);
                self.logger
                    .log_collection(requests.len(), records.len(), elapsed.as_millis());
            }
            Err(err) => self.record_failure("collect", err),
        }
        result
    }

    async fn collect_records(&self, requests: &[MetricRequest]) -> Result<Vec<MetricRecord>> {
        let plan = CollectionPlan::from_requests(requests)?;

        let config = &requests[0].config;
        let ctx = self.context(config.credentials()?);
        let privileged = config.privileged_tenant()?;

        let mut names: Vec<&str> = plan.tenants().iter().map(String::as_str).collect();
        if plan.needs_aggregates() {
            names.push(privileged);
        }
        let tenants = self.resolve_tenants(&ctx, &names).await?;

        let aggregates = if plan.needs_aggregates() {
            let privileged = tenant_named(&tenants, privileged)?;
            self.collect_aggregates(&ctx, &plan, &tenants, privileged)
                .await?
        } else {
            CollectedAggregates::default()
        };
        self.collect_limits(&ctx, &plan, &tenants).await?;

        let timestamp = Utc::now();
        plan.metrics()
            .iter()
            .map(|metric| {
                let tenant_id = tenant_named(&tenants, &metric.tenant)?.id.as_str();
                let metrics = TenantMetrics {
                    limits: self.cache.limits(&ctx.scope, tenant_id).unwrap_or_default(),
                    volumes: aggregates.get(AggregateKind::Volumes, tenant_id),
                    snapshots: aggregates.get(AggregateKind::Snapshots, tenant_id),
                };

                Ok(MetricRecord {
                    path: metric.path.clone(),
                    value: resolve(&metrics, metric.category, &metric.field)?,
                    source: self.settings.source_host.clone(),
                    timestamp,
                })
            })
            .collect()
    }

    /// Bulk phase: volume and snapshot aggregates of the requested tenants
    async fn collect_aggregates(
        &self,
        ctx: &CallContext,
        plan: &CollectionPlan,
        tenants: &HashMap<String, Tenant>,
        privileged: &Tenant,
    ) -> Result<CollectedAggregates> {
        let (session, adapter) = ctx
            .with_deadline(
                format!("session setup for tenant {:?}", privileged.name),
                ctx.dispatch_for(privileged),
            )
            .await?;

        let mut tasks: JoinSet<Result<(AggregateKind, HashMap<String, Aggregate>)>> =
            JoinSet::new();
        match adapter.listing_scope() {
            ListingScope::AllTenants => {
                for kind in plan.aggregate_kinds() {
                    let ctx = ctx.clone();
                    let session = Arc::clone(&session);
                    let adapter = Arc::clone(&adapter);
                    tasks.spawn(async move {
                        let totals = ctx
                            .with_deadline(
                                format!("{kind} listing for all tenants"),
                                ctx.aggregate(adapter.as_ref(), &session, kind),
                            )
                            .await?;
                        Ok((kind, totals))
                    });
                }
            }
            ListingScope::OwnTenant => {
                for (name, kind) in plan.aggregate_targets() {
                    let tenant = tenant_named(tenants, name)?.clone();
                    let ctx = ctx.clone();
                    tasks.spawn(async move {
                        let operation = format!("{kind} listing for tenant {:?}", tenant.name);
                        let totals = ctx
                            .with_deadline(operation, async {
                                let (session, adapter) = ctx.dispatch_for(&tenant).await?;
                                ctx.aggregate(adapter.as_ref(), &session, kind).await
                            })
                            .await?;
                        Ok((kind, totals))
                    });
                }
            }
        }

        let mut collected = CollectedAggregates::default();
        for (kind, totals) in join_all(tasks).await? {
            collected.merge(kind, totals);
        }
        Ok(collected)
    }

    /// Limits phase: quotas of tenants missing from the cache
    async fn collect_limits(
        &self,
        ctx: &CallContext,
        plan: &CollectionPlan,
        tenants: &HashMap<String, Tenant>,
    ) -> Result<()> {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for name in plan.limits_tenants() {
            let tenant = tenant_named(tenants, name)?.clone();
            if self.cache.limits(&ctx.scope, &tenant.id).is_some() {
                debug!(tenant = %tenant.name, "Limits cache hit");
                continue;
            }

            let ctx = ctx.clone();
            tasks.spawn(async move {
                let limits = ctx
                    .with_deadline(
                        format!("limits for tenant {:?}", tenant.name),
                        ctx.limits(&tenant),
                    )
                    .await?;
                ctx.cache.store_limits(&ctx.scope, &tenant.id, limits);
                Ok(())
            });
        }

        join_all(tasks).await.map(|_| ())
    }

    /// Map tenant names to tenants, refreshing the directory once on a miss
    async fn resolve_tenants(
        &self,
        ctx: &CallContext,
        names: &[&str],
    ) -> Result<HashMap<String, Tenant>> {
        let (mut directory, fresh) = match self.cache.directory(&ctx.scope).await {
            Some(directory) => (directory, false),
            None => (self.refresh_directory(ctx).await?, true),
        };

        if !fresh {
            if let Some(missing) = names.iter().find(|name| directory.id_for(name).is_none()) {
                debug!(tenant = %missing, "Unknown tenant name, refreshing directory");
                directory = self.refresh_directory(ctx).await?;
            }
        }

        names
            .iter()
            .map(|name| {
                directory
                    .tenant(name)
                    .map(|tenant| (name.to_string(), tenant))
                    .ok_or_else(|| CollectorError::UnknownTenant(name.to_string()))
            })
            .collect()
    }

    async fn refresh_directory(&self, ctx: &CallContext) -> Result<TenantDirectory> {
        let result = ctx
            .with_deadline(
                "tenant listing",
                list_tenants(ctx.transport.as_ref(), &ctx.credentials),
            )
            .await;

        match &result {
            Ok(_) | Err(CollectorError::Directory(_)) => ctx.metrics.inc_authentications("success"),
            Err(CollectorError::Auth { .. }) => ctx.metrics.inc_authentications("failure"),
            Err(_) => {}
        }

        let directory = TenantDirectory::from_tenants(result?);
        self.cache
            .replace_directory(&ctx.scope, directory.clone())
            .await;
        Ok(directory)
    }

    fn context(&self, credentials: Credentials) -> CallContext {
        CallContext {
            transport: Arc::clone(&self.transport),
            dispatcher: Arc::clone(&self.dispatcher),
            cache: Arc::clone(&self.cache),
            scope: CloudScope::of(&credentials),
            credentials: Arc::new(credentials),
            metrics: self.metrics.clone(),
            logger: self.logger.clone(),
            call_timeout: self.settings.call_timeout,
        }
    }

    fn record_failure(&self, operation: &str, err: &CollectorError) {
        self.metrics.inc_collection_errors(err.kind());
        self.logger
            .log_failure(operation, err.kind(), &err.to_string());
    }
}

/// Everything a concurrent task needs, cheap to clone
#[derive(Clone)]
struct CallContext {
    transport: Arc<dyn CloudTransport>,
    dispatcher: Arc<ServiceDispatcher>,
    cache: Arc<TenantCache>,
    scope: CloudScope,
    credentials: Arc<Credentials>,
    metrics: CollectorMetrics,
    logger: StructuredLogger,
    call_timeout: Duration,
}

impl CallContext {
    async fn with_deadline<T>(
        &self,
        operation: impl Into<String>,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CollectorError::Timeout {
                operation: operation.into(),
                timeout: self.call_timeout,
            }),
        }
    }

    /// Cached session of `tenant`
    async fn session(&self, tenant: &Tenant) -> Result<Arc<Session>> {
        self.cache
            .session(&self.scope, &tenant.id, move || async move {
                let result =
                    authenticate(self.transport.as_ref(), &self.credentials, Some(&tenant.name))
                        .await;
                let outcome = if result.is_ok() { "success" } else { "failure" };
                self.metrics.inc_authentications(outcome);
                result
            })
            .await
    }

    /// Session and adapter of `tenant`
    async fn dispatch_for(
        &self,
        tenant: &Tenant,
    ) -> Result<(Arc<Session>, Arc<dyn BlockStorageAdapter>)> {
        let session = self.session(tenant).await?;
        let adapter = self.dispatcher.dispatch(&session).await;
        let adapter = self.evict_on_unauthorized(&session, adapter)?;
        Ok((session, adapter))
    }

    async fn aggregate(
        &self,
        adapter: &dyn BlockStorageAdapter,
        session: &Session,
        kind: AggregateKind,
    ) -> Result<HashMap<String, Aggregate>> {
        self.metrics
            .inc_adapter_calls(adapter.version().id(), kind.as_str());
        let result = match kind {
            AggregateKind::Volumes => adapter.get_volume_aggregate(session).await,
            AggregateKind::Snapshots => adapter.get_snapshot_aggregate(session).await,
        };

        let aggregates = self.evict_on_unauthorized(session, result)?;
        Ok(aggregates.into_map(session.scope_key()))
    }

    async fn limits(&self, tenant: &Tenant) -> Result<Limits> {
        let (session, adapter) = self.dispatch_for(tenant).await?;
        self.metrics
            .inc_adapter_calls(adapter.version().id(), "limits");
        let result = adapter.get_limits(&session).await;
        self.evict_on_unauthorized(&session, result)
    }

    /// Drop a session whose token the storage service rejected
    fn evict_on_unauthorized<T>(&self, session: &Session, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                if let Some(tenant_id) = session.tenant_id() {
                    if self.cache.evict_session(&self.scope, tenant_id) {
                        self.logger.log_session_evicted(tenant_id);
                    }
                }
                self.dispatcher.forget(session);
            }
        }
        result
    }
}

#[derive(Debug, Default)]
struct CollectedAggregates {
    volumes: HashMap<String, Aggregate>,
    snapshots: HashMap<String, Aggregate>,
}

impl CollectedAggregates {
    fn merge(&mut self, kind: AggregateKind, totals: HashMap<String, Aggregate>) {
        match kind {
            AggregateKind::Volumes => self.volumes.extend(totals),
            AggregateKind::Snapshots => self.snapshots.extend(totals),
        }
    }

    /// Aggregate of a tenant; zero when it owns nothing of that kind
    fn get(&self, kind: AggregateKind, tenant_id: &str) -> Aggregate {
        let totals = match kind {
            AggregateKind::Volumes => &self.volumes,
            AggregateKind::Snapshots => &self.snapshots,
        };
        totals.get(tenant_id).copied().unwrap_or_default()
    }
}

fn tenant_named<'a>(tenants: &'a HashMap<String, Tenant>, name: &str) -> Result<&'a Tenant> {
    tenants
        .get(name)
        .ok_or_else(|| CollectorError::UnknownTenant(name.to_string()))
}

/// Wait for every task, then fail with all collected errors if any task failed
async fn join_all<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(tasks.len());
    let mut errors = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(value)) => values.push(value),
            Ok(Err(err)) => errors.push(err),
            Err(join_err) => errors.push(CollectorError::TaskFailed(join_err.to_string())),
        }
    }

    match CollectorError::from_many(errors) {
        Some(err) => {
            debug!(
                discarded = values.len(),
                error = %err,
                "Discarding sibling results after task failure"
            );
            Err(err)
        }
        None => Ok(values),
    }
}
