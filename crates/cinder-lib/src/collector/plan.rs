//! Request batch analysis

use crate::error::{CollectorError, Result};
use crate::models::MetricRequest;
use crate::namespace::{Category, MetricPath};
use std::collections::BTreeSet;
use std::fmt;

/// Resource listings an aggregate can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKind {
    Volumes,
    Snapshots,
}

impl AggregateKind {
    pub fn from_category(category: Category) -> Option<Self> {
        match category {
            Category::Limits => None,
            Category::Volumes => Some(AggregateKind::Volumes),
            Category::Snapshots => Some(AggregateKind::Snapshots),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Volumes => "volumes",
            AggregateKind::Snapshots => "snapshots",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMetric {
    pub path: MetricPath,
    pub tenant: String,
    pub category: Category,
    pub field: String,
}

/// What a collect call has to fetch
#[derive(Debug, Clone, Default)]
pub struct CollectionPlan {
    metrics: Vec<PlannedMetric>,
    tenants: Vec<String>,
    limits: BTreeSet<String>,
    aggregates: BTreeSet<(String, AggregateKind)>,
}

impl CollectionPlan {
    /// Validate every path and derive the fetch plan
    ///
    /// A single malformed path rejects the whole batch.
    pub fn from_requests(requests: &[MetricRequest]) -> Result<Self> {
        let mut plan = Self::default();

        for request in requests {
            let category = request.path.validate()?;
            let (tenant, field) = match (request.path.tenant(), request.path.field()) {
                (Some(tenant), Some(field)) => (tenant.to_string(), field.to_string()),
                _ => {
                    return Err(CollectorError::request_format(
                        request.path.to_string(),
                        "missing tenant or field segment",
                    ))
                }
            };

            if !plan.tenants.contains(&tenant) {
                plan.tenants.push(tenant.clone());
            }
            match AggregateKind::from_category(category) {
                Some(kind) => {
                    plan.aggregates.insert((tenant.clone(), kind));
                }
                None => {
                    plan.limits.insert(tenant.clone());
                }
            }

            plan.metrics.push(PlannedMetric {
                path: request.path.clone(),
                tenant,
                category,
                field,
            });
        }

        Ok(plan)
    }

    /// Requested metrics in input order
    pub fn metrics(&self) -> &[PlannedMetric] {
        &self.metrics
    }

    /// Distinct tenant names in first-seen order
    pub fn tenants(&self) -> &[String] {
        &self.tenants
    }

    pub fn limits_tenants(&self) -> impl Iterator<Item = &str> {
        self.limits.iter().map(String::as_str)
    }

    /// `(tenant, kind)` pairs with at least one requested aggregate field
    pub fn aggregate_targets(&self) -> impl Iterator<Item = (&str, AggregateKind)> {
        self.aggregates
            .iter()
            .map(|(tenant, kind)| (tenant.as_str(), *kind))
    }

    /// Aggregate kinds requested for any tenant
    pub fn aggregate_kinds(&self) -> BTreeSet<AggregateKind> {
        self.aggregates.iter().map(|(_, kind)| *kind).collect()
    }

    pub fn needs(&self, kind: AggregateKind) -> bool {
        self.aggregates.iter().any(|(_, k)| *k == kind)
    }

    pub fn needs_aggregates(&self) -> bool {
        !self.aggregates.is_empty()
    }
}
