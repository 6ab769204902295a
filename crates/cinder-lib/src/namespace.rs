//! Metric namespace mapping
//!
//! Metrics are addressed as `intel/openstack/cinder/<tenant>/<category>/<field>`.
//! This module enumerates the addressable leaves for a set of tenants and
//! resolves a `(category, field)` suffix back to a value of a tenant's
//! collected metrics.

use crate::error::{CollectorError, Result};
use crate::models::{Aggregate, Limits, TenantMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const VENDOR: &str = "intel";
pub const SUBSYSTEM: &str = "openstack";
pub const PLUGIN_NAME: &str = "cinder";

/// Number of segments in a complete metric path
pub const PATH_SEGMENTS: usize = 6;

const TENANT_SEGMENT: usize = 3;
const CATEGORY_SEGMENT: usize = 4;
const FIELD_SEGMENT: usize = 5;

/// Metric category, the fifth path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Limits,
    Volumes,
    Snapshots,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Limits, Category::Volumes, Category::Snapshots];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Limits => "limits",
            Category::Volumes => "volumes",
            Category::Snapshots => "snapshots",
        }
    }

    /// Field tags addressable under this category
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Category::Limits => Limits::FIELDS,
            Category::Volumes | Category::Snapshots => Aggregate::FIELDS,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "limits" => Ok(Category::Limits),
            "volumes" => Ok(Category::Volumes),
            "snapshots" => Ok(Category::Snapshots),
            other => Err(format!(
                "unknown category {other:?}, expected one of limits, volumes, snapshots"
            )),
        }
    }
}

/// Structural access to the tagged fields of a metric group
pub trait MetricFields {
    const FIELDS: &'static [&'static str];

    /// Value of the field with exactly this tag
    fn field(&self, tag: &str) -> Option<i64>;
}

impl MetricFields for Limits {
    const FIELDS: &'static [&'static str] = &["MaxTotalVolumes", "MaxTotalVolumeGigabytes"];

    fn field(&self, tag: &str) -> Option<i64> {
        match tag {
            "MaxTotalVolumes" => Some(self.max_total_volumes),
            "MaxTotalVolumeGigabytes" => Some(self.max_total_volume_gigabytes),
            _ => None,
        }
    }
}

impl MetricFields for Aggregate {
    const FIELDS: &'static [&'static str] = &["count", "bytes"];

    fn field(&self, tag: &str) -> Option<i64> {
        match tag {
            "count" => Some(self.count),
            "bytes" => Some(self.bytes),
            _ => None,
        }
    }
}

/// Slash-separated metric address
///
/// Parsing never fails; completeness is checked by [`MetricPath::validate`]
/// so that a malformed request can be rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MetricPath {
    segments: Vec<String>,
}

impl MetricPath {
    /// Build a complete path for `tenant`
    pub fn new(tenant: &str, category: Category, field: &str) -> Self {
        Self {
            segments: vec![
                VENDOR.to_string(),
                SUBSYSTEM.to_string(),
                PLUGIN_NAME.to_string(),
                tenant.to_string(),
                category.as_str().to_string(),
                field.to_string(),
            ],
        }
    }

    pub fn from_segments<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn tenant(&self) -> Option<&str> {
        self.segment(TENANT_SEGMENT)
    }

    pub fn field(&self) -> Option<&str> {
        self.segment(FIELD_SEGMENT)
    }

    fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Check the path lies in this namespace and names a known category and field
    pub fn validate(&self) -> Result<Category> {
        if self.segments.len() != PATH_SEGMENTS {
            return Err(CollectorError::request_format(
                self.to_string(),
                format!(
                    "expected {PATH_SEGMENTS} segments, got {}",
                    self.segments.len()
                ),
            ));
        }

        let prefix = [VENDOR, SUBSYSTEM, PLUGIN_NAME];
        if self.segments[..TENANT_SEGMENT] != prefix {
            return Err(CollectorError::request_format(
                self.to_string(),
                format!("path must start with {}", prefix.join("/")),
            ));
        }

        let category: Category = self.segments[CATEGORY_SEGMENT]
            .parse()
            .map_err(|reason| CollectorError::request_format(self.to_string(), reason))?;

        let field = &self.segments[FIELD_SEGMENT];
        if !category.fields().contains(&field.as_str()) {
            return Err(CollectorError::request_format(
                self.to_string(),
                format!(
                    "unknown {category} field {field:?}, expected one of {}",
                    category.fields().join(", ")
                ),
            ));
        }

        Ok(category)
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<String> for MetricPath {
    fn from(path: String) -> Self {
        Self::from(path.as_str())
    }
}

impl From<&str> for MetricPath {
    fn from(path: &str) -> Self {
        Self::from_segments(path.split('/'))
    }
}

impl From<MetricPath> for String {
    fn from(path: MetricPath) -> Self {
        path.to_string()
    }
}

/// List every metric path available for the given tenants
///
/// Tenants are deduplicated and emitted in sorted order.
pub fn enumerate<'a>(tenants: impl IntoIterator<Item = &'a str>) -> Vec<MetricPath> {
    let tenants: BTreeSet<&str> = tenants.into_iter().collect();

    tenants
        .into_iter()
        .flat_map(|tenant| {
            Category::ALL.into_iter().flat_map(move |category| {
                category
                    .fields()
                    .iter()
                    .map(move |field| MetricPath::new(tenant, category, field))
            })
        })
        .collect()
}

/// Resolve a `(category, field)` suffix against a tenant's metrics
pub fn resolve(metrics: &TenantMetrics, category: Category, field: &str) -> Result<i64> {
    let value = match category {
        Category::Limits => metrics.limits.field(field),
        Category::Volumes => metrics.volumes.field(field),
        Category::Snapshots => metrics.snapshots.field(field),
    };

    value.ok_or_else(|| CollectorError::UnknownField {
        category: category.to_string(),
        field: field.to_string(),
    })
}
