//! Schema, discovery and collection commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_value, print_info, print_rows, print_warning, OutputFormat};

const TENANT_SEGMENT: usize = 3;
const CATEGORY_SEGMENT: usize = 4;
const FIELD_SEGMENT: usize = 5;

fn segment(path: &str, index: usize) -> &str {
    path.split('/').nth(index).unwrap_or_default()
}

/// Keep the paths of `tenant`, or every path when no tenant is given
pub fn filter_by_tenant(paths: Vec<String>, tenant: Option<&str>) -> Vec<String> {
    match tenant {
        Some(tenant) => paths
            .into_iter()
            .filter(|path| segment(path, TENANT_SEGMENT) == tenant)
            .collect(),
        None => paths,
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Required")]
    required: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Tenant")]
    tenant: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Path")]
    path: String,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Tenant")]
    tenant: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Collected")]
    collected: String,
}

/// Show the connection settings the collector understands
pub async fn show_schema(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let schema = client.schema().await?;

    let rows = schema
        .fields
        .iter()
        .map(|f| FieldRow {
            name: f.name.clone(),
            kind: f.kind.clone(),
            required: if f.required { "yes" } else { "no" }.to_string(),
            description: f.description.clone(),
        })
        .collect();

    print_rows(rows, &schema, format)
}

/// List the metric paths the agent can collect
pub async fn discover(client: &ApiClient, tenant: Option<&str>, format: OutputFormat) -> Result<()> {
    let paths = filter_by_tenant(client.discover().await?, tenant);

    let rows = paths
        .iter()
        .map(|path| PathRow {
            tenant: segment(path, TENANT_SEGMENT).to_string(),
            category: segment(path, CATEGORY_SEGMENT).to_string(),
            field: segment(path, FIELD_SEGMENT).to_string(),
            path: path.clone(),
        })
        .collect();

    print_rows(rows, &paths, format)
}

/// Collect the given paths, or every discovered path with `all`
pub async fn collect(
    client: &ApiClient,
    paths: Vec<String>,
    all: bool,
    tenant: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let paths = if all {
        let discovered = filter_by_tenant(client.discover().await?, tenant);
        if let OutputFormat::Table = format {
            print_info(&format!("Collecting {} discovered metrics", discovered.len()));
        }
        discovered
    } else {
        paths
    };

    if paths.is_empty() {
        print_warning("No metrics to collect");
        return Ok(());
    }

    let records = client.collect(&paths).await?;

    let rows = records
        .iter()
        .map(|r| {
            let field = segment(&r.path, FIELD_SEGMENT);
            RecordRow {
                tenant: segment(&r.path, TENANT_SEGMENT).to_string(),
                category: segment(&r.path, CATEGORY_SEGMENT).to_string(),
                field: field.to_string(),
                value: format_value(field, r.value),
                source: r.source.clone(),
                collected: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            }
        })
        .collect();

    print_rows(rows, &records, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_by_tenant() {
        let paths = vec![
            "intel/openstack/cinder/admin/volumes/count".to_string(),
            "intel/openstack/cinder/demo/volumes/count".to_string(),
            "intel/openstack/cinder/demo/limits/MaxTotalVolumes".to_string(),
        ];

        assert_eq!(filter_by_tenant(paths.clone(), Some("demo")).len(), 2);
        assert_eq!(filter_by_tenant(paths.clone(), Some("ghost")).len(), 0);
        assert_eq!(filter_by_tenant(paths, None).len(), 3);
    }
}
