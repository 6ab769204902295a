//! Response parsing shared by the Cinder adapters

use super::pagination::drain_pages;
use super::session::Session;
use super::transport::{join_url, CloudTransport};
use crate::error::TransportError;
use crate::models::{Aggregate, Limits, GIB};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct LimitsResponse {
    limits: LimitsBody,
}

#[derive(Debug, Deserialize)]
struct LimitsBody {
    absolute: AbsoluteLimits,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbsoluteLimits {
    max_total_volumes: i64,
    max_total_volume_gigabytes: i64,
}

/// Base URL of `service_type` in the session's catalog
pub(crate) fn service_base<'a>(
    session: &'a Session,
    service_type: &str,
) -> Result<&'a str, TransportError> {
    session.endpoint(service_type).ok_or_else(|| {
        TransportError::Decode(format!("no {service_type:?} endpoint in service catalog"))
    })
}

/// `GET {base}/limits`
pub(crate) async fn fetch_limits(
    transport: &dyn CloudTransport,
    session: &Session,
    base: &str,
) -> Result<Limits, TransportError> {
    let body = transport
        .get(&join_url(base, "limits"), Some(session.token()))
        .await?;
    let response: LimitsResponse = serde_json::from_value(body)?;

    Ok(Limits {
        max_total_volumes: response.limits.absolute.max_total_volumes,
        max_total_volume_gigabytes: response.limits.absolute.max_total_volume_gigabytes,
    })
}

/// URL of a resource listing under `base`, optionally across all tenants
pub(crate) fn listing_url(base: &str, path: &str, all_tenants: bool) -> Result<String, TransportError> {
    let joined = join_url(base, path);
    if !all_tenants {
        return Ok(joined);
    }

    let mut url = Url::parse(&joined)
        .map_err(|e| TransportError::Decode(format!("invalid listing URL {joined:?}: {e}")))?;
    url.query_pairs_mut().append_pair("all_tenants", "true");
    Ok(url.into())
}

/// Size in GiB and owning tenant of one listed volume or snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SizedResource {
    pub size_gib: i64,
    pub owner: Option<String>,
}

/// Drain a volume or snapshot listing
pub(crate) async fn list_sized(
    transport: &dyn CloudTransport,
    session: &Session,
    url: &str,
    collection: &str,
    owner_attribute: Option<&str>,
) -> Result<Vec<SizedResource>, TransportError> {
    let items = drain_pages(transport, url, session.token(), collection).await?;

    items
        .iter()
        .map(|item| {
            let size_gib = item.get("size").and_then(Value::as_i64).ok_or_else(|| {
                TransportError::Decode(format!("{collection} entry without integer size"))
            })?;
            if size_gib < 0 || size_gib.checked_mul(GIB).is_none() {
                return Err(TransportError::Decode(format!(
                    "{collection} entry with out-of-range size {size_gib}"
                )));
            }
            let owner = owner_attribute
                .and_then(|attr| item.get(attr))
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(SizedResource { size_gib, owner })
        })
        .collect()
}

fn overflow(owner: &str) -> TransportError {
    TransportError::Decode(format!("resource totals for {owner:?} overflow"))
}

/// Sum resources into one aggregate
pub(crate) fn aggregate(resources: &[SizedResource]) -> Result<Aggregate, TransportError> {
    let mut total = Aggregate::default();
    for resource in resources {
        total
            .add_gib(resource.size_gib)
            .ok_or_else(|| overflow("scoped tenant"))?;
    }
    Ok(total)
}

/// Sum resources per owning tenant; unowned entries go to `fallback_owner`
pub(crate) fn aggregate_by_owner(
    resources: &[SizedResource],
    fallback_owner: &str,
) -> Result<HashMap<String, Aggregate>, TransportError> {
    let mut totals: HashMap<String, Aggregate> = HashMap::new();
    for resource in resources {
        let owner = match resource.owner.as_deref() {
            Some(owner) => owner,
            None => {
                debug!(fallback = %fallback_owner, "Listed resource without owner attribute");
                fallback_owner
            }
        };
        totals
            .entry(owner.to_string())
            .or_default()
            .add_gib(resource.size_gib)
            .ok_or_else(|| overflow(owner))?;
    }
    Ok(totals)
}
