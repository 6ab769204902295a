//! Draining of `<collection>_links` paginated listings

use super::transport::CloudTransport;
use crate::error::TransportError;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Fetch `url` and follow `rel=next` links until the listing is exhausted,
/// returning the concatenated items of `collection`
///
/// A `next` link pointing at an already fetched page ends the listing.
pub(crate) async fn drain_pages(
    transport: &dyn CloudTransport,
    url: &str,
    token: &str,
    collection: &str,
) -> Result<Vec<Value>, TransportError> {
    let links_key = format!("{collection}_links");
    let mut items = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut next = Some(url.to_string());

    while let Some(page_url) = next.take() {
        let mut body = transport.get(&page_url, Some(token)).await?;
        visited.insert(page_url.clone());

        match body.get_mut(collection).map(Value::take) {
            Some(Value::Array(page)) => items.extend(page),
            _ => {
                return Err(TransportError::Decode(format!(
                    "{page_url}: missing {collection:?} array"
                )))
            }
        }

        next = match next_link(&body, &links_key) {
            Some(href) if visited.contains(&href) => {
                warn!(collection = %collection, href = %href, "Listing links back to a fetched page");
                None
            }
            other => other,
        };
    }

    debug!(
        collection = %collection,
        pages = visited.len(),
        items = items.len(),
        "Drained listing"
    );
    Ok(items)
}

fn next_link(body: &Value, links_key: &str) -> Option<String> {
    body.get(links_key)?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
