//! Block storage API version discovery and selection

use super::session::Session;
use super::transport::CloudTransport;
use super::{VOLUME_SERVICE_V1, VOLUME_SERVICE_V2};
use crate::error::{CollectorError, Result, TransportError};
use serde::Deserialize;
use url::Url;

/// Known versions and their selection priority; higher wins
const API_PRIORITY: &[(&str, u8)] = &[("v1.0", 1), ("v2.0", 2)];

#[derive(Debug, Deserialize)]
struct VersionList {
    versions: Vec<VersionDescriptor>,
}

#[derive(Debug, Deserialize)]
struct VersionDescriptor {
    id: String,
}

fn priority(version: &str) -> Option<u8> {
    API_PRIORITY
        .iter()
        .find(|(id, _)| *id == version)
        .map(|(_, priority)| *priority)
}

/// Root URL of the block storage service in the session's catalog
fn storage_root(session: &Session) -> std::result::Result<Url, TransportError> {
    let endpoint = session
        .endpoint(VOLUME_SERVICE_V2)
        .or_else(|| session.endpoint(VOLUME_SERVICE_V1))
        .ok_or_else(|| {
            TransportError::Decode("no block storage endpoint in service catalog".to_string())
        })?;

    let mut root = Url::parse(endpoint)
        .map_err(|e| TransportError::Decode(format!("invalid endpoint {endpoint:?}: {e}")))?;
    root.set_path("/");
    root.set_query(None);
    Ok(root)
}

/// List the API versions advertised by the storage service root
///
/// The root is a single, unpaginated document. Versions are returned in the
/// advertised order without duplicates.
pub async fn discover_versions(
    transport: &dyn CloudTransport,
    session: &Session,
) -> Result<Vec<String>> {
    let root = storage_root(session).map_err(CollectorError::Probe)?;

    let body = transport
        .get(root.as_str(), Some(session.token()))
        .await
        .map_err(CollectorError::Probe)?;
    let list: VersionList =
        serde_json::from_value(body).map_err(|e| CollectorError::Probe(e.into()))?;

    let mut versions: Vec<String> = Vec::with_capacity(list.versions.len());
    for descriptor in list.versions {
        if !versions.contains(&descriptor.id) {
            versions.push(descriptor.id);
        }
    }
    Ok(versions)
}

/// Pick the highest-priority known version among `candidates`
///
/// Falls back to the first candidate when none is known.
pub fn choose_version(candidates: &[String]) -> Result<String> {
    let first = candidates
        .first()
        .ok_or(CollectorError::NoRecognizedVersion)?;

    let best_known = candidates
        .iter()
        .filter_map(|candidate| priority(candidate).map(|p| (p, candidate)))
        .max_by_key(|(p, _)| *p)
        .map(|(_, candidate)| candidate);

    Ok(best_known.unwrap_or(first).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack::CatalogEntry;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn versions(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_choose_highest_priority() {
        assert_eq!(choose_version(&versions(&["v1.0", "v2.0"])).unwrap(), "v2.0");
        assert_eq!(choose_version(&versions(&["v2.0", "v1.0"])).unwrap(), "v2.0");
        assert_eq!(choose_version(&versions(&["v1.0"])).unwrap(), "v1.0");
    }

    #[test]
    fn test_choose_empty_is_error() {
        let err = choose_version(&[]).unwrap_err();
        assert!(matches!(err, CollectorError::NoRecognizedVersion));
    }

    #[test]
    fn test_choose_ignores_unknown_when_known_present() {
        assert_eq!(
            choose_version(&versions(&["v3.0", "v1.0"])).unwrap(),
            "v1.0"
        );
    }

    #[test]
    fn test_choose_falls_back_to_first_unknown() {
        assert_eq!(
            choose_version(&versions(&["v3.0", "v9.9"])).unwrap(),
            "v3.0"
        );
    }

    struct RootStub {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CloudTransport for RootStub {
        async fn get(
            &self,
            url: &str,
            _token: Option<&str>,
        ) -> std::result::Result<Value, TransportError> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(json!({
                "versions": [
                    {"id": "v1.0", "status": "SUPPORTED", "links": []},
                    {"id": "v2.0", "status": "CURRENT", "links": []},
                    {"id": "v1.0", "status": "SUPPORTED", "links": []}
                ]
            }))
        }

        async fn post(&self, url: &str, _body: &Value) -> std::result::Result<Value, TransportError> {
            panic!("unexpected POST {url}")
        }
    }

    fn session_with(catalog: Vec<CatalogEntry>) -> Session {
        Session::new("tok", None, catalog)
    }

    #[tokio::test]
    async fn test_discover_versions_hits_storage_root() {
        let stub = RootStub {
            requested: Mutex::new(Vec::new()),
        };
        let session = session_with(vec![CatalogEntry {
            service_type: VOLUME_SERVICE_V2.to_string(),
            name: "cinderv2".to_string(),
            public_url: "http://cinder:8776/v2/abc?x=1".to_string(),
        }]);

        let found = discover_versions(&stub, &session).await.unwrap();

        assert_eq!(found, versions(&["v1.0", "v2.0"]));
        assert_eq!(
            *stub.requested.lock().unwrap(),
            vec!["http://cinder:8776/".to_string()]
        );
    }

    #[tokio::test]
    async fn test_discover_versions_falls_back_to_v1_endpoint() {
        let stub = RootStub {
            requested: Mutex::new(Vec::new()),
        };
        let session = session_with(vec![CatalogEntry {
            service_type: VOLUME_SERVICE_V1.to_string(),
            name: "cinder".to_string(),
            public_url: "http://legacy:8776/v1/abc".to_string(),
        }]);

        discover_versions(&stub, &session).await.unwrap();
        assert_eq!(
            *stub.requested.lock().unwrap(),
            vec!["http://legacy:8776/".to_string()]
        );
    }

    #[tokio::test]
    async fn test_discover_versions_without_storage_endpoint() {
        let stub = RootStub {
            requested: Mutex::new(Vec::new()),
        };
        let err = discover_versions(&stub, &session_with(vec![]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "probe");
        assert!(stub.requested.lock().unwrap().is_empty());
    }
}
