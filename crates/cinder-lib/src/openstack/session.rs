//! Keystone v2 authentication and tenant directory lookup

use super::pagination::drain_pages;
use super::transport::{join_url, CloudTransport};
use crate::error::{CollectorError, Result, TransportError};
use crate::models::{Credentials, Tenant};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Authenticated handle bound to one tenant scope
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    tenant: Option<Tenant>,
    catalog: Vec<CatalogEntry>,
}

/// Public endpoint of one service in the token's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub service_type: String,
    pub name: String,
    pub public_url: String,
}

impl Session {
    pub fn new(token: impl Into<String>, tenant: Option<Tenant>, catalog: Vec<CatalogEntry>) -> Self {
        Self {
            token: token.into(),
            tenant,
            catalog,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Tenant the token is scoped to, `None` for unscoped tokens
    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant.as_ref().map(|t| t.id.as_str())
    }

    /// Key identifying this session's scope
    pub fn scope_key(&self) -> &str {
        self.tenant_id().unwrap_or(&self.token)
    }

    /// Public URL of the first catalog entry of `service_type`
    pub fn endpoint(&self, service_type: &str) -> Option<&str> {
        self.catalog
            .iter()
            .find(|entry| entry.service_type == service_type)
            .map(|entry| entry.public_url.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
    #[serde(default)]
    tenant: Option<Tenant>,
}

#[derive(Debug, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

/// Authenticate against the identity endpoint, scoped to `tenant` when given
pub async fn authenticate(
    transport: &dyn CloudTransport,
    credentials: &Credentials,
    tenant: Option<&str>,
) -> Result<Session> {
    let scope = match tenant {
        Some(name) => format!("tenant {name:?}"),
        None => "unscoped token".to_string(),
    };
    let auth_error = |source: TransportError| CollectorError::Auth {
        scope: scope.clone(),
        source,
    };

    let mut auth = json!({
        "passwordCredentials": {
            "username": credentials.user,
            "password": credentials.password,
        }
    });
    if let Some(name) = tenant {
        auth["tenantName"] = json!(name);
    }

    let url = join_url(&credentials.endpoint, "tokens");
    let body = transport
        .post(&url, &json!({ "auth": auth }))
        .await
        .map_err(auth_error)?;
    let response: TokenResponse =
        serde_json::from_value(body).map_err(|e| auth_error(e.into()))?;

    let catalog = response
        .access
        .service_catalog
        .into_iter()
        .filter_map(|service| {
            let endpoint = service.endpoints.into_iter().next()?;
            Some(CatalogEntry {
                service_type: service.service_type,
                name: service.name,
                public_url: endpoint.public_url,
            })
        })
        .collect::<Vec<_>>();

    debug!(
        scope = %scope,
        services = catalog.len(),
        "Authenticated against identity service"
    );

    Ok(Session::new(
        response.access.token.id,
        response.access.token.tenant,
        catalog,
    ))
}

/// List every tenant visible to the credentials
///
/// Uses an unscoped token; in practice the credentials must be privileged.
pub async fn list_tenants(
    transport: &dyn CloudTransport,
    credentials: &Credentials,
) -> Result<Vec<Tenant>> {
    let session = authenticate(transport, credentials, None).await?;

    let url = join_url(&credentials.endpoint, "tenants");
    let items = drain_pages(transport, &url, session.token(), "tenants")
        .await
        .map_err(CollectorError::Directory)?;

    let tenants = items
        .into_iter()
        .map(serde_json::from_value::<Tenant>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CollectorError::Directory(e.into()))?;

    info!(count = tenants.len(), "Listed tenants");
    Ok(tenants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Transport answering token and tenant calls from canned bodies
    struct IdentityStub {
        token_response: std::result::Result<Value, TransportError>,
        tenants_response: Value,
        posted: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl CloudTransport for IdentityStub {
        async fn get(
            &self,
            url: &str,
            token: Option<&str>,
        ) -> std::result::Result<Value, TransportError> {
            assert!(url.ends_with("/tenants"), "unexpected GET {url}");
            assert_eq!(token, Some("tok-1"));
            Ok(self.tenants_response.clone())
        }

        async fn post(&self, url: &str, body: &Value) -> std::result::Result<Value, TransportError> {
            assert_eq!(url, "http://keystone:5000/v2.0/tokens");
            self.posted.lock().unwrap().push(body.clone());
            self.token_response.clone()
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            endpoint: "http://keystone:5000/v2.0".to_string(),
            user: "me".to_string(),
            password: "secret".to_string(),
        }
    }

    fn token_body() -> Value {
        json!({
            "access": {
                "token": {
                    "id": "tok-1",
                    "tenant": {"id": "demo_id123", "name": "demo", "enabled": true}
                },
                "serviceCatalog": [
                    {
                        "type": "volumev2",
                        "name": "cinderv2",
                        "endpoints": [{"publicURL": "http://cinder:8776/v2/demo_id123", "region": "RegionOne"}]
                    },
                    {
                        "type": "volume",
                        "name": "cinder",
                        "endpoints": [{"publicURL": "http://cinder:8776/v1/demo_id123"}]
                    },
                    {"type": "empty", "name": "nothing", "endpoints": []}
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_authenticate_scoped() {
        let stub = IdentityStub {
            token_response: Ok(token_body()),
            tenants_response: Value::Null,
            posted: Mutex::new(Vec::new()),
        };

        let session = authenticate(&stub, &credentials(), Some("demo")).await.unwrap();

        assert_eq!(session.token(), "tok-1");
        assert_eq!(session.tenant_id(), Some("demo_id123"));
        assert_eq!(session.scope_key(), "demo_id123");
        assert_eq!(
            session.endpoint("volumev2"),
            Some("http://cinder:8776/v2/demo_id123")
        );
        assert_eq!(
            session.endpoint("volume"),
            Some("http://cinder:8776/v1/demo_id123")
        );
        assert!(session.endpoint("empty").is_none());

        let posted = stub.posted.lock().unwrap();
        assert_eq!(posted[0]["auth"]["tenantName"], "demo");
        assert_eq!(posted[0]["auth"]["passwordCredentials"]["username"], "me");
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let stub = IdentityStub {
            token_response: Err(TransportError::Http {
                url: "http://keystone:5000/v2.0/tokens".to_string(),
                status: 401,
                body: "bad credentials".to_string(),
            }),
            tenants_response: Value::Null,
            posted: Mutex::new(Vec::new()),
        };

        let err = authenticate(&stub, &credentials(), Some("demo"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "auth");
        assert!(err.to_string().contains("demo"));
    }

    #[tokio::test]
    async fn test_list_tenants_uses_unscoped_token() {
        let stub = IdentityStub {
            token_response: Ok(token_body()),
            tenants_response: json!({
                "tenants": [
                    {"id": "admin_id123", "name": "admin", "enabled": true},
                    {"id": "demo_id123", "name": "demo", "description": "Test tenant"}
                ],
                "tenants_links": []
            }),
            posted: Mutex::new(Vec::new()),
        };

        let tenants = list_tenants(&stub, &credentials()).await.unwrap();

        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].name, "admin");
        let posted = stub.posted.lock().unwrap();
        assert!(posted[0]["auth"].get("tenantName").is_none());
    }

    #[tokio::test]
    async fn test_list_tenants_rejects_malformed_listing() {
        let stub = IdentityStub {
            token_response: Ok(token_body()),
            tenants_response: json!({"tenants": [{"name": "no-id"}]}),
            posted: Mutex::new(Vec::new()),
        };

        let err = list_tenants(&stub, &credentials()).await.unwrap_err();
        assert_eq!(err.kind(), "directory");
    }
}
