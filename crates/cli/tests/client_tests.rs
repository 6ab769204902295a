//! API client tests against a mock agent

use cinder_cli::client::ApiClient;
use mockito::{Matcher, Server};
use serde_json::json;

#[tokio::test]
async fn test_discover_posts_empty_settings() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/discover")
        .match_body(Matcher::Json(json!({})))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"metrics": [
                "intel/openstack/cinder/admin/limits/MaxTotalVolumes",
                "intel/openstack/cinder/demo/volumes/bytes"
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let paths = client.discover().await.unwrap();

    mock.assert_async().await;
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[1], "intel/openstack/cinder/demo/volumes/bytes");
}

#[tokio::test]
async fn test_collect_sends_paths_and_parses_records() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/collect")
        .match_body(Matcher::Json(json!({"metrics": [
            {"path": "intel/openstack/cinder/demo/volumes/count"}
        ]})))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"records": [{
                "path": "intel/openstack/cinder/demo/volumes/count",
                "value": 2,
                "source": "node-1",
                "timestamp": "2024-05-01T10:00:00Z"
            }]})
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let records = client
        .collect(&["intel/openstack/cinder/demo/volumes/count".to_string()])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, 2);
    assert_eq!(records[0].source, "node-1");
}

#[tokio::test]
async fn test_agent_error_is_reported_with_kind() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/collect")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"error": "tenant \"ghost\" is not known to the identity service", "kind": "unknown_tenant"})
                .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let err = client
        .collect(&["intel/openstack/cinder/ghost/volumes/count".to_string()])
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("400"));
    assert!(message.contains("unknown_tenant"));
}

#[tokio::test]
async fn test_health_parses_unhealthy_body() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/healthz")
        .with_status(503)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "unhealthy",
                "components": {
                    "identity": {
                        "status": "unhealthy",
                        "message": "authentication failed",
                        "last_check_timestamp": 1714557600
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let health = client.health().await.unwrap();

    assert_eq!(health.status, "unhealthy");
    assert!(health.last_cycle.is_none());
    assert_eq!(
        health.components["identity"].message.as_deref(),
        Some("authentication failed")
    );
}

#[tokio::test]
async fn test_schema_fields() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/schema")
        .with_header("content-type", "application/json")
        .with_body(
            json!({"fields": [
                {"name": "endpoint", "type": "string", "required": true, "description": "Keystone v2 URL"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let schema = client.schema().await.unwrap();

    assert_eq!(schema.fields[0].name, "endpoint");
    assert!(schema.fields[0].required);
}
