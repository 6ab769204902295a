//! JSON transport to Keystone and Cinder

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Header carrying the Keystone token on authenticated calls
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Raw request/response capability against the cloud APIs
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// GET `url`, optionally authenticated, and decode the JSON body
    async fn get(&self, url: &str, token: Option<&str>) -> Result<Value, TransportError>;

    /// POST a JSON body to `url` and decode the JSON response
    async fn post(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

/// [`CloudTransport`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    async fn decode(url: &str, response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();

        // The version root answers 300 Multiple Choices with a regular body
        if !status.is_success() && status != StatusCode::MULTIPLE_CHOICES {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(format!("{url}: {e}")))
    }
}

fn request_error(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl CloudTransport for HttpTransport {
    async fn get(&self, url: &str, token: Option<&str>) -> Result<Value, TransportError> {
        debug!(url = %url, "GET");

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.header(AUTH_TOKEN_HEADER, token);
        }

        let response = request.send().await.map_err(|e| request_error(url, e))?;
        Self::decode(url, response).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        Self::decode(url, response).await
    }
}

/// Join `path` onto a service base URL
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
