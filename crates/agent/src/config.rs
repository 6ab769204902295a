//! Agent configuration

use anyhow::Result;
use cinder_lib::collector::local_hostname;
use cinder_lib::{CollectorSettings, ConnectionConfig};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "CINDER_AGENT_CONFIG";

/// Agent configuration
#[derive(Clone, Deserialize)]
pub struct AgentConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Keystone v2 endpoint used when a request does not name one
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Privileged tenant used for cross-tenant listings
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Deadline of one concurrent collection task
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Timeout of a single HTTP request
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Reported as the source of every record
    #[serde(default = "local_hostname")]
    pub source_host: String,
}

fn default_api_port() -> u16 {
    8080
}

fn default_identity_endpoint() -> String {
    "http://localhost:5000/v2.0".to_string()
}

fn default_tenant() -> String {
    "admin".to_string()
}

fn default_call_timeout() -> u64 {
    30
}

fn default_http_timeout() -> u64 {
    20
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_port", &self.api_port)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("user", &self.user)
            .field("tenant", &self.tenant)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("source_host", &self.source_host)
            .finish_non_exhaustive()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            identity_endpoint: default_identity_endpoint(),
            user: String::new(),
            password: String::new(),
            tenant: default_tenant(),
            call_timeout_secs: default_call_timeout(),
            http_timeout_secs: default_http_timeout(),
            source_host: local_hostname(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the optional config file and the environment
    ///
    /// Environment variables use the `CINDER_` prefix, e.g. `CINDER_API_PORT`.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        builder = builder.add_source(config::Environment::with_prefix("CINDER").try_parsing(true));

        Self::from_builder(builder)
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Fill the fields a request left empty with the agent's own settings
    pub fn complete(&self, mut requested: ConnectionConfig) -> ConnectionConfig {
        if requested.endpoint.trim().is_empty() {
            requested.endpoint = self.identity_endpoint.clone();
        }
        if requested.user.trim().is_empty() {
            requested.user = self.user.clone();
        }
        if requested.password.is_empty() {
            requested.password = self.password.clone();
        }
        if requested.tenant.is_none() && !self.tenant.is_empty() {
            requested.tenant = Some(self.tenant.clone());
        }
        requested
    }

    /// Connection settings made of the agent's own credentials
    pub fn connection(&self) -> ConnectionConfig {
        self.complete(ConnectionConfig::default())
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            source_host: self.source_host.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
