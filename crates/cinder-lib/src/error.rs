//! Error types for the Cinder collector
//!
//! Every failure is fatal for the operation that observed it; nothing here is
//! retried internally. The host's own re-invocation policy governs retries.

use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the collector
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Failure of a single request against Keystone or Cinder
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("unexpected response payload: {0}")]
    Decode(String),
}

impl TransportError {
    /// True when the remote side rejected the token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Http { status: 401, .. })
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

/// Collector error taxonomy
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("authentication failed for {scope}: {source}")]
    Auth {
        scope: String,
        #[source]
        source: TransportError,
    },

    #[error("tenant directory lookup failed: {0}")]
    Directory(#[source] TransportError),

    #[error("tenant {0:?} is not known to the identity service")]
    UnknownTenant(String),

    #[error("block storage version probe failed: {0}")]
    Probe(#[source] TransportError),

    #[error("no recognized block storage API version")]
    NoRecognizedVersion,

    #[error("unsupported block storage API version {0:?}")]
    UnsupportedVersion(String),

    #[error("{operation} call failed: {source}")]
    Adapter {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("no field {field:?} in metric category {category:?}")]
    UnknownField { category: String, field: String },

    #[error("malformed metric path {path:?}: {reason}")]
    RequestFormat { path: String, reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("collection task aborted: {0}")]
    TaskFailed(String),

    #[error("{} collection tasks failed: {}", .0.len(), join_messages(.0))]
    Multiple(Vec<CollectorError>),
}

impl CollectorError {
    /// Collapse the errors of a joined task set into one error
    ///
    /// Returns `None` when no task failed.
    pub fn from_many(mut errors: Vec<CollectorError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(CollectorError::Multiple(errors)),
        }
    }

    /// Stable snake_case tag, used for metric labels and API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            CollectorError::Config(_) => "config",
            CollectorError::Auth { .. } => "auth",
            CollectorError::Directory(_) => "directory",
            CollectorError::UnknownTenant(_) => "unknown_tenant",
            CollectorError::Probe(_) => "probe",
            CollectorError::NoRecognizedVersion => "no_recognized_version",
            CollectorError::UnsupportedVersion(_) => "unsupported_version",
            CollectorError::Adapter { .. } => "adapter",
            CollectorError::UnknownField { .. } => "unknown_field",
            CollectorError::RequestFormat { .. } => "request_format",
            CollectorError::Timeout { .. } => "timeout",
            CollectorError::TaskFailed(_) => "task_failed",
            CollectorError::Multiple(_) => "multiple",
        }
    }

    /// True when a storage call was rejected because the session token is no
    /// longer valid
    pub fn is_unauthorized(&self) -> bool {
        match self {
            CollectorError::Adapter { source, .. } | CollectorError::Probe(source) => {
                source.is_unauthorized()
            }
            CollectorError::Multiple(errors) => errors.iter().any(|e| e.is_unauthorized()),
            _ => false,
        }
    }

    pub(crate) fn request_format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CollectorError::RequestFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn adapter(operation: &'static str, source: TransportError) -> Self {
        CollectorError::Adapter { operation, source }
    }
}

fn join_messages(errors: &[CollectorError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
