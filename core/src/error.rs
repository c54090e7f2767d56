use serde::Serialize;
use thiserror::Error;

/// Failure talking to the cluster or reading what it sent back.
///
/// Never retried. Callers see one opaque kind carrying the underlying message.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced an HTTP response (refused, DNS, timeout).
    #[error("failed to reach Elasticsearch: {0}")]
    Connection(String),
    /// The cluster answered with a non-2xx status.
    #[error("Elasticsearch returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The body could not be read or is not the JSON shape the operation expects.
    #[error("malformed Elasticsearch response: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Uniform error report handed to tool callers. Every invocation failure,
/// whatever produced it, is flattened into this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which argument caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }
}

impl From<&TransportError> for ErrorReport {
    fn from(err: &TransportError) -> Self {
        let report = ErrorReport::new(codes::TRANSPORT_ERROR, err.to_string());
        match err {
            TransportError::Connection(_) => report.with_docs_hint(
                "Ensure the cluster is reachable and ELASTICSEARCH_HOSTS points to it.",
            ),
            _ => report,
        }
    }
}

/// Error codes used in [`ErrorReport`]
pub mod codes {
    pub const TRANSPORT_ERROR: &str = "transport_error";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_ARGUMENTS: &str = "invalid_arguments";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const CONFIG_ERROR: &str = "config_error";
    pub const SERVER_ERROR: &str = "mcp_server_error";
}
