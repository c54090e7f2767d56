//! Outbound HTTP seam. The facade only knows [`Transport`]; [`HttpTransport`]
//! is the reqwest-backed implementation wired up by the binary.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use esview_core::error::TransportError;
use thiserror::Error;

use crate::util::client;

/// Placeholder the deployment configuration uses for "no credential".
const EMPTY_CREDENTIAL: &str = "EMPTY";

/// Methods the facade is allowed to issue. Search is the only POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsRequest {
    pub method: HttpMethod,
    /// Absolute path including any query string, e.g. `/_cat/aliases?format=json`
    pub path: String,
    /// JSON payload forwarded verbatim
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EsResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl EsResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Performs one request against the cluster. Implementations own pooling,
/// auth and timeouts; they must not retry.
pub trait Transport: Send + Sync {
    fn perform_request(
        &self,
        request: EsRequest,
    ) -> impl Future<Output = Result<EsResponse, TransportError>> + Send;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one Elasticsearch host is required")]
    NoHosts,
    #[error("invalid Elasticsearch host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub hosts: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Basic-auth pair, only when both halves are set to something real.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        fn usable(value: &Option<String>) -> Option<&str> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != EMPTY_CREDENTIAL)
        }
        Some((usable(&self.username)?, usable(&self.password)?))
    }
}

/// Split a comma-separated host list, dropping blanks.
pub fn parse_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub struct HttpTransport {
    http: reqwest::Client,
    hosts: Vec<String>,
    credentials: Option<(String, String)>,
    next_host: AtomicUsize,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self, ConfigError> {
        if config.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        let hosts = config
            .hosts
            .iter()
            .map(|host| validate_host(host))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            http: client(config.timeout)?,
            hosts,
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            next_host: AtomicUsize::new(0),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Round robin over the configured hosts, one host per request.
    fn pick_host(&self) -> &str {
        let slot = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[slot]
    }
}

impl Transport for HttpTransport {
    async fn perform_request(&self, request: EsRequest) -> Result<EsResponse, TransportError> {
        let host = self.pick_host();
        let url = reqwest::Url::parse(&format!("{host}{}", request.path))
            .map_err(|e| TransportError::Connection(format!("invalid request URL: {e}")))?;

        tracing::debug!(
            method = request.method.as_str(),
            host,
            path = %request.path,
            has_body = request.body.is_some(),
            "sending Elasticsearch request"
        );

        let mut builder = self.http.request(request.method.to_reqwest(), url);
        if let Some((user, pass)) = &self.credentials {
            builder = builder.basic_auth(user, Some(pass));
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connection(format!("{host}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Connection(format!("failed to read response body: {e}")))?;

        tracing::debug!(status, bytes = body.len(), "Elasticsearch responded");
        Ok(EsResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn validate_host(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigError::InvalidHost {
        host: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = reqwest::Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("host must not carry a query or fragment"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hosts: &[&str]) -> ConnectionConfig {
        ConnectionConfig {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            username: None,
            password: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn parse_hosts_splits_and_trims() {
        assert_eq!(
            parse_hosts(" http://a:9200, ,http://b:9200 "),
            vec!["http://a:9200".to_string(), "http://b:9200".to_string()]
        );
        assert!(parse_hosts("").is_empty());
    }

    #[test]
    fn credentials_require_both_halves_and_skip_placeholders() {
        let mut cfg = config(&["http://localhost:9200"]);
        assert_eq!(cfg.credentials(), None);

        cfg.username = Some("elastic".to_string());
        assert_eq!(cfg.credentials(), None);

        cfg.password = Some("EMPTY".to_string());
        assert_eq!(cfg.credentials(), None);

        cfg.password = Some("changeme".to_string());
        assert_eq!(cfg.credentials(), Some(("elastic", "changeme")));

        cfg.username = Some("  ".to_string());
        assert_eq!(cfg.credentials(), None);
    }

    #[test]
    fn rejects_empty_and_invalid_host_lists() {
        assert!(matches!(HttpTransport::new(&config(&[])), Err(ConfigError::NoHosts)));
        assert!(matches!(
            HttpTransport::new(&config(&["localhost:9200"])),
            Err(ConfigError::InvalidHost { .. })
        ));
        assert!(matches!(
            HttpTransport::new(&config(&["ftp://es.internal"])),
            Err(ConfigError::InvalidHost { .. })
        ));
    }

    #[test]
    fn rotates_hosts_per_request() {
        let transport =
            HttpTransport::new(&config(&["http://a:9200/", "http://b:9200"])).unwrap();
        assert_eq!(transport.hosts(), ["http://a:9200", "http://b:9200"]);
        assert_eq!(transport.pick_host(), "http://a:9200");
        assert_eq!(transport.pick_host(), "http://b:9200");
        assert_eq!(transport.pick_host(), "http://a:9200");
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let transport = HttpTransport::new(&config(&["http://127.0.0.1:9"])).unwrap();
        let err = transport
            .perform_request(EsRequest {
                method: HttpMethod::Get,
                path: "/_cluster/health".to_string(),
                body: None,
            })
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
