//! Operation facade: each administrative view binds a request template to a
//! normalizer from `esview-core`.

use esview_core::cat::{
    AliasRecord, AllocationRecord, INDEX_COLUMNS, IndexSummary, normalize_aliases,
    normalize_allocation, normalize_indices,
};
use esview_core::document::{RawDocument, normalize_document};
use esview_core::error::TransportError;
use esview_core::health::{ClusterHealthSummary, normalize_health};
use esview_core::statistics::{ClusterStatistics, normalize_statistics};
use serde_json::Value;

use crate::transport::{EsRequest, HttpMethod, Transport};

/// Method, path template and fixed query string of one endpoint.
/// `{name}` placeholders are filled from path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: HttpMethod,
    pub path: &'static str,
    pub query: &'static [(&'static str, &'static str)],
}

const FORMAT_JSON: (&str, &str) = ("format", "json");

pub const CLUSTER_HEALTH: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cluster/health",
    query: &[],
};
pub const CLUSTER_STATS: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cluster/stats",
    query: &[],
};
pub const CAT_INDICES: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cat/indices",
    query: &[FORMAT_JSON, ("h", INDEX_COLUMNS)],
};
pub const CAT_INDICES_BY_NAME: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cat/indices/{indexName}",
    query: &[FORMAT_JSON, ("h", INDEX_COLUMNS)],
};
pub const CAT_ALIASES: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cat/aliases",
    query: &[FORMAT_JSON],
};
pub const CAT_ALIASES_BY_NAME: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cat/aliases/{aliasName}",
    query: &[FORMAT_JSON],
};
pub const INDEX_MAPPING: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/{index}/_mapping",
    query: &[],
};
pub const CAT_ALLOCATION: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cat/allocation",
    query: &[FORMAT_JSON],
};
pub const CAT_ALLOCATION_FOR_NODE: RequestTemplate = RequestTemplate {
    method: HttpMethod::Get,
    path: "/_cat/allocation/{nodeId}",
    query: &[FORMAT_JSON],
};
pub const INDEX_SEARCH: RequestTemplate = RequestTemplate {
    method: HttpMethod::Post,
    path: "/{index}/_search",
    query: &[],
};

impl RequestTemplate {
    pub fn render(&self, segments: &[(&str, &PathSegment)]) -> String {
        let mut path = self.path.to_string();
        for (name, segment) in segments {
            path = path.replace(&format!("{{{name}}}"), segment.as_str());
        }
        if !self.query.is_empty() {
            let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            path.push('?');
            path.push_str(&query.join("&"));
        }
        path
    }
}

/// One path component supplied by a caller: an index, alias or node name or
/// pattern. Cannot contain anything that would change which endpoint is hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment(String);

impl PathSegment {
    pub fn new(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("path argument must not be empty".to_string());
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|&c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace())
        {
            return Err(format!("'{trimmed}' must not contain '{bad}'"));
        }
        if matches!(trimmed, "." | "..") {
            return Err(format!("'{trimmed}' is not a valid name"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read-only views of a cluster. Stateless: every call is one round trip.
pub struct ElasticsearchFacade<T> {
    transport: T,
}

impl<T: Transport> ElasticsearchFacade<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn cluster_health(&self) -> Result<ClusterHealthSummary, TransportError> {
        let doc = self.fetch_json(&CLUSTER_HEALTH, &[], None).await?;
        Ok(normalize_health(&doc))
    }

    pub async fn cluster_statistics(&self) -> Result<ClusterStatistics, TransportError> {
        let doc = self.fetch_json(&CLUSTER_STATS, &[], None).await?;
        Ok(normalize_statistics(&doc))
    }

    pub async fn cat_indices(
        &self,
        index_name: Option<&PathSegment>,
    ) -> Result<Vec<IndexSummary>, TransportError> {
        let doc = match index_name {
            Some(name) => {
                self.fetch_json(&CAT_INDICES_BY_NAME, &[("indexName", name)], None)
                    .await?
            }
            None => self.fetch_json(&CAT_INDICES, &[], None).await?,
        };
        normalize_indices(&doc)
    }

    pub async fn cat_aliases(
        &self,
        alias_name: Option<&PathSegment>,
    ) -> Result<Vec<AliasRecord>, TransportError> {
        let doc = match alias_name {
            Some(name) => {
                self.fetch_json(&CAT_ALIASES_BY_NAME, &[("aliasName", name)], None)
                    .await?
            }
            None => self.fetch_json(&CAT_ALIASES, &[], None).await?,
        };
        normalize_aliases(&doc)
    }

    pub async fn mappings(&self, index: &PathSegment) -> Result<RawDocument, TransportError> {
        let body = self.fetch(&INDEX_MAPPING, &[("index", index)], None).await?;
        normalize_document(&body)
    }

    pub async fn shard_allocation(
        &self,
        node_id: Option<&PathSegment>,
    ) -> Result<Vec<AllocationRecord>, TransportError> {
        let doc = match node_id {
            Some(node) => {
                self.fetch_json(&CAT_ALLOCATION_FOR_NODE, &[("nodeId", node)], None)
                    .await?
            }
            None => self.fetch_json(&CAT_ALLOCATION, &[], None).await?,
        };
        normalize_allocation(&doc)
    }

    /// `query_body` goes out exactly as given; the DSL is not inspected.
    pub async fn search(
        &self,
        index: &PathSegment,
        query_body: String,
    ) -> Result<RawDocument, TransportError> {
        let body = self
            .fetch(&INDEX_SEARCH, &[("index", index)], Some(query_body))
            .await?;
        normalize_document(&body)
    }

    async fn fetch_json(
        &self,
        template: &RequestTemplate,
        segments: &[(&str, &PathSegment)],
        body: Option<String>,
    ) -> Result<Value, TransportError> {
        let bytes = self.fetch(template, segments, body).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::malformed(format!("response body is not JSON: {e}")))
    }

    async fn fetch(
        &self,
        template: &RequestTemplate,
        segments: &[(&str, &PathSegment)],
        body: Option<String>,
    ) -> Result<Vec<u8>, TransportError> {
        let request = EsRequest {
            method: template.method,
            path: template.render(segments),
            body,
        };
        let response = self.transport.perform_request(request).await?;
        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response.body)
    }
}
