//! Tool registry: the static catalog of operations and name-based dispatch.

use std::collections::HashMap;

use esview_core::document::RawDocument;
use esview_core::error::{ErrorReport, TransportError, codes};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::facade::ElasticsearchFacade;
use crate::transport::Transport;
use crate::util::{required_query_body, required_segment, to_pretty_json};

/// Canonical tool names.
pub mod names {
    pub const GET_CLUSTER_HEALTH: &str = "get_cluster_health";
    pub const GET_CLUSTER_STATISTICS: &str = "get_cluster_statistics";
    pub const GET_CAT_INDICES: &str = "get_cat_indices";
    pub const GET_CAT_INDICES_BY_NAME: &str = "get_cat_indices_by_name";
    pub const GET_CAT_ALIASES: &str = "get_cat_aliases";
    pub const GET_CAT_ALIASES_BY_NAME: &str = "get_cat_aliases_by_name";
    pub const GET_MAPPINGS: &str = "get_mappings";
    pub const GET_SHARD_ALLOCATION: &str = "get_shard_allocation";
    pub const GET_SHARD_ALLOCATION_FOR_NODE: &str = "get_shard_allocation_for_node";
    pub const GET_DOCUMENT_SEARCH_BY_INDEX: &str = "get_document_search_by_index";
}

/// The facade call a tool is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ClusterHealth,
    ClusterStatistics,
    CatIndices,
    CatIndicesByName,
    CatAliases,
    CatAliasesByName,
    Mappings,
    ShardAllocation,
    ShardAllocationForNode,
    DocumentSearch,
}

/// Accepted JSON types of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A name or pattern
    Text,
    /// Query DSL as JSON text or as an object
    QueryDsl,
}

impl ParamKind {
    fn schema_type(self) -> Value {
        match self {
            ParamKind::Text => json!("string"),
            ParamKind::QueryDsl => json!(["string", "object"]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: ParamKind::Text,
            required: true,
        }
    }

    const fn query_dsl(name: &'static str, description: &'static str) -> Self {
        Self {
            kind: ParamKind::QueryDsl,
            ..Self::required(name, description)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    /// Human-readable shape of a successful result
    pub returns: &'static str,
    pub operation: Operation,
}

impl ToolDescriptor {
    /// JSON Schema for the arguments object. Undeclared arguments are
    /// ignored at call time, so the schema leaves them open.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.to_string(),
                json!({ "type": param.kind.schema_type(), "description": param.description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    pub fn full_description(&self) -> String {
        format!("{} Returns {}.", self.description, self.returns)
    }
}

/// The built-in catalog, in listing order.
pub fn tool_definitions() -> Vec<ToolDescriptor> {
    const INDEX_SUMMARY: &str = "a list of {index, health, status, docsCount, docsDeleted, priStoreSize, storeSize} display strings";
    const ALIAS_RECORD: &str = "a list of {alias, index, filter, routingIndex, routingSearch, isWriteIndex}; system aliases starting with '.' are excluded";
    const ALLOCATION_RECORD: &str =
        "the _cat/allocation rows as-is (shards, disk.indices, disk.used, disk.avail, disk.total, disk.percent, host, ip, node)";

    vec![
        ToolDescriptor {
            name: names::GET_CLUSTER_HEALTH,
            description: "Returns basic information about the health of the cluster.",
            params: Vec::new(),
            returns: "{cluster, status, node.total, node.data, shards, pri, relo, init, unassign, unassign.pri, pending_tasks, max_task_wait_time, active_shards_percent}; missing values are '-'",
            operation: Operation::ClusterHealth,
        },
        ToolDescriptor {
            name: names::GET_CLUSTER_STATISTICS,
            description: "Returns comprehensive cluster statistics including cluster name, UUID, health status, node roles, OS and JVM resource usage, index counts, and shard metrics.",
            params: Vec::new(),
            returns: "{cluster:{name, uuid, status, timestamp}, nodes:{total, data, master, ingest, mem_used_percent, processors, heap_used_bytes, heap_max_bytes, heap_used_percent}, indices:{count, shards:{total, primaries, replication}, docs:{count, deleted}, store_bytes}}",
            operation: Operation::ClusterStatistics,
        },
        ToolDescriptor {
            name: names::GET_CAT_INDICES,
            description: "Get a list of all indices in Elasticsearch.",
            params: Vec::new(),
            returns: INDEX_SUMMARY,
            operation: Operation::CatIndices,
        },
        ToolDescriptor {
            name: names::GET_CAT_INDICES_BY_NAME,
            description: "Get a list of indices matching the specified index name or pattern.",
            params: vec![ParamSpec::required(
                "indexName",
                "Index name or pattern to filter indices by",
            )],
            returns: INDEX_SUMMARY,
            operation: Operation::CatIndicesByName,
        },
        ToolDescriptor {
            name: names::GET_CAT_ALIASES,
            description: "Get a list of all aliases in Elasticsearch.",
            params: Vec::new(),
            returns: ALIAS_RECORD,
            operation: Operation::CatAliases,
        },
        ToolDescriptor {
            name: names::GET_CAT_ALIASES_BY_NAME,
            description: "Get only the aliases matching the specified alias name or wildcard pattern.",
            params: vec![ParamSpec::required(
                "aliasName",
                "Alias name or wildcard pattern to filter",
            )],
            returns: ALIAS_RECORD,
            operation: Operation::CatAliasesByName,
        },
        ToolDescriptor {
            name: names::GET_MAPPINGS,
            description: "Get field mappings for a specific Elasticsearch index.",
            params: vec![ParamSpec::required(
                "index",
                "Name of the Elasticsearch index to get mappings for",
            )],
            returns: "the raw mapping document as JSON text",
            operation: Operation::Mappings,
        },
        ToolDescriptor {
            name: names::GET_SHARD_ALLOCATION,
            description: "Returns information about shard allocation in the Elasticsearch cluster.",
            params: Vec::new(),
            returns: ALLOCATION_RECORD,
            operation: Operation::ShardAllocation,
        },
        ToolDescriptor {
            name: names::GET_SHARD_ALLOCATION_FOR_NODE,
            description: "Returns information about shard allocation for a specific node in the Elasticsearch cluster.",
            params: vec![ParamSpec::required(
                "nodeId",
                "The ID of the node to get shard allocation for.",
            )],
            returns: ALLOCATION_RECORD,
            operation: Operation::ShardAllocationForNode,
        },
        ToolDescriptor {
            name: names::GET_DOCUMENT_SEARCH_BY_INDEX,
            description: "Search for documents in an Elasticsearch index using Query DSL.",
            params: vec![
                ParamSpec::required("index", "The name of the Elasticsearch index to search"),
                ParamSpec::query_dsl(
                    "queryBody",
                    "Elasticsearch search request body (Query DSL) as JSON text or an object, forwarded as-is",
                ),
            ],
            returns: "the raw search response as JSON text",
            operation: Operation::DocumentSearch,
        },
    ]
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate tool name '{0}'")]
    DuplicateName(&'static str),
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Unknown tool '{0}'")]
    NotFound(String),
    #[error("{message}")]
    InvalidArguments { field: String, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode result: {0}")]
    Internal(String),
}

impl InvocationError {
    pub fn missing(field: &str) -> Self {
        Self::InvalidArguments {
            field: field.to_string(),
            message: format!("Missing required argument '{field}'"),
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InvocationError::NotFound(_) => codes::NOT_FOUND,
            InvocationError::InvalidArguments { .. } => codes::INVALID_ARGUMENTS,
            InvocationError::Transport(_) => codes::TRANSPORT_ERROR,
            InvocationError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        match self {
            InvocationError::NotFound(_) => ErrorReport::new(self.code(), self.to_string())
                .with_docs_hint("Call tools/list for the available tool names."),
            InvocationError::InvalidArguments { field, message } => {
                ErrorReport::new(self.code(), message.clone()).with_field(field.clone())
            }
            InvocationError::Transport(err) => ErrorReport::from(err),
            InvocationError::Internal(_) => ErrorReport::new(self.code(), self.to_string()),
        }
    }
}

/// A successful invocation. Raw documents keep the cluster's exact text.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Structured(Value),
    Raw(RawDocument),
}

impl ToolOutput {
    fn structured<S: Serialize>(value: S) -> Result<Self, InvocationError> {
        serde_json::to_value(value)
            .map(ToolOutput::Structured)
            .map_err(|e| InvocationError::Internal(e.to_string()))
    }

    pub fn text(&self) -> String {
        match self {
            ToolOutput::Structured(value) => to_pretty_json(value),
            ToolOutput::Raw(doc) => doc.as_str().to_string(),
        }
    }

    pub fn structured_content(&self) -> Option<&Value> {
        match self {
            ToolOutput::Structured(value) => Some(value),
            ToolOutput::Raw(_) => None,
        }
    }
}

/// Immutable after construction; safe to share across concurrent invocations.
pub struct ToolRegistry<T> {
    facade: ElasticsearchFacade<T>,
    tools: Vec<ToolDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl<T: Transport> ToolRegistry<T> {
    pub fn new(transport: T) -> Result<Self, RegistryError> {
        Self::with_tools(transport, tool_definitions())
    }

    pub fn with_tools(transport: T, tools: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if by_name.insert(tool.name, position).is_some() {
                return Err(RegistryError::DuplicateName(tool.name));
            }
        }
        Ok(Self {
            facade: ElasticsearchFacade::new(transport),
            tools,
            by_name,
        })
    }

    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.by_name.get(name).map(|&position| &self.tools[position])
    }

    pub fn facade(&self) -> &ElasticsearchFacade<T> {
        &self.facade
    }

    pub async fn invoke(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<ToolOutput, InvocationError> {
        let tool = self
            .get(name)
            .ok_or_else(|| InvocationError::NotFound(name.to_string()))?;

        tracing::debug!(tool = tool.name, "invoking tool");
        let result = self.dispatch(tool.operation, args).await;
        if let Err(err) = &result {
            tracing::warn!(tool = tool.name, code = err.code(), error = %err, "tool invocation failed");
        }
        result
    }

    async fn dispatch(
        &self,
        operation: Operation,
        args: &Map<String, Value>,
    ) -> Result<ToolOutput, InvocationError> {
        let facade = &self.facade;
        match operation {
            Operation::ClusterHealth => ToolOutput::structured(facade.cluster_health().await?),
            Operation::ClusterStatistics => {
                ToolOutput::structured(facade.cluster_statistics().await?)
            }
            Operation::CatIndices => ToolOutput::structured(facade.cat_indices(None).await?),
            Operation::CatIndicesByName => {
                let index = required_segment(args, "indexName")?;
                ToolOutput::structured(facade.cat_indices(Some(&index)).await?)
            }
            Operation::CatAliases => ToolOutput::structured(facade.cat_aliases(None).await?),
            Operation::CatAliasesByName => {
                let alias = required_segment(args, "aliasName")?;
                ToolOutput::structured(facade.cat_aliases(Some(&alias)).await?)
            }
            Operation::Mappings => {
                let index = required_segment(args, "index")?;
                Ok(ToolOutput::Raw(facade.mappings(&index).await?))
            }
            Operation::ShardAllocation => {
                ToolOutput::structured(facade.shard_allocation(None).await?)
            }
            Operation::ShardAllocationForNode => {
                let node = required_segment(args, "nodeId")?;
                ToolOutput::structured(facade.shard_allocation(Some(&node)).await?)
            }
            Operation::DocumentSearch => {
                let index = required_segment(args, "index")?;
                let query_body = required_query_body(args, "queryBody")?;
                Ok(ToolOutput::Raw(facade.search(&index, query_body).await?))
            }
        }
    }
}
