//! `GET /_cluster/health` normalized into a `_cat/health`-style summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::{ABSENT, display_string, format_decimal, read_f64, read_i64};

/// Sentinel Elasticsearch uses for "no task is waiting".
const NO_TASK_WAITING_MILLIS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
    Unknown,
}

impl HealthStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "green" => HealthStatus::Green,
            "yellow" => HealthStatus::Yellow,
            "red" => HealthStatus::Red,
            _ => HealthStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Green => "green",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Red => "red",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// Status of a document's top-level `status` field, `None` when absent.
    pub fn from_document(doc: &Value) -> Option<Self> {
        doc.get("status").and_then(Value::as_str).map(Self::parse)
    }
}

/// Cluster health rendered as display strings. Every field that the source
/// omits renders as [`ABSENT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterHealthSummary {
    pub epoch: String,
    pub timestamp: String,
    pub cluster: String,
    pub status: String,
    #[serde(rename = "node.total")]
    pub node_total: String,
    #[serde(rename = "node.data")]
    pub node_data: String,
    pub shards: String,
    pub pri: String,
    pub relo: String,
    pub init: String,
    pub unassign: String,
    /// The health endpoint has no separate unassigned-primary figure, so this
    /// mirrors `unassign`.
    #[serde(rename = "unassign.pri")]
    pub unassign_pri: String,
    pub pending_tasks: String,
    pub max_task_wait_time: String,
    pub active_shards_percent: String,
}

pub fn normalize_health(doc: &Value) -> ClusterHealthSummary {
    let field = |key: &str| display_string(doc.get(key));
    let unassigned = field("unassigned_shards");

    ClusterHealthSummary {
        epoch: ABSENT.to_string(),
        timestamp: ABSENT.to_string(),
        cluster: field("cluster_name"),
        status: HealthStatus::from_document(doc)
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| ABSENT.to_string()),
        node_total: field("number_of_nodes"),
        node_data: field("number_of_data_nodes"),
        shards: field("active_shards"),
        pri: field("active_primary_shards"),
        relo: field("relocating_shards"),
        init: field("initializing_shards"),
        unassign_pri: unassigned.clone(),
        unassign: unassigned,
        pending_tasks: field("number_of_pending_tasks"),
        max_task_wait_time: max_task_wait_time(doc.get("task_max_waiting_in_queue_millis")),
        active_shards_percent: active_shards_percent(doc.get("active_shards_percent_as_number")),
    }
}

fn max_task_wait_time(raw: Option<&Value>) -> String {
    match read_i64(raw) {
        Some(NO_TASK_WAITING_MILLIS) => ABSENT.to_string(),
        Some(millis) => millis.to_string(),
        None => display_string(raw),
    }
}

fn active_shards_percent(raw: Option<&Value>) -> String {
    let value = read_f64(raw)
        .map(format_decimal)
        .unwrap_or_else(|| ABSENT.to_string());
    format!("{value}%")
}
