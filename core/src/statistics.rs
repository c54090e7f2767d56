//! `GET /_cluster/stats` condensed into cluster, node and index topology.

use serde::Serialize;
use serde_json::Value;

use crate::health::HealthStatus;
use crate::json::{Reported, lookup, read_f64, read_i64, read_string, read_u64};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatistics {
    pub cluster: ClusterIdentity,
    pub nodes: NodeTopology,
    pub indices: IndexTopology,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterIdentity {
    pub name: Reported<String>,
    pub uuid: Reported<String>,
    pub status: Reported<HealthStatus>,
    /// Epoch milliseconds as reported by the cluster
    pub timestamp: Reported<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTopology {
    pub total: Reported<u64>,
    pub data: Reported<u64>,
    pub master: Reported<u64>,
    pub ingest: Reported<u64>,
    pub mem_used_percent: Reported<f64>,
    pub processors: Reported<u64>,
    pub heap_used_bytes: Reported<u64>,
    pub heap_max_bytes: Reported<u64>,
    /// Always present: derived from the two heap figures, 0.0 without a max.
    pub heap_used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexTopology {
    pub count: Reported<u64>,
    pub shards: ShardTotals,
    pub docs: DocTotals,
    pub store_bytes: Reported<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardTotals {
    pub total: Reported<u64>,
    pub primaries: Reported<u64>,
    pub replication: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocTotals {
    pub count: Reported<u64>,
    pub deleted: Reported<u64>,
}

pub fn normalize_statistics(doc: &Value) -> ClusterStatistics {
    let u64_at = |keys: &[&str]| Reported(read_u64(lookup(doc, keys)));

    let heap_used = read_u64(lookup(doc, &["nodes", "jvm", "mem", "heap_used_in_bytes"]));
    let heap_max = read_u64(lookup(doc, &["nodes", "jvm", "mem", "heap_max_in_bytes"]));

    ClusterStatistics {
        cluster: ClusterIdentity {
            name: Reported(read_string(lookup(doc, &["cluster_name"]))),
            uuid: Reported(read_string(lookup(doc, &["cluster_uuid"]))),
            status: Reported(HealthStatus::from_document(doc)),
            timestamp: Reported(read_i64(lookup(doc, &["timestamp"]))),
        },
        nodes: NodeTopology {
            total: u64_at(&["nodes", "count", "total"]),
            data: u64_at(&["nodes", "count", "data"]),
            master: u64_at(&["nodes", "count", "master"]),
            ingest: u64_at(&["nodes", "count", "ingest"]),
            mem_used_percent: Reported(read_f64(lookup(doc, &["nodes", "os", "mem", "used_percent"]))),
            processors: u64_at(&["nodes", "os", "available_processors"]),
            heap_used_bytes: Reported(heap_used),
            heap_max_bytes: Reported(heap_max),
            heap_used_percent: heap_used_percent(heap_used, heap_max),
        },
        indices: IndexTopology {
            count: u64_at(&["indices", "count"]),
            shards: ShardTotals {
                total: u64_at(&["indices", "shards", "total"]),
                primaries: u64_at(&["indices", "shards", "primaries"]),
                replication: read_f64(lookup(doc, &["indices", "shards", "replication"]))
                    .unwrap_or(0.0),
            },
            docs: DocTotals {
                count: u64_at(&["indices", "docs", "count"]),
                deleted: u64_at(&["indices", "docs", "deleted"]),
            },
            store_bytes: u64_at(&["indices", "store", "size_in_bytes"]),
        },
    }
}

/// `used / max * 100`, or 0.0 when the max is zero or unknown. A missing used
/// figure counts as zero.
pub fn heap_used_percent(used: Option<u64>, max: Option<u64>) -> f64 {
    match max {
        Some(max) if max > 0 => used.unwrap_or(0) as f64 / max as f64 * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "cluster_name": "test_cluster",
            "cluster_uuid": "test_uuid",
            "status": "green",
            "timestamp": 1678886400000_i64,
            "nodes": {
                "count": { "total": 3, "data": 2, "master": 1, "ingest": 2 },
                "os": { "mem": { "used_percent": 60 }, "available_processors": 8 },
                "jvm": { "mem": { "heap_used_in_bytes": 1073741824_u64, "heap_max_in_bytes": 2147483648_u64 } }
            },
            "indices": {
                "count": 5,
                "shards": { "total": 10, "primaries": 5, "replication": 1.0 },
                "docs": { "count": 10000, "deleted": 500 },
                "store": { "size_in_bytes": 4096 }
            }
        })
    }

    #[test]
    fn extracts_nested_statistics() {
        let stats = normalize_statistics(&sample());
        assert_eq!(stats.cluster.name.value().map(String::as_str), Some("test_cluster"));
        assert_eq!(stats.cluster.uuid.value().map(String::as_str), Some("test_uuid"));
        assert_eq!(stats.cluster.status, Reported(Some(HealthStatus::Green)));
        assert_eq!(stats.cluster.timestamp, Reported(Some(1678886400000)));
        assert_eq!(stats.nodes.total, Reported(Some(3)));
        assert_eq!(stats.nodes.data, Reported(Some(2)));
        assert_eq!(stats.nodes.master, Reported(Some(1)));
        assert_eq!(stats.nodes.ingest, Reported(Some(2)));
        assert_eq!(stats.nodes.mem_used_percent, Reported(Some(60.0)));
        assert_eq!(stats.nodes.processors, Reported(Some(8)));
        assert_eq!(stats.nodes.heap_used_bytes, Reported(Some(1073741824)));
        assert_eq!(stats.nodes.heap_max_bytes, Reported(Some(2147483648)));
        assert!((stats.nodes.heap_used_percent - 50.0).abs() < 1e-9);
        assert_eq!(stats.indices.count, Reported(Some(5)));
        assert_eq!(stats.indices.shards.total, Reported(Some(10)));
        assert_eq!(stats.indices.shards.primaries, Reported(Some(5)));
        assert_eq!(stats.indices.shards.replication, 1.0);
        assert_eq!(stats.indices.docs.count, Reported(Some(10000)));
        assert_eq!(stats.indices.docs.deleted, Reported(Some(500)));
        assert_eq!(stats.indices.store_bytes, Reported(Some(4096)));
    }

    #[test]
    fn missing_parent_objects_yield_absent_children() {
        let stats = normalize_statistics(&json!({ "cluster_name": "bare" }));
        assert!(stats.nodes.total.is_absent());
        assert!(stats.nodes.mem_used_percent.is_absent());
        assert!(stats.nodes.heap_max_bytes.is_absent());
        assert_eq!(stats.nodes.heap_used_percent, 0.0);
        assert!(stats.indices.count.is_absent());
        assert!(stats.indices.docs.deleted.is_absent());
        assert_eq!(stats.indices.shards.replication, 0.0);

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["cluster"]["name"], "bare");
        assert_eq!(value["cluster"]["status"], "-");
        assert_eq!(value["nodes"]["total"], "-");
        assert_eq!(value["nodes"]["heap_used_percent"], json!(0.0));
        assert_eq!(value["indices"]["shards"]["replication"], json!(0.0));
        assert_eq!(value["indices"]["docs"]["count"], "-");
    }

    #[test]
    fn heap_percent_is_zero_without_a_max() {
        assert_eq!(heap_used_percent(Some(100), Some(0)), 0.0);
        assert_eq!(heap_used_percent(Some(100), None), 0.0);
        assert_eq!(heap_used_percent(None, Some(400)), 0.0);
        assert_eq!(heap_used_percent(Some(1), Some(3)), 1.0 / 3.0 * 100.0);
    }

    #[test]
    fn non_object_document_is_all_absent() {
        let value = serde_json::to_value(normalize_statistics(&json!([1, 2, 3]))).unwrap();
        assert_eq!(value["cluster"]["uuid"], "-");
        assert_eq!(value["indices"]["store_bytes"], "-");
    }
}
