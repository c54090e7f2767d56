//! `_cat` listings (indices, aliases, allocation) requested with `format=json`.
//!
//! Cat records are flat maps of display strings keyed by column name. The
//! normalizers rename dotted columns to camel case and leave values untouched.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::json::display_string;

/// Column selection sent with every `_cat/indices` request.
pub const INDEX_COLUMNS: &str = "health,status,index,docs.count,docs.deleted,pri.store.size,store.size";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub index: String,
    pub health: String,
    pub status: String,
    pub docs_count: String,
    pub docs_deleted: String,
    pub pri_store_size: String,
    pub store_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    pub alias: String,
    pub index: String,
    pub filter: String,
    pub routing_index: String,
    pub routing_search: String,
    pub is_write_index: String,
}

impl AliasRecord {
    /// Aliases with a leading dot are system or hidden aliases.
    pub fn is_system(&self) -> bool {
        self.alias.starts_with('.')
    }
}

/// One `_cat/allocation` row, passed through without a fixed schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AllocationRecord(pub Map<String, Value>);

impl AllocationRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }
}

pub fn normalize_indices(body: &Value) -> Result<Vec<IndexSummary>, TransportError> {
    let rows = cat_rows(body, "_cat/indices")?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let column = |key: &str| display_string(row.get(key));
            IndexSummary {
                index: column("index"),
                health: column("health"),
                status: column("status"),
                docs_count: column("docs.count"),
                docs_deleted: column("docs.deleted"),
                pri_store_size: column("pri.store.size"),
                store_size: column("store.size"),
            }
        })
        .collect())
}

/// Aliases with system aliases removed, whatever name filter produced the body.
pub fn normalize_aliases(body: &Value) -> Result<Vec<AliasRecord>, TransportError> {
    let rows = cat_rows(body, "_cat/aliases")?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(alias) = row.get("alias").and_then(Value::as_str) else {
            tracing::warn!(row = ?row, "dropping alias row without an alias name");
            continue;
        };
        let column = |key: &str| display_string(row.get(key));
        let record = AliasRecord {
            alias: alias.to_string(),
            index: column("index"),
            filter: column("filter"),
            routing_index: column("routing.index"),
            routing_search: column("routing.search"),
            is_write_index: column("is_write_index"),
        };
        if !record.is_system() {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn normalize_allocation(body: &Value) -> Result<Vec<AllocationRecord>, TransportError> {
    Ok(cat_rows(body, "_cat/allocation")?
        .into_iter()
        .map(|row| AllocationRecord(row.clone()))
        .collect())
}

fn cat_rows<'a>(body: &'a Value, endpoint: &str) -> Result<Vec<&'a Map<String, Value>>, TransportError> {
    let rows = body.as_array().ok_or_else(|| {
        TransportError::malformed(format!("{endpoint} must return a JSON array"))
    })?;
    rows.iter()
        .enumerate()
        .map(|(position, row)| {
            row.as_object().ok_or_else(|| {
                TransportError::malformed(format!("{endpoint} row {position} is not an object"))
            })
        })
        .collect()
}
