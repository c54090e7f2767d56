use std::time::Duration;

use serde_json::{Map, Value};

use crate::facade::PathSegment;
use crate::registry::InvocationError;

pub fn client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("esview-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// A non-blank string argument. Blank strings count as missing.
pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, InvocationError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(InvocationError::missing(key)),
        Some(Value::String(v)) if v.trim().is_empty() => Err(InvocationError::missing(key)),
        Some(Value::String(v)) => Ok(v.clone()),
        Some(_) => Err(InvocationError::invalid(key, format!("'{key}' must be a string"))),
    }
}

pub fn required_segment(
    args: &Map<String, Value>,
    key: &str,
) -> Result<PathSegment, InvocationError> {
    let raw = required_string(args, key)?;
    PathSegment::new(&raw).map_err(|reason| InvocationError::invalid(key, reason))
}

/// Query DSL as text: strings are forwarded verbatim, objects are serialized.
pub fn required_query_body(
    args: &Map<String, Value>,
    key: &str,
) -> Result<String, InvocationError> {
    match args.get(key) {
        Some(Value::Object(map)) => serde_json::to_string(map)
            .map_err(|e| InvocationError::invalid(key, format!("'{key}' is not serializable: {e}"))),
        Some(Value::String(_)) | Some(Value::Null) | None => required_string(args, key),
        Some(_) => Err(InvocationError::invalid(
            key,
            format!("'{key}' must be a JSON query string or object"),
        )),
    }
}
