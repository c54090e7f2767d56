use serde_json::Value;

use crate::error::TransportError;

/// An open-ended JSON document (index mappings, search responses) returned
/// exactly as the cluster sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    text: String,
}

impl RawDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    pub fn to_value(&self) -> Result<Value, TransportError> {
        serde_json::from_str(&self.text).map_err(|e| TransportError::malformed(e.to_string()))
    }
}

/// Accept a response body verbatim once it is known to be UTF-8 JSON.
pub fn normalize_document(body: &[u8]) -> Result<RawDocument, TransportError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| TransportError::malformed(format!("response body is not UTF-8: {e}")))?;
    serde_json::from_str::<serde::de::IgnoredAny>(text)
        .map_err(|e| TransportError::malformed(format!("response body is not JSON: {e}")))?;
    Ok(RawDocument {
        text: text.to_string(),
    })
}
