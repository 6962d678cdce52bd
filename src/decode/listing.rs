//! Listing page decoder
//!
//! Splits a decoded response body into "empty" and "records" pages. The
//! listing endpoint answers past its last page with `{"data": null}`.

use super::types::PageContent;
use crate::error::{Error, Result};
use serde_json::Value;

/// Default path to the record list inside a listing response
pub const DEFAULT_RECORD_PATH: &str = "data.diff";

/// Extracts records from a listing response
#[derive(Debug, Clone)]
pub struct ListingDecoder {
    /// Dot path to the record list; its parent is the payload object
    record_path: String,
}

impl Default for ListingDecoder {
    fn default() -> Self {
        Self::with_path(DEFAULT_RECORD_PATH)
    }
}

impl ListingDecoder {
    /// Create a decoder for the default record path
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = path.strip_prefix("$.").unwrap_or(&path).to_string();
        Self { record_path: path }
    }

    /// Get the record path
    pub fn record_path(&self) -> &str {
        &self.record_path
    }

    /// Classify a response body.
    ///
    /// A missing or null payload, or an empty record list, is `Empty`. A
    /// payload without the record field is malformed and an error.
    pub fn decode(&self, body: &Value) -> Result<PageContent> {
        let (parent, field) = match self.record_path.rsplit_once('.') {
            Some((parent, field)) => (Some(parent), field),
            None => (None, self.record_path.as_str()),
        };

        let payload = match parent {
            Some(parent) => match extract_simple_path(body, parent) {
                None | Some(Value::Null) => return Ok(PageContent::Empty),
                Some(v) => v,
            },
            None => body,
        };

        let records = match payload.get(field) {
            Some(Value::Array(items)) => items.clone(),
            // Without `np=1` the endpoint keys records by position
            Some(Value::Object(map)) => map.values().cloned().collect(),
            Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(Error::extraction(
                    &self.record_path,
                    format!("expected a list of records, found {}", type_name(other)),
                ))
            }
            None => {
                return Err(Error::extraction(
                    &self.record_path,
                    "payload has no record list",
                ))
            }
        };

        if records.is_empty() {
            Ok(PageContent::Empty)
        } else {
            Ok(PageContent::Records(records))
        }
    }
}

/// Follow a dot-separated path of object keys
fn extract_simple_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|part| !part.is_empty())
        .try_fold(value, |current, part| current.get(part))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
