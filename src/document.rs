//! The ingest document being enriched.
//!
//! An [`IngestDocument`] is an ordered map from field name to JSON value,
//! owned by the host pipeline for the duration of one processor call. Field
//! names are top-level keys; the processor never creates nested objects.
//!
//! Binary content travels through JSON documents as base64 text, so
//! [`IngestDocument::field_bytes`] decodes string fields the same way the
//! host does when a processor asks for a field "as bytes".

use crate::error::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A mutable document flowing through an ingest pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngestDocument {
    source: Map<String, Value>,
}

impl IngestDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the document's fields.
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Consume the document, returning its fields.
    pub fn into_source(self) -> Map<String, Value> {
        self.source
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source.get(field)
    }

    /// True when the field exists, even if its value is `null`.
    pub fn contains(&self, field: &str) -> bool {
        self.source.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Set `field` to `value`, replacing any previous value.
    pub fn set_field(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.source.insert(field.into(), value.into());
    }

    /// Store raw bytes in `field` as base64 text.
    pub fn set_field_bytes(&mut self, field: impl Into<String>, bytes: &[u8]) {
        self.set_field(field, STANDARD.encode(bytes));
    }

    /// Append `value` to `field` without discarding what is already there.
    ///
    /// * absent field → the value is stored as-is;
    /// * existing list → the value is pushed (a list value is spliced in
    ///   element by element);
    /// * existing scalar/object → it becomes the first element of a new list
    ///   and the value is appended after it.
    ///
    /// Duplicates are kept: two calls with the same value leave two entries.
    pub fn append_field(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();

        let Some(existing) = self.source.get_mut(&field) else {
            self.source.insert(field, value);
            return;
        };

        if !existing.is_array() {
            let prior = existing.take();
            *existing = Value::Array(vec![prior]);
        }
        if let Value::Array(items) = existing {
            match value {
                Value::Array(values) => items.extend(values),
                other => items.push(other),
            }
        }
    }

    /// Read `field` as binary content.
    ///
    /// Returns `Ok(None)` when the field is absent or `null`. String values
    /// are base64-decoded; any other type is an [`IngestError::InvalidField`].
    pub fn field_bytes(&self, field: &str) -> Result<Option<Vec<u8>>, IngestError> {
        match self.source.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(encoded)) => STANDARD
                .decode(encoded.trim())
                .map(Some)
                .map_err(|e| IngestError::InvalidField {
                    field: field.to_string(),
                    reason: format!("not valid base64: {e}"),
                }),
            Some(other) => Err(IngestError::InvalidField {
                field: field.to_string(),
                reason: format!("content field of unknown type: {other}"),
            }),
        }
    }
}

impl From<Map<String, Value>> for IngestDocument {
    fn from(source: Map<String, Value>) -> Self {
        Self { source }
    }
}
