//! Value types produced by the partition call and the projector.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The raw result of one partition call.
///
/// The body is kept as untyped JSON; `properties` keys come from a
/// user-supplied schema, so the projector checks its shape field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionResponse {
    /// Parsed response body.
    pub body: Value,
    /// Value of the call-identifier response header, when sent.
    pub call_id: Option<String>,
    /// Value of the API-version response header, when sent.
    pub api_version: Option<String>,
}

impl PartitionResponse {
    /// Wrap a body with no trace headers.
    pub fn from_body(body: Value) -> Self {
        Self {
            body,
            call_id: None,
            api_version: None,
        }
    }
}

/// One unit of partitioner output: a text block, table, image, ...
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element type tag, e.g. `"Text"`, `"Table"`, `"Picture"`.
    #[serde(rename = "type")]
    pub element_type: Option<String>,
    /// Text rendering of the element, if the service produced one.
    pub text_representation: Option<String>,
}

impl Element {
    /// Read an element out of a response entry, tolerating missing or
    /// oddly-typed fields (they read as `None`).
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            element_type: field("type"),
            text_representation: field("text_representation"),
        }
    }
}

/// What a response contributes to the target document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Element texts joined with `\n`, in response order. Empty when no
    /// element carried text.
    pub text: String,
    /// Extracted properties, in response order.
    pub properties: Map<String, Value>,
    /// Number of elements in the response.
    pub element_count: usize,
}

impl Projection {
    /// True when the response contributes nothing to the document.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.properties.is_empty()
    }
}
