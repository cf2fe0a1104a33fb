//! Response projection: partitioner output → document updates.
//!
//! The response is checked field by field rather than deserialised into a
//! fixed struct. What counts as an error:
//!
//! * body is not a JSON object;
//! * `elements` present but not an array;
//! * `properties` present but not an object.
//!
//! Everything else degrades gracefully: a body without `elements` simply
//! extracted nothing, and elements without a usable `text_representation`
//! are skipped.

use crate::error::IngestError;
use crate::output::{Element, PartitionResponse, Projection};
use serde_json::Value;
use tracing::debug;

/// Turn a partition response into the text and properties to apply.
pub fn project(response: &PartitionResponse) -> Result<Projection, IngestError> {
    let body = response.body.as_object().ok_or_else(|| {
        IngestError::MalformedResponse(format!(
            "expected a JSON object, got: {}",
            truncate(&response.body.to_string(), 200)
        ))
    })?;

    let elements: &[Value] = match body.get("elements") {
        None | Some(Value::Null) => {
            debug!("Partitioner response contains no elements");
            &[]
        }
        Some(Value::Array(elements)) => elements.as_slice(),
        Some(other) => {
            return Err(IngestError::MalformedResponse(format!(
                "`elements` is not a list: {}",
                truncate(&other.to_string(), 200)
            )))
        }
    };

    let text = join_text_representations(elements);

    let properties = match body.get("properties") {
        None | Some(Value::Null) => Default::default(),
        Some(Value::Object(properties)) => properties.clone(),
        Some(other) => {
            return Err(IngestError::MalformedResponse(format!(
                "`properties` is not an object: {}",
                truncate(&other.to_string(), 200)
            )))
        }
    };

    debug!(
        "Projected {} elements → {} chars of text, {} properties",
        elements.len(),
        text.len(),
        properties.len()
    );

    Ok(Projection {
        text,
        properties,
        element_count: elements.len(),
    })
}

/// Join every non-empty `text_representation`, in order, with `\n`.
fn join_text_representations(elements: &[Value]) -> String {
    let texts: Vec<String> = elements
        .iter()
        .map(Element::from_value)
        .filter_map(|element| element.text_representation)
        .filter(|text| !text.is_empty())
        .collect();
    texts.join("\n")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
