//! Document mutation: apply a [`Projection`] to the target document.
//!
//! The output-text field is overwritten. Property fields are appended to,
//! never overwritten: separate ingest calls for the same logical record may
//! each contribute part of a property's values.

use crate::document::IngestDocument;
use crate::output::Projection;
use tracing::debug;

/// Apply `projection` to `document`.
///
/// Only called after a fully successful projection, so a document is either
/// updated with everything the response carried or left untouched.
pub fn apply(document: &mut IngestDocument, output_field: &str, projection: &Projection) {
    if !projection.text.is_empty() {
        document.set_field(output_field, projection.text.clone());
    }

    for (key, value) in &projection.properties {
        document.append_field(key.clone(), value.clone());
    }

    debug!(
        "Applied {} chars to [{}] and {} properties",
        projection.text.len(),
        output_field,
        projection.properties.len()
    );
}
