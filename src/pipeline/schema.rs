//! Property-extraction schema resolution.
//!
//! A schema may be given inline or as a path to a JSON file. Inline text
//! wins and is forwarded untouched. A file is parsed and re-serialised in
//! compact form so indentation or trailing newlines in the file never reach
//! the request.

use crate::error::IngestError;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Resolve the schema to send, if any.
///
/// * non-empty `inline` → returned as-is, `path` is not read;
/// * otherwise `path` → read, validated as JSON, returned compacted;
/// * neither → `None` (no property extraction).
pub fn resolve_schema(inline: Option<&str>, path: Option<&Path>) -> Result<Option<String>, IngestError> {
    if let Some(schema) = inline.filter(|s| !s.is_empty()) {
        debug!("Using inline property schema ({} bytes)", schema.len());
        return Ok(Some(schema.to_string()));
    }

    let Some(path) = path else {
        return Ok(None);
    };

    let text = std::fs::read_to_string(path).map_err(|e| IngestError::SchemaFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let parsed: Value = serde_json::from_str(&text).map_err(|e| IngestError::SchemaFile {
        path: path.to_path_buf(),
        detail: format!("invalid JSON: {e}"),
    })?;
    let canonical = serde_json::to_string(&parsed).map_err(|e| IngestError::SchemaFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    debug!("Loaded property schema from {}", path.display());
    Ok(Some(canonical))
}
