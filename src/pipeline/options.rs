//! Partition options: typed value object and its wire encoding.
//!
//! The service receives its options as one JSON object next to the document
//! part. Field order is fixed by [`OptionsPayload`]'s declaration, so the
//! same options always encode to the same bytes. Unset modes, OCR language
//! and chunking options are left out of the object entirely (not sent as
//! `null`) so the service applies its own defaults.

use crate::config::ProcessorConfig;
use crate::error::IngestError;
use crate::pipeline::schema;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Detection threshold sent to the partitioner.
///
/// Parsed from the exact text `"auto"` or a decimal number in `[0, 1]`.
/// Surrounding whitespace is not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Threshold {
    /// Let the service pick a threshold per document.
    #[default]
    Auto,
    /// Fixed confidence cut-off in `[0, 1]`.
    Value(f64),
}

impl FromStr for Threshold {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            return Ok(Threshold::Auto);
        }
        let value: f64 = s.parse().map_err(|_| {
            IngestError::invalid_option(
                "threshold",
                format!("[{s}] is neither \"auto\" nor a number"),
            )
        })?;
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(IngestError::invalid_option(
                "threshold",
                format!("[{s}] must be a number between 0 and 1"),
            ));
        }
        Ok(Threshold::Value(value))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Auto => f.write_str("auto"),
            Threshold::Value(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for Threshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Threshold::Auto => serializer.serialize_str("auto"),
            Threshold::Value(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Resolved, immutable partition options.
///
/// Built once per processor from its [`ProcessorConfig`] and shared by every
/// call; [`PartitionOptions::encode`] produces the request payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionOptions {
    pub threshold: Threshold,
    pub text_mode: Option<String>,
    pub table_mode: Option<String>,
    pub ocr_language: Option<String>,
    pub extract_images: bool,
    pub summarize_images: bool,
    /// Forwarded verbatim under `chunking_options`.
    pub chunking_options: Option<Map<String, Value>>,
    /// Schema JSON text for property extraction, passed through as a string.
    pub property_schema: Option<String>,
}

impl PartitionOptions {
    /// Resolve options from processor configuration.
    ///
    /// Fails with [`IngestError::InvalidOption`] for a bad threshold and with
    /// [`IngestError::SchemaFile`] when the schema file is unusable.
    pub fn resolve(config: &ProcessorConfig) -> Result<Self, IngestError> {
        let threshold: Threshold = config.threshold.parse()?;
        let property_schema =
            schema::resolve_schema(config.schema.as_deref(), config.schema_path.as_deref())?;

        Ok(Self {
            threshold,
            text_mode: non_empty(config.text_mode.as_deref()).map(str::to_string),
            table_mode: non_empty(config.table_mode.as_deref()).map(str::to_string),
            ocr_language: non_empty(config.ocr_language.as_deref()).map(str::to_string),
            extract_images: config.extract_images,
            summarize_images: config.summarize_images,
            chunking_options: config.chunking_options.clone().filter(|m| !m.is_empty()),
            property_schema,
        })
    }

    /// Serialise to the JSON payload sent alongside the document.
    pub fn encode(&self) -> Result<Vec<u8>, IngestError> {
        let payload = OptionsPayload {
            threshold: self.threshold,
            text_mode: non_empty(self.text_mode.as_deref()),
            table_mode: non_empty(self.table_mode.as_deref()),
            ocr_language: non_empty(self.ocr_language.as_deref()),
            extract_images: self.extract_images,
            summarize_images: self.summarize_images,
            chunking_options: self.chunking_options.as_ref().filter(|m| !m.is_empty()),
            property_extraction_options: self
                .property_schema
                .as_deref()
                .map(|schema| PropertyExtraction { schema }),
        };
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| IngestError::Internal(format!("options encoding: {e}")))?;
        debug!("Encoded partition options → {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Encode partition options straight from configuration values.
///
/// `threshold` is `"auto"` or a decimal number in `[0, 1]`; anything else
/// fails with [`IngestError::InvalidOption`] before any network I/O.
pub fn encode_options(
    threshold: &str,
    text_mode: Option<&str>,
    table_mode: Option<&str>,
    extract_images: bool,
    summarize_images: bool,
    schema: Option<&str>,
) -> Result<Vec<u8>, IngestError> {
    PartitionOptions {
        threshold: threshold.parse()?,
        text_mode: text_mode.map(str::to_string),
        table_mode: table_mode.map(str::to_string),
        ocr_language: None,
        extract_images,
        summarize_images,
        chunking_options: None,
        property_schema: schema.map(str::to_string),
    }
    .encode()
}

#[derive(Serialize)]
struct OptionsPayload<'a> {
    threshold: Threshold,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    table_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocr_language: Option<&'a str>,
    extract_images: bool,
    summarize_images: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunking_options: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    property_extraction_options: Option<PropertyExtraction<'a>>,
}

#[derive(Serialize)]
struct PropertyExtraction<'a> {
    schema: &'a str,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
