//! Processor configuration.
//!
//! All ingest behaviour is controlled through [`ProcessorConfig`], built via
//! its [`ProcessorConfigBuilder`] or read from a pipeline settings object with
//! [`ProcessorConfig::from_settings`]. The settings reader is where loosely
//! typed input (a threshold given as `"auto"`, `"0.3"` or `0.3`, booleans as
//! strings) gets normalised; past this module every value has one type.
//!
//! The configuration is read-only once built and is shared by every worker
//! that runs the processor.

use crate::error::IngestError;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Base URL of the hosted partitioning service.
pub const DEFAULT_BASE_URL: &str = "https://api.aryn.ai";

/// Text mode selected by the legacy `use_ocr` flag.
const LEGACY_OCR_TEXT_MODE: &str = "standard_ocr";

/// Table mode selected by the legacy `extract_table_structure` flag.
const LEGACY_TABLE_MODE: &str = "standard";

/// User agent sent with every partition call unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!("docparse-ingest/", env!("CARGO_PKG_VERSION"));

/// Configuration for an ingest processor.
///
/// # Example
/// ```rust
/// use docparse_ingest::ProcessorConfig;
///
/// let config = ProcessorConfig::builder()
///     .api_key("secret")
///     .output_field("extracted")
///     .threshold("0.35")
///     .text_mode("standard_ocr")
///     .build()
///     .unwrap();
/// assert_eq!(config.input_field, "data");
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// Field holding the base64-encoded source document. Default: `"data"`.
    pub input_field: String,

    /// Field receiving the extracted text. Default: `"parsed_data"`.
    pub output_field: String,

    /// Treat an absent input field as a no-op instead of an error. Default: false.
    pub ignore_missing: bool,

    /// Bearer credential for the partitioning service.
    pub api_key: String,

    /// Service base URL. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Detection threshold: `"auto"` or a number in `[0, 1]`. Default: `"auto"`.
    ///
    /// Kept as text here because settings may supply it either way; it is
    /// parsed into [`crate::pipeline::options::Threshold`] when the processor
    /// resolves its options.
    pub threshold: String,

    /// Text extraction mode. Unset means the service default.
    pub text_mode: Option<String>,

    /// Table extraction mode. Unset means the service default.
    pub table_mode: Option<String>,

    /// OCR language hint, e.g. `"english"`. Unset means the service default.
    pub ocr_language: Option<String>,

    /// Ask the service to extract embedded images. Default: false.
    pub extract_images: bool,

    /// Ask the service to summarise extracted images. Default: false.
    pub summarize_images: bool,

    /// Inline property-extraction schema (JSON text). Wins over `schema_path`.
    pub schema: Option<String>,

    /// Path to a property-extraction schema file.
    pub schema_path: Option<PathBuf>,

    /// Chunking options forwarded verbatim to the service. An empty map is
    /// treated as unset.
    pub chunking_options: Option<Map<String, Value>>,

    /// User agent for partition calls. Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: String,

    /// Per-call timeout in seconds. Default: 300.
    ///
    /// Partitioning a long scanned PDF with OCR routinely takes minutes.
    pub timeout_secs: u64,

    /// Extra attempts on a transient failure. Default: 0 (no retry).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Documents partitioned at once by `execute_batch`. Default: 4.
    pub concurrency: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            input_field: "data".to_string(),
            output_field: "parsed_data".to_string(),
            ignore_missing: false,
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            threshold: "auto".to_string(),
            text_mode: None,
            table_mode: None,
            ocr_language: None,
            extract_images: false,
            summarize_images: false,
            schema: None,
            schema_path: None,
            chunking_options: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 300,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 4,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("input_field", &self.input_field)
            .field("output_field", &self.output_field)
            .field("ignore_missing", &self.ignore_missing)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("threshold", &self.threshold)
            .field("text_mode", &self.text_mode)
            .field("table_mode", &self.table_mode)
            .field("ocr_language", &self.ocr_language)
            .field("extract_images", &self.extract_images)
            .field("summarize_images", &self.summarize_images)
            .field("schema", &self.schema.as_ref().map(|s| s.len()))
            .field("schema_path", &self.schema_path)
            .field("chunking_options", &self.chunking_options)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl ProcessorConfig {
    /// Create a new builder for `ProcessorConfig`.
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read a processor definition from a pipeline settings object.
    ///
    /// Keys follow the ingest-pipeline convention (`input_field`,
    /// `aryn_api_key`, `threshold`, ...). Each key is consumed as it is read;
    /// anything left over is rejected so a misspelt setting fails at
    /// pipeline creation rather than being silently ignored.
    ///
    /// The legacy flags `use_ocr` and `extract_table_structure` are still
    /// accepted. When true they select `text_mode = "standard_ocr"` and
    /// `table_mode = "standard"`, unless that mode is set explicitly.
    pub fn from_settings(mut settings: Map<String, Value>) -> Result<Self, IngestError> {
        let s = &mut settings;
        let mut builder = Self::builder();

        if let Some(v) = read_string(s, "input_field")? {
            builder = builder.input_field(v);
        }
        if let Some(v) = read_string(s, "output_field")? {
            builder = builder.output_field(v);
        }
        if let Some(v) = read_bool(s, "ignore_missing")? {
            builder = builder.ignore_missing(v);
        }
        let api_key = read_string(s, "aryn_api_key")?.ok_or_else(|| {
            IngestError::invalid_option("aryn_api_key", "required property is missing")
        })?;
        builder = builder.api_key(api_key);
        if let Some(v) = read_string(s, "aryn_url")? {
            builder = builder.base_url(v);
        }
        if let Some(v) = read_string_or_number(s, "threshold")? {
            builder = builder.threshold(v);
        }
        if let Some(v) = read_string(s, "text_mode")? {
            builder = builder.text_mode(v);
        }
        if let Some(v) = read_string(s, "table_mode")? {
            builder = builder.table_mode(v);
        }
        if let Some(v) = read_string(s, "ocr_language")? {
            builder = builder.ocr_language(v);
        }
        if let Some(v) = read_bool(s, "extract_images")? {
            builder = builder.extract_images(v);
        }
        if let Some(v) = read_bool(s, "summarize_images")? {
            builder = builder.summarize_images(v);
        }
        if let Some(v) = read_string(s, "schema")? {
            builder = builder.schema(v);
        }
        if let Some(v) = read_string(s, "schema_path")? {
            builder = builder.schema_path(v);
        }
        if let Some(v) = read_object(s, "chunking_options")? {
            builder = builder.chunking_options(v);
        }
        if read_bool(s, "use_ocr")? == Some(true) && builder.config.text_mode.is_none() {
            builder = builder.text_mode(LEGACY_OCR_TEXT_MODE);
        }
        if read_bool(s, "extract_table_structure")? == Some(true)
            && builder.config.table_mode.is_none()
        {
            builder = builder.table_mode(LEGACY_TABLE_MODE);
        }
        if let Some(v) = read_string(s, "user_agent")? {
            builder = builder.user_agent(v);
        }
        if let Some(v) = read_u64(s, "timeout_secs")? {
            builder = builder.timeout_secs(v);
        }
        if let Some(v) = read_u64(s, "max_retries")? {
            let v = u32::try_from(v)
                .map_err(|_| IngestError::invalid_option("max_retries", "value is too large"))?;
            builder = builder.max_retries(v);
        }
        if let Some(v) = read_u64(s, "retry_backoff_ms")? {
            builder = builder.retry_backoff_ms(v);
        }
        if let Some(v) = read_u64(s, "concurrency")? {
            let v = usize::try_from(v)
                .map_err(|_| IngestError::invalid_option("concurrency", "value is too large"))?;
            builder = builder.concurrency(v);
        }

        if let Some(unknown) = settings.keys().next() {
            return Err(IngestError::invalid_option(
                unknown.clone(),
                "unknown setting",
            ));
        }

        builder.build()
    }
}

/// Builder for [`ProcessorConfig`].
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    pub fn input_field(mut self, field: impl Into<String>) -> Self {
        self.config.input_field = field.into();
        self
    }

    pub fn output_field(mut self, field: impl Into<String>) -> Self {
        self.config.output_field = field.into();
        self
    }

    pub fn ignore_missing(mut self, v: bool) -> Self {
        self.config.ignore_missing = v;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn threshold(mut self, threshold: impl Into<String>) -> Self {
        self.config.threshold = threshold.into();
        self
    }

    pub fn text_mode(mut self, mode: impl Into<String>) -> Self {
        self.config.text_mode = Some(mode.into());
        self
    }

    pub fn table_mode(mut self, mode: impl Into<String>) -> Self {
        self.config.table_mode = Some(mode.into());
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.config.ocr_language = Some(language.into());
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    pub fn summarize_images(mut self, v: bool) -> Self {
        self.config.summarize_images = v;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = Some(schema.into());
        self
    }

    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schema_path = Some(path.into());
        self
    }

    pub fn chunking_options(mut self, options: Map<String, Value>) -> Self {
        self.config.chunking_options = Some(options);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, IngestError> {
        let c = &self.config;
        if c.api_key.trim().is_empty() {
            return Err(IngestError::invalid_option(
                "aryn_api_key",
                "required property is missing",
            ));
        }
        if c.input_field.is_empty() {
            return Err(IngestError::invalid_option("input_field", "must not be empty"));
        }
        if c.output_field.is_empty() {
            return Err(IngestError::invalid_option("output_field", "must not be empty"));
        }
        if c.concurrency == 0 {
            return Err(IngestError::invalid_option("concurrency", "must be ≥ 1"));
        }
        if c.timeout_secs == 0 {
            return Err(IngestError::invalid_option("timeout_secs", "must be ≥ 1"));
        }
        Ok(self.config)
    }
}

// ── Settings readers ─────────────────────────────────────────────────────

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_string(settings: &mut Map<String, Value>, key: &str) -> Result<Option<String>, IngestError> {
    match settings.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(IngestError::invalid_option(
            key,
            format!("property isn't a string, but of type [{}]", type_name(&other)),
        )),
    }
}

fn read_string_or_number(
    settings: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<String>, IngestError> {
    match settings.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(IngestError::invalid_option(
            key,
            format!(
                "property isn't a string or number, but of type [{}]",
                type_name(&other)
            ),
        )),
    }
}

fn read_bool(settings: &mut Map<String, Value>, key: &str) -> Result<Option<bool>, IngestError> {
    match settings.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::String(s)) => match s.as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(IngestError::invalid_option(
                key,
                format!("[{s}] is not a boolean value"),
            )),
        },
        Some(other) => Err(IngestError::invalid_option(
            key,
            format!("property isn't a boolean, but of type [{}]", type_name(&other)),
        )),
    }
}

fn read_object(
    settings: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<Map<String, Value>>, IngestError> {
    match settings.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(IngestError::invalid_option(
            key,
            format!("property isn't an object, but of type [{}]", type_name(&other)),
        )),
    }
}

fn read_u64(settings: &mut Map<String, Value>, key: &str) -> Result<Option<u64>, IngestError> {
    match settings.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            IngestError::invalid_option(key, format!("[{n}] is not a non-negative integer"))
        }),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
            IngestError::invalid_option(key, format!("[{s}] is not a non-negative integer"))
        }),
        Some(other) => Err(IngestError::invalid_option(
            key,
            format!("property isn't a number, but of type [{}]", type_name(&other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("settings must be an object"),
        }
    }

    #[test]
    fn defaults_match_pipeline_conventions() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key"
        })))
        .expect("valid settings");
        assert_eq!(config.input_field, "data");
        assert_eq!(config.output_field, "parsed_data");
        assert_eq!(config.threshold, "auto");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(!config.ignore_missing);
        assert!(!config.extract_images);
        assert!(config.text_mode.is_none());
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn numeric_threshold_is_normalised_to_text() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "threshold": 0.01
        })))
        .expect("valid settings");
        assert_eq!(config.threshold, "0.01");
    }

    #[test]
    fn string_threshold_is_kept() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "threshold": "auto"
        })))
        .expect("valid settings");
        assert_eq!(config.threshold, "auto");
    }

    #[test]
    fn threshold_of_wrong_type_is_rejected() {
        let err = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "threshold": [0.5]
        })))
        .unwrap_err();
        match err {
            IngestError::InvalidOption { name, reason } => {
                assert_eq!(name, "threshold");
                assert!(reason.contains("array"), "got: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = ProcessorConfig::from_settings(settings(json!({}))).unwrap_err();
        assert!(matches!(err, IngestError::InvalidOption { ref name, .. } if name == "aryn_api_key"));
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let err = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "partitioner_output": true
        })))
        .unwrap_err();
        assert!(
            matches!(err, IngestError::InvalidOption { ref name, .. } if name == "partitioner_output")
        );
    }

    #[test]
    fn legacy_flags_select_modes() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "use_ocr": true,
            "extract_table_structure": "true"
        })))
        .expect("legacy settings are accepted");
        assert_eq!(config.text_mode.as_deref(), Some("standard_ocr"));
        assert_eq!(config.table_mode.as_deref(), Some("standard"));

        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "use_ocr": false,
            "extract_table_structure": false
        })))
        .expect("legacy settings are accepted");
        assert!(config.text_mode.is_none());
        assert!(config.table_mode.is_none());
    }

    #[test]
    fn explicit_modes_win_over_legacy_flags() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "text_mode": "fine_grained",
            "use_ocr": true,
            "table_mode": "vision",
            "extract_table_structure": true
        })))
        .expect("valid settings");
        assert_eq!(config.text_mode.as_deref(), Some("fine_grained"));
        assert_eq!(config.table_mode.as_deref(), Some("vision"));
    }

    #[test]
    fn ocr_language_and_chunking_options_are_read() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "ocr_language": "english",
            "chunking_options": {"strategy": "context_rich", "max_tokens": 512}
        })))
        .expect("valid settings");
        assert_eq!(config.ocr_language.as_deref(), Some("english"));
        let chunking = config.chunking_options.expect("chunking options");
        assert_eq!(chunking["strategy"], json!("context_rich"));
        assert_eq!(chunking["max_tokens"], json!(512));

        let err = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "chunking_options": "context_rich"
        })))
        .unwrap_err();
        assert!(
            matches!(err, IngestError::InvalidOption { ref name, .. } if name == "chunking_options")
        );
    }

    #[test]
    fn oversized_integers_are_rejected() {
        let err = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "max_retries": u64::MAX
        })))
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidOption { ref name, .. } if name == "max_retries"));

        if usize::BITS < 64 {
            let err = ProcessorConfig::from_settings(settings(json!({
                "aryn_api_key": "key",
                "concurrency": u64::MAX
            })))
            .unwrap_err();
            assert!(
                matches!(err, IngestError::InvalidOption { ref name, .. } if name == "concurrency")
            );
        }
    }

    #[test]
    fn booleans_accept_string_form() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "ignore_missing": "true",
            "extract_images": true,
            "summarize_images": "false"
        })))
        .expect("valid settings");
        assert!(config.ignore_missing);
        assert!(config.extract_images);
        assert!(!config.summarize_images);

        let err = ProcessorConfig::from_settings(settings(json!({
            "aryn_api_key": "key",
            "ignore_missing": "yes"
        })))
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidOption { .. }));
    }

    #[test]
    fn full_settings_round_into_config() {
        let config = ProcessorConfig::from_settings(settings(json!({
            "input_field": "file",
            "output_field": "text",
            "aryn_api_key": "key",
            "aryn_url": "http://localhost:8080",
            "text_mode": "standard_ocr",
            "table_mode": "standard",
            "schema": "{\"type\":\"object\"}",
            "timeout_secs": "60",
            "max_retries": 2,
            "concurrency": 8
        })))
        .expect("valid settings");
        assert_eq!(config.input_field, "file");
        assert_eq!(config.output_field, "text");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.text_mode.as_deref(), Some("standard_ocr"));
        assert_eq!(config.table_mode.as_deref(), Some("standard"));
        assert_eq!(config.schema.as_deref(), Some("{\"type\":\"object\"}"));
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn builder_validation() {
        assert!(ProcessorConfig::builder().build().is_err());
        assert!(ProcessorConfig::builder()
            .api_key("k")
            .concurrency(0)
            .build()
            .is_err());
        assert!(ProcessorConfig::builder()
            .api_key("k")
            .output_field("")
            .build()
            .is_err());
        assert!(ProcessorConfig::builder().api_key("k").build().is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ProcessorConfig::builder()
            .api_key("super-secret")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
