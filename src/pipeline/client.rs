//! The partition call: the only stage with network I/O.
//!
//! [`PartitionApi`] is the narrow seam between the processor and the remote
//! service: submit a document with its encoded options, get back a parsed
//! body plus trace headers. [`HttpPartitionClient`] is the reqwest-backed
//! implementation; tests and middleware (see [`crate::pipeline::retry`])
//! plug in at the same trait.
//!
//! ## Temp-file artifact
//!
//! The document is spooled to a private temp file and streamed from there
//! as the multipart `pdf` part. The file belongs to exactly one call and is
//! removed when [`DocumentArtifact`] drops, which covers success, error
//! returns, panics and a cancelled (dropped) future alike.

use crate::config::ProcessorConfig;
use crate::error::IngestError;
use crate::output::PartitionResponse;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Response header carrying the service's identifier for the call.
pub const CALL_ID_HEADER: &str = "x-aryn-call-id";

/// Response header carrying the service's API version.
pub const API_VERSION_HEADER: &str = "x-aryn-api-version";

/// Partition endpoint, relative to the service base URL.
pub const PARTITION_PATH: &str = "/v1/document/partition";

/// One document submission.
#[derive(Debug, Clone)]
pub struct PartitionRequest {
    /// Raw document bytes (PDF, image, ...).
    pub document: Vec<u8>,
    /// Encoded options payload, see [`crate::pipeline::options`].
    pub options: Vec<u8>,
    pub user_agent: String,
}

/// A remote partitioning service.
///
/// Implementations must be safe to call concurrently; the processor shares
/// one instance across all workers.
#[async_trait]
pub trait PartitionApi: Send + Sync {
    /// Partition one document.
    ///
    /// Returns the parsed response body and any trace headers, or a
    /// [`IngestError::Transport`], [`IngestError::Timeout`],
    /// [`IngestError::PartitionService`] or
    /// [`IngestError::MalformedResponse`] failure.
    async fn partition(&self, request: &PartitionRequest) -> Result<PartitionResponse, IngestError>;
}

/// reqwest-backed [`PartitionApi`] with bearer authentication.
#[derive(Clone)]
pub struct HttpPartitionClient {
    http: Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    temp_dir: Option<PathBuf>,
}

impl std::fmt::Debug for HttpPartitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPartitionClient")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl HttpPartitionClient {
    /// Build a client for the service at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, IngestError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IngestError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), PARTITION_PATH),
            api_key: api_key.into(),
            timeout_secs,
            temp_dir: None,
        })
    }

    pub fn from_config(config: &ProcessorConfig) -> Result<Self, IngestError> {
        Self::new(&config.base_url, config.api_key.clone(), config.timeout_secs)
    }

    /// Spool documents into `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Full URL of the partition endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> IngestError {
        if e.is_timeout() {
            IngestError::Timeout {
                url: self.endpoint.clone(),
                secs: self.timeout_secs,
            }
        } else {
            IngestError::Transport {
                url: self.endpoint.clone(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl PartitionApi for HttpPartitionClient {
    async fn partition(&self, request: &PartitionRequest) -> Result<PartitionResponse, IngestError> {
        let start = Instant::now();
        let artifact = DocumentArtifact::create_in(&request.document, self.temp_dir.as_deref())?;

        let file = tokio::fs::File::from_std(artifact.reopen()?);
        let document_part = Part::stream_with_length(Body::from(file), request.document.len() as u64)
            .file_name("document")
            .mime_str("application/octet-stream")
            .map_err(|e| IngestError::Internal(format!("multipart: {e}")))?;
        let options_part = Part::bytes(request.options.clone())
            .mime_str("application/json")
            .map_err(|e| IngestError::Internal(format!("multipart: {e}")))?;
        let form = Form::new()
            .part("options", options_part)
            .part("pdf", document_part);

        debug!(
            "Submitting {} document bytes to {}",
            request.document.len(),
            self.endpoint
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(USER_AGENT, &request.user_agent)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Call to partitioner failed: HTTP {}", status);
            return Err(IngestError::PartitionService {
                status: status.as_u16(),
                body,
            });
        }

        let call_id = header_value(response.headers(), CALL_ID_HEADER);
        let api_version = header_value(response.headers(), API_VERSION_HEADER);
        log_trace_headers(call_id.as_deref(), api_version.as_deref());

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            IngestError::MalformedResponse(format!("response body is not JSON: {e}"))
        })?;

        info!(
            "Partitioned {} bytes in {}ms",
            request.document.len(),
            start.elapsed().as_millis()
        );

        Ok(PartitionResponse {
            body,
            call_id,
            api_version,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn log_trace_headers(call_id: Option<&str>, api_version: Option<&str>) {
    match (call_id, api_version) {
        (Some(id), Some(version)) => info!("aryn_call_id: {}, aryn_version: {}", id, version),
        _ => warn!(
            "Partitioner response missing trace headers (aryn_call_id: {:?}, aryn_version: {:?})",
            call_id, api_version
        ),
    }
}

/// A document spooled to a private temp file for the length of one call.
///
/// Removal happens on drop. A failed removal is logged, never raised, so it
/// cannot mask the call's own outcome.
#[derive(Debug)]
pub struct DocumentArtifact {
    file: Option<NamedTempFile>,
}

impl DocumentArtifact {
    /// Write `bytes` to a fresh file in the system temp directory.
    pub fn create(bytes: &[u8]) -> Result<Self, IngestError> {
        Self::create_in(bytes, None)
    }

    /// Write `bytes` to a fresh temp file in `dir`, or in the system temp
    /// directory when `dir` is `None`.
    pub fn create_in(bytes: &[u8], dir: Option<&Path>) -> Result<Self, IngestError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docparse-");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = file.map_err(|e| IngestError::Internal(format!("tempfile: {e}")))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| IngestError::Internal(format!("tempfile write: {e}")))?;
        Ok(Self { file: Some(file) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }

    /// Open a fresh read handle positioned at the start of the file.
    pub fn reopen(&self) -> Result<std::fs::File, IngestError> {
        self.file
            .as_ref()
            .ok_or_else(|| IngestError::Internal("temp artifact already removed".into()))?
            .reopen()
            .map_err(|e| IngestError::Internal(format!("tempfile reopen: {e}")))
    }
}

impl Drop for DocumentArtifact {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                warn!("Failed to remove temp artifact {}: {}", path.display(), e);
            }
        }
    }
}
