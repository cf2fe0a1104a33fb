//! Error type for the docparse-ingest library.
//!
//! Every failure of a single ingest call surfaces as one [`IngestError`].
//! The host pipeline marks that document as failed and moves on; nothing in
//! this crate swallows an error except best-effort trace-header extraction,
//! which only logs.
//!
//! Variants are grouped by the phase that raises them so a caller can tell
//! at a glance whether the problem is local configuration (fails before any
//! network I/O), the transport, or the remote service itself.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docparse-ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A setting has the wrong type or an out-of-range value.
    #[error("Invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    /// The property-extraction schema file could not be read or parsed.
    #[error("Schema file '{path}' is unusable: {detail}")]
    SchemaFile { path: PathBuf, detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The source field is absent and `ignore_missing` is off.
    #[error("field [{field}] is null, cannot parse.")]
    MissingField { field: String },

    /// The source field exists but cannot be read as binary content.
    #[error("field [{field}] cannot be read as document bytes: {reason}")]
    InvalidField { field: String, reason: String },

    // ── Remote call errors ────────────────────────────────────────────────
    /// The partitioning service could not be reached.
    #[error("Failed to reach partitioning service at '{url}': {detail}")]
    Transport { url: String, detail: String },

    /// The partitioning call exceeded the configured timeout.
    #[error("Partitioning call to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The partitioning service answered with a non-success status.
    #[error("Partitioning service returned HTTP {status}: {body}")]
    PartitionService { status: u16, body: String },

    /// The response body does not have the expected shape.
    #[error("Malformed partitioner response: {0}")]
    MalformedResponse(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected local failure (temp file, runtime construction, ...).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Whether repeating the same call might succeed.
    ///
    /// Network failures, timeouts, HTTP 429 and 5xx responses are transient.
    /// Everything else fails identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Transport { .. } | IngestError::Timeout { .. } => true,
            IngestError::PartitionService { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
