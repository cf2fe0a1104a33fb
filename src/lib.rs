//! # docparse-ingest
//!
//! Enrich ingest documents with text and properties extracted by a remote
//! document-partitioning service.
//!
//! An ingest document carries a binary source (PDF, image, ...) as base64 in
//! one of its fields. The processor sends those bytes, with a JSON option
//! set, to the partitioner; the response is an ordered list of elements and,
//! when a property schema was supplied, a map of extracted properties. The
//! element texts are joined into one output field and each property is
//! appended to a field of the same name.
//!
//! ## Pipeline Overview
//!
//! ```text
//! IngestDocument
//!  │
//!  ├─ 1. Input     read the input field as bytes (or skip if ignorable)
//!  ├─ 2. Options   threshold / modes / image flags / schema → JSON payload
//!  ├─ 3. Partition multipart POST with bearer auth (temp-file artifact)
//!  ├─ 4. Project   elements → joined text, properties → field updates
//!  └─ 5. Mutate    set output text, append property values
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docparse_ingest::{IngestDocument, IngestProcessor, ProcessorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProcessorConfig::builder()
//!         .api_key(std::env::var("ARYN_API_KEY")?)
//!         .output_field("extracted")
//!         .build()?;
//!     let processor = IngestProcessor::new(config)?;
//!
//!     let mut doc = IngestDocument::new();
//!     doc.set_field_bytes("data", &std::fs::read("report.pdf")?);
//!     processor.execute(&mut doc).await?;
//!     println!("{:?}", doc.get("extracted"));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docparse-ingest` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessorConfig, ProcessorConfigBuilder, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
pub use document::IngestDocument;
pub use error::IngestError;
pub use output::{Element, PartitionResponse, Projection};
pub use pipeline::client::{
    HttpPartitionClient, PartitionApi, PartitionRequest, API_VERSION_HEADER, CALL_ID_HEADER,
};
pub use pipeline::options::{encode_options, PartitionOptions, Threshold};
pub use pipeline::project::project;
pub use pipeline::retry::RetryingClient;
pub use pipeline::schema::resolve_schema;
pub use processor::IngestProcessor;
pub use progress::{BatchProgressCallback, NoopBatchProgress};
