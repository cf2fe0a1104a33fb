//! Progress-callback trait for batch execution.
//!
//! Pass a [`BatchProgressCallback`] to
//! [`crate::IngestProcessor::execute_batch_with_progress`] to hear about each
//! document as it finishes. Callers can forward events to a channel, a log,
//! or a terminal progress bar without the library knowing how.
//!
//! # Example
//!
//! ```rust
//! use docparse_ingest::{BatchProgressCallback, IngestDocument};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_document_complete(&self, _index: usize, _total: usize, _doc: &IngestDocument) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::document::IngestDocument;
use crate::error::IngestError;

/// Called by [`crate::IngestProcessor`] as a batch makes progress.
///
/// All methods default to no-ops so callers only override what they need.
/// Documents run concurrently, so completion events arrive in finishing
/// order, not input order; `index` always refers to the input position.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a document was processed successfully, after mutation.
    fn on_document_complete(&self, index: usize, total: usize, document: &IngestDocument) {
        let _ = (index, total, document);
    }

    /// Called when a document failed. The document is unchanged.
    fn on_document_error(&self, index: usize, total: usize, error: &IngestError) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op callback, used by [`crate::IngestProcessor::execute_batch`].
pub struct NoopBatchProgress;

impl BatchProgressCallback for NoopBatchProgress {}
