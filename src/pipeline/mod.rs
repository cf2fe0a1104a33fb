//! Pipeline stages for one ingest call.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the network-facing stage can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! config ──▶ options/schema ──▶ client ──▶ project ──▶ mutate
//!            (encode payload)   (HTTP)    (response)  (document)
//! ```
//!
//! 1. [`options`] : typed partition options and their JSON encoding
//! 2. [`schema`]  : inline-or-file property schema resolution
//! 3. [`client`]  : the [`client::PartitionApi`] seam and its reqwest
//!    implementation; the only stage with network I/O
//! 4. [`retry`]   : optional retry layer over any `PartitionApi`
//! 5. [`project`] : lenient reading of the response into text + properties
//! 6. [`mutate`]  : set/append the results on the target document

pub mod client;
pub mod mutate;
pub mod options;
pub mod project;
pub mod retry;
pub mod schema;
