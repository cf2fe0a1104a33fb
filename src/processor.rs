//! The ingest processor: one partition call per document.
//!
//! [`IngestProcessor`] ties the pipeline stages together and owns the
//! missing-input policy. It holds only read-only state (configuration,
//! resolved options, a shared [`PartitionApi`]) so one instance can serve
//! every worker of the host pipeline at once.
//!
//! ## Failure semantics
//!
//! The document is mutated only after the response has been fully
//! projected. Any error leaves it exactly as it was handed in.

use crate::config::ProcessorConfig;
use crate::document::IngestDocument;
use crate::error::IngestError;
use crate::output::Projection;
use crate::pipeline::client::{HttpPartitionClient, PartitionApi, PartitionRequest};
use crate::pipeline::options::PartitionOptions;
use crate::pipeline::retry::RetryingClient;
use crate::pipeline::{mutate, project};
use crate::progress::{BatchProgressCallback, NoopBatchProgress};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Partitions documents and projects the results back onto them.
pub struct IngestProcessor {
    config: ProcessorConfig,
    options: PartitionOptions,
    api: Arc<dyn PartitionApi>,
}

impl std::fmt::Debug for IngestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestProcessor")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("api", &"<dyn PartitionApi>")
            .finish()
    }
}

impl IngestProcessor {
    /// Processor type tag used in pipeline definitions.
    pub const TYPE: &'static str = "aryn_ingest";

    /// Build a processor talking to the service named in `config`.
    ///
    /// Options are resolved here, so a bad threshold or unreadable schema
    /// file fails at pipeline creation, before any document is seen.
    pub fn new(config: ProcessorConfig) -> Result<Self, IngestError> {
        let http = HttpPartitionClient::from_config(&config)?;
        let api: Arc<dyn PartitionApi> = if config.max_retries > 0 {
            Arc::new(RetryingClient::new(
                http,
                config.max_retries,
                config.retry_backoff_ms,
            ))
        } else {
            Arc::new(http)
        };
        Self::with_client(config, api)
    }

    /// Build a processor around a caller-supplied [`PartitionApi`].
    pub fn with_client(
        config: ProcessorConfig,
        api: Arc<dyn PartitionApi>,
    ) -> Result<Self, IngestError> {
        let options = PartitionOptions::resolve(&config)?;
        info!(
            "Created {} processor: {} → {} (threshold {})",
            Self::TYPE,
            config.input_field,
            config.output_field,
            options.threshold
        );
        Ok(Self {
            config,
            options,
            api,
        })
    }

    /// Build a processor from a pipeline settings object.
    pub fn from_settings(settings: Map<String, Value>) -> Result<Self, IngestError> {
        Self::new(ProcessorConfig::from_settings(settings)?)
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn options(&self) -> &PartitionOptions {
        &self.options
    }

    /// Partition the document's input field and write the results back.
    ///
    /// * input absent + `ignore_missing` → no-op, no network call;
    /// * input absent otherwise → [`IngestError::MissingField`];
    /// * otherwise the extracted text overwrites the output field and each
    ///   extracted property is appended to its own field.
    pub async fn execute(&self, document: &mut IngestDocument) -> Result<(), IngestError> {
        let input_field = &self.config.input_field;
        let Some(bytes) = document.field_bytes(input_field)? else {
            if self.config.ignore_missing {
                debug!("Field [{}] absent; skipping document", input_field);
                return Ok(());
            }
            return Err(IngestError::MissingField {
                field: input_field.clone(),
            });
        };

        let projection = self.partition(bytes).await?;
        mutate::apply(document, &self.config.output_field, &projection);
        Ok(())
    }

    /// Blocking wrapper around [`IngestProcessor::execute`].
    ///
    /// Creates a temporary tokio runtime; must not be called from inside one.
    pub fn execute_sync(&self, document: &mut IngestDocument) -> Result<(), IngestError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.execute(document))
    }

    /// Process many documents, at most `concurrency` at a time.
    ///
    /// Results line up with `documents`; a failed document is left untouched
    /// and does not affect the others.
    pub async fn execute_batch(&self, documents: &mut [IngestDocument]) -> Vec<Result<(), IngestError>> {
        self.execute_batch_with_progress(documents, &NoopBatchProgress)
            .await
    }

    /// [`IngestProcessor::execute_batch`], reporting each finished document
    /// to `progress`.
    pub async fn execute_batch_with_progress(
        &self,
        documents: &mut [IngestDocument],
        progress: &dyn BatchProgressCallback,
    ) -> Vec<Result<(), IngestError>> {
        let start = Instant::now();
        let total = documents.len();
        progress.on_batch_start(total);

        let results: Vec<Result<(), IngestError>> = stream::iter(documents.iter_mut().enumerate().map(
            |(index, document)| async move {
                let result = self.execute(document).await;
                match &result {
                    Ok(()) => progress.on_document_complete(index, total, document),
                    Err(e) => progress.on_document_error(index, total, e),
                }
                result
            },
        ))
        .buffered(self.config.concurrency)
        .collect()
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        progress.on_batch_complete(total, total - failed);
        info!(
            "Batch complete: {}/{} documents in {}ms",
            total - failed,
            total,
            start.elapsed().as_millis()
        );
        results
    }

    /// Encode options, call the service, and project its response.
    async fn partition(&self, document: Vec<u8>) -> Result<Projection, IngestError> {
        let request = PartitionRequest {
            document,
            options: self.options.encode()?,
            user_agent: self.config.user_agent.clone(),
        };
        let response = self.api.partition(&request).await?;
        project::project(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PartitionResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a canned body and records every request it receives.
    struct StubApi {
        body: Value,
        requests: Mutex<Vec<PartitionRequest>>,
    }

    impl StubApi {
        fn new(body: Value) -> Arc<Self> {
            Arc::new(Self {
                body,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PartitionApi for StubApi {
        async fn partition(&self, request: &PartitionRequest) -> Result<PartitionResponse, IngestError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(PartitionResponse::from_body(self.body.clone()))
        }
    }

    fn config() -> crate::config::ProcessorConfigBuilder {
        ProcessorConfig::builder().api_key("test-key")
    }

    fn document_with_input() -> IngestDocument {
        let mut doc = IngestDocument::new();
        doc.set_field_bytes("data", b"%PDF-1.7");
        doc
    }

    #[test]
    fn single_element_lands_in_output_field() {
        let api = StubApi::new(json!({
            "elements": [{"type": "Text", "text_representation": "Yosemite National Park"}]
        }));
        let processor =
            IngestProcessor::with_client(config().output_field("extracted").build().unwrap(), api.clone())
                .unwrap();

        let mut doc = document_with_input();
        tokio_test::block_on(processor.execute(&mut doc)).unwrap();

        assert_eq!(doc.get("extracted"), Some(&json!("Yosemite National Park")));
        assert_eq!(doc.len(), 2, "only the output field is added");
        assert_eq!(api.calls(), 1);

        let request = api.requests.lock().unwrap()[0].clone();
        assert_eq!(request.document, b"%PDF-1.7");
        assert_eq!(request.user_agent, crate::config::DEFAULT_USER_AGENT);
    }

    #[test]
    fn missing_input_with_ignore_missing_is_a_noop() {
        let api = StubApi::new(json!({"elements": []}));
        let processor =
            IngestProcessor::with_client(config().ignore_missing(true).build().unwrap(), api.clone())
                .unwrap();

        let mut doc = IngestDocument::new();
        doc.set_field("title", "untouched");
        let before = doc.clone();
        tokio_test::block_on(processor.execute(&mut doc)).unwrap();

        assert_eq!(doc, before);
        assert_eq!(api.calls(), 0);
    }

    #[test]
    fn missing_input_without_ignore_missing_fails_before_call() {
        let api = StubApi::new(json!({"elements": []}));
        let processor = IngestProcessor::with_client(config().build().unwrap(), api.clone()).unwrap();

        let mut doc = IngestDocument::new();
        let err = tokio_test::block_on(processor.execute(&mut doc)).unwrap_err();
        assert!(matches!(err, IngestError::MissingField { ref field } if field == "data"));
        assert_eq!(api.calls(), 0);
    }

    #[test]
    fn malformed_response_leaves_document_untouched() {
        let api = StubApi::new(json!({
            "elements": "oops",
            "properties": {"property_name": "Lakeview Commons"}
        }));
        let processor = IngestProcessor::with_client(config().build().unwrap(), api).unwrap();

        let mut doc = document_with_input();
        let before = doc.clone();
        let err = tokio_test::block_on(processor.execute(&mut doc)).unwrap_err();
        assert!(matches!(err, IngestError::MalformedResponse(_)));
        assert_eq!(doc, before);
    }

    #[test]
    fn bad_threshold_fails_at_construction() {
        let api = StubApi::new(json!({}));
        let err = IngestProcessor::with_client(config().threshold("notanumber").build().unwrap(), api)
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidOption { .. }));
    }

    #[test]
    fn options_are_sent_with_each_call() {
        let api = StubApi::new(json!({"elements": []}));
        let processor = IngestProcessor::with_client(
            config()
                .threshold("0.25")
                .schema("{\"type\":\"object\"}")
                .build()
                .unwrap(),
            api.clone(),
        )
        .unwrap();

        let mut doc = document_with_input();
        tokio_test::block_on(processor.execute(&mut doc)).unwrap();

        let request = api.requests.lock().unwrap()[0].clone();
        let options: Value = serde_json::from_slice(&request.options).unwrap();
        assert_eq!(options["threshold"].as_f64(), Some(0.25));
        assert_eq!(
            options["property_extraction_options"]["schema"],
            json!("{\"type\":\"object\"}")
        );
    }

    #[derive(Default)]
    struct Recorder {
        started: Mutex<Option<usize>>,
        completed: Mutex<Vec<usize>>,
        failed: Mutex<Vec<usize>>,
        finished: Mutex<Option<(usize, usize)>>,
    }

    impl BatchProgressCallback for Recorder {
        fn on_batch_start(&self, total: usize) {
            *self.started.lock().unwrap() = Some(total);
        }

        fn on_document_complete(&self, index: usize, _total: usize, document: &IngestDocument) {
            assert!(document.contains("parsed_data"), "callback sees the mutated document");
            self.completed.lock().unwrap().push(index);
        }

        fn on_document_error(&self, index: usize, _total: usize, _error: &IngestError) {
            self.failed.lock().unwrap().push(index);
        }

        fn on_batch_complete(&self, total: usize, success_count: usize) {
            *self.finished.lock().unwrap() = Some((total, success_count));
        }
    }

    #[test]
    fn batch_reports_progress_per_document() {
        let api = StubApi::new(json!({
            "elements": [{"type": "Text", "text_representation": "Acadia"}]
        }));
        let processor =
            IngestProcessor::with_client(config().concurrency(2).build().unwrap(), api).unwrap();

        let mut docs = vec![document_with_input(), IngestDocument::new(), document_with_input()];
        let recorder = Recorder::default();
        let results = tokio_test::block_on(processor.execute_batch_with_progress(&mut docs, &recorder));

        assert_eq!(results.len(), 3);
        assert_eq!(*recorder.started.lock().unwrap(), Some(3));
        let mut completed = recorder.completed.lock().unwrap().clone();
        completed.sort_unstable();
        assert_eq!(completed, [0, 2]);
        assert_eq!(*recorder.failed.lock().unwrap(), [1]);
        assert_eq!(*recorder.finished.lock().unwrap(), Some((3, 2)));
    }

    #[test]
    fn execute_sync_blocks_on_its_own_runtime() {
        let api = StubApi::new(json!({
            "elements": [{"type": "Text", "text_representation": "Zion"}]
        }));
        let processor = IngestProcessor::with_client(config().build().unwrap(), api).unwrap();

        let mut doc = document_with_input();
        processor.execute_sync(&mut doc).unwrap();
        assert_eq!(doc.get("parsed_data"), Some(&json!("Zion")));
    }

    #[test]
    fn batch_results_follow_input_order() {
        let api = StubApi::new(json!({
            "elements": [{"type": "Text", "text_representation": "Yellowstone"}]
        }));
        let processor =
            IngestProcessor::with_client(config().concurrency(2).build().unwrap(), api.clone()).unwrap();

        let mut docs = vec![document_with_input(), IngestDocument::new(), document_with_input()];
        let results = tokio_test::block_on(processor.execute_batch(&mut docs));

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(IngestError::MissingField { .. })));
        assert!(results[2].is_ok());
        assert_eq!(docs[0].get("parsed_data"), Some(&json!("Yellowstone")));
        assert!(docs[1].is_empty());
        assert_eq!(api.calls(), 2);
    }
}
