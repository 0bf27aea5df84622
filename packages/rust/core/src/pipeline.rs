//! Pipeline execution: run an ordered transformer list over documents.
//!
//! The order is computed once per [`Pipeline`] and reused for every
//! document. Each document gets its own [`DocumentPage`], so runs never
//! share mutable state.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use docmesh_shared::{DocmeshError, DocumentContext, DocumentId, PipelineSettings, Result};

use crate::builder::PipelineOrder;
use crate::page::{DocumentPage, PageAdapter};
use crate::registry::Registry;

/// One source document waiting to be processed.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Where the document came from.
    pub context: DocumentContext,
    /// Raw file contents, front matter included.
    pub text: String,
}

impl SourceDocument {
    pub fn new(context: DocumentContext, text: impl Into<String>) -> Self {
        Self {
            context,
            text: text.into(),
        }
    }
}

/// A successfully serialized document.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub id: DocumentId,
    pub output: String,
}

/// A document whose run stopped at a failing transformer.
#[derive(Debug)]
pub struct FailedDocument {
    pub id: DocumentId,
    pub error: DocmeshError,
}

/// Outcome of [`Pipeline::process_batch`].
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Documents that made it through every transformer, in input order.
    pub outputs: Vec<ProcessedDocument>,
    /// Documents that failed, in input order.
    pub failures: Vec<FailedDocument>,
    /// Wall time for the whole batch.
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.outputs.len() + self.failures.len()
    }
}

/// Progress callback for batch runs.
pub trait ProgressReporter: Send + Sync {
    /// Called before a document enters the pipeline.
    fn document_started(&self, id: &DocumentId, current: usize, total: usize);
    /// Called after a document finished, successfully or not.
    fn document_finished(&self, id: &DocumentId, ok: bool);
    /// Called when the batch completes.
    fn done(&self, result: &BatchResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn document_started(&self, _id: &DocumentId, _current: usize, _total: usize) {}
    fn document_finished(&self, _id: &DocumentId, _ok: bool) {}
    fn done(&self, _result: &BatchResult) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A built, immutable transformer order ready to process documents.
#[derive(Debug, Clone)]
pub struct Pipeline {
    order: PipelineOrder,
}

impl Pipeline {
    pub fn new(order: PipelineOrder) -> Self {
        Self { order }
    }

    /// Build from a registry, dropping the transforms named in
    /// `settings.exclude`.
    pub fn from_registry(registry: &Registry, settings: &PipelineSettings) -> Result<Self> {
        for name in &settings.exclude {
            if !registry.contains(name) {
                warn!(transform = %name, "excluded transform is not registered");
            }
        }

        let order = if settings.exclude.is_empty() {
            registry.list()?
        } else {
            registry.build_pipeline_with_filter(|t| !settings.exclude.iter().any(|n| n == t.name()))?
        };

        debug!(transforms = ?order.names(), "pipeline built");
        Ok(Self::new(order))
    }

    pub fn order(&self) -> &PipelineOrder {
        &self.order
    }

    /// Run every transformer over `page` in order.
    ///
    /// Stops at the first failure; the error names the document and the
    /// transformer that failed.
    #[instrument(skip_all, fields(document = %id))]
    pub fn run(&self, page: &mut dyn PageAdapter, id: &DocumentId) -> Result<()> {
        for transform in &self.order {
            let start = Instant::now();
            transform
                .transform(page)
                .map_err(|e| DocmeshError::transform(id.to_string(), transform.name(), e))?;
            debug!(
                transform = transform.name(),
                stage = transform.stage(),
                elapsed_us = start.elapsed().as_micros() as u64,
                "transform applied"
            );
        }
        Ok(())
    }

    /// Process one document from source text to serialized output.
    pub fn process(&self, context: DocumentContext, source: &str) -> Result<String> {
        let id = context.id();
        let mut page = DocumentPage::new(context, source);
        self.run(&mut page, &id)?;

        page.into_output().ok_or_else(|| {
            DocmeshError::Serialization(format!(
                "no output produced for {id}; is the serializer excluded?"
            ))
        })
    }

    /// Process every document, collecting failures instead of stopping.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn process_batch(
        &self,
        documents: Vec<SourceDocument>,
        progress: &dyn ProgressReporter,
    ) -> BatchResult {
        let start = Instant::now();
        let total = documents.len();
        let mut result = BatchResult::default();

        for (i, doc) in documents.into_iter().enumerate() {
            let id = doc.context.id();
            progress.document_started(&id, i + 1, total);

            match self.process(doc.context, &doc.text) {
                Ok(output) => {
                    progress.document_finished(&id, true);
                    result.outputs.push(ProcessedDocument { id, output });
                }
                Err(error) => {
                    warn!(document = %id, error = %error, "document failed, skipping");
                    progress.document_finished(&id, false);
                    result.failures.push(FailedDocument { id, error });
                }
            }
        }

        result.elapsed = start.elapsed();
        info!(
            processed = result.outputs.len(),
            failed = result.failures.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "batch complete"
        );
        progress.done(&result);
        result
    }
}
