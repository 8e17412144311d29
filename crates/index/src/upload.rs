use std::time::Duration;

use ctxbench_core::IndexedDocument;
use ctxbench_search::{AddContextRequest, ContextDocument, ContextStore};
use tracing::{info, warn};

use crate::error::{IndexError, Result};
use crate::pacing::Pacer;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub batch_size: usize,
    /// Recorded as the `source` of every uploaded document.
    pub source: String,
    pub scope: String,
    pub context_type: String,
}

impl IndexerConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            source: source.into(),
            scope: "internal".to_string(),
            context_type: "resource".to_string(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IndexError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub uploaded: usize,
    pub batches: usize,
}

pub struct Indexer<'a, S: ?Sized> {
    store: &'a S,
    pacer: &'a mut dyn Pacer,
    config: IndexerConfig,
}

impl<'a, S: ContextStore + ?Sized> Indexer<'a, S> {
    pub fn new(store: &'a S, pacer: &'a mut dyn Pacer, config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            pacer,
            config,
        })
    }

    /// Uploads `docs` one add call per document, in batches. The first failed
    /// upload aborts the run; documents already sent stay uploaded.
    pub async fn run(&mut self, docs: &[IndexedDocument]) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let total = docs.len().div_ceil(self.config.batch_size);
        for (idx, batch) in docs.chunks(self.config.batch_size).enumerate() {
            if idx > 0 {
                self.pacer.between_batches().await;
            }
            info!(batch = idx + 1, total, size = batch.len(), "uploading batch");
            for doc in batch {
                self.pacer.before_request().await;
                self.upload(doc).await?;
                report.uploaded += 1;
            }
            report.batches += 1;
        }
        info!(
            uploaded = report.uploaded,
            batches = report.batches,
            "indexing finished"
        );
        Ok(report)
    }

    async fn upload(&self, doc: &IndexedDocument) -> Result<()> {
        let request = AddContextRequest {
            documents: vec![ContextDocument {
                content: doc.content.clone(),
            }],
            context_type: self.config.context_type.clone(),
            source: self.config.source.clone(),
            scope: self.config.scope.clone(),
            metadata: doc.metadata.clone(),
        };
        self.store.add(&request).await.map_err(|source| {
            warn!(file = %doc.metadata.file_name, error = %source, "upload failed");
            IndexError::Upload {
                file: doc.metadata.file_name.clone(),
                source,
            }
        })
    }
}
