use async_trait::async_trait;
use ctxbench_core::{BenchError, FailurePolicy, RetrievalBackend, ToolKind};
use serde_json::json;
use tracing::debug;

use crate::context_api::{ContextStore, SearchContextRequest};

pub const SIMILARITY_THRESHOLD: f64 = 0.5;
pub const MINIMUM_SIMILARITY_THRESHOLD: f64 = 0.3;
pub const TOP_CONTEXTS: usize = 3;

/// Similarity search against the hosted context service.
///
/// Remote failures are returned to the caller unchanged.
pub struct SemanticSearch<'a, S: ?Sized> {
    store: &'a S,
    top: usize,
}

impl<'a, S: ContextStore + ?Sized> SemanticSearch<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            top: TOP_CONTEXTS,
        }
    }

    fn request(query: &str) -> SearchContextRequest {
        SearchContextRequest {
            query: query.to_string(),
            similarity_threshold: SIMILARITY_THRESHOLD,
            minimum_similarity_threshold: MINIMUM_SIMILARITY_THRESHOLD,
            metadata: json!({}),
        }
    }
}

#[async_trait]
impl<'a, S: ContextStore + ?Sized> RetrievalBackend for SemanticSearch<'a, S> {
    fn kind(&self) -> ToolKind {
        ToolKind::Semantic
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Propagated
    }

    async fn execute(&self, argument: &str) -> ctxbench_core::Result<String> {
        let response = self
            .store
            .search(&Self::request(argument))
            .await
            .map_err(|err| BenchError::Backend {
                backend: "semantic",
                source: Box::new(err),
            })?;
        debug!(
            returned = response.contexts.len(),
            kept = response.contexts.len().min(self.top),
            "semantic search finished"
        );
        let top = &response.contexts[..response.contexts.len().min(self.top)];
        Ok(serde_json::to_string_pretty(top)?)
    }
}
