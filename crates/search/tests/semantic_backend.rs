use std::sync::Mutex;

use async_trait::async_trait;
use ctxbench_core::{BenchError, FailurePolicy, RetrievalBackend, ToolKind};
use ctxbench_search::{
    AddContextRequest, ContextStore, SearchContextRequest, SearchContextResponse, SearchError,
    SemanticSearch, MINIMUM_SIMILARITY_THRESHOLD, SIMILARITY_THRESHOLD,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[derive(Default)]
struct MemoryStore {
    contexts: Vec<Value>,
    fail: bool,
    requests: Mutex<Vec<SearchContextRequest>>,
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn add(&self, _request: &AddContextRequest) -> ctxbench_search::Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        request: &SearchContextRequest,
    ) -> ctxbench_search::Result<SearchContextResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(SearchError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "down".to_string(),
            });
        }
        Ok(SearchContextResponse {
            contexts: self.contexts.clone(),
        })
    }
}

#[tokio::test]
async fn keeps_only_top_three_contexts() {
    let store = MemoryStore {
        contexts: (1..=5)
            .map(|i| json!({ "content": format!("chunk {i}"), "score": 1.0 - i as f64 / 10.0 }))
            .collect(),
        ..MemoryStore::default()
    };
    let backend = SemanticSearch::new(&store);

    let output = backend.execute("how are sessions persisted").await.unwrap();

    let parsed: Vec<Value> = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed[0]["content"], "chunk 1");
    assert_eq!(parsed[2]["content"], "chunk 3");
    assert!(output.contains("\n  {"));

    let requests = store.requests.lock().unwrap();
    assert_eq!(requests[0].query, "how are sessions persisted");
    assert_eq!(requests[0].similarity_threshold, SIMILARITY_THRESHOLD);
    assert_eq!(
        requests[0].minimum_similarity_threshold,
        MINIMUM_SIMILARITY_THRESHOLD
    );
}

#[tokio::test]
async fn empty_result_serializes_as_empty_array() {
    let store = MemoryStore::default();
    let output = SemanticSearch::new(&store).execute("q").await.unwrap();
    assert_eq!(output, "[]");
}

#[tokio::test]
async fn remote_failure_propagates() {
    let store = MemoryStore {
        fail: true,
        ..MemoryStore::default()
    };
    let backend = SemanticSearch::new(&store);
    assert_eq!(backend.kind(), ToolKind::Semantic);
    assert_eq!(backend.failure_policy(), FailurePolicy::Propagated);
    let err = backend.execute("q").await.unwrap_err();
    assert!(matches!(
        err,
        BenchError::Backend {
            backend: "semantic",
            ..
        }
    ));
}
