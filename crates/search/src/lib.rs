pub mod context_api;
pub mod error;
pub mod pattern;
pub mod semantic;

pub use context_api::{
    AddContextRequest, ContextApiClient, ContextApiConfig, ContextDocument, ContextStore,
    SearchContextRequest, SearchContextResponse,
};
pub use error::{Result, SearchError};
pub use pattern::{PatternSearch, NO_MATCHES, PATTERN_OUTPUT_LIMIT};
pub use semantic::{
    SemanticSearch, MINIMUM_SIMILARITY_THRESHOLD, SIMILARITY_THRESHOLD, TOP_CONTEXTS,
};
