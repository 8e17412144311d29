mod backend;
mod bench;
mod correlate;
mod error;
mod model;
mod tokens;

pub use backend::{FailurePolicy, QueryRouter, RetrievalArgument, RetrievalBackend};
pub use bench::{BenchRunner, BenchSummary, QueryOutcome};
pub use correlate::{
    compare_dirs, correlate, load_results_by_id, ComparisonSummary, Correlation,
    IncompleteResult, ResultIndex, SideSummary,
};
pub use error::{BenchError, BoxError, Result};
pub use model::{
    load_queries, record_file_name, write_json_pretty, write_record, ComparisonEntry,
    DocumentMetadata, IndexedDocument, PatternSide, Query, ResultRecord, SemanticSide,
    TokenUsage, ToolKind,
};
pub use tokens::{TokenCounter, TokenizerKind};
