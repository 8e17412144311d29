use async_trait::async_trait;

use crate::error::Result;
use crate::model::ToolKind;

/// Structured argument extracted from a natural-language question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalArgument {
    Keyword(String),
    Query(String),
}

impl RetrievalArgument {
    pub fn for_tool(tool: ToolKind, value: impl Into<String>) -> Self {
        match tool {
            ToolKind::Pattern => RetrievalArgument::Keyword(value.into()),
            ToolKind::Semantic => RetrievalArgument::Query(value.into()),
        }
    }

    pub fn tool(&self) -> ToolKind {
        match self {
            RetrievalArgument::Keyword(_) => ToolKind::Pattern,
            RetrievalArgument::Query(_) => ToolKind::Semantic,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RetrievalArgument::Keyword(value) | RetrievalArgument::Query(value) => value,
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            RetrievalArgument::Keyword(value) => Some(value),
            RetrievalArgument::Query(_) => None,
        }
    }
}

/// How a backend reports its own failures.
///
/// `Recovered` backends never return `Err`; a failed search becomes a
/// sentinel output. `Propagated` backends return the error and the run for
/// that backend stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Recovered,
    Propagated,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Recovered => "recovered",
            FailurePolicy::Propagated => "propagated",
        }
    }
}

#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn failure_policy(&self) -> FailurePolicy;

    async fn execute(&self, argument: &str) -> Result<String>;
}

#[async_trait]
pub trait QueryRouter: Send + Sync {
    /// Returns `Ok(None)` when the model produced no usable function call.
    async fn route(&self, question: &str, tool: ToolKind) -> Result<Option<RetrievalArgument>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_matches_tool() {
        let arg = RetrievalArgument::for_tool(ToolKind::Pattern, "refreshToken");
        assert_eq!(arg.tool(), ToolKind::Pattern);
        assert_eq!(arg.keyword(), Some("refreshToken"));
        let arg = RetrievalArgument::for_tool(ToolKind::Semantic, "how is auth done");
        assert_eq!(arg.keyword(), None);
        assert_eq!(arg.as_str(), "how is auth done");
    }
}
