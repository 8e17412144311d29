use async_trait::async_trait;
use ctxbench_core::{BenchError, QueryRouter, RetrievalArgument, ToolKind};
use ctxbench_llm::{FunctionDeclaration, LlmClient, ToolCallRequest, ToolCallResponse};
use tracing::warn;

pub const PATTERN_FUNCTION: &str = "pattern_search";
pub const SEMANTIC_FUNCTION: &str = "semantic_search";

/// Function offered to the model for one backend.
struct ToolSchema {
    function: FunctionDeclaration,
    argument: &'static str,
}

impl ToolSchema {
    fn for_tool(tool: ToolKind) -> Self {
        match tool {
            ToolKind::Pattern => Self {
                function: FunctionDeclaration::single_string_argument(
                    PATTERN_FUNCTION,
                    "Search the repository for lines containing a keyword",
                    "keyword",
                ),
                argument: "keyword",
            },
            ToolKind::Semantic => Self {
                function: FunctionDeclaration::single_string_argument(
                    SEMANTIC_FUNCTION,
                    "Retrieve relevant context for a natural-language query",
                    "query",
                ),
                argument: "query",
            },
        }
    }
}

pub fn prompt_for(tool: ToolKind, question: &str) -> String {
    match tool {
        ToolKind::Pattern => format!(
            "Convert the following question into a grep keyword and call {PATTERN_FUNCTION}:\n\n\"{question}\""
        ),
        ToolKind::Semantic => {
            format!("Call {SEMANTIC_FUNCTION} for the following query:\n\n\"{question}\"")
        }
    }
}

/// Turns questions into backend arguments with one forced function call.
pub struct LlmRouter<'a> {
    client: &'a LlmClient,
}

impl<'a> LlmRouter<'a> {
    pub fn new(client: &'a LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryRouter for LlmRouter<'_> {
    async fn route(
        &self,
        question: &str,
        tool: ToolKind,
    ) -> ctxbench_core::Result<Option<RetrievalArgument>> {
        let schema = ToolSchema::for_tool(tool);
        let request = ToolCallRequest {
            system: None,
            user: prompt_for(tool, question),
            function: schema.function,
        };
        let response = self
            .client
            .call_function(&request)
            .await
            .map_err(|err| BenchError::Router(err.into()))?;
        Ok(extract_argument(
            &response,
            &request.function.name,
            schema.argument,
            tool,
        ))
    }
}

/// Reads the backend argument out of the model's reply. A missing call, a
/// call to another function, or a blank or non-string argument is a miss.
fn extract_argument(
    response: &ToolCallResponse,
    function: &str,
    argument: &str,
    tool: ToolKind,
) -> Option<RetrievalArgument> {
    let call = response.call.as_ref()?;
    if call.name != function {
        warn!(
            expected = function,
            got = %call.name,
            "model called an unexpected function"
        );
        return None;
    }
    call.string_arg(argument)
        .filter(|value| !value.trim().is_empty())
        .map(|value| RetrievalArgument::for_tool(tool, value))
}
