use std::path::Path;

use anyhow::{Context, Result};
use ctxbench_core::{load_queries, BenchRunner, BenchSummary, TokenCounter, ToolKind};
use ctxbench_llm::LlmClient;
use ctxbench_search::{ContextApiClient, PatternSearch, SemanticSearch};
use tokio::runtime::Runtime;

use crate::cli::Backend;
use crate::config::BenchEnv;
use crate::logging;
use crate::router::LlmRouter;

pub fn default_output(tool: ToolKind) -> String {
    format!("results/{}", tool.as_str())
}

pub fn run(backend: Backend, queries: String, output: Option<String>, root: String) -> Result<()> {
    let tool = backend.tool();
    let output = output.unwrap_or_else(|| default_output(tool));
    let env = BenchEnv::from_env()?;
    let llm = LlmClient::new(env.provider, env.model.clone())?;
    // The context credential is only needed by the semantic backend.
    let context = match tool {
        ToolKind::Semantic => Some(ContextApiClient::from_env()?),
        ToolKind::Pattern => None,
    };
    let tokenizer = TokenCounter::new(env.tokenizer)?;
    let queries = load_queries(Path::new(&queries))?;
    logging::stage(
        "bench",
        format!(
            "backend={} provider={} model={} queries={} output={}",
            tool.as_str(),
            env.provider.as_str(),
            env.model,
            queries.len(),
            output
        ),
    );
    let router = LlmRouter::new(&llm);
    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let summary: BenchSummary = match &context {
        Some(client) => {
            let backend = SemanticSearch::new(client);
            let runner = BenchRunner::new(&router, &backend, &tokenizer, &output);
            runtime.block_on(runner.run(&queries))?
        }
        None => {
            let backend = PatternSearch::new(&root);
            let runner = BenchRunner::new(&router, &backend, &tokenizer, &output);
            runtime.block_on(runner.run(&queries))?
        }
    };
    logging::stage(
        "bench",
        format!(
            "{} persisted, {} skipped, {} tokens",
            summary.persisted, summary.skipped, summary.total_tokens
        ),
    );
    Ok(())
}
