use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::backend::{QueryRouter, RetrievalBackend};
use crate::error::{BenchError, Result};
use crate::model::{record_file_name, write_record, Query, ResultRecord, TokenUsage};
use crate::tokens::TokenCounter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Persisted {
        id: i64,
        path: PathBuf,
        tokens: TokenUsage,
    },
    Skipped {
        id: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchSummary {
    pub persisted: usize,
    pub skipped: usize,
    pub total_tokens: usize,
    pub outcomes: Vec<QueryOutcome>,
}

/// Drives one backend over the query list, one query at a time.
pub struct BenchRunner<'a, R: ?Sized, B: ?Sized> {
    router: &'a R,
    backend: &'a B,
    tokenizer: &'a TokenCounter,
    output_dir: PathBuf,
}

impl<'a, R, B> BenchRunner<'a, R, B>
where
    R: QueryRouter + ?Sized,
    B: RetrievalBackend + ?Sized,
{
    pub fn new(
        router: &'a R,
        backend: &'a B,
        tokenizer: &'a TokenCounter,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            router,
            backend,
            tokenizer,
            output_dir: output_dir.into(),
        }
    }

    pub async fn run(&self, queries: &[Query]) -> Result<BenchSummary> {
        fs::create_dir_all(&self.output_dir).map_err(|source| BenchError::Write {
            path: self.output_dir.clone(),
            source,
        })?;
        info!(
            backend = self.backend.kind().as_str(),
            failure_policy = self.backend.failure_policy().as_str(),
            tokenizer = self.tokenizer.kind().as_str(),
            queries = queries.len(),
            "starting benchmark run"
        );
        let mut summary = BenchSummary::default();
        for query in queries {
            let outcome = self.process(query).await?;
            match &outcome {
                QueryOutcome::Persisted { tokens, .. } => {
                    summary.persisted += 1;
                    summary.total_tokens += tokens.total;
                }
                QueryOutcome::Skipped { .. } => summary.skipped += 1,
            }
            summary.outcomes.push(outcome);
        }
        info!(
            backend = self.backend.kind().as_str(),
            persisted = summary.persisted,
            skipped = summary.skipped,
            "benchmark run finished"
        );
        Ok(summary)
    }

    async fn process(&self, query: &Query) -> Result<QueryOutcome> {
        let tool = self.backend.kind();
        let Some(argument) = self.router.route(&query.content, tool).await? else {
            warn!(id = query.id, "no argument extracted; skipping query");
            return Ok(QueryOutcome::Skipped { id: query.id });
        };
        if argument.tool() != tool {
            return Err(BenchError::Other(format!(
                "router produced a {} argument for the {} backend",
                argument.tool().as_str(),
                tool.as_str()
            )));
        }
        debug!(id = query.id, argument = argument.as_str(), "translated query");
        let output = self.backend.execute(argument.as_str()).await?;
        let tokens = TokenUsage::new(
            self.tokenizer.count(&query.content),
            self.tokenizer.count(&output),
        );
        let record = ResultRecord {
            id: query.id,
            query: query.content.clone(),
            tool,
            keyword: argument.keyword().map(str::to_string),
            tokens,
            output,
        };
        let path = write_record(&self.output_dir, &record)?;
        info!(
            "{} saved: {}",
            tool.as_str().to_uppercase(),
            record_file_name(record.id)
        );
        Ok(QueryOutcome::Persisted {
            id: query.id,
            path,
            tokens,
        })
    }
}
