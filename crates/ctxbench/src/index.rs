use anyhow::{Context, Result};
use ctxbench_index::{crawl, Indexer};
use ctxbench_search::ContextApiClient;
use tokio::runtime::Runtime;

use crate::config::{IndexSettings, RateLimitSettings};
use crate::logging;

#[allow(clippy::too_many_arguments)]
pub fn run(
    root: String,
    tag: String,
    source: String,
    batch_size: usize,
    batch_delay_ms: u64,
    extensions: String,
    max_requests: Option<usize>,
    interval_ms: u64,
) -> Result<()> {
    let settings = IndexSettings {
        root: Some(root.clone()),
        tag,
        source,
        batch_size,
        batch_delay_ms,
        extensions: split_list(&extensions),
        rate_limit: max_requests.map(|max_requests| RateLimitSettings {
            max_requests,
            interval_ms,
        }),
    };
    run_with_settings(&root, &settings)
}

pub fn run_with_settings(fallback_root: &str, settings: &IndexSettings) -> Result<()> {
    let client = ContextApiClient::from_env()?;
    let crawl_config = settings.crawl_config(fallback_root);
    let docs = crawl(&crawl_config)?;
    logging::stage(
        "index",
        format!(
            "{} documents from {} (batch_size={}, endpoint={})",
            docs.len(),
            crawl_config.root.display(),
            settings.batch_size,
            client.base_url()
        ),
    );
    let mut pacer = settings.pacer();
    let mut indexer = Indexer::new(&client, pacer.as_mut(), settings.indexer_config())?;
    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let report = runtime.block_on(indexer.run(&docs))?;
    logging::stage(
        "index",
        format!(
            "uploaded {} documents in {} batches",
            report.uploaded, report.batches
        ),
    );
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
