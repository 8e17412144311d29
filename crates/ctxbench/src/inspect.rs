use anyhow::{Context, Result};
use ctxbench_search::ContextApiClient;
use tokio::runtime::Runtime;

use crate::logging;

pub fn run() -> Result<()> {
    let client = ContextApiClient::from_env()?;
    logging::stage("inspect", format!("listing documents at {}", client.base_url()));
    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let docs = runtime
        .block_on(client.view_docs())
        .context("failed to list context documents")?;
    println!("{}", serde_json::to_string_pretty(&docs)?);
    Ok(())
}
