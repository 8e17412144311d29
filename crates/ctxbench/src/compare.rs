use std::path::Path;

use anyhow::Result;
use ctxbench_core::{compare_dirs, write_json_pretty, ComparisonSummary};

use crate::logging;

pub fn run(
    pattern_dir: String,
    semantic_dir: String,
    output: String,
    summary_out: Option<String>,
) -> Result<()> {
    let summary = compare(
        Path::new(&pattern_dir),
        Path::new(&semantic_dir),
        Path::new(&output),
    )?;
    if let Some(path) = summary_out {
        write_json_pretty(Path::new(&path), &summary)?;
        logging::stage("compare", format!("summary written to {path}"));
    }
    Ok(())
}

fn compare(pattern_dir: &Path, semantic_dir: &Path, output: &Path) -> Result<ComparisonSummary> {
    let correlation = compare_dirs(pattern_dir, semantic_dir, output)?;
    if !correlation.incomplete.is_empty() {
        logging::stage(
            "compare",
            format!("{} ids present on one side only", correlation.incomplete.len()),
        );
    }
    let summary = ComparisonSummary::from_entries(&correlation.entries);
    let ratio = summary
        .token_ratio
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    logging::stage(
        "compare",
        format!(
            "aligned={} pattern_tokens={} (median {:.1}) semantic_tokens={} (median {:.1}) ratio={}",
            summary.aligned,
            summary.pattern.total_tokens,
            summary.pattern.median_tokens,
            summary.semantic.total_tokens,
            summary.semantic.median_tokens,
            ratio
        ),
    );
    Ok(summary)
}
