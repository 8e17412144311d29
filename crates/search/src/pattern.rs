use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use ctxbench_core::{FailurePolicy, RetrievalBackend, ToolKind};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Characters of matched output kept per query.
pub const PATTERN_OUTPUT_LIMIT: usize = 5000;
pub const NO_MATCHES: &str = "No matches found";

/// Recursive, case-insensitive keyword search over a local tree.
///
/// The keyword is matched literally and never reaches a shell. Output lines
/// look like `path:line:text`, in file-name order.
#[derive(Debug, Clone)]
pub struct PatternSearch {
    root: PathBuf,
    limit: usize,
}

impl PatternSearch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limit: PATTERN_OUTPUT_LIMIT,
        }
    }

    pub fn search(&self, keyword: &str) -> String {
        match self.collect_matches(keyword) {
            Some(output) if !output.is_empty() => truncate_chars(output, self.limit),
            _ => NO_MATCHES.to_string(),
        }
    }

    fn collect_matches(&self, keyword: &str) -> Option<String> {
        if !self.root.exists() {
            warn!(root = %self.root.display(), "search root does not exist");
            return None;
        }
        let matcher = build_matcher(keyword)?;
        let mut output = String::new();
        let mut chars = 0usize;
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(bytes) = fs::read(entry.path()) else {
                continue;
            };
            if bytes.contains(&0) {
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            for (idx, line) in text.lines().enumerate() {
                if !matcher.is_match(line) {
                    continue;
                }
                let hit = format!("{}:{}:{}\n", entry.path().display(), idx + 1, line);
                chars += hit.chars().count();
                output.push_str(&hit);
                if chars >= self.limit {
                    return Some(output);
                }
            }
        }
        Some(output)
    }
}

#[async_trait]
impl RetrievalBackend for PatternSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::Pattern
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Recovered
    }

    async fn execute(&self, argument: &str) -> ctxbench_core::Result<String> {
        let search = self.clone();
        let keyword = argument.to_string();
        match tokio::task::spawn_blocking(move || search.search(&keyword)).await {
            Ok(output) => Ok(output),
            Err(err) => {
                warn!(error = %err, "pattern search task failed");
                Ok(NO_MATCHES.to_string())
            }
        }
    }
}

fn build_matcher(keyword: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .map_err(|err| warn!(error = %err, "keyword rejected by matcher"))
        .ok()
}

fn truncate_chars(mut text: String, limit: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(limit) {
        text.truncate(byte_idx);
    }
    text
}
