use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    pub content: String,
}

/// Which retrieval strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[serde(alias = "grep")]
    Pattern,
    #[serde(alias = "alchemyst")]
    Semantic,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Pattern => "pattern",
            ToolKind::Semantic => "semantic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub query: usize,
    pub output: usize,
    pub total: usize,
}

impl TokenUsage {
    pub fn new(query: usize, output: usize) -> Self {
        Self {
            query,
            output,
            total: query + output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: i64,
    pub query: String,
    pub tool: ToolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub tokens: TokenUsage,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub id: i64,
    pub query: String,
    pub pattern: PatternSide,
    pub semantic: SemanticSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSide {
    pub keyword: Option<String>,
    pub tokens: usize,
    pub output_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSide {
    pub tokens: usize,
    pub output_length: usize,
}

/// A crawled file as uploaded to the context service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "groupName")]
    pub group_path: Vec<String>,
    pub file_type: String,
    pub file_name: String,
    pub file_size: u64,
    pub last_modified: String,
}

pub fn load_queries(path: &Path) -> Result<Vec<Query>> {
    let raw = fs::read_to_string(path).map_err(|source| BenchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let queries: Vec<Query> =
        serde_json::from_str(&raw).map_err(|source| BenchError::InvalidQueries {
            path: path.to_path_buf(),
            source,
        })?;
    let mut seen = HashSet::new();
    for query in &queries {
        if !seen.insert(query.id) {
            warn!(id = query.id, "duplicate query id; later result overwrites earlier one");
        }
    }
    Ok(queries)
}

pub fn record_file_name(id: i64) -> String {
    format!("query_{id}.json")
}

/// Writes `record` to `<dir>/query_<id>.json`, replacing any previous file.
pub fn write_record(dir: &Path, record: &ResultRecord) -> Result<PathBuf> {
    let path = dir.join(record_file_name(record.id));
    write_json_pretty(&path, record)?;
    Ok(path)
}

pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).map_err(|source| BenchError::Write {
        path: path.to_path_buf(),
        source,
    })
}
