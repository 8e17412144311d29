use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{BenchError, Result};
use crate::model::{
    write_json_pretty, ComparisonEntry, PatternSide, ResultRecord, SemanticSide, ToolKind,
};

/// Result records from one directory keyed by query id.
#[derive(Debug, Clone, Default)]
pub struct ResultIndex {
    records: BTreeMap<i64, ResultRecord>,
    skipped: Vec<PathBuf>,
}

impl ResultIndex {
    pub fn get(&self, id: i64) -> Option<&ResultRecord> {
        self.records.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Files that were skipped because they had no numeric id.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    fn insert(&mut self, record: ResultRecord) {
        self.records.insert(record.id, record);
    }
}

/// Loads every `*.json` file in `dir`.
///
/// Files without an integer `id` are skipped with a warning; a file with an
/// id but an otherwise malformed body is an error.
pub fn load_results_by_id(dir: &Path) -> Result<ResultIndex> {
    let entries = fs::read_dir(dir).map_err(|source| BenchError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();

    let mut index = ResultIndex::default();
    for path in files {
        let raw = fs::read_to_string(&path).map_err(|source| BenchError::Read {
            path: path.clone(),
            source,
        })?;
        let mut value: Value =
            serde_json::from_str(&raw).map_err(|source| BenchError::InvalidRecord {
                path: path.clone(),
                source,
            })?;
        let Some(id) = value.get("id").and_then(integer_id) else {
            warn!(file = %path.display(), "skipping file without integer id");
            index.skipped.push(path);
            continue;
        };
        value["id"] = Value::from(id);
        let record: ResultRecord =
            serde_json::from_value(value).map_err(|source| BenchError::InvalidRecord {
                path: path.clone(),
                source,
            })?;
        index.insert(record);
    }
    Ok(index)
}

/// Accepts `2` and `2.0`; rejects fractional, non-numeric and out-of-range ids.
fn integer_id(value: &Value) -> Option<i64> {
    if let Some(id) = value.as_i64() {
        return Some(id);
    }
    let id = value.as_f64()?;
    let in_range = id >= i64::MIN as f64 && id < i64::MAX as f64;
    (id.fract() == 0.0 && in_range).then_some(id as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteResult {
    pub id: i64,
    pub pattern: bool,
    pub semantic: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Correlation {
    /// Union of ids from both sides, ascending.
    pub all_ids: Vec<i64>,
    pub entries: Vec<ComparisonEntry>,
    pub incomplete: Vec<IncompleteResult>,
}

/// Inner-joins the two indexes by id in ascending order.
pub fn correlate(pattern: &ResultIndex, semantic: &ResultIndex) -> Correlation {
    let all_ids: BTreeSet<i64> = pattern.ids().chain(semantic.ids()).collect();
    let mut correlation = Correlation {
        all_ids: all_ids.iter().copied().collect(),
        ..Correlation::default()
    };
    for id in all_ids {
        let (p, s) = match (pattern.get(id), semantic.get(id)) {
            (Some(p), Some(s)) => (p, s),
            (p, s) => {
                warn!(
                    "Incomplete result for query id={id} (pattern={}, semantic={})",
                    p.is_some(),
                    s.is_some()
                );
                correlation.incomplete.push(IncompleteResult {
                    id,
                    pattern: p.is_some(),
                    semantic: s.is_some(),
                });
                continue;
            }
        };
        if p.tool != ToolKind::Pattern || s.tool != ToolKind::Semantic {
            warn!(
                id,
                pattern_side = p.tool.as_str(),
                semantic_side = s.tool.as_str(),
                "record tool does not match its directory"
            );
        }
        correlation.entries.push(ComparisonEntry {
            id,
            query: p.query.clone(),
            pattern: PatternSide {
                keyword: p.keyword.clone(),
                tokens: p.tokens.total,
                output_length: p.output.chars().count(),
            },
            semantic: SemanticSide {
                tokens: s.tokens.total,
                output_length: s.output.chars().count(),
            },
        });
    }
    correlation
}

/// Loads both directories, correlates them and writes the entries to `out`.
pub fn compare_dirs(pattern_dir: &Path, semantic_dir: &Path, out: &Path) -> Result<Correlation> {
    let pattern = load_results_by_id(pattern_dir)?;
    let semantic = load_results_by_id(semantic_dir)?;
    let correlation = correlate(&pattern, &semantic);
    write_json_pretty(out, &correlation.entries)?;
    info!(
        "{} generated ({} aligned queries)",
        out.display(),
        correlation.entries.len()
    );
    Ok(correlation)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SideSummary {
    pub total_tokens: usize,
    pub mean_tokens: f64,
    pub median_tokens: f64,
    pub mean_output_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub aligned: usize,
    pub pattern: SideSummary,
    pub semantic: SideSummary,
    /// Pattern tokens divided by semantic tokens; `None` when semantic is 0.
    pub token_ratio: Option<f64>,
}

impl ComparisonSummary {
    pub fn from_entries(entries: &[ComparisonEntry]) -> Self {
        let pattern = side_summary(
            entries
                .iter()
                .map(|e| (e.pattern.tokens, e.pattern.output_length)),
        );
        let semantic = side_summary(
            entries
                .iter()
                .map(|e| (e.semantic.tokens, e.semantic.output_length)),
        );
        let token_ratio = if semantic.total_tokens == 0 {
            None
        } else {
            Some(pattern.total_tokens as f64 / semantic.total_tokens as f64)
        };
        Self {
            aligned: entries.len(),
            pattern,
            semantic,
            token_ratio,
        }
    }
}

fn side_summary(rows: impl Iterator<Item = (usize, usize)>) -> SideSummary {
    let (mut tokens, lengths): (Vec<usize>, Vec<usize>) = rows.unzip();
    if tokens.is_empty() {
        return SideSummary::default();
    }
    let count = tokens.len() as f64;
    let total_tokens = tokens.iter().sum::<usize>();
    tokens.sort_unstable();
    let mid = tokens.len() / 2;
    let median_tokens = if tokens.len() % 2 == 0 {
        (tokens[mid - 1] + tokens[mid]) as f64 / 2.0
    } else {
        tokens[mid] as f64
    };
    SideSummary {
        total_tokens,
        mean_tokens: total_tokens as f64 / count,
        median_tokens,
        mean_output_length: lengths.iter().sum::<usize>() as f64 / count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenUsage;

    fn record(id: i64, tool: ToolKind, total: usize, output: &str) -> ResultRecord {
        ResultRecord {
            id,
            query: format!("question {id}"),
            tool,
            keyword: (tool == ToolKind::Pattern).then(|| format!("kw{id}")),
            tokens: TokenUsage::new(1, total - 1),
            output: output.to_string(),
        }
    }

    fn index(records: Vec<ResultRecord>) -> ResultIndex {
        let mut index = ResultIndex::default();
        for r in records {
            index.insert(r);
        }
        index
    }

    #[test]
    fn integer_id_accepts_whole_numbers_only() {
        assert_eq!(integer_id(&Value::from(7)), Some(7));
        assert_eq!(integer_id(&Value::from(7.0)), Some(7));
        assert_eq!(integer_id(&Value::from(-3.0)), Some(-3));
        assert_eq!(integer_id(&Value::from(7.5)), None);
        assert_eq!(integer_id(&Value::from(1e300)), None);
        assert_eq!(integer_id(&Value::from("7")), None);
    }

    #[test]
    fn correlate_is_an_inner_join_in_ascending_order() {
        let pattern = index(vec![
            record(3, ToolKind::Pattern, 30, "c"),
            record(1, ToolKind::Pattern, 10, "a"),
            record(2, ToolKind::Pattern, 20, "b"),
        ]);
        let semantic = index(vec![
            record(4, ToolKind::Semantic, 41, "dddd"),
            record(2, ToolKind::Semantic, 21, "bb"),
            record(3, ToolKind::Semantic, 31, "ccc"),
        ]);
        let correlation = correlate(&pattern, &semantic);
        assert_eq!(correlation.all_ids, vec![1, 2, 3, 4]);
        let ids: Vec<i64> = correlation.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(
            correlation.incomplete,
            vec![
                IncompleteResult {
                    id: 1,
                    pattern: true,
                    semantic: false
                },
                IncompleteResult {
                    id: 4,
                    pattern: false,
                    semantic: true
                },
            ]
        );
    }

    #[test]
    fn entry_propagates_recorded_totals() {
        let mut p = record(5, ToolKind::Pattern, 10, "héllo");
        // A total that disagrees with its parts must still be copied verbatim.
        p.tokens.total = 99;
        let pattern = index(vec![p]);
        let semantic = index(vec![record(5, ToolKind::Semantic, 12, "abc")]);
        let entry = &correlate(&pattern, &semantic).entries[0];
        assert_eq!(entry.pattern.tokens, 99);
        assert_eq!(entry.pattern.output_length, 5);
        assert_eq!(entry.pattern.keyword.as_deref(), Some("kw5"));
        assert_eq!(entry.semantic.tokens, 12);
        assert_eq!(entry.query, "question 5");
    }

    #[test]
    fn summary_reports_means_and_ratio() {
        let pattern = index(vec![
            record(1, ToolKind::Pattern, 10, "aaaa"),
            record(2, ToolKind::Pattern, 30, "aa"),
        ]);
        let semantic = index(vec![
            record(1, ToolKind::Semantic, 20, "a"),
            record(2, ToolKind::Semantic, 20, "aaa"),
        ]);
        let entries = correlate(&pattern, &semantic).entries;
        let summary = ComparisonSummary::from_entries(&entries);
        assert_eq!(summary.aligned, 2);
        assert_eq!(summary.pattern.total_tokens, 40);
        assert_eq!(summary.pattern.median_tokens, 20.0);
        assert_eq!(summary.pattern.mean_output_length, 3.0);
        assert_eq!(summary.semantic.mean_tokens, 20.0);
        assert_eq!(summary.token_ratio, Some(1.0));
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = ComparisonSummary::from_entries(&[]);
        assert_eq!(summary.aligned, 0);
        assert_eq!(summary.token_ratio, None);
    }
}
