use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use ctxbench_core::{DocumentMetadata, IndexedDocument};
use tracing::info;
use walkdir::{DirEntry, WalkDir};

use crate::error::{IndexError, Result};

pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "js", "md", "json", "txt"];
const FILE_TYPE: &str = "text/plain";

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    /// Appended to every document's group path.
    pub group_tag: String,
}

impl CrawlConfig {
    pub fn new(root: impl Into<PathBuf>, group_tag: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            group_tag: group_tag.into(),
        }
    }

    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }
}

/// Crawls `config.root` and reads every allow-listed file into a document.
pub fn crawl(config: &CrawlConfig) -> Result<Vec<IndexedDocument>> {
    let files = discover_files(&config.root, &config.extensions)?;
    info!(
        root = %config.root.display(),
        files = files.len(),
        "discovered files for indexing"
    );
    files
        .iter()
        .map(|path| build_document(path, &config.group_tag))
        .collect()
}

/// Lists files under `root` whose extension is in `extensions`, skipping
/// hidden files and directories. The result is sorted by path.
pub fn discover_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(IndexError::MissingRoot(root.to_path_buf()));
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if has_allowed_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

pub fn build_document(path: &Path, group_tag: &str) -> Result<IndexedDocument> {
    let read_err = |source| IndexError::Read {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(read_err)?;
    let meta = fs::metadata(path).map_err(read_err)?;
    let modified: DateTime<Utc> = meta.modified().map_err(read_err)?.into();
    let mut group_path = path_segments(path);
    group_path.push(group_tag.to_string());
    Ok(IndexedDocument {
        content: String::from_utf8_lossy(&bytes).into_owned(),
        metadata: DocumentMetadata {
            group_path,
            file_type: FILE_TYPE.to_string(),
            file_name: path.display().to_string(),
            file_size: meta.len(),
            last_modified: modified.to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn segments_drop_current_dir_markers() {
        assert_eq!(
            path_segments(Path::new("./repo/src/index.ts")),
            vec!["repo", "src", "index.ts"]
        );
    }

    #[test]
    fn with_extensions_normalizes_input() {
        let config = CrawlConfig::new("repo", "tag")
            .with_extensions(&[".TS".to_string(), " md ".to_string(), String::new()]);
        assert_eq!(config.extensions, vec!["ts", "md"]);
    }

    #[test]
    fn build_document_fills_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# hello").unwrap();
        let doc = build_document(&path, "bench-corpus").unwrap();
        assert_eq!(doc.content, "# hello");
        assert_eq!(doc.metadata.file_size, 7);
        assert_eq!(doc.metadata.file_type, "text/plain");
        assert_eq!(doc.metadata.group_path.last().unwrap(), "bench-corpus");
        assert_eq!(
            doc.metadata.group_path[doc.metadata.group_path.len() - 2],
            "notes.md"
        );
        assert!(doc.metadata.last_modified.ends_with('Z'));
    }
}
