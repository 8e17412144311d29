use std::path::PathBuf;

use ctxbench_search::SearchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("corpus root {0:?} does not exist")]
    MissingRoot(PathBuf),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload of {file} failed: {source}")]
    Upload {
        file: String,
        #[source]
        source: SearchError,
    },
    #[error("invalid indexer config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
