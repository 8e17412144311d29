use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{0} is not set")]
    MissingCredential(&'static str),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("context api returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid context api response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;
