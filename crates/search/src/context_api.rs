use std::env;

use async_trait::async_trait;
use ctxbench_core::DocumentMetadata;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SearchError};

pub const DEFAULT_BASE_URL: &str = "https://platform-dev.getalchemystai.com/api/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddContextRequest {
    pub documents: Vec<ContextDocument>,
    pub context_type: String,
    pub source: String,
    pub scope: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchContextRequest {
    pub query: String,
    pub similarity_threshold: f64,
    pub minimum_similarity_threshold: f64,
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchContextResponse {
    /// Ranked matches, kept as raw JSON so their shape reaches the report untouched.
    #[serde(default)]
    pub contexts: Vec<Value>,
}

/// The two operations the harness needs from the hosted context service.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn add(&self, request: &AddContextRequest) -> Result<()>;

    async fn search(&self, request: &SearchContextRequest) -> Result<SearchContextResponse>;
}

#[derive(Debug, Clone)]
pub struct ContextApiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ContextApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("ALCHEMYST_AI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(SearchError::MissingCredential("ALCHEMYST_AI_API_KEY"))?;
        let base_url = lookup("CTXBENCH_CONTEXT_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self { api_key, base_url })
    }
}

#[derive(Clone)]
pub struct ContextApiClient {
    http: Client,
    config: ContextApiConfig,
}

impl ContextApiClient {
    pub fn new(config: ContextApiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ContextApiConfig::from_env()?))
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Lists the documents the service currently holds for this key.
    pub async fn view_docs(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.endpoint("context/view/docs"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        decode(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ContextStore for ContextApiClient {
    async fn add(&self, request: &AddContextRequest) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("context/add"))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }
        debug!(file = %request.metadata.file_name, "context added");
        Ok(())
    }

    async fn search(&self, request: &SearchContextRequest) -> Result<SearchContextResponse> {
        let response = self
            .http
            .post(self.endpoint("context/search"))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;
        let value = decode(response).await?;
        Ok(serde_json::from_value(value)?)
    }
}

async fn decode(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(SearchError::Status { status, body });
    }
    Ok(serde_json::from_str(&body)?)
}
