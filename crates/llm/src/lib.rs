use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::env;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const MAX_RETRIES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
    Deepseek,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Deepseek => "deepseek",
            LlmProvider::Local => "local",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "gemini" => Some(LlmProvider::Gemini),
            "deepseek" => Some(LlmProvider::Deepseek),
            "local" => Some(LlmProvider::Local),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4.1-mini",
            LlmProvider::Anthropic => "claude-3-5-sonnet-latest",
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::Deepseek => "deepseek-chat",
            LlmProvider::Local => "local",
        }
    }
}

/// A function the model may call, described with a JSON schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionDeclaration {
    /// Declares a function taking exactly one required string argument.
    pub fn single_string_argument(
        name: impl Into<String>,
        description: impl Into<String>,
        argument: &str,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({
                "type": "object",
                "properties": { argument: { "type": "string" } },
                "required": [argument],
            }),
        }
    }

    fn required_arguments(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub system: Option<String>,
    pub user: String,
    pub function: FunctionDeclaration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
}

impl FunctionCall {
    pub fn string_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResponse {
    /// First function call in the response, if the model produced any.
    pub call: Option<FunctionCall>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ToolCallResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    OpenAi(OpenAiConfig),
    Anthropic(AnthropicConfig),
    Gemini(GeminiConfig),
    Deepseek(OpenAiConfig),
    Local,
}

#[derive(Clone)]
struct OpenAiConfig {
    api_key: String,
    base_url: String,
}

#[derive(Clone)]
struct AnthropicConfig {
    api_key: String,
    max_tokens: u32,
}

#[derive(Clone)]
struct GeminiConfig {
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let http = Client::new();
        let config = match provider {
            LlmProvider::OpenAi => ProviderConfig::OpenAi(OpenAiConfig {
                api_key: read_api_key("OPENAI_API_KEY")?,
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            }),
            LlmProvider::Anthropic => ProviderConfig::Anthropic(AnthropicConfig {
                api_key: read_api_key("ANTHROPIC_API_KEY")?,
                max_tokens: env::var("ANTHROPIC_MAX_TOKENS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(512),
            }),
            LlmProvider::Gemini => ProviderConfig::Gemini(GeminiConfig {
                api_key: read_api_key("GEMINI_API_KEY")?,
                base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
            }),
            LlmProvider::Deepseek => ProviderConfig::Deepseek(OpenAiConfig {
                api_key: read_api_key("DEEPSEEK_API_KEY")?,
                base_url: "https://api.deepseek.com/v1".to_string(),
            }),
            LlmProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http,
            provider,
            model,
            config,
        })
    }

    /// Offline client that answers tool calls from the prompt text alone.
    pub fn local() -> Self {
        Self {
            http: Client::new(),
            provider: LlmProvider::Local,
            model: LlmProvider::Local.default_model().to_string(),
            config: ProviderConfig::Local,
        }
    }

    /// Sends one request that offers exactly one function to the model.
    pub async fn call_function(&self, req: &ToolCallRequest) -> Result<ToolCallResponse> {
        let response = match &self.config {
            ProviderConfig::OpenAi(cfg) => self.call_openai(cfg, req, "openai").await,
            ProviderConfig::Deepseek(cfg) => self.call_openai(cfg, req, "deepseek").await,
            ProviderConfig::Anthropic(cfg) => self.call_anthropic(cfg, req).await,
            ProviderConfig::Gemini(cfg) => self.call_gemini(cfg, req).await,
            ProviderConfig::Local => Ok(call_local(req)),
        }?;
        debug!(
            provider = self.provider.as_str(),
            function = %req.function.name,
            called = response.call.is_some(),
            tokens = response.total_tokens(),
            "tool call finished"
        );
        Ok(response)
    }

    async fn call_openai(
        &self,
        cfg: &OpenAiConfig,
        req: &ToolCallRequest,
        label: &str,
    ) -> Result<ToolCallResponse> {
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": req.user }));
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "tools": [{
                "type": "function",
                "function": {
                    "name": req.function.name,
                    "description": req.function.description,
                    "parameters": req.function.parameters,
                },
            }],
            "tool_choice": {
                "type": "function",
                "function": { "name": req.function.name },
            },
        });
        let value = self
            .send_with_retry(label, || {
                self.http
                    .post(&url)
                    .bearer_auth(&cfg.api_key)
                    .json(&payload)
            })
            .await?;
        Ok(parse_openai_response(&value))
    }

    async fn call_anthropic(
        &self,
        cfg: &AnthropicConfig,
        req: &ToolCallRequest,
    ) -> Result<ToolCallResponse> {
        let mut payload = json!({
            "model": self.model,
            "max_tokens": cfg.max_tokens,
            "messages": [ { "role": "user", "content": req.user } ],
            "tools": [{
                "name": req.function.name,
                "description": req.function.description,
                "input_schema": req.function.parameters,
            }],
            "tool_choice": { "type": "tool", "name": req.function.name },
        });
        if let Some(system) = &req.system {
            payload["system"] = json!(system);
        }
        let value = self
            .send_with_retry("anthropic", || {
                self.http
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &cfg.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&payload)
            })
            .await?;
        Ok(parse_anthropic_response(&value))
    }

    async fn call_gemini(
        &self,
        cfg: &GeminiConfig,
        req: &ToolCallRequest,
    ) -> Result<ToolCallResponse> {
        let mut payload = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [ { "text": req.user } ]
                }
            ],
            "tools": [{
                "functionDeclarations": [{
                    "name": req.function.name,
                    "description": req.function.description,
                    "parameters": req.function.parameters,
                }],
            }],
            "toolConfig": {
                "functionCallingConfig": {
                    "mode": "ANY",
                    "allowedFunctionNames": [req.function.name],
                },
            },
        });
        if let Some(system) = &req.system {
            payload["systemInstruction"] = json!({ "parts": [ { "text": system } ] });
        }
        let value = self
            .send_with_retry("gemini", || self.gemini_request(cfg, &payload))
            .await?;
        Ok(parse_gemini_response(&value))
    }

    /// The key travels in a header so it never shows up in a logged URL.
    fn gemini_request(&self, cfg: &GeminiConfig, payload: &Value) -> RequestBuilder {
        let url = format!(
            "{}/models/{}:generateContent",
            cfg.base_url.trim_end_matches('/'),
            self.model
        );
        self.http
            .post(url)
            .header("x-goog-api-key", &cfg.api_key)
            .json(payload)
    }

    async fn send_with_retry<F>(&self, label: &str, build: F) -> Result<Value>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match build().send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let err = err.without_url();
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| format!("{label} request failed"));
                    }
                    warn!(provider = label, attempt, error = %err, "request failed; retrying");
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("{label} rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                warn!(provider = label, attempt, wait_secs = wait.as_secs(), "rate limited");
                sleep(wait).await;
                continue;
            }
            return decode_body(label, response).await;
        }
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

async fn decode_body(label: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!("{label} returned error (status {status}): {body}"));
    }
    serde_json::from_str(&body).with_context(|| format!("failed to decode {label} response"))
}

fn parse_openai_response(value: &Value) -> ToolCallResponse {
    let call = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.pointer("/message/tool_calls"))
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(|call| call.get("function"))
        .and_then(|function| {
            let name = function.get("name")?.as_str()?.to_string();
            let args = match function.get("arguments") {
                Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
                Some(other) => other.clone(),
                None => Value::Null,
            };
            Some(FunctionCall { name, args })
        });
    ToolCallResponse {
        call,
        prompt_tokens: usage_field(value, "/usage/prompt_tokens"),
        completion_tokens: usage_field(value, "/usage/completion_tokens"),
    }
}

fn parse_anthropic_response(value: &Value) -> ToolCallResponse {
    let call = value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
        })
        .and_then(|block| {
            Some(FunctionCall {
                name: block.get("name")?.as_str()?.to_string(),
                args: block.get("input").cloned().unwrap_or(Value::Null),
            })
        });
    ToolCallResponse {
        call,
        prompt_tokens: usage_field(value, "/usage/input_tokens"),
        completion_tokens: usage_field(value, "/usage/output_tokens"),
    }
}

fn parse_gemini_response(value: &Value) -> ToolCallResponse {
    let call = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.pointer("/content/parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find_map(|part| part.get("functionCall")))
        .and_then(|call| {
            Some(FunctionCall {
                name: call.get("name")?.as_str()?.to_string(),
                args: call.get("args").cloned().unwrap_or(Value::Null),
            })
        });
    ToolCallResponse {
        call,
        prompt_tokens: usage_field(value, "/usageMetadata/promptTokenCount"),
        completion_tokens: usage_field(value, "/usageMetadata/candidatesTokenCount"),
    }
}

fn usage_field(value: &Value, pointer: &str) -> u32 {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32
}

fn call_local(req: &ToolCallRequest) -> ToolCallResponse {
    let question = extract_quoted(&req.user);
    let call = req
        .function
        .required_arguments()
        .first()
        .and_then(|argument| {
            let value = if *argument == "keyword" {
                longest_word(&question)?
            } else {
                let trimmed = question.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.to_string()
            };
            Some(FunctionCall {
                name: req.function.name.clone(),
                args: json!({ *argument: value }),
            })
        });
    ToolCallResponse {
        call,
        prompt_tokens: 0,
        completion_tokens: 0,
    }
}

fn extract_quoted(text: &str) -> String {
    match (text.find('"'), text.rfind('"')) {
        (Some(start), Some(end)) if end > start => text[start + 1..end].to_string(),
        _ => text.to_string(),
    }
}

fn longest_word(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().count() >= 3)
        .fold(None::<&str>, |best, word| match best {
            Some(current) if current.chars().count() >= word.chars().count() => Some(current),
            _ => Some(word),
        })
        .map(str::to_string)
}

fn read_api_key(var: &str) -> Result<String> {
    let value = env::var(var).map_err(|_| anyhow!("{var} is not set"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("{var} is empty"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_request(question: &str) -> ToolCallRequest {
        ToolCallRequest {
            system: None,
            user: format!("Convert the following question into a keyword:\n\n\"{question}\""),
            function: FunctionDeclaration::single_string_argument(
                "pattern_search",
                "keyword search",
                "keyword",
            ),
        }
    }

    #[test]
    fn declaration_requires_its_argument() {
        let decl = FunctionDeclaration::single_string_argument("f", "d", "query");
        assert_eq!(decl.required_arguments(), vec!["query"]);
        assert_eq!(decl.parameters["properties"]["query"]["type"], "string");
    }

    #[test]
    fn gemini_key_is_sent_as_header() {
        let client = LlmClient {
            http: Client::new(),
            provider: LlmProvider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            config: ProviderConfig::Local,
        };
        let cfg = GeminiConfig {
            api_key: "SECRET-KEY-123".to_string(),
            base_url: "http://127.0.0.1:1/v1beta/".to_string(),
        };
        let request = client
            .gemini_request(&cfg, &json!({ "contents": [] }))
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://127.0.0.1:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(!request.url().as_str().contains("SECRET"));
        assert_eq!(request.headers()["x-goog-api-key"], "SECRET-KEY-123");
    }

    #[tokio::test]
    async fn send_errors_do_not_carry_the_url() {
        let http = Client::new();
        let err = http
            .post("http://127.0.0.1:1/v1beta/models/m:generateContent?key=SECRET-KEY-123")
            .send()
            .await
            .unwrap_err()
            .without_url();
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }

    #[test]
    fn gemini_reads_first_function_call() {
        let value = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking" },
                    { "functionCall": { "name": "pattern_search", "args": { "keyword": "session" } } },
                    { "functionCall": { "name": "pattern_search", "args": { "keyword": "later" } } }
                ]}
            }],
            "usageMetadata": { "promptTokenCount": 21, "candidatesTokenCount": 4 }
        });
        let response = parse_gemini_response(&value);
        assert_eq!(response.total_tokens(), 25);
        let call = response.call.as_ref().unwrap();
        assert_eq!(call.string_arg("keyword"), Some("session"));
    }

    #[test]
    fn gemini_without_function_call_yields_none() {
        let value = json!({
            "candidates": [{ "content": { "parts": [ { "text": "I cannot help" } ] } }]
        });
        assert!(parse_gemini_response(&value).call.is_none());
        assert!(parse_gemini_response(&json!({})).call.is_none());
    }

    #[test]
    fn openai_arguments_are_decoded_from_string() {
        let value = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "type": "function",
                        "function": { "name": "semantic_search", "arguments": "{\"query\":\"auth flow\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 30, "completion_tokens": 7 }
        });
        let response = parse_openai_response(&value);
        assert_eq!(
            response.call.unwrap().string_arg("query"),
            Some("auth flow")
        );
        assert_eq!(response.prompt_tokens, 30);
    }

    #[test]
    fn openai_garbage_arguments_have_no_string_arg() {
        let value = json!({
            "choices": [{ "message": { "tool_calls": [{
                "function": { "name": "semantic_search", "arguments": "{not json" }
            }]}}]
        });
        let call = parse_openai_response(&value).call.unwrap();
        assert_eq!(call.string_arg("query"), None);
    }

    #[test]
    fn anthropic_finds_tool_use_block() {
        let value = json!({
            "content": [
                { "type": "text", "text": "Sure" },
                { "type": "tool_use", "name": "pattern_search", "input": { "keyword": "retry" } }
            ],
            "usage": { "input_tokens": 10, "output_tokens": 3 }
        });
        let response = parse_anthropic_response(&value);
        assert_eq!(response.call.unwrap().string_arg("keyword"), Some("retry"));
        assert_eq!(response.completion_tokens, 3);
    }

    #[test]
    fn local_provider_picks_longest_word_for_keywords() {
        let response = call_local(&keyword_request("Where is the session refreshed?"));
        let call = response.call.unwrap();
        assert_eq!(call.name, "pattern_search");
        assert_eq!(call.string_arg("keyword"), Some("refreshed"));
    }

    #[test]
    fn local_provider_passes_query_through() {
        let mut req = keyword_request("  how is auth handled  ");
        req.function = FunctionDeclaration::single_string_argument("semantic_search", "d", "query");
        let call = call_local(&req).call.unwrap();
        assert_eq!(call.string_arg("query"), Some("how is auth handled"));
    }

    #[test]
    fn local_provider_declines_blank_questions() {
        assert!(call_local(&keyword_request("?? !")).call.is_none());
    }

    #[test]
    fn backoff_honors_retry_after() {
        let header = HeaderValue::from_static("7");
        assert_eq!(backoff_delay(1, Some(&header)), Duration::from_secs(7));
        assert_eq!(backoff_delay(2, None), Duration::from_secs(4));
        assert_eq!(backoff_delay(40, None), Duration::from_secs(64));
    }

    #[test]
    fn provider_names_round_trip() {
        for provider in [
            LlmProvider::OpenAi,
            LlmProvider::Anthropic,
            LlmProvider::Gemini,
            LlmProvider::Deepseek,
            LlmProvider::Local,
        ] {
            assert_eq!(LlmProvider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(LlmProvider::parse("mistral"), None);
    }
}
