use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use ctxbench_core::TokenizerKind;
use ctxbench_index::{CrawlConfig, FixedDelay, IndexerConfig, Pacer, RateLimiter};
use ctxbench_llm::LlmProvider;
use serde::Deserialize;

pub const DEFAULT_GROUP_TAG: &str = "repo-benchmark";
pub const DEFAULT_SOURCE: &str = "ctxbench";

#[derive(Debug, Clone)]
pub struct BenchEnv {
    pub provider: LlmProvider,
    pub model: String,
    pub tokenizer: TokenizerKind,
}

impl BenchEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider_name = lookup("CTXBENCH_PROVIDER").unwrap_or_else(|| "gemini".to_string());
        let provider = LlmProvider::parse(&provider_name)
            .ok_or_else(|| anyhow!("unknown provider {provider_name}"))?;
        let model = lookup("CTXBENCH_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());
        let tokenizer = match lookup("CTXBENCH_TOKENIZER") {
            Some(name) => TokenizerKind::parse(&name)?,
            None => TokenizerKind::default(),
        };
        Ok(Self {
            provider,
            model,
            tokenizer,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Index,
    Pattern,
    Semantic,
    Compare,
}

fn default_stages() -> Vec<Stage> {
    vec![Stage::Pattern, Stage::Semantic, Stage::Compare]
}

fn default_repo_root() -> String {
    ".".to_string()
}

fn default_queries() -> String {
    "queries.json".to_string()
}

fn default_pattern_dir() -> String {
    "results/pattern".to_string()
}

fn default_semantic_dir() -> String {
    "results/semantic".to_string()
}

fn default_comparison() -> String {
    "comparison.json".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_repo_root")]
    pub repo_root: String,
    #[serde(default = "default_queries")]
    pub queries: String,
    #[serde(default = "default_pattern_dir")]
    pub pattern_dir: String,
    #[serde(default = "default_semantic_dir")]
    pub semantic_dir: String,
    #[serde(default = "default_comparison")]
    pub comparison: String,
    #[serde(default)]
    pub summary_out: Option<String>,
    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub index: IndexSettings,
}

impl RunConfig {
    pub fn wants(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

fn default_tag() -> String {
    DEFAULT_GROUP_TAG.to_string()
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_batch_size() -> usize {
    ctxbench_index::DEFAULT_BATCH_SIZE
}

fn default_batch_delay_ms() -> u64 {
    ctxbench_index::DEFAULT_BATCH_DELAY.as_millis() as u64
}

fn default_extensions() -> Vec<String> {
    ctxbench_index::DEFAULT_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Indexer knobs shared by the `index` subcommand and the run file.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSettings {
    /// Falls back to the run's `repo_root` when absent.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitSettings {
    pub max_requests: usize,
    pub interval_ms: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            root: None,
            tag: default_tag(),
            source: default_source(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            extensions: default_extensions(),
            rate_limit: None,
        }
    }
}

impl IndexSettings {
    pub fn crawl_config(&self, fallback_root: &str) -> CrawlConfig {
        let root = self.root.as_deref().unwrap_or(fallback_root);
        CrawlConfig::new(root, self.tag.clone()).with_extensions(&self.extensions)
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig::new(self.source.clone()).with_batch_size(self.batch_size)
    }

    /// A rate limit replaces the fixed pause between batches.
    pub fn pacer(&self) -> Box<dyn Pacer> {
        match self.rate_limit {
            Some(limit) => Box::new(RateLimiter::new(
                limit.max_requests,
                Duration::from_millis(limit.interval_ms),
            )),
            None => Box::new(FixedDelay::new(Duration::from_millis(self.batch_delay_ms))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_defaults_to_gemini_and_cl100k() {
        let env = BenchEnv::from_lookup(lookup(&[])).unwrap();
        assert_eq!(env.provider, LlmProvider::Gemini);
        assert_eq!(env.model, "gemini-2.5-flash");
        assert_eq!(env.tokenizer, TokenizerKind::Cl100k);
    }

    #[test]
    fn env_overrides_are_honored() {
        let env = BenchEnv::from_lookup(lookup(&[
            ("CTXBENCH_PROVIDER", "OpenAI"),
            ("CTXBENCH_MODEL", "gpt-4o-mini"),
            ("CTXBENCH_TOKENIZER", "o200k_base"),
        ]))
        .unwrap();
        assert_eq!(env.provider, LlmProvider::OpenAi);
        assert_eq!(env.model, "gpt-4o-mini");
        assert_eq!(env.tokenizer, TokenizerKind::O200k);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = BenchEnv::from_lookup(lookup(&[("CTXBENCH_PROVIDER", "bard")])).unwrap_err();
        assert!(err.to_string().contains("bard"));
    }

    #[test]
    fn run_config_fills_defaults() {
        let cfg: RunConfig = serde_yaml::from_str("repo_root: ./repo\n").unwrap();
        assert_eq!(cfg.queries, "queries.json");
        assert_eq!(cfg.stages, default_stages());
        assert!(!cfg.wants(Stage::Index));
        assert_eq!(cfg.index.batch_size, 5);
        assert_eq!(cfg.index.batch_delay_ms, 3000);
        assert_eq!(cfg.index.crawl_config(&cfg.repo_root).root.to_str(), Some("./repo"));
    }

    #[test]
    fn run_config_parses_index_section() {
        let raw = "stages: [index, compare]\nindex:\n  root: ./corpus\n  batch_size: 2\n  extensions: [md]\n  rate_limit:\n    max_requests: 10\n    interval_ms: 60000\n";
        let cfg: RunConfig = serde_yaml::from_str(raw).unwrap();
        assert!(cfg.wants(Stage::Index));
        assert!(!cfg.wants(Stage::Pattern));
        let crawl = cfg.index.crawl_config(&cfg.repo_root);
        assert_eq!(crawl.root.to_str(), Some("./corpus"));
        assert_eq!(crawl.extensions, vec!["md"]);
        assert_eq!(
            cfg.index.rate_limit,
            Some(RateLimitSettings {
                max_requests: 10,
                interval_ms: 60_000
            })
        );
    }
}
