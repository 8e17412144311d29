use tiktoken_rs::CoreBPE;

use crate::error::{BenchError, Result};

/// BPE vocabulary used to price retrieval output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenizerKind {
    #[default]
    Cl100k,
    O200k,
    P50k,
}

impl TokenizerKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "cl100k" | "cl100k_base" | "gpt-4" | "gpt4" => Ok(TokenizerKind::Cl100k),
            "o200k" | "o200k_base" => Ok(TokenizerKind::O200k),
            "p50k" | "p50k_base" | "gpt2" => Ok(TokenizerKind::P50k),
            other => Err(BenchError::UnknownTokenizer(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenizerKind::Cl100k => "cl100k",
            TokenizerKind::O200k => "o200k",
            TokenizerKind::P50k => "p50k",
        }
    }

    pub fn build(&self) -> Result<CoreBPE> {
        let built = match self {
            TokenizerKind::Cl100k => tiktoken_rs::cl100k_base(),
            TokenizerKind::O200k => tiktoken_rs::o200k_base(),
            TokenizerKind::P50k => tiktoken_rs::p50k_base(),
        };
        built.map_err(|e| BenchError::Tokenizer(e.to_string()))
    }
}

/// Counts tokens with one vocabulary for the whole run so both backends are
/// priced identically.
pub struct TokenCounter {
    kind: TokenizerKind,
    bpe: CoreBPE,
}

impl TokenCounter {
    pub fn new(kind: TokenizerKind) -> Result<Self> {
        Ok(Self {
            kind,
            bpe: kind.build()?,
        })
    }

    pub fn kind(&self) -> TokenizerKind {
        self.kind
    }

    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}
