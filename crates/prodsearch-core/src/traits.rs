use async_trait::async_trait;

use crate::error::Result;
use crate::types::{KnnQuery, KnnResponse, Label, LexicalQuery, LexicalResponse, MediaType};

/// Text to fixed-width vector. Every vector in the system has width `dim()`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Image plus prompt to free text, expected to be JSON-parseable. The reply
/// is capped at `max_tokens` output tokens.
#[async_trait]
pub trait VisionLanguageProvider: Send + Sync {
    async fn invoke(&self, image: &[u8], media_type: MediaType, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Prompt to free text, capped at `max_tokens` output tokens.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

#[async_trait]
pub trait LabelDetector: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Label>>;
}

/// The product index. Treated as a black box returning scored hits and aggregation buckets.
#[async_trait]
pub trait IndexService: Send + Sync {
    async fn search(&self, query: &LexicalQuery) -> Result<LexicalResponse>;
    async fn knn_search(&self, query: &KnnQuery) -> Result<KnnResponse>;
}
