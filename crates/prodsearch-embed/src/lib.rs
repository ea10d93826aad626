//! Embedding gateway: text, image and batch embeddings over an external provider.

mod hash;

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use prodsearch_core::config::Settings;
use prodsearch_core::labels::select_labels;
use prodsearch_core::{EmbeddingProvider, Error, Label, LabelDetector, Result, RetryExecutor, RetryPolicy};

pub use hash::HashEmbedder;

/// Prefix of the sentence embedded in place of an image.
pub const IMAGE_TEXT_PREFIX: &str = "Image containing: ";

/// Vector for an image together with the labels it was derived from.
#[derive(Debug, Clone)]
pub struct ImageEmbedding {
    pub vector: Vec<f32>,
    pub labels: Vec<Label>,
}

pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    labels: Option<Arc<dyn LabelDetector>>,
    retry: RetryExecutor,
    batch_concurrency: usize,
    min_label_confidence: f32,
    max_labels: usize,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::from_settings(provider, &Settings::default())
    }

    pub fn from_settings(provider: Arc<dyn EmbeddingProvider>, settings: &Settings) -> Self {
        Self {
            provider,
            labels: None,
            retry: RetryExecutor::new(RetryPolicy::from_settings(&settings.retry)),
            batch_concurrency: settings.embedding.batch_concurrency.max(1),
            min_label_confidence: settings.vision.min_label_confidence,
            max_labels: settings.vision.max_labels,
        }
    }

    pub fn with_label_detector(mut self, detector: Arc<dyn LabelDetector>) -> Self {
        self.labels = Some(detector);
        self
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn dim(&self) -> usize {
        self.provider.dim()
    }

    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.retry.run("embed_text", || self.embed_once(text)).await
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let v = self.provider.embed(text).await?;
        let dim = self.provider.dim();
        if v.len() != dim {
            return Err(Error::Upstream(format!("embedding has {} dimensions, expected {}", v.len(), dim)));
        }
        Ok(v)
    }

    /// Embeds an image through its detected labels.
    ///
    /// Label detection and the text embedding each get their own retry budget.
    pub async fn embed_image(&self, bytes: &[u8]) -> Result<ImageEmbedding> {
        let detector = self
            .labels
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("label detector is not configured".into()))?;
        let raw = self.retry.run("detect_labels", || detector.detect(bytes)).await?;
        let labels = select_labels(raw, self.min_label_confidence, self.max_labels);
        let text = image_text(&labels);
        debug!(labels = labels.len(), "embedding image through labels");
        let vector = self.embed_text(&text).await?;
        Ok(ImageEmbedding { vector, labels })
    }

    /// Embeds `texts` in order, with at most `batch_concurrency` calls in flight.
    pub async fn embed_text_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_concurrency) {
            let vectors = try_join_all(chunk.iter().map(|t| self.embed_text(t))).await?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Sentence standing in for an image: the label names after [`IMAGE_TEXT_PREFIX`].
pub fn image_text(labels: &[Label]) -> String {
    let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
    format!("{IMAGE_TEXT_PREFIX}{}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_text_lists_label_names() {
        let labels = vec![Label::new("Chair", 95.0), Label::new("Wood", 80.0)];
        assert_eq!(image_text(&labels), "Image containing: Chair, Wood");
    }
}
