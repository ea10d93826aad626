//! Scripted provider doubles with call counting and failure injection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use prodsearch_core::{
    EmbeddingProvider, Error, Label, LabelDetector, LanguageModel, MediaType, Result, VisionLanguageProvider,
};
use prodsearch_embed::HashEmbedder;

fn take_failure(counter: &AtomicUsize) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

/// Hash embedder that records the texts it is asked to embed.
pub struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    fail_next: AtomicUsize,
    unavailable: AtomicBool,
    texts: Mutex<Vec<String>>,
}

impl CountingEmbedder {
    pub fn new(dim: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(dim),
            calls: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        if self.unavailable.load(Ordering::SeqCst) || take_failure(&self.fail_next) {
            return Err(Error::Upstream("embedding service unavailable".into()));
        }
        Ok(self.inner.embed_sync(text))
    }
}

/// Returns a fixed reply, or fails every call when built with [`ScriptedVision::failing`].
pub struct ScriptedVision {
    reply: Option<String>,
    calls: AtomicUsize,
    media: Mutex<Vec<MediaType>>,
    budgets: Mutex<Vec<u32>>,
}

impl ScriptedVision {
    fn build(reply: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            media: Mutex::new(Vec::new()),
            budgets: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Self::build(Some(reply.into()))
    }

    pub fn failing() -> Arc<Self> {
        Self::build(None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn media_types(&self) -> Vec<MediaType> {
        self.media.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// MIME types the image was sent as, one per call.
    pub fn mime_types(&self) -> Vec<&'static str> {
        self.media_types().iter().map(MediaType::mime).collect()
    }

    /// Output token budgets requested, one per call.
    pub fn budgets(&self) -> Vec<u32> {
        self.budgets.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisionLanguageProvider for ScriptedVision {
    async fn invoke(&self, _image: &[u8], media_type: MediaType, _prompt: &str, max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut media) = self.media.lock() {
            media.push(media_type);
        }
        if let Ok(mut budgets) = self.budgets.lock() {
            budgets.push(max_tokens);
        }
        self.reply.clone().ok_or_else(|| Error::Upstream("vision model timed out".into()))
    }
}

pub struct ScriptedModel {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    budgets: Mutex<Vec<u32>>,
}

impl ScriptedModel {
    fn build(reply: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            budgets: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Self::build(Some(reply.into()))
    }

    pub fn failing() -> Arc<Self> {
        Self::build(None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn budgets(&self) -> Vec<u32> {
        self.budgets.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Ok(mut budgets) = self.budgets.lock() {
            budgets.push(max_tokens);
        }
        self.reply.clone().ok_or_else(|| Error::Upstream("language model unavailable".into()))
    }
}

/// Reports the same labels for every image.
pub struct StaticLabels {
    labels: Option<Vec<Label>>,
    calls: AtomicUsize,
}

impl StaticLabels {
    pub fn new(labels: Vec<Label>) -> Arc<Self> {
        Arc::new(Self { labels: Some(labels), calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { labels: None, calls: AtomicUsize::new(0) })
    }

    /// Parses `Name:confidence` pairs separated by commas, e.g. `Sofa:95,Blue:88`.
    /// A missing confidence reads as 100.
    pub fn parse(spec: &str) -> Result<Vec<Label>> {
        spec.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|pair| match pair.rsplit_once(':') {
                Some((name, conf)) => conf
                    .trim()
                    .parse::<f32>()
                    .map(|c| Label::new(name.trim(), c))
                    .map_err(|e| Error::Validation(format!("bad label confidence in '{pair}': {e}"))),
                None => Ok(Label::new(pair, 100.0)),
            })
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LabelDetector for StaticLabels {
    async fn detect(&self, _image: &[u8]) -> Result<Vec<Label>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.labels.clone().ok_or_else(|| Error::Upstream("label detection unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_spec_parses_pairs() {
        let labels = StaticLabels::parse("Sofa:95, Blue:88.5,Furniture").expect("parse");
        assert_eq!(labels, vec![Label::new("Sofa", 95.0), Label::new("Blue", 88.5), Label::new("Furniture", 100.0)]);
        assert!(StaticLabels::parse("Sofa:high").is_err());
    }

    #[tokio::test]
    async fn embedder_failures_are_counted_and_consumed() {
        let e = CountingEmbedder::new(8);
        e.fail_next(1);
        assert!(e.embed("a").await.is_err());
        assert_eq!(e.embed("b").await.expect("embed").len(), 8);
        assert_eq!(e.calls(), 2);
        assert_eq!(e.texts(), ["a", "b"]);
    }

    #[tokio::test]
    async fn vision_records_mime_type_and_budget() {
        let vision = ScriptedVision::replying("{}");
        let jpeg = [0xff, 0xd8, 0xff, 0xe0];
        vision.invoke(&jpeg, MediaType::sniff(&jpeg), "describe", 512).await.expect("invoke");
        assert_eq!(vision.mime_types(), ["image/jpeg"]);
        assert_eq!(vision.budgets(), [512]);
    }
}
