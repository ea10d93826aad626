//! Structured image description with an ordered chain of strategies.
//!
//! The describer asks each strategy in turn and returns the first success.
//! With the default wiring that is the vision-language model first and the
//! label detector second.

mod strategies;

use std::sync::Arc;
use tracing::warn;

use prodsearch_core::config::Settings;
use prodsearch_core::{
    Error, LabelDetector, Result, RetryExecutor, RetryPolicy, VisionDescription, VisionLanguageProvider,
};

pub use strategies::{DescribeStrategy, LabelStrategy, VisionLanguageStrategy, DESCRIBE_PROMPT, UNABLE_TO_ANALYZE};

/// A description plus the strategy that produced it.
#[derive(Debug, Clone)]
pub struct Described {
    pub description: VisionDescription,
    pub strategy: &'static str,
    /// True when an earlier strategy in the chain failed.
    pub degraded: bool,
}

pub struct VisionDescriber {
    strategies: Vec<Box<dyn DescribeStrategy>>,
}

impl VisionDescriber {
    pub fn new(strategies: Vec<Box<dyn DescribeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Vision-language model first, label detector as fallback. Either may be absent.
    pub fn from_providers(
        vision: Option<Arc<dyn VisionLanguageProvider>>,
        labels: Option<Arc<dyn LabelDetector>>,
        settings: &Settings,
    ) -> Self {
        let retry = RetryExecutor::new(RetryPolicy::from_settings(&settings.retry));
        let mut strategies: Vec<Box<dyn DescribeStrategy>> = Vec::new();
        if let Some(p) = vision {
            strategies.push(Box::new(VisionLanguageStrategy::new(p, retry, settings.vision.max_tokens)));
        }
        if let Some(d) = labels {
            strategies.push(Box::new(LabelStrategy::new(d, retry, settings.vision.clone())));
        }
        Self::new(strategies)
    }

    pub async fn describe(&self, image: &[u8]) -> Result<VisionDescription> {
        self.describe_traced(image).await.map(|d| d.description)
    }

    pub async fn describe_traced(&self, image: &[u8]) -> Result<Described> {
        let mut last_err = Error::NotConfigured("no image description strategy is configured".into());
        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.describe(image).await {
                Ok(description) => return Ok(Described { description, strategy: strategy.name(), degraded: i > 0 }),
                Err(e) => {
                    if let Some(next) = self.strategies.get(i + 1) {
                        warn!(
                            failed = strategy.name(),
                            next = next.name(),
                            error = %e,
                            "image description falling back"
                        );
                    }
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
