//! Query intent: structured constraints and language from free text.
//!
//! Strategies are tried in order (language model, then rules). Whatever
//! produced the constraints, they are normalized the same way before the
//! intent is returned. Parsing never fails: when every strategy errors the
//! plain rule-based reading is used.

mod language;
mod llm;
mod normalize;
mod price;
mod rules;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use prodsearch_core::config::Settings;
use prodsearch_core::{
    Language, LanguageModel, Result, RetryExecutor, RetryPolicy, SearchConstraints, SearchIntent, SearchMode,
    VisionDescription, UNKNOWN,
};

pub use language::detect_language;
pub use llm::{build_prompt, LlmIntentStrategy};
pub use normalize::normalize_constraints;
pub use price::extract_price_range;
pub use rules::RuleBasedStrategy;

/// What a strategy read from a query, before normalization.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub detected_language: Language,
    pub visual_reference: Option<String>,
    pub constraints: SearchConstraints,
}

#[async_trait]
pub trait IntentStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn extract(&self, query: &str, vision: Option<&VisionDescription>) -> Result<Extracted>;
}

#[derive(Debug, Clone)]
pub struct ParsedIntent {
    pub intent: SearchIntent,
    /// `vision` when constraints were seeded from the image alone.
    pub strategy: &'static str,
    pub degraded: bool,
}

pub struct IntentParser {
    strategies: Vec<Box<dyn IntentStrategy>>,
    last_resort: RuleBasedStrategy,
}

impl IntentParser {
    pub fn new(strategies: Vec<Box<dyn IntentStrategy>>) -> Self {
        Self { strategies, last_resort: RuleBasedStrategy::default() }
    }

    pub fn from_providers(model: Option<Arc<dyn LanguageModel>>, settings: &Settings) -> Self {
        let rules = RuleBasedStrategy::new(settings.intent.rule_based_prices);
        let mut strategies: Vec<Box<dyn IntentStrategy>> = Vec::new();
        if let Some(m) = model {
            let retry = RetryExecutor::new(RetryPolicy::from_settings(&settings.retry));
            strategies.push(Box::new(LlmIntentStrategy::new(m, retry, settings.intent.max_tokens)));
        }
        strategies.push(Box::new(rules));
        Self { strategies, last_resort: rules }
    }

    pub async fn parse(&self, query: &str, vision: Option<&VisionDescription>) -> SearchIntent {
        self.parse_traced(query, vision).await.intent
    }

    pub async fn parse_traced(&self, query: &str, vision: Option<&VisionDescription>) -> ParsedIntent {
        let has_query = !query.trim().is_empty();
        let search_mode = SearchMode::classify(has_query, vision.is_some()).unwrap_or(SearchMode::TextOnly);
        let finish = |e: Extracted, strategy: &'static str, degraded: bool| ParsedIntent {
            intent: SearchIntent {
                original_query: query.to_string(),
                detected_language: e.detected_language,
                visual_reference: e.visual_reference,
                constraints: normalize_constraints(e.constraints),
                search_mode,
            },
            strategy,
            degraded,
        };

        if !has_query {
            return match vision {
                Some(v) => finish(seed_from_vision(v), "vision", false),
                None => finish(self.last_resort.extract_now(query, None), "rules", false),
            };
        }

        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.extract(query, vision).await {
                Ok(e) => return finish(e, strategy.name(), i > 0),
                Err(e) => {
                    let next = self.strategies.get(i + 1).map_or("rules", |s| s.name());
                    warn!(failed = strategy.name(), next, error = %e, "intent extraction falling back");
                }
            }
        }
        let degraded = !self.strategies.is_empty();
        finish(self.last_resort.extract_now(query, vision), "rules", degraded)
    }
}

fn not_unknown(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.trim().eq_ignore_ascii_case(UNKNOWN)).cloned().collect()
}

/// Constraints for an image with no accompanying text. The `unknown`
/// sentinel never becomes a constraint.
fn seed_from_vision(v: &VisionDescription) -> Extracted {
    let categories = not_unknown(std::slice::from_ref(&v.suggested_category));
    Extracted {
        detected_language: Language::En,
        visual_reference: Some(v.description.clone()).filter(|d| !d.is_empty()),
        constraints: SearchConstraints {
            colors: Some(not_unknown(&v.dominant_colors)),
            styles: Some(not_unknown(&v.style_keywords)),
            categories: Some(categories),
            ..SearchConstraints::default()
        },
    }
}
