use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use prodsearch_core::json::parse_model_json;
use prodsearch_core::{Language, LanguageModel, Result, RetryExecutor, SearchConstraints, VisionDescription};

use crate::normalize::RawConstraints;
use crate::{Extracted, IntentStrategy};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIntent {
    detected_language: Option<String>,
    visual_reference: Option<String>,
    constraints: Option<RawConstraints>,
}

/// Asks a language model to read the query.
pub struct LlmIntentStrategy {
    model: Arc<dyn LanguageModel>,
    retry: RetryExecutor,
    max_tokens: u32,
}

impl LlmIntentStrategy {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryExecutor, max_tokens: u32) -> Self {
        Self { model, retry, max_tokens }
    }

    async fn attempt(&self, prompt: &str) -> Result<Extracted> {
        let text = self.model.invoke(prompt, self.max_tokens).await?;
        let raw: RawIntent = parse_model_json(&text)?;
        Ok(Extracted {
            detected_language: raw.detected_language.as_deref().and_then(Language::parse).unwrap_or_default(),
            visual_reference: raw.visual_reference.filter(|v| !v.trim().is_empty()),
            constraints: raw.constraints.map(SearchConstraints::from).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl IntentStrategy for LlmIntentStrategy {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(&self, query: &str, vision: Option<&VisionDescription>) -> Result<Extracted> {
        let prompt = build_prompt(query, vision);
        self.retry.run("extract_intent", || self.attempt(&prompt)).await
    }
}

pub fn build_prompt(query: &str, vision: Option<&VisionDescription>) -> String {
    let mut prompt = format!(
        "Read this shopping search query and extract structured search parameters.\n\nQuery: \"{query}\"\n"
    );
    if let Some(v) = vision {
        prompt.push_str(&format!(
            "\nThe shopper also uploaded an image:\n- Description: {}\n- Dominant colors: {}\n\
             - Style keywords: {}\n- Suggested category: {}\n",
            v.description,
            v.dominant_colors.join(", "),
            v.style_keywords.join(", "),
            v.suggested_category,
        ));
    }
    prompt.push_str(PROMPT_RULES);
    prompt
}

const PROMPT_RULES: &str = r#"
Reply with a JSON object:
{
  "detected_language": "en" | "zh" | "mixed",
  "visual_reference": "the visual style being sought, or null",
  "constraints": {
    "colors": ["colors mentioned or implied"],
    "price_min": number or null,
    "price_max": number or null,
    "materials": ["materials mentioned"],
    "categories": ["product categories"],
    "styles": ["style preferences"],
    "size_constraints": "size requirements, or null"
  }
}

Rules:
1. Queries may be English, Chinese, or both.
2. Chinese price phrases:
   - "1000以下" or "1000元以下" means price_max 1000
   - "500以上" or "500元以上" means price_min 500
   - "500到1000" or "500-1000元" means price_min 500 and price_max 1000
   - "1000左右" means price_min 800 and price_max 1200 (about 20% either side)
3. English price phrases:
   - "under $100" or "below 100" means price_max 100
   - "above $50" or "over 50" means price_min 50
   - "between $50 and $100" means price_min 50 and price_max 100
   - "around $100" means price_min 80 and price_max 120 (about 20% either side)
4. Give colors in standard English form, so "蓝色" becomes "blue".
5. When the query points at the image ("like this", "similar to this", "这样的"), fill in visual_reference.
6. Return only the JSON object, without markdown or commentary."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_query_and_image_context() {
        let vision = VisionDescription {
            description: "a walnut side table".into(),
            dominant_colors: vec!["brown".into()],
            style_keywords: vec!["rustic".into(), "solid wood".into()],
            suggested_category: "tables".into(),
        };
        let p = build_prompt("像这样的 but smaller", Some(&vision));
        assert!(p.contains("Query: \"像这样的 but smaller\""));
        assert!(p.contains("Style keywords: rustic, solid wood"));
        assert!(p.contains("1000左右"));
        assert!(!build_prompt("lamp", None).contains("uploaded an image"));
    }
}
