use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use prodsearch_core::config::Settings;
use prodsearch_core::{Error, Language, LanguageModel, Result, SearchMode, VisionDescription};
use prodsearch_intent::IntentParser;

struct ScriptedModel {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    budgets: Mutex<Vec<u32>>,
}

impl ScriptedModel {
    fn build(reply: Option<String>) -> Arc<Self> {
        Arc::new(Self { reply, calls: AtomicUsize::new(0), prompts: Mutex::new(vec![]), budgets: Mutex::new(vec![]) })
    }

    fn replying(reply: &str) -> Arc<Self> {
        Self::build(Some(reply.into()))
    }

    fn failing() -> Arc<Self> {
        Self::build(None)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("lock").push(prompt.to_string());
        self.budgets.lock().expect("lock").push(max_tokens);
        self.reply.clone().ok_or_else(|| Error::Upstream("model unavailable".into()))
    }
}

fn settings() -> Settings {
    let mut s = Settings::default();
    s.retry.base_delay_ms = 5;
    s
}

fn chair() -> VisionDescription {
    VisionDescription {
        description: "Image containing: Chair, Red".into(),
        dominant_colors: vec!["Red".into()],
        style_keywords: vec!["Chair".into(), "unknown".into()],
        suggested_category: "unknown".into(),
    }
}

#[tokio::test]
async fn model_reply_is_normalized() {
    let model = ScriptedModel::replying(
        r#"```json
{"detected_language": "zh", "visual_reference": null,
 "constraints": {"colors": [" Blue "], "price_min": 1000, "price_max": 500,
                 "materials": ["Velvet", ""], "size_constraints": " 3 seats "}}
```"#,
    );
    let parser = IntentParser::from_providers(Some(model.clone()), &settings());

    let parsed = parser.parse_traced("蓝色丝绒沙发 500到1000", None).await;

    assert_eq!(parsed.strategy, "llm");
    assert!(!parsed.degraded);
    let intent = parsed.intent;
    assert_eq!(intent.search_mode, SearchMode::TextOnly);
    assert_eq!(intent.detected_language, Language::Zh);
    assert_eq!(intent.original_query, "蓝色丝绒沙发 500到1000");
    assert_eq!(intent.constraints.colors, Some(vec!["blue".to_string()]));
    assert_eq!(intent.constraints.materials, Some(vec!["velvet".to_string()]));
    assert_eq!(intent.constraints.price_min, Some(500.0));
    assert_eq!(intent.constraints.price_max, Some(1000.0));
    assert_eq!(intent.constraints.size_text.as_deref(), Some("3 seats"));
    assert_eq!(model.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn model_failure_falls_back_to_rules() {
    let model = ScriptedModel::failing();
    let parser = IntentParser::from_providers(Some(model.clone()), &settings());

    let parsed = parser.parse_traced("red chair 1000以下", Some(&chair())).await;

    assert_eq!(model.calls(), 3);
    assert_eq!(parsed.strategy, "rules");
    assert!(parsed.degraded);
    let intent = parsed.intent;
    assert_eq!(intent.detected_language, Language::Mixed);
    assert!(intent.constraints.is_empty());
    assert_eq!(intent.visual_reference.as_deref(), Some("Image containing: Chair, Red"));
    assert_eq!(intent.search_mode, SearchMode::MixedModal);
}

#[tokio::test(start_paused = true)]
async fn prose_reply_counts_as_failure() {
    let model = ScriptedModel::replying("The user wants a sofa.");
    let parser = IntentParser::from_providers(Some(model.clone()), &settings());
    let parsed = parser.parse_traced("sofa", None).await;
    assert_eq!(parsed.strategy, "rules");
    assert_eq!(parsed.intent.detected_language, Language::En);
}

#[tokio::test(start_paused = true)]
async fn rule_based_prices_when_enabled() {
    let mut s = settings();
    s.intent.rule_based_prices = true;
    let parser = IntentParser::from_providers(Some(ScriptedModel::failing()), &s);
    let intent = parser.parse("沙发1000左右", None).await;
    assert_eq!(intent.constraints.price_min, Some(800.0));
    assert_eq!(intent.constraints.price_max, Some(1200.0));
}

#[tokio::test]
async fn image_only_seeds_constraints_without_calling_the_model() {
    let model = ScriptedModel::replying("{}");
    let parser = IntentParser::from_providers(Some(model.clone()), &settings());

    let intent = parser.parse("   ", Some(&chair())).await;

    assert_eq!(model.calls(), 0);
    assert_eq!(intent.search_mode, SearchMode::ImageOnly);
    assert_eq!(intent.detected_language, Language::En);
    assert_eq!(intent.constraints.colors, Some(vec!["red".to_string()]));
    assert_eq!(intent.constraints.styles, Some(vec!["chair".to_string()]));
    assert_eq!(intent.constraints.categories, None);
    assert_eq!(intent.visual_reference.as_deref(), Some("Image containing: Chair, Red"));
}

#[tokio::test]
async fn empty_query_without_image_is_an_empty_intent() {
    let model = ScriptedModel::replying("{}");
    let parser = IntentParser::from_providers(Some(model.clone()), &settings());
    let intent = parser.parse("", None).await;
    assert_eq!(model.calls(), 0);
    assert!(intent.constraints.is_empty());
    assert_eq!(intent.search_mode, SearchMode::TextOnly);
}

#[tokio::test]
async fn mixed_prompt_includes_image_context() {
    let model = ScriptedModel::replying(
        r#"{"detected_language": "en", "visual_reference": "red accent chair", "constraints": {}}"#,
    );
    let parser = IntentParser::from_providers(Some(model.clone()), &settings());

    let intent = parser.parse("like this but blue", Some(&chair())).await;

    assert_eq!(intent.visual_reference.as_deref(), Some("red accent chair"));
    assert_eq!(intent.search_mode, SearchMode::MixedModal);
    let prompts = model.prompts.lock().expect("lock");
    assert!(prompts[0].contains("Dominant colors: Red"));
}

#[tokio::test]
async fn parse_is_idempotent_on_normalized_constraints() {
    let reply =
        r#"{"detected_language": "en", "constraints": {"colors": ["blue"], "price_min": 100, "price_max": 200}}"#;
    let parser = IntentParser::from_providers(Some(ScriptedModel::replying(reply)), &settings());
    let first = parser.parse("blue lamp", None).await;
    let second = parser.parse("blue lamp", None).await;
    assert_eq!(first, second);
    assert_eq!(prodsearch_intent::normalize_constraints(first.constraints.clone()), first.constraints);
}

#[tokio::test]
async fn configured_token_budget_reaches_the_model() {
    let model = ScriptedModel::replying(r#"{"detected_language": "en", "constraints": {}}"#);
    let mut s = settings();
    s.intent.max_tokens = 300;
    let parser = IntentParser::from_providers(Some(model.clone()), &s);

    parser.parse("oak table", None).await;

    assert_eq!(model.budgets.lock().expect("lock").as_slice(), [300]);
}
