use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use prodsearch_core::config::VisionSettings;
use prodsearch_core::json::parse_model_json;
use prodsearch_core::labels::select_labels;
use prodsearch_core::{
    LabelDetector, MediaType, Result, RetryExecutor, VisionDescription, VisionLanguageProvider, UNKNOWN,
};

/// One way of turning an image into a [`VisionDescription`].
#[async_trait]
pub trait DescribeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn describe(&self, image: &[u8]) -> Result<VisionDescription>;
}

pub const DESCRIBE_PROMPT: &str = r#"Describe this image for product search.

The shopper wants products that look like what is shown.

Reply with JSON of this shape:
{
  "description": "short description of the main subject, suitable for search matching",
  "dominant_colors": ["dominant colors in the image"],
  "style_keywords": ["words for the style, aesthetic or design"],
  "suggested_category": "most likely product category"
}

Return only the JSON object, without markdown or commentary."#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDescription {
    description: Option<String>,
    dominant_colors: serde_json::Value,
    style_keywords: serde_json::Value,
    suggested_category: Option<String>,
}

/// String entries of a JSON array; anything else reads as empty.
fn string_list(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl From<RawDescription> for VisionDescription {
    fn from(raw: RawDescription) -> Self {
        Self {
            description: raw.description.unwrap_or_default(),
            dominant_colors: string_list(raw.dominant_colors),
            style_keywords: string_list(raw.style_keywords),
            suggested_category: raw
                .suggested_category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Sends the image and a fixed prompt to a vision-language model.
pub struct VisionLanguageStrategy {
    provider: Arc<dyn VisionLanguageProvider>,
    retry: RetryExecutor,
    max_tokens: u32,
}

impl VisionLanguageStrategy {
    pub fn new(provider: Arc<dyn VisionLanguageProvider>, retry: RetryExecutor, max_tokens: u32) -> Self {
        Self { provider, retry, max_tokens }
    }

    async fn attempt(&self, image: &[u8], media_type: MediaType) -> Result<VisionDescription> {
        let text = self.provider.invoke(image, media_type, DESCRIBE_PROMPT, self.max_tokens).await?;
        let raw: RawDescription = parse_model_json(&text)?;
        Ok(raw.into())
    }
}

#[async_trait]
impl DescribeStrategy for VisionLanguageStrategy {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn describe(&self, image: &[u8]) -> Result<VisionDescription> {
        let media_type = MediaType::sniff(image);
        self.retry.run("describe_image", || self.attempt(image, media_type)).await
    }
}

const COLOR_NAMES: [&str; 18] = [
    "red", "blue", "green", "yellow", "black", "white", "brown", "gray", "grey", "pink", "purple", "orange", "gold",
    "silver", "beige", "navy", "teal", "maroon",
];

fn is_color(label: &str) -> bool {
    let lower = label.to_lowercase();
    COLOR_NAMES.iter().any(|c| lower.contains(c))
}

pub const UNABLE_TO_ANALYZE: &str = "Unable to analyze image content";

/// Builds a description from detected labels alone.
pub struct LabelStrategy {
    detector: Arc<dyn LabelDetector>,
    retry: RetryExecutor,
    settings: VisionSettings,
}

impl LabelStrategy {
    pub fn new(detector: Arc<dyn LabelDetector>, retry: RetryExecutor, settings: VisionSettings) -> Self {
        Self { detector, retry, settings }
    }
}

#[async_trait]
impl DescribeStrategy for LabelStrategy {
    fn name(&self) -> &'static str {
        "labels"
    }

    async fn describe(&self, image: &[u8]) -> Result<VisionDescription> {
        let detected = self.retry.run("detect_labels", || self.detector.detect(image)).await?;
        let labels = select_labels(detected, self.settings.min_label_confidence, self.settings.max_labels);
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();

        let (colors, others): (Vec<&str>, Vec<&str>) = names.iter().copied().partition(|n| is_color(n));
        let dominant_colors = if colors.is_empty() {
            vec![UNKNOWN.to_string()]
        } else {
            colors.into_iter().map(str::to_string).collect()
        };
        let style_keywords: Vec<String> = if others.is_empty() {
            names.iter().take(self.settings.description_labels).map(|n| (*n).to_string()).collect()
        } else {
            others.into_iter().take(self.settings.max_style_keywords).map(str::to_string).collect()
        };
        // select_labels leaves the most confident label first.
        let suggested_category = labels
            .iter()
            .find(|l| l.confidence > self.settings.category_confidence)
            .map_or_else(|| UNKNOWN.to_string(), |l| l.name.clone());
        let description = if names.is_empty() {
            UNABLE_TO_ANALYZE.to_string()
        } else {
            let top: Vec<&str> = names.iter().take(self.settings.description_labels).copied().collect();
            format!("Image containing: {}", top.join(", "))
        };

        Ok(VisionDescription { description, dominant_colors, style_keywords, suggested_category })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_match_is_case_insensitive_substring() {
        assert!(is_color("Navy Blue"));
        assert!(is_color("GOLDEN"));
        assert!(!is_color("Furniture"));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let raw: RawDescription = parse_model_json(r#"{"description": "a lamp"}"#).expect("parse");
        let d = VisionDescription::from(raw);
        assert_eq!(d.description, "a lamp");
        assert!(d.dominant_colors.is_empty());
        assert!(d.style_keywords.is_empty());
        assert_eq!(d.suggested_category, UNKNOWN);
    }

    #[test]
    fn non_array_lists_read_as_empty() {
        let raw: RawDescription =
            parse_model_json(r#"{"dominant_colors": "red", "style_keywords": ["modern", 3]}"#).expect("parse");
        let d = VisionDescription::from(raw);
        assert!(d.dominant_colors.is_empty());
        assert_eq!(d.style_keywords, ["modern"]);
    }
}
