//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys come from env vars with `__` separators, e.g.
//! `APP_RETRY__MAX_ATTEMPTS=5`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{AggregationRequest, RangeSpec};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, defaults filled in.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub retry: RetrySettings,
    pub embedding: EmbeddingSettings,
    pub vision: VisionSettings,
    pub intent: IntentSettings,
    pub index: IndexSettings,
    pub filters: FilterSettings,
    pub facets: FacetSettings,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.search;
        if s.max_size == 0 || s.default_size == 0 || s.default_size > s.max_size {
            anyhow::bail!("search.default_size must be in 1..=search.max_size");
        }
        for (name, w) in [
            ("keyword_weight", s.keyword_weight),
            ("semantic_weight", s.semantic_weight),
            ("image_keyword_weight", s.image_keyword_weight),
            ("image_semantic_weight", s.image_semantic_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                anyhow::bail!("search.{} must be within [0, 1], got {}", name, w);
            }
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.embedding.dimension == 0 || self.embedding.batch_concurrency == 0 {
            anyhow::bail!("embedding.dimension and embedding.batch_concurrency must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_size: usize,
    pub max_size: usize,
    pub max_query_chars: usize,
    pub keyword_weight: f32,
    pub semantic_weight: f32,
    /// Fixed weights for image-only searches.
    pub image_keyword_weight: f32,
    pub image_semantic_weight: f32,
    /// Threshold for the single-channel searches.
    pub min_score: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
            max_query_chars: 1000,
            keyword_weight: 0.5,
            semantic_weight: 0.5,
            image_keyword_weight: 0.3,
            image_semantic_weight: 0.7,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 1000 }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
    pub batch_concurrency: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dimension: 1024, batch_concurrency: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub min_label_confidence: f32,
    pub max_labels: usize,
    /// A label must be strictly above this to become the suggested category.
    pub category_confidence: f32,
    pub max_style_keywords: usize,
    pub description_labels: usize,
    pub max_tokens: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            min_label_confidence: 70.0,
            max_labels: 20,
            category_confidence: 80.0,
            max_style_keywords: 10,
            description_labels: 5,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    pub max_tokens: u32,
    pub rule_based_prices: bool,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self { max_tokens: 1024, rule_based_prices: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub text_vector_field: String,
    pub image_vector_field: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { text_vector_field: "text_embedding".into(), image_vector_field: "image_embedding".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub color_field: String,
    pub material_field: String,
    pub category_field: String,
    pub style_field: String,
    pub price_field: String,
    /// Multiplier from whole currency units to the index's stored price units.
    pub price_scale: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            color_field: "ai_colors".into(),
            material_field: "ai_materials".into(),
            category_field: "category_names".into(),
            style_field: "ai_style".into(),
            price_field: "default_price".into(),
            price_scale: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsFacet {
    pub field: String,
    #[serde(default = "default_terms_size")]
    pub size: usize,
}

fn default_terms_size() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetSettings {
    pub price_field: String,
    pub terms: Vec<TermsFacet>,
    pub price_ranges: Vec<RangeSpec>,
}

impl Default for FacetSettings {
    fn default() -> Self {
        let terms = ["category_names", "ai_colors", "ai_materials", "ai_style", "tag_values"]
            .into_iter()
            .map(|field| TermsFacet { field: field.into(), size: default_terms_size() })
            .collect();
        let band = |name: &str, from: Option<f64>, to: Option<f64>| RangeSpec { name: name.into(), from, to };
        Self {
            price_field: "default_price".into(),
            terms,
            price_ranges: vec![
                band("0-50", None, Some(5_000.0)),
                band("50-100", Some(5_000.0), Some(10_000.0)),
                band("100-500", Some(10_000.0), Some(50_000.0)),
                band("500-1000", Some(50_000.0), Some(100_000.0)),
                band("1000+", Some(100_000.0), None),
            ],
        }
    }
}

impl FacetSettings {
    /// Aggregations to request with every lexical query.
    pub fn aggregation_requests(&self) -> Vec<AggregationRequest> {
        let mut aggs: Vec<AggregationRequest> = self
            .terms
            .iter()
            .map(|t| AggregationRequest::Terms { field: t.field.clone(), size: t.size })
            .collect();
        if !self.price_ranges.is_empty() {
            aggs.push(AggregationRequest::Range { field: self.price_field.clone(), ranges: self.price_ranges.clone() });
        }
        aggs
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = Config::from_figment(Figment::new()).settings().expect("settings");
        assert_eq!(settings.search.default_size, 20);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_delay(), Duration::from_millis(1000));
        assert_eq!(settings.embedding.batch_concurrency, 5);
        assert_eq!(settings.facets.terms.len(), 5);
        assert_eq!(settings.filters.price_field, "default_price");
    }

    #[test]
    fn toml_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[retry]\nmax_attempts = 5\n\n[search]\nkeyword_weight = 0.8\n")?;
            jail.set_env("RUST_ENV", "test");
            jail.set_env("APP_RETRY__BASE_DELAY_MS", "10");
            let settings = Config::load().expect("load").settings().expect("settings");
            assert_eq!(settings.retry.max_attempts, 5);
            assert_eq!(settings.retry.base_delay_ms, 10);
            assert!((settings.search.keyword_weight - 0.8).abs() < f32::EPSILON);
            assert!((settings.search.semantic_weight - 0.5).abs() < f32::EPSILON);
            Ok(())
        });
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[search]\nsemantic_weight = 1.5\n")?;
            let err = Config::load().expect("load").settings().unwrap_err();
            assert!(err.to_string().contains("semantic_weight"));
            Ok(())
        });
    }

    #[test]
    fn production_layer_applies_after_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[retry]\nmax_attempts = 5\n")?;
            jail.create_file("config.prod.toml", "[retry]\nmax_attempts = 2\n")?;
            jail.create_file("config.dev.toml", "[retry]\nmax_attempts = 9\n")?;
            jail.set_env("RUST_ENV", "production");
            let settings = Config::load().expect("load").settings().expect("settings");
            assert_eq!(settings.retry.max_attempts, 2);
            Ok(())
        });
    }

    #[test]
    fn price_band_aggregation_follows_terms() {
        let aggs = FacetSettings::default().aggregation_requests();
        assert_eq!(aggs.len(), 6);
        assert_eq!(aggs[5].field(), "default_price");
        assert!(matches!(aggs[5], AggregationRequest::Range { .. }));
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = tempfile::tempdir().expect("tempdir");
        assert_eq!(resolve_with_base(base.path(), "catalog.json"), base.path().join("catalog.json"));
        assert_eq!(resolve_with_base(base.path(), "/tmp/x.json"), PathBuf::from("/tmp/x.json"));
    }
}
