//! Domain types shared by the retrieval, enrichment and orchestration crates.
//!
//! Everything here is built fresh per request and dropped after the response
//! is serialized. Documents are opaque JSON owned by the catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocumentId = String;
pub type Document = serde_json::Value;

/// Sentinel used by vision output when a field could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Indicates which retrieval channel produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Lexical,
    Vector,
}

/// A scored candidate as returned by the index.
///
/// `score` is channel-specific (BM25-like for lexical, cosine for vector)
/// but higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub score: f32,
    pub source: SourceKind,
    #[serde(default)]
    pub document: Document,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, score: f32, source: SourceKind) -> Self {
        Self { id: id.into(), score, source, document: serde_json::json!({}) }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }
}

/// Inclusive numeric range used by the filter DSL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

/// One clause of the term/terms/range filter DSL understood by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Terms(Vec<serde_json::Value>),
    Range(RangeFilter),
    Term(serde_json::Value),
}

impl FilterValue {
    pub fn terms<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Terms(values.into_iter().map(|v| serde_json::Value::String(v.into())).collect())
    }
}

pub type Filters = BTreeMap<String, FilterValue>;

/// Which search pipeline a request runs through. A pure function of input presence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    TextOnly,
    ImageOnly,
    MixedModal,
}

impl SearchMode {
    /// `None` when neither input is present.
    pub fn classify(has_text: bool, has_image: bool) -> Option<Self> {
        match (has_text, has_image) {
            (true, true) => Some(SearchMode::MixedModal),
            (false, true) => Some(SearchMode::ImageOnly),
            (true, false) => Some(SearchMode::TextOnly),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::TextOnly => "text_only",
            SearchMode::ImageOnly => "image_only",
            SearchMode::MixedModal => "mixed_modal",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
    Mixed,
}

impl Language {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            "mixed" => Some(Language::Mixed),
            _ => None,
        }
    }
}

/// Structured constraints extracted from a query.
///
/// Prices are whole currency units. String lists are lowercase, trimmed and
/// never empty when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_text: Option<String>,
}

impl SearchConstraints {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIntent {
    pub original_query: String,
    pub detected_language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_reference: Option<String>,
    pub constraints: SearchConstraints,
    pub search_mode: SearchMode,
}

/// Structured description of an uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionDescription {
    pub description: String,
    pub dominant_colors: Vec<String>,
    pub style_keywords: Vec<String>,
    pub suggested_category: String,
}

/// A label reported by the label detector. Confidence is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self { name: name.into(), confidence }
    }
}

/// Image container format, sniffed from magic bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl MediaType {
    /// Unrecognised signatures are reported as JPEG.
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [0xff, 0xd8, 0xff, ..] => MediaType::Jpeg,
            [0x89, b'P', b'N', b'G', ..] => MediaType::Png,
            [b'G', b'I', b'F', ..] => MediaType::Gif,
            [b'R', b'I', b'F', b'F', ..] => MediaType::Webp,
            _ => MediaType::Jpeg,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Semantic,
    Visual,
    Hybrid,
    Mixed,
}

/// A ranked result ready for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedResult {
    pub id: DocumentId,
    pub document: Document,
    pub combined_score: f32,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_currency: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    Value,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub field: String,
    pub kind: FacetKind,
    pub buckets: Vec<FacetBucket>,
}

pub type Facets = BTreeMap<String, Facet>;

/// Aggregation bucket as the index reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBucket {
    pub key: serde_json::Value,
    pub doc_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAggregation {
    #[serde(default)]
    pub buckets: Vec<RawBucket>,
}

pub type RawAggregations = BTreeMap<String, RawAggregation>;

/// A named price band for range aggregations, in the index's price units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
}

/// Aggregations requested alongside a lexical query. The aggregation is named after its field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AggregationRequest {
    Terms { field: String, size: usize },
    Range { field: String, ranges: Vec<RangeSpec> },
}

impl AggregationRequest {
    pub fn field(&self) -> &str {
        match self {
            AggregationRequest::Terms { field, .. } | AggregationRequest::Range { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexicalQuery {
    pub text: String,
    pub filters: Filters,
    pub aggregations: Vec<AggregationRequest>,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexicalResponse {
    pub hits: Vec<SearchHit>,
    /// Total matching documents, which may exceed `hits.len()`.
    pub total: u64,
    #[serde(default)]
    pub aggregations: RawAggregations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnnQuery {
    pub vector: Vec<f32>,
    /// Name of the vector field to search (text- or image-derived).
    pub field: String,
    pub k: usize,
    pub filters: Filters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnnResponse {
    pub hits: Vec<SearchHit>,
}

/// A search over text, an image, or both.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
    pub filters: Filters,
    pub result_size: Option<usize>,
    pub keyword_weight: Option<f32>,
    pub semantic_weight: Option<f32>,
    pub region_id: Option<String>,
}

impl SearchRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn image(bytes: impl Into<Vec<u8>>) -> Self {
        Self { image: Some(bytes.into()), ..Self::default() }
    }

    pub fn with_image(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.image = Some(bytes.into());
        self
    }

    pub fn with_weights(mut self, keyword: f32, semantic: f32) -> Self {
        self.keyword_weight = Some(keyword);
        self.semantic_weight = Some(semantic);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.result_size = Some(size);
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    pub fn with_region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    /// Trimmed query text, `None` when absent or blank.
    pub fn query_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Image bytes, `None` when absent or empty.
    pub fn image_bytes(&self) -> Option<&[u8]> {
        self.image.as_deref().filter(|b| !b.is_empty())
    }
}

/// A component that served the request through its fallback strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub component: String,
    pub fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub total: u64,
    pub elapsed_ms: u64,
    pub search_mode: SearchMode,
    pub used_fallback: bool,
    pub detected_language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision: Option<VisionDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

/// Terminal payload of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<MergedResult>,
    pub intent: SearchIntent,
    pub facets: Facets,
    pub meta: SearchMeta,
}
