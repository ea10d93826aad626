use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use prodsearch_core::config::Settings;
use prodsearch_core::{
    AggregationRequest, Degradation, EmbeddingProvider, Error, Facets, Filters, IndexService, KnnQuery, Label,
    LabelDetector, LanguageModel, MatchType, MergedResult, Result, SearchConstraints, SearchIntent, SearchMeta,
    SearchMode, SearchRequest, SearchResponse, VisionDescription, VisionLanguageProvider,
};
use prodsearch_embed::EmbeddingGateway;
use prodsearch_hybrid::{threshold, FacetAggregator, HybridOutcome, HybridQuery, HybridSearch, MatchProfile, Weights};
use prodsearch_intent::{detect_language, IntentParser, ParsedIntent};
use prodsearch_vision::{Described, VisionDescriber};

use crate::filters::merge_filters;
use crate::pricing::apply_region_prices;
use crate::synth::{image_search_text, mixed_search_text};

/// External services the orchestrator is wired with. Only the embedding
/// provider and the index are required.
pub struct Providers {
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub vision: Option<Arc<dyn VisionLanguageProvider>>,
    pub language: Option<Arc<dyn LanguageModel>>,
    pub labels: Option<Arc<dyn LabelDetector>>,
    pub index: Arc<dyn IndexService>,
}

/// Options for the single-channel searches.
#[derive(Debug, Clone, Default)]
pub struct ChannelOptions {
    pub size: Option<usize>,
    pub filters: Filters,
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub results: Vec<MergedResult>,
    pub total: u64,
    pub elapsed_ms: u64,
    /// Labels the image was described with; empty for text searches.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

#[derive(Clone, Copy)]
enum Input<'a> {
    Text(&'a str),
    Image(&'a [u8]),
    Mixed(&'a str, &'a [u8]),
}

impl<'a> Input<'a> {
    fn mode(&self) -> SearchMode {
        match self {
            Input::Text(_) => SearchMode::TextOnly,
            Input::Image(_) => SearchMode::ImageOnly,
            Input::Mixed(..) => SearchMode::MixedModal,
        }
    }

    fn text(&self) -> Option<&'a str> {
        match *self {
            Input::Text(t) | Input::Mixed(t, _) => Some(t),
            Input::Image(_) => None,
        }
    }
}

/// A request that passed validation, with defaults applied.
struct Plan<'a> {
    input: Input<'a>,
    filters: &'a Filters,
    size: usize,
    weights: Weights,
    region_id: Option<&'a str>,
}

struct PathOutcome {
    intent: SearchIntent,
    vision: Option<VisionDescription>,
    degradations: Vec<Degradation>,
    hybrid: HybridOutcome,
}

fn empty_outcome() -> HybridOutcome {
    HybridOutcome { results: Vec::new(), facets: Facets::new(), total: 0 }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn note_vision(trail: &mut Vec<Degradation>, d: &Described) {
    if d.degraded {
        trail.push(Degradation { component: "vision".into(), fallback: d.strategy.into() });
    }
}

fn note_intent(trail: &mut Vec<Degradation>, p: &ParsedIntent) {
    if p.degraded {
        trail.push(Degradation { component: "intent".into(), fallback: p.strategy.into() });
    }
}

pub struct SearchOrchestrator {
    settings: Settings,
    aggregations: Vec<AggregationRequest>,
    embeddings: EmbeddingGateway,
    vision: VisionDescriber,
    intent: IntentParser,
    hybrid: HybridSearch,
}

impl SearchOrchestrator {
    pub fn new(providers: Providers, settings: Settings) -> Self {
        let mut embeddings = EmbeddingGateway::from_settings(providers.embedding, &settings);
        if let Some(labels) = &providers.labels {
            embeddings = embeddings.with_label_detector(Arc::clone(labels));
        }
        let vision = VisionDescriber::from_providers(providers.vision, providers.labels, &settings);
        let intent = IntentParser::from_providers(providers.language, &settings);
        let hybrid = HybridSearch::new(providers.index, FacetAggregator::new(settings.facets.price_field.clone()));
        Self::from_parts(settings, embeddings, vision, intent, hybrid)
    }

    pub fn from_parts(
        settings: Settings,
        embeddings: EmbeddingGateway,
        vision: VisionDescriber,
        intent: IntentParser,
        hybrid: HybridSearch,
    ) -> Self {
        let aggregations = settings.facets.aggregation_requests();
        Self { settings, aggregations, embeddings, vision, intent, hybrid }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one search. Only invalid input is reported as an error; any
    /// failure after validation is answered from the fallback path.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let plan = self.plan(request)?;
        let mode = plan.input.mode();

        let (outcome, used_fallback) = match self.run_path(&plan).await {
            Ok(outcome) => (outcome, false),
            Err(e) => {
                error!(mode = mode.as_str(), error = %e, "search path failed, running fallback");
                (self.fallback(&plan).await, true)
            }
        };
        let PathOutcome { intent, vision, degradations, mut hybrid } = outcome;
        if let Some(region) = plan.region_id {
            apply_region_prices(&mut hybrid.results, region, &self.settings.filters.price_field);
        }

        let elapsed_ms = elapsed_ms(started);
        info!(mode = mode.as_str(), results = hybrid.results.len(), elapsed_ms, used_fallback, "search completed");
        Ok(SearchResponse {
            results: hybrid.results,
            facets: hybrid.facets,
            meta: SearchMeta {
                total: hybrid.total,
                elapsed_ms,
                search_mode: mode,
                used_fallback,
                detected_language: intent.detected_language,
                vision,
                degradations,
            },
            intent,
        })
    }

    /// k-NN over the text vector field only. Errors propagate.
    pub async fn semantic_search(&self, text: &str, opts: &ChannelOptions) -> Result<ChannelResponse> {
        let started = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        self.check_query_length(text)?;
        let size = self.check_size(opts.size)?;

        let vector = self.embeddings.embed_text(text).await?;
        let field = &self.settings.index.text_vector_field;
        let results = self.knn_channel(vector, field, size, opts, MatchType::Semantic).await?;
        Ok(ChannelResponse {
            total: results.len() as u64,
            results,
            elapsed_ms: elapsed_ms(started),
            labels: Vec::new(),
        })
    }

    /// k-NN over the image vector field, embedding the image through its
    /// detected labels. Errors propagate.
    pub async fn image_search(&self, image: &[u8], opts: &ChannelOptions) -> Result<ChannelResponse> {
        let started = Instant::now();
        if image.is_empty() {
            return Err(Error::Validation("image must not be empty".into()));
        }
        let size = self.check_size(opts.size)?;

        let embedded = self.embeddings.embed_image(image).await?;
        let field = &self.settings.index.image_vector_field;
        let results = self.knn_channel(embedded.vector, field, size, opts, MatchType::Visual).await?;
        Ok(ChannelResponse {
            total: results.len() as u64,
            results,
            elapsed_ms: elapsed_ms(started),
            labels: embedded.labels,
        })
    }

    async fn knn_channel(
        &self,
        vector: Vec<f32>,
        field: &str,
        size: usize,
        opts: &ChannelOptions,
        match_type: MatchType,
    ) -> Result<Vec<MergedResult>> {
        let query = KnnQuery { vector, field: field.to_string(), k: size, filters: opts.filters.clone() };
        let response = self.hybrid.index().knn_search(&query).await?;
        let min_score = opts.min_score.unwrap_or(self.settings.search.min_score);
        debug!(field, hits = response.hits.len(), min_score, "single channel search returned");
        Ok(threshold(response.hits, min_score, match_type, size))
    }

    fn check_query_length(&self, text: &str) -> Result<()> {
        let max = self.settings.search.max_query_chars;
        if text.chars().count() > max {
            return Err(Error::Validation(format!("query must be at most {max} characters")));
        }
        Ok(())
    }

    fn check_size(&self, size: Option<usize>) -> Result<usize> {
        let s = &self.settings.search;
        let size = size.unwrap_or(s.default_size);
        if !(1..=s.max_size).contains(&size) {
            return Err(Error::Validation(format!("result size must be between 1 and {}, got {size}", s.max_size)));
        }
        Ok(size)
    }

    fn plan<'a>(&self, request: &'a SearchRequest) -> Result<Plan<'a>> {
        if let Some(text) = &request.text {
            self.check_query_length(text)?;
        }
        let input = match (request.query_text(), request.image_bytes()) {
            (Some(t), None) => Input::Text(t),
            (None, Some(i)) => Input::Image(i),
            (Some(t), Some(i)) => Input::Mixed(t, i),
            (None, None) => return Err(Error::Validation("either text or an image must be provided".into())),
        };
        let size = self.check_size(request.result_size)?;

        let s = &self.settings.search;
        for (name, w) in [("keyword_weight", request.keyword_weight), ("semantic_weight", request.semantic_weight)] {
            if let Some(w) = w {
                if !(0.0..=1.0).contains(&w) {
                    return Err(Error::Validation(format!("{name} must be within [0, 1], got {w}")));
                }
            }
        }
        let weights = Weights::new(
            request.keyword_weight.unwrap_or(s.keyword_weight),
            request.semantic_weight.unwrap_or(s.semantic_weight),
        );

        Ok(Plan { input, filters: &request.filters, size, weights, region_id: request.region_id.as_deref() })
    }

    async fn run_path(&self, plan: &Plan<'_>) -> Result<PathOutcome> {
        match plan.input {
            Input::Text(text) => self.text_path(plan, text).await,
            Input::Image(image) => self.image_path(plan, image).await,
            Input::Mixed(text, image) => self.mixed_path(plan, text, image).await,
        }
    }

    async fn text_path(&self, plan: &Plan<'_>, text: &str) -> Result<PathOutcome> {
        let parsed = self.intent.parse_traced(text, None).await;
        let vector = self.embeddings.embed_text(text).await?;
        let hybrid = self
            .retrieve(plan, text.to_string(), vector, &parsed.intent.constraints, plan.weights, MatchProfile::TEXT)
            .await?;

        let mut degradations = Vec::new();
        note_intent(&mut degradations, &parsed);
        Ok(PathOutcome { intent: parsed.intent, vision: None, degradations, hybrid })
    }

    async fn image_path(&self, plan: &Plan<'_>, image: &[u8]) -> Result<PathOutcome> {
        let described = self.vision.describe_traced(image).await?;
        let parsed = self.intent.parse_traced("", Some(&described.description)).await;
        let text = image_search_text(&described.description);
        let vector = self.embeddings.embed_text(&text).await?;

        let s = &self.settings.search;
        let weights = Weights::new(s.image_keyword_weight, s.image_semantic_weight);
        let hybrid = self.retrieve(plan, text, vector, &parsed.intent.constraints, weights, MatchProfile::IMAGE).await?;

        let mut degradations = Vec::new();
        note_vision(&mut degradations, &described);
        Ok(PathOutcome { intent: parsed.intent, vision: Some(described.description), degradations, hybrid })
    }

    async fn mixed_path(&self, plan: &Plan<'_>, query: &str, image: &[u8]) -> Result<PathOutcome> {
        let described = self.vision.describe_traced(image).await?;
        let parsed = self.intent.parse_traced(query, Some(&described.description)).await;
        let text = mixed_search_text(query, &described.description);
        let vector = self.embeddings.embed_text(&text).await?;
        let hybrid =
            self.retrieve(plan, text, vector, &parsed.intent.constraints, plan.weights, MatchProfile::MIXED).await?;

        let mut degradations = Vec::new();
        note_vision(&mut degradations, &described);
        note_intent(&mut degradations, &parsed);
        Ok(PathOutcome { intent: parsed.intent, vision: Some(described.description), degradations, hybrid })
    }

    async fn retrieve(
        &self,
        plan: &Plan<'_>,
        text: String,
        vector: Vec<f32>,
        constraints: &SearchConstraints,
        weights: Weights,
        profile: MatchProfile,
    ) -> Result<HybridOutcome> {
        let query = HybridQuery {
            text,
            vector,
            vector_field: self.settings.index.text_vector_field.clone(),
            filters: merge_filters(plan.filters, constraints, &self.settings.filters),
            aggregations: self.aggregations.clone(),
            size: plan.size,
            weights,
            profile,
            region_id: plan.region_id.map(str::to_string),
        };
        self.hybrid.run(query).await
    }

    /// Bare text search with caller filters and default weights. Never fails:
    /// without text, or when this search fails too, the result set is empty.
    async fn fallback(&self, plan: &Plan<'_>) -> PathOutcome {
        let text = plan.input.text();
        let intent = SearchIntent {
            original_query: text.unwrap_or_default().to_string(),
            detected_language: text.map(detect_language).unwrap_or_default(),
            visual_reference: None,
            constraints: SearchConstraints::default(),
            search_mode: plan.input.mode(),
        };

        let hybrid = match text {
            Some(text) => match self.fallback_text_search(plan, text).await {
                Ok(h) => h,
                Err(e) => {
                    error!(error = %e, "fallback search failed, returning no results");
                    empty_outcome()
                }
            },
            None => empty_outcome(),
        };
        PathOutcome { intent, vision: None, degradations: Vec::new(), hybrid }
    }

    async fn fallback_text_search(&self, plan: &Plan<'_>, text: &str) -> Result<HybridOutcome> {
        let vector = self.embeddings.embed_text(text).await?;
        let s = &self.settings.search;
        let weights = Weights::new(s.keyword_weight, s.semantic_weight);
        self.retrieve(plan, text.to_string(), vector, &SearchConstraints::default(), weights, MatchProfile::TEXT).await
    }
}
