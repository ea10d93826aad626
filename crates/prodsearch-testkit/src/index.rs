//! In-memory product index for tests and the demo binary.
//!
//! Lexical scoring counts distinct query tokens found in a product's text
//! fields. k-NN is brute-force cosine over stored vectors. Filters and
//! aggregations follow the term/terms/range shapes of the core filter DSL.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use prodsearch_core::config::IndexSettings;
use prodsearch_core::{
    AggregationRequest, Error, FilterValue, Filters, IndexService, KnnQuery, KnnResponse, Label, LexicalQuery,
    LexicalResponse, RangeSpec, RawAggregation, RawAggregations, RawBucket, Result, SearchHit, SourceKind,
};
use prodsearch_embed::{image_text, HashEmbedder};

const TEXT_FIELDS: [&str; 8] =
    ["title", "subtitle", "description", "category_names", "ai_colors", "ai_materials", "ai_style", "tag_values"];

struct StoredDoc {
    id: String,
    document: Value,
    tokens: HashSet<String>,
    vectors: HashMap<String, Vec<f32>>,
}

#[derive(Default)]
pub struct MemoryIndex {
    docs: Vec<StoredDoc>,
    search_calls: AtomicUsize,
    knn_calls: AtomicUsize,
    fail_searches: AtomicUsize,
    fail_knn: AtomicUsize,
    unavailable: AtomicBool,
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase).collect()
}

fn strings_of(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Concatenated text fields of a product document.
pub fn searchable_text(document: &Value) -> String {
    TEXT_FIELDS
        .iter()
        .filter_map(|f| document.get(*f))
        .flat_map(strings_of)
        .collect::<Vec<_>>()
        .join(" ")
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter.fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document keyed by its `id` field, with any precomputed vectors.
    pub fn insert(&mut self, document: Value, vectors: HashMap<String, Vec<f32>>) -> Result<()> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Index("document has no string id".into()))?
            .to_string();
        let tokens = tokenize(&searchable_text(&document)).into_iter().collect();
        self.docs.retain(|d| d.id != id);
        self.docs.push(StoredDoc { id, document, tokens, vectors });
        Ok(())
    }

    /// Indexes a catalog, embedding each product's text fields into the text
    /// vector field and its `image_labels` into the image vector field.
    pub fn from_catalog(products: Vec<Value>, embedder: &HashEmbedder, fields: &IndexSettings) -> Result<Self> {
        let mut index = Self::new();
        for document in products {
            let mut vectors = HashMap::new();
            vectors.insert(fields.text_vector_field.clone(), embedder.embed_sync(&searchable_text(&document)));
            if let Some(labels) = document.get("image_labels") {
                let labels: Vec<Label> = strings_of(labels).into_iter().map(|n| Label::new(n, 100.0)).collect();
                if !labels.is_empty() {
                    vectors.insert(fields.image_vector_field.clone(), embedder.embed_sync(&image_text(&labels)));
                }
            }
            index.insert(document, vectors)?;
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn fail_next_searches(&self, n: usize) {
        self.fail_searches.store(n, AtomicOrdering::SeqCst);
    }

    pub fn fail_next_knn(&self, n: usize) {
        self.fail_knn.store(n, AtomicOrdering::SeqCst);
    }

    /// Every call fails while set.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, AtomicOrdering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn knn_calls(&self) -> usize {
        self.knn_calls.load(AtomicOrdering::SeqCst)
    }

    fn filtered<'a>(&'a self, filters: &'a Filters) -> impl Iterator<Item = &'a StoredDoc> + 'a {
        self.docs.iter().filter(move |d| filters.iter().all(|(field, f)| matches_filter(&d.document, field, f)))
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
        (Value::Number(_), Value::Number(_)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

fn field_values<'a>(document: &'a Value, field: &str) -> Vec<&'a Value> {
    match document.get(field) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(v) => vec![v],
    }
}

fn matches_filter(document: &Value, field: &str, filter: &FilterValue) -> bool {
    let values = field_values(document, field);
    match filter {
        FilterValue::Term(t) => values.iter().any(|v| value_eq(v, t)),
        FilterValue::Terms(ts) => ts.iter().any(|t| values.iter().any(|v| value_eq(v, t))),
        FilterValue::Range(r) => values
            .iter()
            .filter_map(|v| v.as_f64())
            .any(|x| r.gte.map_or(true, |g| x >= g) && r.lte.map_or(true, |l| x <= l)),
    }
}

fn in_band(x: f64, band: &RangeSpec) -> bool {
    band.from.map_or(true, |f| x >= f) && band.to.map_or(true, |t| x < t)
}

fn aggregate(docs: &[&StoredDoc], request: &AggregationRequest) -> RawAggregation {
    match request {
        AggregationRequest::Terms { field, size } => {
            let mut counts: BTreeMap<String, (Value, u64)> = BTreeMap::new();
            for d in docs {
                let distinct: HashSet<String> = field_values(&d.document, field)
                    .into_iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect();
                for label in distinct {
                    counts.entry(label.clone()).or_insert((Value::String(label), 0)).1 += 1;
                }
            }
            let mut buckets: Vec<RawBucket> =
                counts.into_values().map(|(key, doc_count)| RawBucket { key, doc_count }).collect();
            // BTreeMap order makes the key tie-break ascending.
            buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count));
            buckets.truncate(*size);
            RawAggregation { buckets }
        }
        AggregationRequest::Range { field, ranges } => {
            let buckets = ranges
                .iter()
                .map(|band| {
                    let doc_count = docs
                        .iter()
                        .filter(|d| {
                            field_values(&d.document, field).iter().filter_map(|v| v.as_f64()).any(|x| in_band(x, band))
                        })
                        .count();
                    RawBucket { key: Value::String(band.name.clone()), doc_count: doc_count as u64 }
                })
                .collect();
            RawAggregation { buckets }
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

fn best_first(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl IndexService for MemoryIndex {
    async fn search(&self, query: &LexicalQuery) -> Result<LexicalResponse> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.unavailable.load(AtomicOrdering::SeqCst) || take_failure(&self.fail_searches) {
            return Err(Error::Index("lexical search unavailable".into()));
        }
        let terms: HashSet<String> = tokenize(&query.text).into_iter().collect();
        let matched: Vec<(&StoredDoc, usize)> = self
            .filtered(&query.filters)
            .map(|d| (d, terms.iter().filter(|t| d.tokens.contains(*t)).count()))
            .filter(|(_, n)| *n > 0)
            .collect();

        let docs: Vec<&StoredDoc> = matched.iter().map(|(d, _)| *d).collect();
        let aggregations: RawAggregations =
            query.aggregations.iter().map(|a| (a.field().to_string(), aggregate(&docs, a))).collect();

        #[allow(clippy::cast_precision_loss)]
        let mut hits: Vec<SearchHit> = matched
            .iter()
            .map(|(d, n)| {
                SearchHit::new(d.id.clone(), *n as f32, SourceKind::Lexical).with_document(d.document.clone())
            })
            .collect();
        hits.sort_by(best_first);
        hits.truncate(query.size);
        Ok(LexicalResponse { hits, total: matched.len() as u64, aggregations })
    }

    async fn knn_search(&self, query: &KnnQuery) -> Result<KnnResponse> {
        self.knn_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.unavailable.load(AtomicOrdering::SeqCst) || take_failure(&self.fail_knn) {
            return Err(Error::Index("k-NN search unavailable".into()));
        }
        let mut hits: Vec<SearchHit> = self
            .filtered(&query.filters)
            .filter_map(|d| {
                let v = d.vectors.get(&query.field)?;
                (v.len() == query.vector.len()).then(|| {
                    SearchHit::new(d.id.clone(), cosine(v, &query.vector), SourceKind::Vector)
                        .with_document(d.document.clone())
                })
            })
            .collect();
        hits.sort_by(best_first);
        hits.truncate(query.k);
        Ok(KnnResponse { hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodsearch_core::RangeFilter;
    use serde_json::json;

    fn index() -> MemoryIndex {
        let docs = vec![
            json!({"id": "a", "title": "Blue Sofa", "ai_colors": ["blue"], "default_price": 40000}),
            json!({"id": "b", "title": "Blue Lamp", "ai_colors": ["blue", "white"], "default_price": 3000}),
            json!({"id": "c", "title": "Red Sofa", "ai_colors": ["red"], "default_price": 90000}),
        ];
        MemoryIndex::from_catalog(docs, &HashEmbedder::new(32), &IndexSettings::default()).expect("index")
    }

    #[tokio::test]
    async fn lexical_scores_by_matched_tokens_with_filters() {
        let idx = index();
        let mut filters = Filters::new();
        filters.insert("default_price".into(), FilterValue::Range(RangeFilter { gte: None, lte: Some(50000.0) }));
        let q = LexicalQuery { text: "blue sofa".into(), filters, size: 10, ..Default::default() };
        let out = idx.search(&q).await.expect("search");
        let ids: Vec<&str> = out.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(out.hits[0].score, 2.0);
        assert_eq!(out.total, 2);
    }

    #[tokio::test]
    async fn aggregations_count_matching_documents() {
        let idx = index();
        let q = LexicalQuery {
            text: "blue red".into(),
            aggregations: vec![
                AggregationRequest::Terms { field: "ai_colors".into(), size: 10 },
                AggregationRequest::Range {
                    field: "default_price".into(),
                    ranges: vec![
                        RangeSpec { name: "cheap".into(), from: None, to: Some(10000.0) },
                        RangeSpec { name: "pricey".into(), from: Some(10000.0), to: None },
                    ],
                },
            ],
            size: 10,
            ..Default::default()
        };
        let out = idx.search(&q).await.expect("search");
        let colors = &out.aggregations["ai_colors"].buckets;
        assert_eq!(colors[0], RawBucket { key: json!("blue"), doc_count: 2 });
        assert_eq!(colors.len(), 3);
        let prices = &out.aggregations["default_price"].buckets;
        assert_eq!(prices[0].doc_count, 1);
        assert_eq!(prices[1].doc_count, 2);
    }

    #[tokio::test]
    async fn knn_ranks_by_cosine_and_respects_field() {
        let idx = index();
        let embedder = HashEmbedder::new(32);
        let q = KnnQuery {
            vector: embedder.embed_sync(&searchable_text(&json!({"title": "Red Sofa", "ai_colors": ["red"]}))),
            field: "text_embedding".into(),
            k: 2,
            filters: Filters::new(),
        };
        let out = idx.knn_search(&q).await.expect("knn");
        assert_eq!(out.hits.len(), 2);
        assert_eq!(out.hits[0].id, "c");
        let none = idx.knn_search(&KnnQuery { field: "image_embedding".into(), ..q }).await.expect("knn");
        assert!(none.hits.is_empty(), "catalog has no image labels");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let idx = index();
        idx.fail_next_searches(1);
        let q = LexicalQuery { text: "sofa".into(), size: 5, ..Default::default() };
        assert!(idx.search(&q).await.is_err());
        assert!(idx.search(&q).await.is_ok());
        assert_eq!(idx.search_calls(), 2);
    }
}
