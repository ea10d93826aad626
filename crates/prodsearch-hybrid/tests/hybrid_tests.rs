use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

use prodsearch_core::{
    Error, FacetKind, FilterValue, Filters, KnnQuery, KnnResponse, LexicalQuery, LexicalResponse, MatchType,
    RawAggregation, RawAggregations, RawBucket, Result, SearchHit, SourceKind, IndexService,
};
use prodsearch_hybrid::{FacetAggregator, HybridQuery, HybridSearch, MatchProfile, Weights};

/// Both channels wait on one barrier, so a sequential caller would hang.
struct RendezvousIndex {
    barrier: Barrier,
    knn_seen: Mutex<Option<KnnQuery>>,
    fail_knn: bool,
}

impl RendezvousIndex {
    fn new(fail_knn: bool) -> Self {
        Self { barrier: Barrier::new(2), knn_seen: Mutex::new(None), fail_knn }
    }
}

#[async_trait]
impl IndexService for RendezvousIndex {
    async fn search(&self, _query: &LexicalQuery) -> Result<LexicalResponse> {
        self.barrier.wait().await;
        let mut aggregations = RawAggregations::new();
        aggregations.insert(
            "default_price".into(),
            RawAggregation { buckets: vec![RawBucket { key: serde_json::json!("0-50"), doc_count: 7 }] },
        );
        Ok(LexicalResponse {
            hits: vec![SearchHit::new("A", 10.0, SourceKind::Lexical)],
            total: 1,
            aggregations,
        })
    }

    async fn knn_search(&self, query: &KnnQuery) -> Result<KnnResponse> {
        self.barrier.wait().await;
        *self.knn_seen.lock().expect("lock") = Some(query.clone());
        if self.fail_knn {
            return Err(Error::Index("knn shard unavailable".into()));
        }
        Ok(KnnResponse {
            hits: vec![SearchHit::new("A", 0.9, SourceKind::Vector), SearchHit::new("B", 0.8, SourceKind::Vector)],
        })
    }
}

fn query() -> HybridQuery {
    let mut filters = Filters::new();
    filters.insert("ai_colors".into(), FilterValue::terms(["blue"]));
    HybridQuery {
        text: "blue sofa".into(),
        vector: vec![0.1; 4],
        vector_field: "text_embedding".into(),
        filters,
        aggregations: vec![],
        size: 20,
        weights: Weights::new(0.5, 0.5),
        profile: MatchProfile::TEXT,
        region_id: None,
    }
}

#[tokio::test]
async fn channels_run_concurrently_and_merge() {
    let index = Arc::new(RendezvousIndex::new(false));
    let hybrid = HybridSearch::new(index.clone(), FacetAggregator::new("default_price"));

    let out = tokio::time::timeout(Duration::from_secs(5), hybrid.run(query()))
        .await
        .expect("both channels in flight together")
        .expect("search");

    let ids: Vec<&str> = out.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["A", "B"]);
    assert_eq!(out.results[0].match_type, MatchType::Hybrid);
    assert_eq!(out.total, 2, "distinct merged documents exceed the lexical total");
    assert_eq!(out.facets["default_price"].kind, FacetKind::Range);

    let knn = index.knn_seen.lock().expect("lock").clone().expect("knn query");
    assert_eq!(knn.field, "text_embedding");
    assert_eq!(knn.k, 20);
    assert!(knn.filters.contains_key("ai_colors"));
}

#[tokio::test]
async fn channel_failure_propagates() {
    let hybrid = HybridSearch::new(Arc::new(RendezvousIndex::new(true)), FacetAggregator::new("default_price"));
    let err = tokio::time::timeout(Duration::from_secs(5), hybrid.run(query())).await.expect("no hang").unwrap_err();
    assert!(matches!(err, Error::Index(_)));
}
