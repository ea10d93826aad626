//! Hybrid retrieval: one lexical and one k-NN query issued together, merged
//! into a single ranked list with facets.

pub mod facets;
pub mod ranking;

use futures::future::try_join;
use std::sync::Arc;
use tracing::debug;

use prodsearch_core::{
    AggregationRequest, Facets, Filters, IndexService, KnnQuery, LexicalQuery, MergedResult, Result,
};

pub use facets::FacetAggregator;
pub use ranking::{merge, threshold, MatchProfile, Ranked, Weights};

#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub text: String,
    pub vector: Vec<f32>,
    pub vector_field: String,
    pub filters: Filters,
    pub aggregations: Vec<AggregationRequest>,
    pub size: usize,
    pub weights: Weights,
    pub profile: MatchProfile,
    pub region_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HybridOutcome {
    pub results: Vec<MergedResult>,
    pub facets: Facets,
    /// The index's lexical total, or the number of distinct merged
    /// documents when that is larger.
    pub total: u64,
}

pub struct HybridSearch {
    index: Arc<dyn IndexService>,
    facets: FacetAggregator,
}

impl HybridSearch {
    pub fn new(index: Arc<dyn IndexService>, facets: FacetAggregator) -> Self {
        Self { index, facets }
    }

    pub fn index(&self) -> &Arc<dyn IndexService> {
        &self.index
    }

    pub async fn run(&self, q: HybridQuery) -> Result<HybridOutcome> {
        let lexical = LexicalQuery {
            text: q.text,
            filters: q.filters.clone(),
            aggregations: q.aggregations,
            size: q.size,
            region_id: q.region_id,
        };
        let knn = KnnQuery { vector: q.vector, field: q.vector_field, k: q.size, filters: q.filters };

        let (lex, vec) = try_join(self.index.search(&lexical), self.index.knn_search(&knn)).await?;
        debug!(lexical = lex.hits.len(), vector = vec.hits.len(), "hybrid channels returned");

        let facets = self.facets.parse(&lex.aggregations);
        let ranked = merge(lex.hits, vec.hits, q.weights, q.size, q.profile);
        let total = lex.total.max(u64::try_from(ranked.unique).unwrap_or(u64::MAX));
        Ok(HybridOutcome { results: ranked.results, facets, total })
    }
}
