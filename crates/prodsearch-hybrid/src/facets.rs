use prodsearch_core::{Facet, FacetBucket, FacetKind, Facets, RawAggregations};

/// Turns raw aggregation buckets into the facet map returned with results.
#[derive(Debug, Clone)]
pub struct FacetAggregator {
    price_field: String,
}

impl FacetAggregator {
    pub fn new(price_field: impl Into<String>) -> Self {
        Self { price_field: price_field.into() }
    }

    /// One facet per aggregation that has buckets. Bucket order is kept as
    /// the index returned it.
    pub fn parse(&self, raw: &RawAggregations) -> Facets {
        raw.iter()
            .filter(|(_, agg)| !agg.buckets.is_empty())
            .map(|(name, agg)| {
                let kind = if *name == self.price_field { FacetKind::Range } else { FacetKind::Value };
                let buckets = agg
                    .buckets
                    .iter()
                    .map(|b| FacetBucket { value: bucket_label(&b.key), count: b.doc_count })
                    .collect();
                (name.clone(), Facet { field: name.clone(), kind, buckets })
            })
            .collect()
    }
}

fn bucket_label(key: &serde_json::Value) -> String {
    match key {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
