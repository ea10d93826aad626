//! Weighted fusion of lexical and vector hits.
//!
//! Each channel is normalized by its own best score (or 1 when the channel is
//! empty or has no positive score), so a document's combined score is
//! `lexNorm * keyword_weight + vecNorm * semantic_weight`.

use std::cmp::Ordering;
use std::collections::HashMap;

use prodsearch_core::{Document, MatchType, MergedResult, SearchHit, SearchMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub keyword: f32,
    pub semantic: f32,
}

impl Weights {
    pub fn new(keyword: f32, semantic: f32) -> Self {
        Self { keyword, semantic }
    }
}

/// Match type assigned by which channels found a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchProfile {
    pub both: MatchType,
    pub lexical_only: MatchType,
    pub vector_only: MatchType,
}

impl MatchProfile {
    pub const TEXT: Self = Self {
        both: MatchType::Hybrid,
        lexical_only: MatchType::Exact,
        vector_only: MatchType::Semantic,
    };
    pub const IMAGE: Self = Self {
        both: MatchType::Visual,
        lexical_only: MatchType::Exact,
        vector_only: MatchType::Visual,
    };
    pub const MIXED: Self = Self {
        both: MatchType::Mixed,
        lexical_only: MatchType::Exact,
        vector_only: MatchType::Semantic,
    };

    pub fn for_mode(mode: SearchMode) -> Self {
        match mode {
            SearchMode::TextOnly => Self::TEXT,
            SearchMode::ImageOnly => Self::IMAGE,
            SearchMode::MixedModal => Self::MIXED,
        }
    }

    fn classify(&self, lexical: bool, vector: bool) -> MatchType {
        match (lexical, vector) {
            (true, true) => self.both,
            (true, false) => self.lexical_only,
            _ => self.vector_only,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ranked {
    pub results: Vec<MergedResult>,
    /// Distinct documents across both channels, before truncation.
    pub unique: usize,
}

struct Entry {
    document: Document,
    lex_norm: f32,
    vec_norm: f32,
    in_lexical: bool,
    in_vector: bool,
}

fn channel_max(hits: &[SearchHit]) -> f32 {
    let max = hits.iter().map(|h| h.score).fold(f32::NEG_INFINITY, f32::max);
    if max.is_finite() && max > 0.0 { max } else { 1.0 }
}

fn normalized(score: f32, max: f32) -> f32 {
    let n = score / max;
    if n.is_finite() { n.max(0.0) } else { 0.0 }
}

fn has_content(doc: &Document) -> bool {
    match doc {
        serde_json::Value::Null => false,
        serde_json::Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn by_score_then_id(a: &MergedResult, b: &MergedResult) -> Ordering {
    b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal).then_with(|| a.id.cmp(&b.id))
}

/// Merge both channels into one list, best first, at most `limit` long.
/// Equal combined scores are ordered by document id.
pub fn merge(
    lexical: Vec<SearchHit>,
    vector: Vec<SearchHit>,
    weights: Weights,
    limit: usize,
    profile: MatchProfile,
) -> Ranked {
    let max_lex = channel_max(&lexical);
    let max_vec = channel_max(&vector);

    let mut by_id: HashMap<String, Entry> = HashMap::new();
    for h in lexical {
        let lex_norm = normalized(h.score, max_lex);
        by_id
            .entry(h.id)
            .and_modify(|e| e.lex_norm = e.lex_norm.max(lex_norm))
            .or_insert(Entry { document: h.document, lex_norm, vec_norm: 0.0, in_lexical: true, in_vector: false });
    }
    for h in vector {
        let vec_norm = normalized(h.score, max_vec);
        match by_id.get_mut(&h.id) {
            Some(e) => {
                e.vec_norm = if e.in_vector { e.vec_norm.max(vec_norm) } else { vec_norm };
                e.in_vector = true;
                if !has_content(&e.document) {
                    e.document = h.document;
                }
            }
            None => {
                by_id.insert(
                    h.id,
                    Entry { document: h.document, lex_norm: 0.0, vec_norm, in_lexical: false, in_vector: true },
                );
            }
        }
    }

    let unique = by_id.len();
    let mut results: Vec<MergedResult> = by_id
        .into_iter()
        .map(|(id, e)| {
            let (mut lexical, mut vector) = (e.lex_norm > 0.0, e.vec_norm > 0.0);
            if !lexical && !vector {
                (lexical, vector) = (e.in_lexical, e.in_vector);
            }
            MergedResult {
                id,
                document: e.document,
                combined_score: e.lex_norm * weights.keyword + e.vec_norm * weights.semantic,
                match_type: profile.classify(lexical, vector),
                similarity_score: (e.vec_norm > 0.0).then_some(e.vec_norm),
                region_price: None,
                region_currency: None,
            }
        })
        .collect();
    results.sort_by(by_score_then_id);
    results.truncate(limit);
    Ranked { results, unique }
}

/// Single-channel ranking: raw scores, a plain `min_score` cut, one match type.
pub fn threshold(hits: Vec<SearchHit>, min_score: f32, match_type: MatchType, limit: usize) -> Vec<MergedResult> {
    let mut results: Vec<MergedResult> = hits
        .into_iter()
        .filter(|h| h.score >= min_score)
        .map(|h| MergedResult {
            id: h.id,
            document: h.document,
            combined_score: h.score,
            match_type,
            similarity_score: Some(h.score),
            region_price: None,
            region_currency: None,
        })
        .collect();
    results.sort_by(by_score_then_id);
    let mut seen = std::collections::HashSet::new();
    results.retain(|r| seen.insert(r.id.clone()));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use prodsearch_core::SourceKind;

    fn lex(id: &str, score: f32) -> SearchHit {
        SearchHit::new(id, score, SourceKind::Lexical)
    }
    fn vec_hit(id: &str, score: f32) -> SearchHit {
        SearchHit::new(id, score, SourceKind::Vector)
    }

    #[test]
    fn blue_sofa_scenario() {
        let ranked = merge(
            vec![lex("A", 10.0)],
            vec![vec_hit("A", 0.9), vec_hit("B", 0.8)],
            Weights::new(0.5, 0.5),
            20,
            MatchProfile::TEXT,
        );
        let r = &ranked.results;
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].id, "A");
        assert!((r[0].combined_score - 1.0).abs() < 1e-6);
        assert_eq!(r[0].match_type, MatchType::Hybrid);
        assert_eq!(r[1].id, "B");
        assert!((r[1].combined_score - 0.444_444).abs() < 1e-4);
        assert_eq!(r[1].match_type, MatchType::Semantic);
        assert!((r[1].similarity_score.unwrap_or_default() - 0.888_889).abs() < 1e-4);
        assert_eq!(ranked.unique, 2);
    }

    #[test]
    fn lexical_only_is_exact_and_has_no_similarity() {
        let ranked = merge(vec![lex("A", 3.0)], vec![], Weights::new(0.5, 0.5), 5, MatchProfile::TEXT);
        assert_eq!(ranked.results[0].match_type, MatchType::Exact);
        assert!(ranked.results[0].similarity_score.is_none());
        assert!((ranked.results[0].combined_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn profiles_follow_the_search_mode() {
        let hits = || (vec![lex("A", 1.0)], vec![vec_hit("A", 1.0), vec_hit("B", 0.5)]);
        let (l, v) = hits();
        let image = merge(l, v, Weights::new(0.3, 0.7), 5, MatchProfile::for_mode(SearchMode::ImageOnly));
        assert!(image.results.iter().all(|r| r.match_type == MatchType::Visual));
        let (l, v) = hits();
        let mixed = merge(l, v, Weights::new(0.5, 0.5), 5, MatchProfile::for_mode(SearchMode::MixedModal));
        assert_eq!(mixed.results[0].match_type, MatchType::Mixed);
        assert_eq!(mixed.results[1].match_type, MatchType::Semantic);
    }

    #[test]
    fn ties_break_by_id_and_limit_truncates() {
        let ranked = merge(
            vec![lex("c", 2.0), lex("a", 2.0), lex("b", 2.0)],
            vec![],
            Weights::new(1.0, 0.0),
            2,
            MatchProfile::TEXT,
        );
        let ids: Vec<&str> = ranked.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(ranked.unique, 3);
    }

    #[test]
    fn zero_scores_are_classified_by_presence() {
        let ranked = merge(vec![], vec![vec_hit("z", 0.0)], Weights::new(0.5, 0.5), 5, MatchProfile::TEXT);
        assert_eq!(ranked.results[0].match_type, MatchType::Semantic);
        assert_eq!(ranked.results[0].combined_score, 0.0);
    }

    #[test]
    fn threshold_keeps_raw_scores_above_cut() {
        let out = threshold(vec![vec_hit("a", 0.2), vec_hit("b", 0.9), vec_hit("c", 0.5)], 0.4, MatchType::Visual, 10);
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert!(out.iter().all(|r| r.match_type == MatchType::Visual));
        assert_eq!(out[0].combined_score, 0.9);
    }

    fn hits(source: SourceKind) -> impl Strategy<Value = Vec<SearchHit>> {
        proptest::collection::vec(("[a-f]", 0.1f32..50.0), 0..8)
            .prop_map(move |v| v.into_iter().map(|(id, s)| SearchHit::new(id, s, source)).collect())
    }

    proptest! {
        #[test]
        fn combined_scores_stay_within_weight_sum(
            l in hits(SourceKind::Lexical),
            v in hits(SourceKind::Vector),
            kw in 0.0f32..=1.0,
            sw in 0.0f32..=1.0,
        ) {
            let both: std::collections::HashSet<String> = l.iter().map(|h| h.id.clone())
                .filter(|id| v.iter().any(|h| &h.id == id))
                .collect();
            let ranked = merge(l, v, Weights::new(kw, sw), 100, MatchProfile::TEXT);
            for r in &ranked.results {
                prop_assert!(r.combined_score >= 0.0);
                prop_assert!(r.combined_score <= kw + sw + 1e-5);
                if both.contains(&r.id) {
                    prop_assert_eq!(r.match_type, MatchType::Hybrid);
                }
            }
        }

        #[test]
        fn merge_is_order_independent(
            l in hits(SourceKind::Lexical),
            v in hits(SourceKind::Vector),
        ) {
            let forward = merge(l.clone(), v.clone(), Weights::new(0.5, 0.5), 100, MatchProfile::TEXT);
            let mut rl = l; rl.reverse();
            let mut rv = v; rv.reverse();
            let backward = merge(rl, rv, Weights::new(0.5, 0.5), 100, MatchProfile::TEXT);
            let a: Vec<(String, f32)> = forward.results.iter().map(|r| (r.id.clone(), r.combined_score)).collect();
            let b: Vec<(String, f32)> = backward.results.iter().map(|r| (r.id.clone(), r.combined_score)).collect();
            prop_assert_eq!(a, b);
        }
    }
}
