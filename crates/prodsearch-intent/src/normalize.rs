//! Constraint normalization, applied to every intent whatever produced it.

use serde::Deserialize;
use serde_json::Value;

use prodsearch_core::SearchConstraints;

/// Constraints as a model emits them. Every field is read leniently.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawConstraints {
    colors: Value,
    price_min: Value,
    price_max: Value,
    materials: Value,
    categories: Value,
    styles: Value,
    size_constraints: Value,
}

fn strings(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

impl From<RawConstraints> for SearchConstraints {
    fn from(raw: RawConstraints) -> Self {
        SearchConstraints {
            colors: strings(raw.colors),
            price_min: raw.price_min.as_f64(),
            price_max: raw.price_max.as_f64(),
            materials: strings(raw.materials),
            categories: strings(raw.categories),
            styles: strings(raw.styles),
            size_text: match raw.size_constraints {
                Value::String(s) => Some(s),
                _ => None,
            },
        }
    }
}

fn normalize_list(list: Option<Vec<String>>) -> Option<Vec<String>> {
    let cleaned: Vec<String> = list?
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Lowercases and trims string lists, drops empty entries and lists, drops
/// a negative minimum or non-positive maximum price, and swaps inverted
/// bounds. Idempotent.
pub fn normalize_constraints(c: SearchConstraints) -> SearchConstraints {
    let mut price_min = c.price_min.filter(|p| p.is_finite() && *p >= 0.0);
    let mut price_max = c.price_max.filter(|p| p.is_finite() && *p > 0.0);
    if let (Some(lo), Some(hi)) = (price_min, price_max) {
        if lo > hi {
            price_min = Some(hi);
            price_max = Some(lo);
        }
    }
    SearchConstraints {
        colors: normalize_list(c.colors),
        price_min,
        price_max,
        materials: normalize_list(c.materials),
        categories: normalize_list(c.categories),
        styles: normalize_list(c.styles),
        size_text: c.size_text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    }
}
