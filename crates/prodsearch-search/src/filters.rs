use prodsearch_core::config::FilterSettings;
use prodsearch_core::{FilterValue, Filters, RangeFilter, SearchConstraints};

fn terms_of(values: &Option<Vec<String>>) -> Option<FilterValue> {
    values.as_ref().filter(|v| !v.is_empty()).map(|v| FilterValue::terms(v.iter().map(String::as_str)))
}

/// Index filters implied by extracted constraints. Prices are whole
/// currency units and are scaled into the index's minor units.
pub fn constraint_filters(constraints: &SearchConstraints, fields: &FilterSettings) -> Filters {
    let mut filters = Filters::new();
    let lists = [
        (&fields.color_field, &constraints.colors),
        (&fields.material_field, &constraints.materials),
        (&fields.category_field, &constraints.categories),
        (&fields.style_field, &constraints.styles),
    ];
    for (field, values) in lists {
        if let Some(f) = terms_of(values) {
            filters.insert(field.clone(), f);
        }
    }
    if constraints.price_min.is_some() || constraints.price_max.is_some() {
        let range = RangeFilter {
            gte: constraints.price_min.map(|p| p * fields.price_scale),
            lte: constraints.price_max.map(|p| p * fields.price_scale),
        };
        filters.insert(fields.price_field.clone(), FilterValue::Range(range));
    }
    filters
}

/// Caller filters overlaid with constraint filters; a constraint wins on a
/// shared field.
pub fn merge_filters(caller: &Filters, constraints: &SearchConstraints, fields: &FilterSettings) -> Filters {
    let mut merged = caller.clone();
    merged.extend(constraint_filters(constraints, fields));
    merged
}
