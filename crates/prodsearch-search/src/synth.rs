use prodsearch_core::{VisionDescription, UNKNOWN};

/// Text standing in for an image in the lexical and embedding channels:
/// the description, then colors, style and category where present.
pub fn image_search_text(v: &VisionDescription) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !v.description.trim().is_empty() {
        parts.push(v.description.trim().to_string());
    }
    if !v.dominant_colors.is_empty() {
        parts.push(format!("colors: {}", v.dominant_colors.join(", ")));
    }
    if !v.style_keywords.is_empty() {
        parts.push(format!("style: {}", v.style_keywords.join(", ")));
    }
    let category = v.suggested_category.trim();
    if !category.is_empty() && !category.eq_ignore_ascii_case(UNKNOWN) {
        parts.push(format!("category: {category}"));
    }
    parts.join(". ")
}

pub fn mixed_search_text(query: &str, v: &VisionDescription) -> String {
    format!("{query}. Visual reference: {}", image_search_text(v))
}
