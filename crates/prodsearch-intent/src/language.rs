use prodsearch_core::Language;

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Character-range language test: any CJK ideograph makes a query Chinese,
/// CJK plus Latin letters makes it mixed, everything else is English.
pub fn detect_language(text: &str) -> Language {
    let has_cjk = text.chars().any(is_cjk);
    let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());
    match (has_cjk, has_latin) {
        (true, true) => Language::Mixed,
        (true, false) => Language::Zh,
        _ => Language::En,
    }
}
