//! Relative price phrases in Chinese and English.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phrase {
    Between,
    Around,
    AtMost,
    AtLeast,
}

const NUM: &str = r"(\d+(?:\.\d+)?)";

fn phrases() -> &'static [(Phrase, Regex)] {
    static PHRASES: OnceLock<Vec<(Phrase, Regex)>> = OnceLock::new();
    PHRASES.get_or_init(|| {
        [
            (Phrase::Between, format!(r"{NUM}\s*元?\s*(?:到|至)\s*{NUM}")),
            (Phrase::Between, format!(r"{NUM}\s*-\s*{NUM}\s*元")),
            (Phrase::Between, format!(r"(?i)\bbetween\s+\$?{NUM}\s+(?:and|to)\s+\$?{NUM}")),
            (Phrase::Around, format!(r"{NUM}\s*元?\s*左右")),
            (Phrase::Around, format!(r"(?i)\b(?:around|about|approximately)\s+\$?{NUM}")),
            (Phrase::AtMost, format!(r"{NUM}\s*元?\s*以下")),
            (Phrase::AtMost, format!(r"(?i)\b(?:under|below|less than)\s+\$?{NUM}")),
            (Phrase::AtLeast, format!(r"{NUM}\s*元?\s*以上")),
            (Phrase::AtLeast, format!(r"(?i)\b(?:above|over|more than)\s+\$?{NUM}")),
        ]
        .into_iter()
        .filter_map(|(phrase, pattern)| Regex::new(&pattern).ok().map(|re| (phrase, re)))
        .collect()
    })
}

fn capture(re: &Regex, text: &str) -> Option<Vec<f64>> {
    let caps = re.captures(text)?;
    caps.iter().skip(1).map(|m| m.and_then(|m| m.as_str().parse().ok())).collect()
}

/// Price bounds stated in `query`, in whole currency units.
///
/// An explicit range or an approximate price ("around X", "X左右", read as
/// X plus or minus 20%) wins; otherwise upper and lower bound phrases combine.
pub fn extract_price_range(query: &str) -> (Option<f64>, Option<f64>) {
    let (mut min, mut max) = (None, None);
    for (phrase, re) in phrases() {
        let Some(values) = capture(re, query) else { continue };
        match (phrase, values.as_slice()) {
            (Phrase::Between, [a, b]) => return (Some(a.min(*b)), Some(a.max(*b))),
            (Phrase::Around, [x]) => return (Some(x * 4.0 / 5.0), Some(x * 6.0 / 5.0)),
            (Phrase::AtMost, [x]) if max.is_none() => max = Some(*x),
            (Phrase::AtLeast, [x]) if min.is_none() => min = Some(*x),
            _ => {}
        }
    }
    (min, max)
}
