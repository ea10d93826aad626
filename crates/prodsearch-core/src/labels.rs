use crate::types::Label;

/// Keep labels at or above `min_confidence` with a non-blank name, most
/// confident first, at most `max`. Equal confidences keep detector order.
pub fn select_labels(labels: Vec<Label>, min_confidence: f32, max: usize) -> Vec<Label> {
    let mut kept: Vec<Label> = labels
        .into_iter()
        .filter(|l| l.confidence >= min_confidence && !l.name.trim().is_empty())
        .collect();
    kept.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    kept.truncate(max);
    kept
}
