use async_trait::async_trait;

use prodsearch_core::{Result, SearchConstraints, VisionDescription};

use crate::language::detect_language;
use crate::price::extract_price_range;
use crate::{Extracted, IntentStrategy};

/// Reads a query without any model. Language comes from character ranges;
/// constraints stay empty unless price phrase extraction is switched on.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedStrategy {
    extract_prices: bool,
}

impl RuleBasedStrategy {
    pub fn new(extract_prices: bool) -> Self {
        Self { extract_prices }
    }

    pub fn extract_now(&self, query: &str, vision: Option<&VisionDescription>) -> Extracted {
        let mut constraints = SearchConstraints::default();
        if self.extract_prices {
            (constraints.price_min, constraints.price_max) = extract_price_range(query);
        }
        Extracted {
            detected_language: detect_language(query),
            visual_reference: vision.map(|v| v.description.clone()),
            constraints,
        }
    }
}

#[async_trait]
impl IntentStrategy for RuleBasedStrategy {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn extract(&self, query: &str, vision: Option<&VisionDescription>) -> Result<Extracted> {
        Ok(self.extract_now(query, vision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodsearch_core::Language;

    #[test]
    fn default_rules_leave_constraints_empty() {
        let e = RuleBasedStrategy::default().extract_now("蓝色 sofa 1000以下", None);
        assert_eq!(e.detected_language, Language::Mixed);
        assert!(e.constraints.is_empty());
        assert!(e.visual_reference.is_none());
    }

    #[test]
    fn price_rules_are_opt_in() {
        let e = RuleBasedStrategy::new(true).extract_now("1000左右的沙发", None);
        assert_eq!(e.detected_language, Language::Zh);
        assert_eq!(e.constraints.price_min, Some(800.0));
        assert_eq!(e.constraints.price_max, Some(1200.0));
    }
}
