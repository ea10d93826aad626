//! Reading JSON out of model responses that may wrap it in markdown fences.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::error::{Error, Result};

fn fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").ok()).as_ref()
}

/// The JSON payload of a model response: the first fenced block if any, else the whole text.
pub fn extract_json_block(text: &str) -> &str {
    fence()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str())
        .trim()
}

pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let block = extract_json_block(text);
    serde_json::from_str(block).map_err(|e| {
        let preview: String = block.chars().take(200).collect();
        Error::Parse(format!("{e} in {preview:?}"))
    })
}
