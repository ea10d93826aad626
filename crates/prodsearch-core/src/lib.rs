#![deny(dead_code)]
#![deny(unused_variables)]

pub mod config;
pub mod error;
pub mod json;
pub mod labels;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use retry::{RetryExecutor, RetryPolicy};
pub use traits::{EmbeddingProvider, IndexService, LabelDetector, LanguageModel, VisionLanguageProvider};
pub use types::*;
