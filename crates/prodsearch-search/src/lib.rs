//! Search orchestration: classifies a request by the inputs it carries,
//! runs the text, image or mixed pipeline, and answers from a bare text
//! search when that pipeline fails.
//!
//! ```text
//! text only   intent -> embed(text)                  -> hybrid (caller weights)
//! image only  describe -> embed(image text)          -> hybrid (0.3 / 0.7)
//! mixed       describe -> intent -> embed(combined)  -> hybrid (caller weights)
//! ```

pub mod filters;
pub mod orchestrator;
pub mod pricing;
pub mod synth;

pub use filters::{constraint_filters, merge_filters};
pub use orchestrator::{ChannelOptions, ChannelResponse, Providers, SearchOrchestrator};
pub use pricing::apply_region_prices;
pub use synth::{image_search_text, mixed_search_text};
