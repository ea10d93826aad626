//! Test and demo scaffolding: an in-memory index, scripted providers and a
//! sample catalog. Not a production index.

pub mod fixtures;
pub mod index;
pub mod providers;

pub use fixtures::{sample_catalog, sample_index};
pub use index::MemoryIndex;
pub use providers::{CountingEmbedder, ScriptedModel, ScriptedVision, StaticLabels};
