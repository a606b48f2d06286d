// src/config/mod.rs
pub mod ai;
pub mod pipeline;

pub use ai::GenerationConfig;
pub use pipeline::{PersistConfig, PipelineConfig};
