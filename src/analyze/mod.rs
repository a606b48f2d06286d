// src/analyze/mod.rs
//! Curation of fetched headlines before they reach the generation pipeline.

pub mod dedup;
pub mod similarity;

pub use crate::analyze::dedup::{deduplicate, deduplicate_with_report, DedupParams, DedupReport};
pub use crate::analyze::similarity::{gestalt_ratio, title_similarity, SimilarityMetric};
