//! Headline deduplication: collapse near-duplicate titles into a bounded,
//! order-stable curated set.
//!
//! The pass is greedy. Each candidate is compared only against items already
//! kept, never against items that were dropped, so the result is not a global
//! clustering. Two survivors are guaranteed to score `<= threshold` against each
//! other, and the first-seen phrasing of a story always wins.

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::analyze::similarity::{title_similarity, SimilarityMetric};
use crate::ingest::types::SourceItem;

pub const DEFAULT_MAX_ITEMS: usize = 10;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupParams {
    pub max_count: usize,
    /// Items scoring strictly above this are duplicates.
    pub threshold: f64,
    #[serde(default)]
    pub metric: SimilarityMetric,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_ITEMS,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            metric: SimilarityMetric::Gestalt,
        }
    }
}

impl DedupParams {
    pub fn new(max_count: usize, threshold: f64) -> Self {
        Self {
            max_count,
            threshold: threshold.clamp(0.0, 1.0),
            metric: SimilarityMetric::Gestalt,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupReport {
    pub kept: Vec<SourceItem>,
    /// Candidates dropped as near-duplicates of a kept item.
    pub dropped: usize,
    /// Candidates never examined because the cap was reached.
    pub unexamined: usize,
}

/// Greedy, order-preserving dedup capped at `params.max_count`.
pub fn deduplicate(items: &[SourceItem], params: &DedupParams) -> Vec<SourceItem> {
    deduplicate_with_report(items, params).kept
}

pub fn deduplicate_with_report(items: &[SourceItem], params: &DedupParams) -> DedupReport {
    let mut report = DedupReport::default();
    if params.max_count == 0 {
        report.unexamined = items.len();
        return report;
    }

    for (idx, candidate) in items.iter().enumerate() {
        let dominated = report
            .kept
            .iter()
            .any(|kept| title_similarity(&candidate.title, &kept.title, params.metric) > params.threshold);

        if dominated {
            report.dropped += 1;
        } else {
            report.kept.push(candidate.clone());
        }

        if report.kept.len() >= params.max_count {
            report.unexamined = items.len() - idx - 1;
            break;
        }
    }

    counter!("dedup_dropped_total").increment(report.dropped as u64);
    tracing::debug!(
        target: "dedup",
        input = items.len(),
        kept = report.kept.len(),
        dropped = report.dropped,
        unexamined = report.unexamined,
        "dedup pass"
    );
    report
}
