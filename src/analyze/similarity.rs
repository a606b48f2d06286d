//! Title similarity scores in [0.0, 1.0].
//!
//! The default metric is the Ratcliff/Obershelp "gestalt pattern matching"
//! ratio: find the longest common block, recurse on both sides of it, and
//! report `2*M / T` where `M` is the number of matched chars and `T` the
//! combined length. The dedup threshold of 0.6 is calibrated against this
//! metric; `Levenshtein` (via `strsim`) is offered for experiments only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    #[default]
    Gestalt,
    Levenshtein,
}

/// Case-insensitive similarity of two titles.
///
/// Blank titles (empty after trim) score 0.0 against everything, including
/// another blank title: an item with no title carries no identity to merge on.
pub fn title_similarity(a: &str, b: &str, metric: SimilarityMetric) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    match metric {
        SimilarityMetric::Gestalt => gestalt_ratio(&a, &b),
        SimilarityMetric::Levenshtein => strsim::normalized_levenshtein(&a, &b),
    }
}

/// Ratcliff/Obershelp ratio over chars. 1.0 for identical input (including
/// two empty strings), 0.0 for disjoint input.
///
/// The raw block search depends on argument order, so the pair is always
/// evaluated in lexicographic order to keep `ratio(a, b) == ratio(b, a)`.
pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matched_chars(&a, &b);
    2.0 * matched as f64 / total as f64
}

/// Sum of the sizes of all matching blocks.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, ch) in b.iter().enumerate() {
        b2j.entry(*ch).or_default().push(j);
    }

    let mut matched = 0usize;
    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows. Ties go
/// to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0usize);
    // j2len[j] = length of the match ending at a[i-1], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(ch) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|p| j2len.get(&p))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        j2len = next;
    }
    (best_i, best_j, best_k)
}
