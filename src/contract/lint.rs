// src/contract/lint.rs
//! Cheap after-the-fact checks of a finished issue against the contract.
//! The edit phase is what enforces the rules; this only reports on it.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::contract::PipelineContract;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    /// Forbidden terms found (as written in the contract).
    pub forbidden_hits: Vec<String>,
    /// Section ids whose heading or marker is missing.
    pub missing_sections: Vec<String>,
    pub masthead_ok: bool,
    pub word_count: usize,
    pub within_word_range: bool,
}

impl ContractReport {
    pub fn is_clean(&self) -> bool {
        self.forbidden_hits.is_empty()
            && self.missing_sections.is_empty()
            && self.masthead_ok
            && self.within_word_range
    }
}

/// Case-insensitive substring search for each forbidden term.
pub fn forbidden_hits(c: &PipelineContract, text: &str) -> Vec<String> {
    let hay = text.to_lowercase();
    c.forbidden_terms
        .iter()
        .filter(|t| hay.contains(&t.to_lowercase()))
        .cloned()
        .collect()
}

/// Visible words once tags and entities are gone.
pub fn word_count(html: &str) -> usize {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re = RE_TAGS.get_or_init(|| Regex::new(r"(?is)<[^>]*>").unwrap());
    let text = re.replace_all(html, " ");
    let text = html_escape::decode_html_entities(&text);
    text.split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .count()
}

pub fn lint(c: &PipelineContract, text: &str) -> ContractReport {
    let lower = text.to_lowercase();
    let missing_sections = c
        .sections
        .iter()
        .filter(|s| {
            let heading_missing = s.heading && !lower.contains(&s.title.to_lowercase());
            let marker_missing = s
                .marker
                .as_ref()
                .is_some_and(|m| !lower.contains(&m.to_lowercase()));
            heading_missing || marker_missing
        })
        .map(|s| s.id.clone())
        .collect();

    let masthead_ok = match &c.masthead_svg {
        Some(_) => lower.trim_start().starts_with("<svg"),
        None => true,
    };

    let word_count = word_count(text);
    ContractReport {
        forbidden_hits: forbidden_hits(c, text),
        missing_sections,
        masthead_ok,
        word_count,
        within_word_range: c.word_range.contains(word_count),
    }
}
