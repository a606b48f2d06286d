// src/contract/render.rs
//! Pure renderers from a `PipelineContract` to the text each generation phase
//! receives. The draft instruction describes the issue loosely; the
//! enforcement instruction restates every rule as a checklist item so the
//! edit pass can repair whatever the draft got wrong.

use std::fmt::Write as _;

use crate::contract::PipelineContract;
use crate::ingest::providers::weather::ContextData;
use crate::ingest::types::SourceItem;

/// Summary chars quoted per headline in the draft payload.
pub const SUMMARY_CHARS: usize = 200;

/// "A, B, C, or D" style list.
fn join_or(items: &[String], conj: &str) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        2 => format!("{} {conj} {}", items[0], items[1]),
        n => format!("{}, {conj} {}", items[..n - 1].join(", "), items[n - 1]),
    }
}

/// The forbidden-names rule, single-sourced for both phases.
pub fn golden_rule(c: &PipelineContract) -> String {
    let names: Vec<String> = c.personas.iter().map(|p| p.name.clone()).collect();
    format!(
        "ABSOLUTE RULE: You must NEVER use the real names {} (or any obvious reference to them). \
         The characters are ONLY referred to by their code names: {}. \
         Breaking this rule is instant disqualification.",
        join_or(&c.forbidden_terms, "or"),
        join_or(&names, "and"),
    )
}

/// Spreadsheet-style label: A..Z, then AA, AB, ...
fn letter(i: usize) -> String {
    let mut n = i + 1;
    let mut rev = Vec::new();
    while n > 0 {
        n -= 1;
        rev.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    rev.into_iter().rev().collect()
}

/// Phase A system instruction.
pub fn draft_instruction(c: &PipelineContract) -> String {
    let mut out = String::new();
    let banner = format!("{} - {}", c.project, c.title);
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "{}", "=".repeat(banner.chars().count()));
    let _ = writeln!(out, "Role: {}", c.role);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Characters");
    for p in &c.personas {
        let _ = writeln!(out, "- **{}**: {}", p.name, p.voice);
    }
    let tones: Vec<String> = c
        .personas
        .iter()
        .map(|p| format!("{} = {}", p.display_name, p.tone))
        .collect();
    let _ = writeln!(out, "Maintain their distinct voices ({}).", tones.join(", "));
    let _ = writeln!(out);

    let _ = writeln!(out, "## {}", golden_rule(c));
    let _ = writeln!(out);

    let _ = writeln!(out, "## 1. Visual Hierarchy & Design System");
    let _ = writeln!(out, "Output ONLY clean HTML fragments, no <html>, <head>, or <body>.");
    let mut idx = 0;
    if let Some(svg) = &c.masthead_svg {
        let _ = writeln!(
            out,
            "{}. MASTHEAD: start the output with this EXACT SVG, copied verbatim and unmodified:\n   {svg}",
            letter(idx)
        );
        idx += 1;
    }
    if let Some(sub) = &c.sub_header {
        let _ = writeln!(
            out,
            "{}. SUB-HEADER: immediately after the masthead, this monospaced meta-data block:\n   {sub}",
            letter(idx)
        );
        idx += 1;
    }
    for rule in &c.layout_rules {
        let _ = writeln!(out, "{}. {rule}", letter(idx));
        idx += 1;
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## 2. Content Sections (in order)");
    for (i, s) in c.sections.iter().enumerate() {
        let _ = writeln!(out, "{}. {}\n   {}", letter(i), s.title, s.rule);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## 3. Technical Anchors & Formatting");
    for rule in &c.formatting_rules {
        let _ = writeln!(out, "- {rule}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## 4. Constraints");
    let _ = writeln!(
        out,
        "Keep the TOTAL output around {}-{} words. {}",
        c.word_range.min, c.word_range.max, c.tone_rule
    );
    out
}

/// Phase B system instruction: every rule of the contract as a checklist.
pub fn enforcement_instruction(c: &PipelineContract) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are the senior editor for \"{}\". Polish the raw draft into a publication-ready \
         layout. Check every item below against the draft and repair any violation.",
        c.title
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Rules");
    let mut rules = vec![
        golden_rule(c),
        format!(
            "Total length must be {}-{} words. Cut ruthlessly if needed.",
            c.word_range.min, c.word_range.max
        ),
        "Output clean HTML fragments only. No markdown, no <html>/<body>, no code fences.".to_string(),
    ];
    rules.extend(c.editor_rules.iter().cloned());
    rules.push(c.tone_rule.clone());
    for (i, r) in rules.iter().enumerate() {
        let _ = writeln!(out, "{}. {r}", i + 1);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Layout Checklist (enforce ALL of these)");
    if let Some(svg) = &c.masthead_svg {
        let _ = writeln!(
            out,
            "- [ ] MASTHEAD: the SVG blueprint MUST be the very first element. If missing, inject \
             it. Do NOT modify it:\n      {svg}"
        );
    }
    if let Some(sub) = &c.sub_header {
        let _ = writeln!(out, "- [ ] SUB-HEADER: {sub} immediately after the masthead.");
    }
    for s in &c.sections {
        let _ = writeln!(out, "- [ ] {}: {}", s.title, s.rule);
    }
    for rule in c.layout_rules.iter().chain(c.formatting_rules.iter()) {
        let _ = writeln!(out, "- [ ] {rule}");
    }
    let names: Vec<String> = c
        .personas
        .iter()
        .map(|p| format!("{} ({}, {})", p.name, p.display_name, p.tone))
        .collect();
    let _ = writeln!(
        out,
        "- [ ] CAST: only these characters speak, each in their own voice: {}.",
        names.join("; ")
    );
    let _ = writeln!(
        out,
        "- [ ] FORBIDDEN: none of these may appear anywhere, in any case: {}.",
        c.forbidden_terms.join(", ")
    );
    let _ = writeln!(out);

    let titles: Vec<String> = c.sections.iter().map(|s| format!("\"{}\"", s.title)).collect();
    let _ = writeln!(
        out,
        "## Section order\nAll {} sections must be present, in this order: {}.",
        c.sections.len(),
        titles.join(", ")
    );
    out
}

/// Phase A user content: curated headlines plus the pass-through context.
pub fn draft_payload(c: &PipelineContract, items: &[SourceItem], context: &ContextData) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## {}", c.news_heading);
    if items.is_empty() {
        let _ = writeln!(out, "(no headlines survived this week)");
    }
    for it in items {
        let summary: String = it.summary.chars().take(SUMMARY_CHARS).collect();
        let head = if it.link.is_empty() {
            it.title.clone()
        } else {
            format!("[{}]({})", it.title, it.link)
        };
        if summary.is_empty() {
            let _ = writeln!(out, "- {head}");
        } else {
            let _ = writeln!(out, "- {head}: {summary}");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Weather forecast for {}", context.location);
    let json = serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());
    let _ = writeln!(out, "{json}");
    if let Some(err) = &context.error {
        let _ = writeln!(
            out,
            "NOTE: the forecast could not be fetched ({err}). Acknowledge the missing forecast \
             instead of inventing one."
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", c.call_to_action);
    out
}

/// Phase B user content.
pub fn edit_payload(draft: &str) -> String {
    format!("## DRAFT TO EDIT\n\n{draft}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> PipelineContract {
        PipelineContract::paddock_default()
    }

    #[test]
    fn golden_rule_lists_names_and_code_names() {
        let r = golden_rule(&contract());
        assert!(r.contains("Jeremy, James, Richard, or Chris"));
        assert!(r.contains("THE APE, SLOWWORM, THE HAMSTER, and THE MONKEY"));
    }

    #[test]
    fn both_instructions_carry_every_rule() {
        let c = contract();
        let draft = draft_instruction(&c);
        let edit = enforcement_instruction(&c);
        for text in [&draft, &edit] {
            for p in &c.personas {
                assert!(text.contains(&p.name), "missing persona {}", p.name);
            }
            for t in &c.forbidden_terms {
                assert!(text.contains(t.as_str()), "missing forbidden term {t}");
            }
            for s in &c.sections {
                assert!(text.contains(&s.title), "missing section {}", s.title);
                assert!(text.contains(&s.rule), "missing rule for {}", s.id);
            }
            for r in c.layout_rules.iter().chain(&c.formatting_rules) {
                assert!(text.contains(r.as_str()), "missing rule {r}");
            }
            assert!(text.contains(crate::contract::MONOLITH_SVG));
            assert!(text.contains("500-600 words"));
        }
    }

    #[test]
    fn enforcement_is_a_checklist_in_section_order() {
        let c = contract();
        let edit = enforcement_instruction(&c);
        let order = edit.split("## Section order").nth(1).unwrap();
        let positions: Vec<usize> = c
            .section_titles()
            .iter()
            .map(|t| order.find(t).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(edit.matches("- [ ] ").count() >= c.sections.len() + 2);
    }

    #[test]
    fn draft_payload_truncates_summary_and_handles_missing_link() {
        let c = contract();
        let long = "x".repeat(300);
        let items = vec![
            SourceItem::new("Norris on pole", "BBC")
                .with_link("https://b.test/1")
                .with_summary(long),
            SourceItem::new("Untethered", "Sky"),
        ];
        let ctx = ContextData {
            location: "Silverstone".into(),
            error: None,
            days: vec![],
        };
        let p = draft_payload(&c, &items, &ctx);
        assert!(p.contains(&format!("- [Norris on pole](https://b.test/1): {}\n", "x".repeat(200))));
        assert!(p.contains("- Untethered\n"));
        assert!(p.contains("## Weather forecast for Silverstone"));
        assert!(!p.contains("NOTE:"));
        assert!(p.trim_end().ends_with("Now write the newsletter."));
    }

    #[test]
    fn failed_context_is_surfaced_not_omitted() {
        let c = contract();
        let ctx = ContextData::failed("Monza", "open-meteo timeout");
        let p = draft_payload(&c, &[], &ctx);
        assert!(p.contains("\"error\": \"open-meteo timeout\""));
        assert!(p.contains("NOTE: the forecast could not be fetched (open-meteo timeout)"));
    }

    #[test]
    fn edit_payload_wraps_draft() {
        assert_eq!(edit_payload("<p>x</p>"), "## DRAFT TO EDIT\n\n<p>x</p>");
    }

    #[test]
    fn labels_stay_unique_past_z() {
        assert_eq!(letter(0), "A");
        assert_eq!(letter(25), "Z");
        assert_eq!(letter(26), "AA");
        assert_eq!(letter(27), "AB");
        assert_eq!(letter(701), "ZZ");
        assert_eq!(letter(702), "AAA");

        let mut c = contract();
        c.layout_rules = (0..30).map(|i| format!("layout rule {i}")).collect();
        let text = draft_instruction(&c);
        let labels: std::collections::HashSet<&str> = text
            .lines()
            .filter(|l| l.contains(". layout rule "))
            .filter_map(|l| l.split('.').next())
            .collect();
        assert_eq!(labels.len(), 30);
    }
}
