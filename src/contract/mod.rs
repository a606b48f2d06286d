// src/contract/mod.rs
//! The newsletter contract: who speaks, what may never be said, which
//! sections appear in which order, and how long the issue is. One value is
//! built (or loaded) per process and shared read-only by both generation
//! phases; the instruction texts for each phase are rendered from it.

pub mod lint;
pub mod render;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub use lint::{lint, ContractReport};
pub use render::{draft_instruction, draft_payload, edit_payload, enforcement_instruction, golden_rule};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Code name, e.g. "THE APE".
    pub name: String,
    /// How the name is written in copy, e.g. "The Ape".
    pub display_name: String,
    /// Two-word voice tag, e.g. "Raw/Loud".
    pub tone: String,
    pub voice: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: String,
    pub title: String,
    /// Whether the section opens with its title as a heading.
    #[serde(default)]
    pub heading: bool,
    /// Literal the rendered section must contain (e.g. "<table").
    #[serde(default)]
    pub marker: Option<String>,
    pub rule: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRange {
    pub min: usize,
    pub max: usize,
}

impl WordRange {
    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineContract {
    pub project: String,
    pub title: String,
    pub role: String,
    pub personas: Vec<Persona>,
    pub forbidden_terms: Vec<String>,
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub masthead_svg: Option<String>,
    #[serde(default)]
    pub sub_header: Option<String>,
    #[serde(default)]
    pub layout_rules: Vec<String>,
    #[serde(default)]
    pub formatting_rules: Vec<String>,
    #[serde(default)]
    pub editor_rules: Vec<String>,
    pub tone_rule: String,
    pub word_range: WordRange,
    pub news_heading: String,
    pub call_to_action: String,
}

impl PipelineContract {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading contract from {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("contract {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let contract: PipelineContract = toml::from_str(s).context("parsing contract toml")?;
        contract.validate()?;
        Ok(contract)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in contract.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!(path = %path.display(), "contract file not found, using built-in contract");
            Ok(Self::paddock_default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.personas.is_empty() {
            bail!("contract has no personas");
        }
        let mut names = HashSet::new();
        for p in &self.personas {
            if p.name.trim().is_empty() {
                bail!("persona with empty name");
            }
            if !names.insert(p.name.to_lowercase()) {
                bail!("duplicate persona: {}", p.name);
            }
        }
        if self.forbidden_terms.iter().any(|t| t.trim().is_empty()) {
            bail!("forbidden terms must not be blank");
        }
        if self.sections.is_empty() {
            bail!("contract has no sections");
        }
        let mut ids = HashSet::new();
        for s in &self.sections {
            if !ids.insert(s.id.as_str()) {
                bail!("duplicate section id: {}", s.id);
            }
        }
        if self.word_range.min > self.word_range.max {
            bail!(
                "word range min {} exceeds max {}",
                self.word_range.min,
                self.word_range.max
            );
        }
        Ok(())
    }

    pub fn persona(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Section titles in required order.
    pub fn section_titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }

    /// The Paddock Pub Chat house contract.
    pub fn paddock_default() -> Self {
        Self {
            project: "PROJECT MONOLITH".into(),
            title: "THE PADDOCK PUB CHAT".into(),
            role: "You are a Lead Creative Developer at a Tier-1 Luxury Automotive Journal. \
                   Transform raw F1 news and \"Pub Chat\" dialogue into a high-fidelity, \
                   technical editorial spread rendered as clean HTML fragments."
                .into(),
            personas: vec![
                persona(
                    "THE APE",
                    "The Ape",
                    "Raw/Loud",
                    "Loud, aggressive, obsessed with POWER. Hates regulations. Frequently shouts \
                     single words in capitals. Thinks every rule change is a conspiracy against \
                     proper racing.",
                ),
                persona(
                    "SLOWWORM",
                    "Slowworm",
                    "Academic/Verbose",
                    "Pedantic know-it-all. Loves citing historical precedents and obscure \
                     regulations. Speaks in long, meandering sentences. Will always find a way \
                     to mention a 1970s Grand Prix.",
                ),
                persona(
                    "THE HAMSTER",
                    "The Hamster",
                    "Chaotic/Energetic",
                    "Excitable, high-pitched energy. Loves drama, crashes, and anything that goes \
                     wrong. Uses far too many exclamation marks. Gets distracted easily.",
                ),
                persona(
                    "THE MONKEY",
                    "The Monkey",
                    "Sensory/Poetic",
                    "Technical driver at heart. Obsessed with 'skids', steering feel, and the \
                     sensation of driving. Judges every situation through the lens of car \
                     control and throttle response.",
                ),
            ],
            forbidden_terms: vec!["Jeremy".into(), "James".into(), "Richard".into(), "Chris".into()],
            sections: vec![
                SectionSpec {
                    id: "quote".into(),
                    title: "QUOTE OF THE DAY".into(),
                    heading: false,
                    marker: Some("<blockquote".into()),
                    rule: "Exactly one standout <blockquote> with the single most memorable line: \
                           <blockquote>\"Quote text\" - <em>Character Name</em></blockquote>"
                        .into(),
                },
                SectionSpec {
                    id: "pub_chat".into(),
                    title: "THE PADDOCK PUB CHAT".into(),
                    heading: true,
                    marker: Some("<table".into()),
                    rule: "<h1> heading in ALL CAPS. Dialogue rendered as an HTML <table>: column 1 \
                           is <em>Character Name</em> (italics, title case), column 2 opens with a \
                           high-impact summary in quotes, then the synthesis of their argument. \
                           The main roundtable about the biggest news story; make it feel like an \
                           overheard pub conversation with interruptions, insults and running gags."
                        .into(),
                },
                SectionSpec {
                    id: "top_six".into(),
                    title: "THE WISE MEN'S TOP SIX".into(),
                    heading: true,
                    marker: Some("<ol".into()),
                    rule: "<h1> heading. Numbered list (<ol><li>) implying a definitive hierarchy. \
                           Each character gives ONE pick with a one-sentence justification. The two \
                           remaining picks are consensus."
                        .into(),
                },
                SectionSpec {
                    id: "weather".into(),
                    title: "WEATHER SPLASH".into(),
                    heading: true,
                    marker: None,
                    rule: "<h1> heading. A short, funny reaction to the provided weather forecast; \
                           each character gets one line."
                        .into(),
                },
            ],
            masthead_svg: Some(MONOLITH_SVG.into()),
            sub_header: Some(
                "<p><code>STATUS: CRITICAL INTEL &nbsp;|&nbsp; CLASSIFICATION: PADDOCK EYES ONLY</code></p>"
                    .into(),
            ),
            layout_rules: vec![
                "Use <h1> and <h3> in ALL CAPS for all section titles.".into(),
                "Character names must be in <em>italics</em> ONLY, never bold.".into(),
                "Use <hr> to separate the masthead, quote, dialogue table, top six, and weather sections."
                    .into(),
            ],
            formatting_rules: vec![
                "Bold key engineering terms with <strong> to create visual anchors (e.g. \
                 <strong>350kW MGU-K</strong>, <strong>Active Aero</strong>, <strong>ground effect</strong>)."
                    .into(),
                "Units rendered as plain text: 5°C or 18%, never LaTeX.".into(),
                "Character names ALWAYS <em>italics</em>, NEVER <strong>.".into(),
            ],
            editor_rules: vec![
                "Each character must sound DISTINCT; if two sound alike, sharpen their voices.".into(),
                "Fix any factual howlers, but keep the satire and humour.".into(),
            ],
            tone_rule: "Be funny, sharp, and irreverent, but never cruel toward real people.".into(),
            word_range: WordRange { min: 500, max: 600 },
            news_heading: "This week's F1 news".into(),
            call_to_action: "Now write the newsletter.".into(),
        }
    }
}

fn persona(name: &str, display_name: &str, tone: &str, voice: &str) -> Persona {
    Persona {
        name: name.into(),
        display_name: display_name.into(),
        tone: tone.into(),
        voice: voice.into(),
    }
}

/// 2026 technical wireframe blueprint used as the masthead.
pub const MONOLITH_SVG: &str = concat!(
    r#"<svg viewBox="0 0 800 160" xmlns="http://www.w3.org/2000/svg">"#,
    r##"<g fill="none" stroke="#F5F5F5" stroke-width="0.5" stroke-opacity="0.7">"##,
    r#"<path d="M100 130 L150 125 L350 110 L580 115 L680 100 L740 100 L750 135 Z" />"#,
    r#"<circle cx="180" cy="135" r="28" /> <circle cx="180" cy="135" r="12" />"#,
    r#"<circle cx="640" cy="135" r="30" /> <circle cx="640" cy="135" r="14" />"#,
    r#"<path d="M400 110 Q450 60 500 105" />"#,
    r#"<path d="M700 80 H750 V100 H700 Z" />"#,
    r#"<path d="M50 135 Q80 145 120 140" stroke-dasharray="2,2" />"#,
    r#"</g></svg>"#
);
