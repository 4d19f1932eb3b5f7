//! Article outlines
//!
//! An outline is a title plus exactly three sections, each naming the
//! direction it should take and the upstream fact it has to quote. The
//! generator asks a model for one and falls back to a fixed skeleton seeded
//! from the Fact Pack when the answer cannot be used.

use serde::{Deserialize, Serialize};

use crate::{brain::extract_json_block, retrieval::FactPack};

/// Number of sections every outline carries
pub const OUTLINE_SECTIONS: usize = 3;

const MAX_QUOTE_CHARS: usize = 120;

const MISSING_FACT: &str = "No upstream fact supplied; draw one from the fact pack";

pub(crate) const OUTLINER_SYSTEM_PROMPT: &str = "You dissect news into a skeleton. \
Respond with strict JSON only, in the form \
{\"title\":\"<headline>\",\"sections\":[{\"name\":\"<section heading>\",\
\"guidance\":\"<what the section argues>\",\"quote_req\":\"<upstream fact it must cite>\"}]}. \
There must be exactly 3 sections and each must be tied to a fact in the fact pack.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub name: String,
    #[serde(default)]
    pub guidance: String,
    #[serde(default)]
    pub quote_req: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineError {
    #[error("Outline is not valid JSON: {0}")]
    Malformed(String),

    #[error("Outline has {0} sections, expected 3")]
    SectionCount(usize),

    #[error("Outline has an empty title or section name")]
    Blank,
}

impl Outline {
    /// Parse a model answer, tolerating code fences and surrounding prose
    pub fn parse(raw: &str) -> Result<Self, OutlineError> {
        let outline: Outline =
            serde_json::from_str(extract_json_block(raw)).map_err(|e| OutlineError::Malformed(e.to_string()))?;

        if outline.sections.len() != OUTLINE_SECTIONS {
            return Err(OutlineError::SectionCount(outline.sections.len()));
        }
        if outline.title.trim().is_empty() || outline.sections.iter().any(|s| s.name.trim().is_empty()) {
            return Err(OutlineError::Blank);
        }

        Ok(outline)
    }

    /// Fixed three-part skeleton quoting the first hard facts, then soft signals
    pub fn fallback(fact_pack: &FactPack) -> Self {
        let mut quotes = fact_pack
            .hard
            .iter()
            .chain(fact_pack.soft.iter())
            .map(|item| item.headline.chars().take(MAX_QUOTE_CHARS).collect::<String>());
        let mut next_quote = || quotes.next().unwrap_or_else(|| MISSING_FACT.to_string());

        let skeleton = [
            (
                "Where things stand",
                "Set out the background and what triggered the story; keep the timeline clear.",
            ),
            ("The core conflict", "Take apart the dispute and point out where the sides disagree."),
            ("Impact and outlook", "Assess who is affected and where this is heading next."),
        ];

        Self {
            title: fact_pack.topic.title.clone(),
            sections: skeleton
                .iter()
                .map(|(name, guidance)| OutlineSection {
                    name: name.to_string(),
                    guidance: guidance.to_string(),
                    quote_req: next_quote(),
                })
                .collect(),
        }
    }

    /// Join section bodies under their headings, in outline order
    pub fn assemble(&self, bodies: &[String]) -> String {
        let mut article = format!("# {}", self.title.trim());
        for (section, body) in self.sections.iter().zip(bodies) {
            article.push_str(&format!("\n\n## {}\n\n{}", section.name.trim(), body.trim()));
        }
        article
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        retrieval::{FetchOutcome, ProviderOutcome, ProviderResult},
        types::{EvidenceClass, EvidenceItem, Topic},
    };

    fn pack_with(hard: Vec<EvidenceItem>, soft: Vec<EvidenceItem>) -> FactPack {
        let outcome = |id: &str, class, items| ProviderOutcome {
            provider_id: id.to_string(),
            class,
            outcome: FetchOutcome::Completed(ProviderResult::new(id, items)),
            elapsed_ms: 1,
        };
        FactPack::assemble(
            Topic::new("t1", "Chip export rules"),
            vec![outcome("wire", EvidenceClass::Hard, hard), outcome("weibo", EvidenceClass::Soft, soft)],
            0,
        )
    }

    #[test]
    fn test_parse_fenced_outline() {
        let raw = "Here you go:\n```json\n{\"title\":\"Export curbs bite\",\"sections\":[\
            {\"name\":\"Trigger\",\"guidance\":\"timeline\",\"quote_req\":\"rule text\"},\
            {\"name\":\"Conflict\",\"guidance\":\"who objects\"},\
            {\"name\":\"Outlook\",\"guidance\":\"next steps\",\"quote_req\":\"analyst view\"}]}\n```";
        let outline = Outline::parse(raw).unwrap();
        assert_eq!(outline.title, "Export curbs bite");
        assert_eq!(outline.sections[1].name, "Conflict");
        assert_eq!(outline.sections[1].quote_req, "");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let two = r#"{"title":"T","sections":[{"name":"a"},{"name":"b"}]}"#;
        assert_eq!(Outline::parse(two), Err(OutlineError::SectionCount(2)));

        let blank = r#"{"title":"T","sections":[{"name":"a"},{"name":" "},{"name":"c"}]}"#;
        assert_eq!(Outline::parse(blank), Err(OutlineError::Blank));

        assert!(matches!(Outline::parse("no json here"), Err(OutlineError::Malformed(_))));
    }

    #[test]
    fn test_fallback_quotes_hard_then_soft() {
        let pack = pack_with(
            vec![EvidenceItem::new("reuters.com", "Rules tightened", 0.9)],
            vec![EvidenceItem::new("Weibo", "Users worry about prices", 0.5)],
        );
        let outline = Outline::fallback(&pack);

        assert_eq!(outline.title, "Chip export rules");
        assert_eq!(outline.sections.len(), OUTLINE_SECTIONS);
        assert_eq!(outline.sections[0].quote_req, "Rules tightened");
        assert_eq!(outline.sections[1].quote_req, "Users worry about prices");
        assert_eq!(outline.sections[2].quote_req, MISSING_FACT);
    }

    #[test]
    fn test_assemble_keeps_section_order() {
        let pack = pack_with(Vec::new(), Vec::new());
        let outline = Outline::fallback(&pack);
        let article = outline.assemble(&["one ".to_string(), "two".to_string(), "three".to_string()]);

        assert!(article.starts_with("# Chip export rules\n\n## Where things stand\n\none\n\n## The core conflict"));
        assert!(article.ends_with("## Impact and outlook\n\nthree"));
    }
}
