//! Content Generator
//!
//! Turns a Fact Pack into a draft article and rewrites drafts against critic
//! feedback. The generator never touches the pack beyond reading it; every
//! draft it produces carries the pack's id as provenance.
//!
//! With outlining on, the first draft is written in two steps: one call for
//! an [`Outline`], then one writer per section running concurrently. The
//! sections are joined in outline order.

use std::{sync::Arc, time::Duration};

use futures::future::try_join_all;

use crate::{
    brain::{BackendError, ChatMessage, GenerationBackend},
    config::GenerationConfig,
    outline::{Outline, OutlineSection, OUTLINER_SYSTEM_PROMPT},
    retrieval::FactPack,
    types::{Critique, Draft, EvidenceItem},
};

const WRITER_SYSTEM_PROMPT: &str = "You are a senior technology columnist. \
Write a complete, publishable article grounded strictly in the supplied evidence. \
Hard facts are verified reporting; cite their sources inline. \
Soft signals describe public discussion; present them as sentiment, never as fact. \
Do not invent numbers, quotes or events that are not in the evidence. \
Output only the article body.";

const SECTION_SYSTEM_PROMPT: &str = "You are an efficient staff writer drafting one section \
of a longer article. Stay on the section's direction, quote the required fact, and use only the \
supplied evidence. Output only the section body, without its heading.";

const REWRITER_SYSTEM_PROMPT: &str = "You are a senior rewrite editor. \
Rework the article in place according to the editor's issues: remove filler and slogans, \
tighten redundant passages, keep information density and logical flow. \
Output only the full rewritten article, no explanation.";

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Generation timed out after {0}ms")]
    Timeout(u64),

    #[error("Revision requested without any issues")]
    InvalidRevision,
}

/// Drives the writing model
#[derive(Clone)]
pub struct ContentGenerator {
    backend: Arc<dyn GenerationBackend>,
    models: Vec<String>,
    timeout: Duration,
    outline: bool,
}

impl std::fmt::Debug for ContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGenerator")
            .field("backend", &self.backend.name())
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .field("outline", &self.outline)
            .finish()
    }
}

impl ContentGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            models: vec![model.into()],
            timeout: Duration::from_secs(120),
            outline: false,
        }
    }

    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        Self {
            backend,
            models: config.model_chain(),
            timeout: config.timeout(),
            outline: config.outline,
        }
    }

    /// Model tried after the primary fails
    pub fn with_fallback(mut self, model: impl Into<String>) -> Self {
        self.models.truncate(1);
        self.models.push(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Outline first, then draft the sections concurrently
    pub fn with_outline(mut self, enabled: bool) -> Self {
        self.outline = enabled;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Write the first draft (round 0) from the fact pack
    pub async fn generate(&self, fact_pack: &Arc<FactPack>, style: &str) -> Result<Draft, GenerationError> {
        tracing::info!(
            "[GENERATOR] Drafting '{}' from fact pack {} ({} items, style={})",
            fact_pack.topic.title,
            fact_pack.id,
            fact_pack.evidence_count(),
            style
        );

        let content = if self.outline {
            let outline = self.outline_for(fact_pack, style).await;
            self.draft_sections(fact_pack, style, &outline).await?
        } else {
            let messages = vec![
                ChatMessage::system(WRITER_SYSTEM_PROMPT),
                ChatMessage::user(build_writer_prompt(fact_pack, style)),
            ];
            self.complete(&messages).await?
        };

        Ok(Draft {
            content,
            round: 0,
            provenance_fact_pack_id: fact_pack.id,
        })
    }

    /// Ask the model for an outline; any failure falls back to the fixed skeleton
    async fn outline_for(&self, fact_pack: &FactPack, style: &str) -> Outline {
        let messages = vec![
            ChatMessage::system(OUTLINER_SYSTEM_PROMPT),
            ChatMessage::user(build_writer_prompt(fact_pack, style)),
        ];

        let reason = match self.complete(&messages).await {
            Ok(raw) => match Outline::parse(&raw) {
                Ok(outline) => {
                    tracing::info!("[GENERATOR] Outline ready: '{}'", outline.title);
                    return outline;
                }
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        tracing::warn!("[GENERATOR] Using fallback outline: {}", reason);
        Outline::fallback(fact_pack)
    }

    /// One writer per section; the first failure fails the whole draft
    async fn draft_sections(
        &self,
        fact_pack: &FactPack,
        style: &str,
        outline: &Outline,
    ) -> Result<String, GenerationError> {
        let evidence = build_writer_prompt(fact_pack, style);

        let writers = outline.sections.iter().map(|section| {
            let messages = vec![
                ChatMessage::system(SECTION_SYSTEM_PROMPT),
                ChatMessage::user(build_section_prompt(&outline.title, section, &evidence)),
            ];
            async move { self.complete(&messages).await }
        });

        let bodies = try_join_all(writers).await?;
        tracing::info!("[GENERATOR] Drafted {} sections", bodies.len());
        Ok(outline.assemble(&bodies))
    }

    /// Rewrite a draft against critic feedback; the result is one round later
    pub async fn revise(&self, draft: &Draft, critique: &Critique) -> Result<Draft, GenerationError> {
        let issues: Vec<&str> = critique
            .issues
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect();
        if issues.is_empty() {
            return Err(GenerationError::InvalidRevision);
        }

        tracing::info!(
            "[GENERATOR] Revising round {} draft against {} issues",
            draft.round,
            issues.len()
        );

        let mut feedback = String::from("Editor issues:\n");
        for issue in &issues {
            feedback.push_str(&format!("- {}\n", issue));
        }
        if let Some(hint) = critique.rewrite_hint.as_deref().filter(|h| !h.trim().is_empty()) {
            feedback.push_str(&format!("\nSuggested rewrite: {}\n", hint.trim()));
        }

        let messages = vec![
            ChatMessage::system(REWRITER_SYSTEM_PROMPT),
            ChatMessage::assistant(draft.content.clone()),
            ChatMessage::user(feedback),
        ];
        let content = self.complete(&messages).await?;

        Ok(Draft {
            content,
            round: draft.round + 1,
            provenance_fact_pack_id: draft.provenance_fact_pack_id,
        })
    }

    /// Try each model in order, returning the first non-empty answer
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let mut last_error = GenerationError::EmptyResponse;

        for (attempt, model) in self.models.iter().enumerate() {
            if attempt > 0 {
                tracing::info!("[GENERATOR] Primary model failed, trying fallback: {}", model);
            }

            match tokio::time::timeout(self.timeout, self.backend.complete(model, messages)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(Ok(_)) => {
                    tracing::warn!("[GENERATOR] {} returned an empty response", model);
                    last_error = GenerationError::EmptyResponse;
                }
                Ok(Err(e)) => {
                    tracing::warn!("[GENERATOR] {} failed: {}", model, e);
                    last_error = GenerationError::Backend(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "[GENERATOR] {} timed out after {}ms",
                        model,
                        self.timeout.as_millis()
                    );
                    last_error = GenerationError::Timeout(self.timeout.as_millis() as u64);
                }
            }
        }

        Err(last_error)
    }
}

fn format_evidence(items: &[EvidenceItem], out: &mut String) {
    for (idx, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. [{}] {}", idx + 1, item.source_label, item.headline));
        if !item.snippet.trim().is_empty() {
            out.push_str(&format!(" | {}", item.snippet.trim()));
        }
        if let Some(url) = &item.url {
            out.push_str(&format!(" ({})", url));
        }
        out.push('\n');
    }
}

fn build_section_prompt(title: &str, section: &OutlineSection, evidence: &str) -> String {
    let mut prompt = format!("Article: {}\nSection: {}\n", title.trim(), section.name.trim());
    if !section.guidance.trim().is_empty() {
        prompt.push_str(&format!("Direction: {}\n", section.guidance.trim()));
    }
    if !section.quote_req.trim().is_empty() {
        prompt.push_str(&format!("Must cite: {}\n", section.quote_req.trim()));
    }
    prompt.push('\n');
    prompt.push_str(evidence);
    prompt
}

fn build_writer_prompt(fact_pack: &FactPack, style: &str) -> String {
    let topic = &fact_pack.topic;
    let mut prompt = format!("Topic: {}\n", topic.title);
    if !topic.description.trim().is_empty() {
        prompt.push_str(&format!("Background: {}\n", topic.description.trim()));
    }
    prompt.push_str(&format!("Style: {}\n\n", style));

    if fact_pack.is_empty() {
        prompt.push_str(
            "No external evidence was retrieved. Write a cautious explainer from the topic alone \
             and say explicitly where facts could not be confirmed.\n",
        );
        return prompt;
    }

    prompt.push_str("## Hard facts (global reporting)\n");
    if fact_pack.hard.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        format_evidence(&fact_pack.hard, &mut prompt);
    }

    prompt.push_str("\n## Soft signals (public discussion)\n");
    if fact_pack.soft.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        format_evidence(&fact_pack.soft, &mut prompt);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        retrieval::{FetchOutcome, ProviderOutcome, ProviderResult},
        types::{EvidenceClass, Topic, Verdict},
    };

    fn pack() -> FactPack {
        let hard = ProviderResult::new(
            "search",
            vec![EvidenceItem::new("reuters.com", "Chip rules tightened", 0.9)
                .with_snippet("New export limits")
                .with_url("https://reuters.com/a")],
        );
        FactPack::assemble(
            Topic::new("t1", "Chip export rules").with_description("Policy shift"),
            vec![ProviderOutcome {
                provider_id: "search".to_string(),
                class: EvidenceClass::Hard,
                outcome: FetchOutcome::Completed(hard),
                elapsed_ms: 5,
            }],
            0,
        )
    }

    #[test]
    fn test_writer_prompt_separates_groups() {
        let prompt = build_writer_prompt(&pack(), "explanatory");
        assert!(prompt.contains("Topic: Chip export rules"));
        assert!(prompt.contains("Background: Policy shift"));
        assert!(prompt.contains("1. [reuters.com] Chip rules tightened | New export limits (https://reuters.com/a)"));
        assert!(prompt.contains("## Soft signals (public discussion)\n(none)"));
    }

    #[test]
    fn test_writer_prompt_for_empty_pack() {
        let empty = FactPack::assemble(Topic::new("t2", "Quiet topic"), Vec::new(), 0);
        let prompt = build_writer_prompt(&empty, "brief");
        assert!(prompt.contains("No external evidence"));
        assert!(!prompt.contains("## Hard facts"));
    }

    #[tokio::test]
    async fn test_revise_rejects_blank_issues() {
        let backend = Arc::new(crate::test_support::ScriptedBackend::new(vec![Ok("unused".to_string())]));
        let generator = ContentGenerator::new(backend.clone(), "m");
        let draft = Draft {
            content: "body".to_string(),
            round: 0,
            provenance_fact_pack_id: uuid::Uuid::new_v4(),
        };
        let critique = Critique {
            verdict: Verdict::Revise,
            issues: vec!["  ".to_string()],
            round: 0,
            rewrite_hint: None,
        };

        let err = generator.revise(&draft, &critique).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRevision));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_model_used_after_primary_fails() {
        let backend = Arc::new(crate::test_support::ScriptedBackend::new(vec![
            Err(BackendError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Ok("  Fallback draft  ".to_string()),
        ]));
        let generator = ContentGenerator::new(backend.clone(), "primary").with_fallback("local");

        let draft = generator.generate(&Arc::new(pack()), "explanatory").await.unwrap();
        assert_eq!(draft.content, "Fallback draft");
        assert_eq!(draft.round, 0);
        assert_eq!(backend.models_called(), vec!["primary", "local"]);
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let backend = Arc::new(crate::test_support::ScriptedBackend::new(vec![Ok(" \n ".to_string())]));
        let generator = ContentGenerator::new(backend, "m");
        let err = generator.generate(&Arc::new(pack()), "explanatory").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    const OUTLINE_JSON: &str = r#"{"title":"Export curbs bite","sections":[
        {"name":"Trigger","guidance":"timeline","quote_req":"Chip rules tightened"},
        {"name":"Conflict","guidance":"who objects","quote_req":"industry pushback"},
        {"name":"Outlook","guidance":"what next","quote_req":"analyst view"}]}"#;

    /// Answers the outliner with a fixed outline; later sections finish first
    struct SectionEcho;

    #[async_trait::async_trait]
    impl GenerationBackend for SectionEcho {
        fn name(&self) -> &str {
            "section-echo"
        }

        async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
            if messages[0].content == OUTLINER_SYSTEM_PROMPT {
                return Ok(OUTLINE_JSON.to_string());
            }
            let section = messages[1]
                .content
                .lines()
                .find_map(|l| l.strip_prefix("Section: "))
                .unwrap_or_default()
                .to_string();
            let delay = match section.as_str() {
                "Trigger" => 300,
                "Conflict" => 200,
                _ => 100,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(format!("Body of {}", section))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sections_assembled_in_outline_order() {
        let generator = ContentGenerator::new(Arc::new(SectionEcho), "m").with_outline(true);
        let draft = generator.generate(&Arc::new(pack()), "explanatory").await.unwrap();

        assert_eq!(
            draft.content,
            "# Export curbs bite\n\n## Trigger\n\nBody of Trigger\n\n## Conflict\n\nBody of Conflict\n\n## Outlook\n\nBody of Outlook"
        );
        assert_eq!(draft.round, 0);
    }

    #[tokio::test]
    async fn test_unusable_outline_falls_back_to_skeleton() {
        let backend = Arc::new(crate::test_support::ScriptedBackend::new(vec![
            Ok("I cannot produce JSON today".to_string()),
            Ok("first".to_string()),
            Ok("second".to_string()),
            Ok("third".to_string()),
        ]));
        let generator = ContentGenerator::new(backend.clone(), "m").with_outline(true);

        let draft = generator.generate(&Arc::new(pack()), "explanatory").await.unwrap();
        assert!(draft
            .content
            .starts_with("# Chip export rules\n\n## Where things stand\n\nfirst"));
        assert!(draft.content.ends_with("## Impact and outlook\n\nthird"));
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn test_failed_section_fails_the_draft() {
        let backend = Arc::new(crate::test_support::ScriptedBackend::new(vec![
            Ok(OUTLINE_JSON.to_string()),
            Ok("first".to_string()),
            Err(BackendError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
            Ok("third".to_string()),
        ]));
        let generator = ContentGenerator::new(backend, "m").with_outline(true);

        let err = generator.generate(&Arc::new(pack()), "explanatory").await.unwrap_err();
        assert!(matches!(err, GenerationError::Backend(BackendError::Api { status: 500, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout() {
        let backend = Arc::new(crate::test_support::ScriptedBackend::hanging());
        let generator = ContentGenerator::new(backend, "m").with_timeout(Duration::from_millis(500));
        let err = generator.generate(&Arc::new(pack()), "explanatory").await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(500)));
    }
}
