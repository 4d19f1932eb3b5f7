//! Critics: the editor side of the review loop

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    brain::{extract_json_block, ChatMessage, GenerationBackend},
    types::{Critique, Verdict},
};

const EDITOR_SYSTEM_PROMPT: &str = "You are an exacting managing editor hunting for filler, \
empty slogans and unsupported claims. If the article is ready to publish, answer with the \
verdict \"accept\". Otherwise answer \"revise\", list each problem in `issues` and give a \
concrete fix in `rewrite_hint`. Respond with strict JSON only, for example: \
{\"verdict\":\"revise\",\"issues\":[\"...\"],\"rewrite_hint\":\"...\"}";

const GENERIC_ISSUE: &str = "The editor requested a revision without listing specific issues";

/// Filler phrases flagged by the offline editor
const FILLER_PHRASES: &[&str] = &[
    "然而在这个瞬息万变的时代",
    "值得注意的是",
    "不可忽视",
    "赋能",
    "生态",
    "引领",
    "in today's fast-paced world",
    "it is worth noting that",
    "cannot be ignored",
    "game-changer",
    "paradigm shift",
    "empower",
];

#[derive(Debug, Clone, thiserror::Error)]
pub enum CritiqueError {
    #[error("Critic backend failed: {0}")]
    Backend(String),

    #[error("Critique timed out after {0}ms")]
    Timeout(u64),

    #[error("Malformed critique: {0}")]
    Malformed(String),
}

/// Raw critic answer before it is pinned to a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueVerdict {
    pub verdict: Verdict,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_hint: Option<String>,
}

impl CritiqueVerdict {
    pub fn accept() -> Self {
        Self {
            verdict: Verdict::Accept,
            issues: Vec::new(),
            rewrite_hint: None,
        }
    }

    pub fn revise(issues: Vec<String>) -> Self {
        Self {
            verdict: Verdict::Revise,
            issues,
            rewrite_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.rewrite_hint = Some(hint.into());
        self
    }

    /// Pin to a round. A REVISE always leaves with at least one issue:
    /// the rewrite hint stands in when the list is empty, then a generic one.
    pub fn into_critique(self, round: u32) -> Critique {
        let mut issues: Vec<String> = self
            .issues
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        let rewrite_hint = self
            .rewrite_hint
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        if self.verdict == Verdict::Revise && issues.is_empty() {
            issues.push(rewrite_hint.clone().unwrap_or_else(|| GENERIC_ISSUE.to_string()));
        }

        Critique {
            verdict: self.verdict,
            issues,
            round,
            rewrite_hint,
        }
    }
}

/// Trait that all critics must implement
#[async_trait]
pub trait CritiqueBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn critique(&self, content: &str) -> Result<CritiqueVerdict, CritiqueError>;
}

/// Editor persona backed by a language model
pub struct LlmCritic {
    backend: Arc<dyn GenerationBackend>,
    model: String,
}

impl LlmCritic {
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CritiqueBackend for LlmCritic {
    fn name(&self) -> &str {
        "llm-editor"
    }

    async fn critique(&self, content: &str) -> Result<CritiqueVerdict, CritiqueError> {
        let messages = [
            ChatMessage::system(EDITOR_SYSTEM_PROMPT),
            ChatMessage::user(format!("Article under review:\n{}", content)),
        ];

        let raw = self
            .backend
            .complete(&self.model, &messages)
            .await
            .map_err(|e| CritiqueError::Backend(e.to_string()))?;

        parse_verdict(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    verdict: String,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    rewrite_hint: Option<String>,
}

fn verdict_from_label(label: &str) -> Option<Verdict> {
    let label = label.trim();
    if label.contains("过审") {
        return Some(Verdict::Accept);
    }
    if label.contains("退回") {
        return Some(Verdict::Revise);
    }
    match label.to_lowercase().as_str() {
        "accept" | "accepted" | "approve" | "approved" | "pass" => Some(Verdict::Accept),
        "revise" | "reject" | "rejected" | "return" => Some(Verdict::Revise),
        _ => None,
    }
}

/// Parse a model answer into a verdict
pub(crate) fn parse_verdict(raw: &str) -> Result<CritiqueVerdict, CritiqueError> {
    let block = extract_json_block(raw);

    if let Ok(parsed) = serde_json::from_str::<RawVerdict>(block) {
        let verdict = verdict_from_label(&parsed.verdict).ok_or_else(|| {
            CritiqueError::Malformed(format!("unknown verdict '{}'", parsed.verdict))
        })?;
        return Ok(CritiqueVerdict {
            verdict,
            issues: parsed.issues,
            rewrite_hint: parsed.rewrite_hint,
        });
    }

    // Bare markers without a JSON body
    if raw.contains("【过审】") {
        return Ok(CritiqueVerdict::accept());
    }
    if raw.contains("【退回】") {
        return Ok(CritiqueVerdict::revise(Vec::new()));
    }

    Err(CritiqueError::Malformed(format!(
        "no verdict found in: {}",
        raw.chars().take(200).collect::<String>()
    )))
}

/// Offline editor that returns drafts containing filler phrases
#[derive(Debug, Clone)]
pub struct HeuristicCritic {
    phrases: Vec<String>,
}

impl Default for HeuristicCritic {
    fn default() -> Self {
        Self {
            phrases: FILLER_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl HeuristicCritic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phrases(phrases: Vec<String>) -> Self {
        Self { phrases }
    }

    fn hits(&self, content: &str) -> Vec<&str> {
        let lowered = content.to_lowercase();
        self.phrases
            .iter()
            .filter(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
            .map(|p| p.as_str())
            .collect()
    }
}

#[async_trait]
impl CritiqueBackend for HeuristicCritic {
    fn name(&self) -> &str {
        "heuristic-editor"
    }

    async fn critique(&self, content: &str) -> Result<CritiqueVerdict, CritiqueError> {
        let hits = self.hits(content);
        if hits.is_empty() {
            return Ok(CritiqueVerdict::accept());
        }

        Ok(CritiqueVerdict::revise(vec![format!("Filler phrases: {}", hits.join(", "))])
            .with_hint("Cut slogans that carry no information; state the facts and the judgement directly."))
    }
}
