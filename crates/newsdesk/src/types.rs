//! Core types shared across pipeline stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    retrieval::ProviderCoverage,
    review::{ReviewOutcome, ReviewState},
};

/// A topic handed to the pipeline by an upstream collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Topic {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Query string sent to every provider
    pub fn query(&self) -> String {
        let tags: Vec<&str> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        if tags.is_empty() {
            self.title.trim().to_string()
        } else {
            format!("{} {}", self.title.trim(), tags.join(" "))
        }
    }
}

/// Which evidence group a provider feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceClass {
    /// Objective reporting: search engines, wire services, research
    Hard,
    /// Sentiment and discussion: hot lists, social platforms
    Soft,
}

impl std::fmt::Display for EvidenceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceClass::Hard => write!(f, "hard"),
            EvidenceClass::Soft => write!(f, "soft"),
        }
    }
}

/// A single piece of evidence returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source_label: String,
    pub headline: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Provider-supplied hint in [0, 1]; passed through untouched
    pub confidence: f64,
}

impl EvidenceItem {
    pub fn new(source_label: impl Into<String>, headline: impl Into<String>, confidence: f64) -> Self {
        Self {
            source_label: source_label.into(),
            headline: headline.into(),
            snippet: String::new(),
            url: None,
            confidence,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A generated article body at a given review round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub content: String,
    /// 0 for the initial generation, +1 per revision
    pub round: u32,
    pub provenance_fact_pack_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accept,
    Revise,
}

/// Critic feedback on one draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub verdict: Verdict,
    pub issues: Vec<String>,
    pub round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_hint: Option<String>,
}

/// Terminal status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    /// Process exit code surfaced by CLI wrappers
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Partial => 1,
            RunStatus::Failed => 2,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Provider,
    Generation,
    Critique,
    Configuration,
    Cancelled,
    DeadlineExceeded,
}

/// An error recorded on a run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl RunError {
    pub fn new(kind: ErrorKind, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.into(),
            message: message.into(),
            provider_id: None,
        }
    }

    pub fn for_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }
}

/// The single terminal artifact of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub topic_id: String,
    pub status: RunStatus,
    pub final_draft: Option<Draft>,
    pub fact_pack_id: Option<Uuid>,
    pub fact_pack_coverage: Vec<ProviderCoverage>,
    pub rounds_used: u32,
    pub review_state: Option<ReviewState>,
    pub unresolved_issues: Vec<String>,
    pub errors: Vec<RunError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Errors of a given kind, in the order they were recorded
    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &RunError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

/// Builder used by the orchestrator; finishing it freezes the result
#[derive(Debug)]
pub(crate) struct RunResultBuilder {
    run_id: Uuid,
    topic_id: String,
    started_at: DateTime<Utc>,
    started: std::time::Instant,
    fact_pack_id: Option<Uuid>,
    coverage: Vec<ProviderCoverage>,
    degraded: bool,
    review: Option<ReviewOutcome>,
    final_draft: Option<Draft>,
    errors: Vec<RunError>,
}

impl RunResultBuilder {
    pub(crate) fn new(run_id: Uuid, topic_id: &str) -> Self {
        Self {
            run_id,
            topic_id: topic_id.to_string(),
            started_at: Utc::now(),
            started: std::time::Instant::now(),
            fact_pack_id: None,
            coverage: Vec::new(),
            degraded: false,
            review: None,
            final_draft: None,
            errors: Vec::new(),
        }
    }

    pub(crate) fn fact_pack(&mut self, id: Uuid, coverage: Vec<ProviderCoverage>, degraded: bool) {
        self.fact_pack_id = Some(id);
        self.coverage = coverage;
        self.degraded = degraded;
    }

    pub(crate) fn draft(&mut self, draft: Draft) {
        self.final_draft = Some(draft);
    }

    pub(crate) fn review(&mut self, outcome: ReviewOutcome) {
        self.final_draft = Some(outcome.final_draft.clone());
        if let Some(err) = &outcome.error {
            self.errors.push(err.clone());
        }
        self.review = Some(outcome);
    }

    pub(crate) fn error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    /// Finish as an aborted run; any draft produced so far is discarded
    pub(crate) fn failed(mut self) -> RunResult {
        self.final_draft = None;
        self.finish(RunStatus::Failed)
    }

    /// Finish a run that produced a draft
    pub(crate) fn completed(self) -> RunResult {
        let forced = self
            .review
            .as_ref()
            .map(|r| r.state == ReviewState::ForcedAccept)
            .unwrap_or(false);

        let status = if forced || self.degraded {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        self.finish(status)
    }

    fn finish(self, status: RunStatus) -> RunResult {
        let (rounds_used, review_state, unresolved_issues) = match self.review {
            Some(outcome) => (outcome.rounds_used, Some(outcome.state), outcome.unresolved_issues),
            None => (
                self.final_draft.as_ref().map(|d| d.round).unwrap_or(0),
                None,
                Vec::new(),
            ),
        };

        RunResult {
            run_id: self.run_id,
            topic_id: self.topic_id,
            status,
            final_draft: self.final_draft,
            fact_pack_id: self.fact_pack_id,
            fact_pack_coverage: self.coverage,
            rounds_used,
            review_state,
            unresolved_issues,
            errors: self.errors,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
