//! Review Loop
//!
//! Bounded generate → critique → revise cycle. The critic is asked about the
//! current draft; a REVISE verdict sends the draft back to the generator
//! until `max_rounds` revisions have been spent, after which the draft is
//! force-accepted with the critic's last issues left unresolved.
//!
//! ```text
//! Drafted → UnderReview → Accepted
//!                ↓   ↑
//!             Revising
//!                ↓
//!           ForcedAccept
//! ```

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::ReviewConfig,
    events::{EventEmitter, PipelineEvent},
    generator::ContentGenerator,
    types::{Critique, Draft, ErrorKind, RunError, Verdict},
};

pub mod critic;

pub use critic::{CritiqueBackend, CritiqueError, CritiqueVerdict, HeuristicCritic, LlmCritic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Drafted,
    UnderReview,
    Revising,
    Accepted,
    ForcedAccept,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Accepted | ReviewState::ForcedAccept)
    }

    /// Pure transition function; `None` for a step that is not valid here
    pub fn advance(self, step: ReviewStep) -> Option<ReviewState> {
        use ReviewState::*;

        match (self, step) {
            (Drafted, ReviewStep::Submit) => Some(UnderReview),
            (UnderReview, ReviewStep::Critiqued { verdict: Verdict::Accept, .. }) => Some(Accepted),
            (
                UnderReview,
                ReviewStep::Critiqued {
                    verdict: Verdict::Revise,
                    draft_round,
                    max_rounds,
                },
            ) => {
                if draft_round < max_rounds {
                    Some(Revising)
                } else {
                    Some(ForcedAccept)
                }
            }
            (Revising, ReviewStep::Revised) => Some(UnderReview),
            (UnderReview | Revising, ReviewStep::Failed) => Some(ForcedAccept),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewState::Drafted => write!(f, "drafted"),
            ReviewState::UnderReview => write!(f, "under_review"),
            ReviewState::Revising => write!(f, "revising"),
            ReviewState::Accepted => write!(f, "accepted"),
            ReviewState::ForcedAccept => write!(f, "forced_accept"),
        }
    }
}

/// Inputs to the review state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStep {
    Submit,
    Critiqued {
        verdict: Verdict,
        draft_round: u32,
        max_rounds: u32,
    },
    Revised,
    /// Critic or reviser failed
    Failed,
}

/// How a review loop ended
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub final_draft: Draft,
    pub state: ReviewState,
    /// Revisions applied to the initial draft
    pub rounds_used: u32,
    pub critique_invocations: u32,
    pub critiques: Vec<Critique>,
    pub unresolved_issues: Vec<String>,
    pub error: Option<RunError>,
}

pub struct ReviewLoop {
    generator: Arc<ContentGenerator>,
    critic: Arc<dyn CritiqueBackend>,
    max_rounds: u32,
    critique_timeout: Duration,
    events: EventEmitter,
}

impl ReviewLoop {
    pub fn new(generator: Arc<ContentGenerator>, critic: Arc<dyn CritiqueBackend>, max_rounds: u32) -> Self {
        Self {
            generator,
            critic,
            max_rounds,
            critique_timeout: Duration::from_secs(60),
            events: EventEmitter::default(),
        }
    }

    pub fn from_config(
        generator: Arc<ContentGenerator>,
        critic: Arc<dyn CritiqueBackend>,
        config: &ReviewConfig,
    ) -> Self {
        Self::new(generator, critic, config.max_rounds).with_critique_timeout(config.critique_timeout())
    }

    pub fn with_critique_timeout(mut self, timeout: Duration) -> Self {
        self.critique_timeout = timeout;
        self
    }

    pub(crate) fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    fn step(&self, state: ReviewState, step: ReviewStep) -> ReviewState {
        state.advance(step).unwrap_or_else(|| {
            tracing::error!("[REVIEW] Invalid transition {:?} from {}", step, state);
            ReviewState::ForcedAccept
        })
    }

    async fn critique(&self, draft: &Draft) -> Result<CritiqueVerdict, CritiqueError> {
        match tokio::time::timeout(self.critique_timeout, self.critic.critique(&draft.content)).await {
            Ok(result) => result,
            Err(_) => Err(CritiqueError::Timeout(self.critique_timeout.as_millis() as u64)),
        }
    }

    /// Run the loop on an initial draft. Never fails: every exit is a
    /// terminal state with the best draft so far.
    pub async fn run(&self, draft: Draft) -> ReviewOutcome {
        let mut state = self.step(ReviewState::Drafted, ReviewStep::Submit);
        let mut current = draft;
        let mut critiques = Vec::new();
        let mut invocations = 0;
        let mut unresolved = Vec::new();
        let mut error = None;

        tracing::info!(
            "[REVIEW] Starting review with {} (max {} rounds)",
            self.critic.name(),
            self.max_rounds
        );

        while !state.is_terminal() {
            invocations += 1;
            let critique = match self.critique(&current).await {
                Ok(verdict) => verdict.into_critique(current.round),
                Err(e) => {
                    tracing::warn!("[REVIEW] Critic failed on round {}: {}", current.round, e);
                    error = Some(RunError::new(ErrorKind::Critique, "review", e.to_string()));
                    state = self.step(state, ReviewStep::Failed);
                    break;
                }
            };

            tracing::info!(
                "[REVIEW] Round {} verdict {:?} with {} issues",
                critique.round,
                critique.verdict,
                critique.issues.len()
            );
            self.events.emit(PipelineEvent::CritiqueReceived {
                run_id: self.events.run_id(),
                round: critique.round,
                verdict: critique.verdict,
                issue_count: critique.issues.len(),
            });

            state = self.step(
                state,
                ReviewStep::Critiqued {
                    verdict: critique.verdict,
                    draft_round: current.round,
                    max_rounds: self.max_rounds,
                },
            );

            match state {
                ReviewState::ForcedAccept => {
                    tracing::warn!(
                        "[REVIEW] Round limit reached, accepting round {} draft with {} open issues",
                        current.round,
                        critique.issues.len()
                    );
                    unresolved = critique.issues.clone();
                }
                ReviewState::Revising => match self.generator.revise(&current, &critique).await {
                    Ok(revised) => {
                        self.events.emit(PipelineEvent::DraftProduced {
                            run_id: self.events.run_id(),
                            round: revised.round,
                            chars: revised.content.chars().count(),
                        });
                        current = revised;
                        state = self.step(state, ReviewStep::Revised);
                    }
                    Err(e) => {
                        tracing::warn!("[REVIEW] Revision of round {} failed: {}", current.round, e);
                        unresolved = critique.issues.clone();
                        error = Some(RunError::new(ErrorKind::Generation, "revise", e.to_string()));
                        state = self.step(state, ReviewStep::Failed);
                    }
                },
                _ => {}
            }

            critiques.push(critique);
        }

        let rounds_used = current.round;
        tracing::info!(
            "[REVIEW] Finished in state {} after {} critiques, {} revisions",
            state,
            invocations,
            rounds_used
        );
        self.events.emit(PipelineEvent::ReviewFinished {
            run_id: self.events.run_id(),
            state,
            rounds_used,
        });

        ReviewOutcome {
            final_draft: current,
            state,
            rounds_used,
            critique_invocations: invocations,
            critiques,
            unresolved_issues: unresolved,
            error,
        }
    }
}
