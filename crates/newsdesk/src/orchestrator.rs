//! Pipeline Orchestrator
//!
//! Runs one topic through retrieval, drafting and review and folds every
//! outcome into a single [`RunResult`]. Stage failures are data on the
//! result, never a panic or an early `Err`.

use std::{collections::HashSet, future::Future, sync::Arc};

use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::{ConfigError, PipelineConfig},
    events::{EventEmitter, PipelineEvent},
    generator::ContentGenerator,
    retrieval::{FactPack, ProviderAdapter, RetrievalFusionEngine},
    review::{CritiqueBackend, ReviewLoop},
    types::{ErrorKind, RunError, RunResult, RunResultBuilder, Topic},
    Result,
};

/// Why a stage was cut short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

/// Result of a run plus the fact pack it was built on
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub result: RunResult,
    /// Absent only when the run stopped before retrieval finished
    pub fact_pack: Option<Arc<FactPack>>,
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    providers: Vec<Arc<dyn ProviderAdapter>>,
    generator: Arc<ContentGenerator>,
    critic: Arc<dyn CritiqueBackend>,
    event_sender: Option<mpsc::Sender<PipelineEvent>>,
}

impl PipelineOrchestrator {
    /// Validate configuration and wire the stages. Fails before any
    /// network call if the configuration is unusable.
    pub fn new(
        config: PipelineConfig,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        generator: ContentGenerator,
        critic: Arc<dyn CritiqueBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let mut seen = HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.id().to_string()) {
                return Err(ConfigError::DuplicateProvider(provider.id().to_string()).into());
            }
        }

        Ok(Self {
            config,
            providers,
            generator: Arc::new(generator),
            critic,
            event_sender: None,
        })
    }

    /// Set event sender for progress updates
    pub fn with_event_sender(mut self, sender: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub async fn run(&self, topic: &Topic) -> RunResult {
        self.execute(topic, CancellationToken::new()).await.result
    }

    pub async fn run_with_cancel(&self, topic: &Topic, cancel: CancellationToken) -> RunResult {
        self.execute(topic, cancel).await.result
    }

    /// Run the pipeline and keep the fact pack alongside the result
    pub async fn execute(&self, topic: &Topic, cancel: CancellationToken) -> RunArtifacts {
        let run_id = Uuid::new_v4();
        let events = EventEmitter::new(run_id, self.event_sender.clone());
        let mut builder = RunResultBuilder::new(run_id, &topic.id);
        let deadline = self.config.run.deadline().map(|d| Instant::now() + d);

        tracing::info!("[PIPELINE] Run {} started for topic '{}' ({})", run_id, topic.title, topic.id);
        events.emit(PipelineEvent::RunStarted {
            run_id,
            topic_id: topic.id.clone(),
        });

        // Stage 1: retrieval
        let fact_pack = if self.config.enable_deep_research() {
            let engine = RetrievalFusionEngine::from_config(&self.config.retrieval);
            match guarded(engine.fuse(topic, &self.providers), &cancel, deadline).await {
                Ok(pack) => pack,
                Err(interrupt) => return self.interrupted(builder, interrupt, "retrieval", None, &events),
            }
        } else {
            tracing::info!("[PIPELINE] Deep research disabled, skipping retrieval");
            let configured: Vec<_> = self
                .providers
                .iter()
                .map(|p| (p.id().to_string(), p.class()))
                .collect();
            FactPack::skipped(topic.clone(), &configured)
        };
        let fact_pack = Arc::new(fact_pack);

        builder.fact_pack(fact_pack.id, fact_pack.provider_coverage.clone(), fact_pack.is_degraded());
        for coverage in &fact_pack.provider_coverage {
            if let Some(message) = &coverage.error {
                builder.error(
                    RunError::new(ErrorKind::Provider, "retrieval", message.clone())
                        .for_provider(coverage.provider_id.clone()),
                );
            }
            events.emit(PipelineEvent::ProviderCompleted {
                run_id,
                coverage: coverage.clone(),
            });
        }
        events.emit(PipelineEvent::FactPackReady {
            run_id,
            fact_pack_id: fact_pack.id,
            evidence_count: fact_pack.evidence_count(),
            status: fact_pack.status_label().to_string(),
        });

        // Stage 2: first draft
        let style = self.config.generation.style.as_str();
        let draft = match guarded(self.generator.generate(&fact_pack, style), &cancel, deadline).await {
            Ok(Ok(draft)) => draft,
            Ok(Err(e)) => {
                tracing::error!("[PIPELINE] Generation failed: {}", e);
                builder.error(RunError::new(ErrorKind::Generation, "generate", e.to_string()));
                return self.finish(builder.failed(), Some(fact_pack), &events);
            }
            Err(interrupt) => {
                return self.interrupted(builder, interrupt, "generate", Some(fact_pack), &events)
            }
        };
        events.emit(PipelineEvent::DraftProduced {
            run_id,
            round: draft.round,
            chars: draft.content.chars().count(),
        });

        // Stage 3: review
        if self.config.enable_multi_agent_review() {
            let review = ReviewLoop::from_config(
                Arc::clone(&self.generator),
                Arc::clone(&self.critic),
                &self.config.review,
            )
            .with_events(events.clone());

            match guarded(review.run(draft), &cancel, deadline).await {
                Ok(outcome) => builder.review(outcome),
                Err(interrupt) => {
                    return self.interrupted(builder, interrupt, "review", Some(fact_pack), &events)
                }
            }
        } else {
            tracing::info!("[PIPELINE] Multi-agent review disabled, keeping first draft");
            builder.draft(draft);
        }

        self.finish(builder.completed(), Some(fact_pack), &events)
    }

    fn interrupted(
        &self,
        mut builder: RunResultBuilder,
        interrupt: Interrupt,
        stage: &str,
        fact_pack: Option<Arc<FactPack>>,
        events: &EventEmitter,
    ) -> RunArtifacts {
        let (kind, message) = match interrupt {
            Interrupt::Cancelled => (ErrorKind::Cancelled, format!("run cancelled during {}", stage)),
            Interrupt::DeadlineExceeded => (
                ErrorKind::DeadlineExceeded,
                format!("run deadline of {}ms exceeded during {}", self.config.run.deadline_ms, stage),
            ),
        };
        tracing::warn!("[PIPELINE] {}", message);
        builder.error(RunError::new(kind, stage, message));
        self.finish(builder.failed(), fact_pack, events)
    }

    fn finish(&self, result: RunResult, fact_pack: Option<Arc<FactPack>>, events: &EventEmitter) -> RunArtifacts {
        tracing::info!(
            "[PIPELINE] Run {} finished: status={} rounds={} errors={} in {}ms",
            result.run_id,
            result.status,
            result.rounds_used,
            result.errors.len(),
            result.duration_ms
        );
        events.emit(PipelineEvent::RunFinished {
            run_id: result.run_id,
            status: result.status,
            duration_ms: result.duration_ms,
        });

        RunArtifacts { result, fact_pack }
    }
}

/// Race a stage against cancellation and the run deadline
async fn guarded<F: Future>(
    stage: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> std::result::Result<F::Output, Interrupt> {
    let deadline_reached = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = deadline_reached => Err(Interrupt::DeadlineExceeded),
        output = stage => Ok(output),
    }
}
