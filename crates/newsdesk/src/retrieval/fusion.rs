//! Retrieval Fusion Engine
//!
//! Fans a topic query out to every configured provider in parallel and folds
//! whatever comes back before the global deadline into a single Fact Pack.
//! Provider failures are recorded in coverage and never fail the fusion.

use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::{task::JoinSet, time::Instant};

use crate::{config::RetrievalConfig, types::Topic};

use super::{
    fact_pack::{FactPack, FetchOutcome, ProviderOutcome},
    provider::{ProviderAdapter, ProviderError},
};

/// Fuse with explicit bounds and no per-provider cap
pub async fn fuse(
    topic: &Topic,
    providers: &[Arc<dyn ProviderAdapter>],
    per_provider_timeout: Duration,
    global_deadline: Duration,
) -> FactPack {
    RetrievalFusionEngine::new(per_provider_timeout, global_deadline)
        .fuse(topic, providers)
        .await
}

#[derive(Debug, Clone)]
pub struct RetrievalFusionEngine {
    per_provider_timeout: Duration,
    global_deadline: Duration,
    max_results_per_provider: usize,
}

impl RetrievalFusionEngine {
    pub fn new(per_provider_timeout: Duration, global_deadline: Duration) -> Self {
        Self {
            per_provider_timeout,
            global_deadline,
            max_results_per_provider: 0,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.per_provider_timeout(), config.global_deadline())
            .with_max_results(config.max_results_per_provider)
    }

    /// Cap items taken from each provider (0 = unlimited)
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results_per_provider = max;
        self
    }

    pub async fn fuse(&self, topic: &Topic, providers: &[Arc<dyn ProviderAdapter>]) -> FactPack {
        let query = topic.query();
        let deadline = Instant::now() + self.global_deadline;

        tracing::info!(
            "[FUSION] Querying {} providers for '{}' (per-provider {}ms, deadline {}ms)",
            providers.len(),
            query,
            self.per_provider_timeout.as_millis(),
            self.global_deadline.as_millis()
        );

        // Slots are owned by this call; aborted tasks can never write into them.
        let mut slots: Vec<Option<(FetchOutcome, u64)>> = (0..providers.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(providers.len());
        let fan_out = Instant::now();

        for (idx, provider) in providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let query = query.clone();
            let per_provider = self.per_provider_timeout;

            let handle = tasks.spawn(async move {
                let started = Instant::now();
                let fetch = AssertUnwindSafe(provider.fetch(&query, per_provider)).catch_unwind();

                let outcome = match tokio::time::timeout(per_provider, fetch).await {
                    Ok(Ok(Ok(result))) => match result.validate() {
                        Ok(()) => FetchOutcome::Completed(result),
                        Err(e) => FetchOutcome::Failed(e),
                    },
                    Ok(Ok(Err(e))) => FetchOutcome::Failed(e),
                    Ok(Err(panic)) => FetchOutcome::Failed(ProviderError::Panicked(panic_message(&panic))),
                    Err(_) => FetchOutcome::Failed(ProviderError::Timeout(per_provider.as_millis() as u64)),
                };

                (idx, outcome, started.elapsed().as_millis() as u64)
            });
            task_slots.insert(handle.id(), idx);
        }

        let mut deadline_hit = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(Ok((_, (idx, outcome, elapsed_ms))))) => {
                    match &outcome {
                        FetchOutcome::Completed(result) => tracing::info!(
                            "[FUSION] {} returned {} items in {}ms{}",
                            providers[idx].id(),
                            result.items.len(),
                            elapsed_ms,
                            if result.partial { " (partial)" } else { "" }
                        ),
                        FetchOutcome::Failed(e) => {
                            tracing::warn!("[FUSION] {} failed after {}ms: {}", providers[idx].id(), elapsed_ms, e)
                        }
                        FetchOutcome::TimedOut => {}
                    }
                    slots[idx] = Some((outcome, elapsed_ms));
                }
                Ok(Some(Err(e))) => {
                    let Some(&idx) = task_slots.get(&e.id()) else {
                        tracing::warn!("[FUSION] Unknown task ended abnormally: {}", e);
                        continue;
                    };
                    let error = if e.is_panic() {
                        ProviderError::Panicked(panic_message(&e.into_panic()))
                    } else {
                        ProviderError::Transport(format!("task ended abnormally: {}", e))
                    };
                    tracing::warn!("[FUSION] {} task ended abnormally: {}", providers[idx].id(), error);
                    slots[idx] = Some((FetchOutcome::Failed(error), fan_out.elapsed().as_millis() as u64));
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    tracing::warn!(
                        "[FUSION] Global deadline reached with {} providers outstanding",
                        tasks.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }
        drop(tasks);

        let global_ms = self.global_deadline.as_millis() as u64;
        let outcomes: Vec<ProviderOutcome> = providers
            .iter()
            .zip(slots)
            .map(|(provider, slot)| {
                let (outcome, elapsed_ms) = match slot {
                    Some(done) => done,
                    None if deadline_hit => (FetchOutcome::TimedOut, global_ms),
                    None => (
                        FetchOutcome::Failed(ProviderError::Panicked(
                            "task ended without a result".to_string(),
                        )),
                        0,
                    ),
                };
                ProviderOutcome {
                    provider_id: provider.id().to_string(),
                    class: provider.class(),
                    outcome,
                    elapsed_ms,
                }
            })
            .collect();

        let pack = FactPack::assemble(topic.clone(), outcomes, self.max_results_per_provider);

        tracing::info!(
            "[FUSION] Fact pack {} ready: {} hard, {} soft, status={}",
            pack.id,
            pack.hard.len(),
            pack.soft.len(),
            pack.status_label()
        );

        pack
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
