//! Progress events emitted while a run is in flight

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    retrieval::ProviderCoverage,
    review::ReviewState,
    types::{RunStatus, Verdict},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        topic_id: String,
    },
    /// One per configured provider once retrieval settles
    ProviderCompleted {
        run_id: Uuid,
        coverage: ProviderCoverage,
    },
    FactPackReady {
        run_id: Uuid,
        fact_pack_id: Uuid,
        evidence_count: usize,
        status: String,
    },
    DraftProduced {
        run_id: Uuid,
        round: u32,
        chars: usize,
    },
    CritiqueReceived {
        run_id: Uuid,
        round: u32,
        verdict: Verdict,
        issue_count: usize,
    },
    ReviewFinished {
        run_id: Uuid,
        state: ReviewState,
        rounds_used: u32,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
        duration_ms: u64,
    },
}

/// Optional event channel shared by the pipeline stages
///
/// Sends never wait: a full or closed channel drops the event.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventEmitter {
    run_id: Uuid,
    sender: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventEmitter {
    pub(crate) fn new(run_id: Uuid, sender: Option<mpsc::Sender<PipelineEvent>>) -> Self {
        Self { run_id, sender }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.try_send(event) {
                tracing::debug!("[PIPELINE] Dropped progress event: {}", e);
            }
        }
    }
}
