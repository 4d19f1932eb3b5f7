//! # Newsdesk
//!
//! Fact-grounded article pipeline: parallel evidence retrieval fused into a
//! Fact Pack, a drafting model writing from that pack, and a bounded
//! editor/rewriter review loop. Every run ends in exactly one [`RunResult`].

pub mod brain;
pub mod config;
pub mod events;
pub mod generator;
pub mod orchestrator;
pub mod outline;
pub mod publish;
pub mod retrieval;
pub mod review;
pub mod types;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod fusion_tests;

pub use brain::{BackendError, ChatMessage, GenerationBackend, MessageRole, OpenAiCompatibleBackend};
pub use config::{
    ConfigError, GenerationConfig, ModuleToggles, PipelineConfig, RetrievalConfig, ReviewConfig, RunConfig,
};
pub use events::PipelineEvent;
pub use generator::{ContentGenerator, GenerationError};
pub use orchestrator::{PipelineOrchestrator, RunArtifacts};
pub use outline::{Outline, OutlineError, OutlineSection};
pub use publish::{is_publishable, JsonFileSink, PublishError, PublishReceipt, PublishRequest, PublishSink};
pub use retrieval::{
    fuse, CoverageStatus, FactPack, FactPackDocument, HotListProvider, ProviderAdapter, ProviderCoverage,
    ProviderError, ProviderResult, RetrievalFusionEngine, StaticProvider, WebSearchProvider,
};
pub use review::{
    CritiqueBackend, CritiqueError, CritiqueVerdict, HeuristicCritic, LlmCritic, ReviewLoop, ReviewOutcome,
    ReviewState,
};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    Critique, Draft, ErrorKind, EvidenceClass, EvidenceItem, RunError, RunResult, RunStatus, Topic, Verdict,
};

/// Main error type for pipeline setup and publishing
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
