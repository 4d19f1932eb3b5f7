//! Evidence retrieval
//!
//! Provider adapters, the fusion engine that fans out to them, and the Fact
//! Pack they are folded into.

pub mod fact_pack;
pub mod fusion;
pub mod provider;
pub mod providers;

pub use fact_pack::{
    normalize_headline, CoverageStatus, FactPack, FactPackDocument, FetchOutcome, ProviderCoverage,
    ProviderOutcome,
};
pub use fusion::{fuse, RetrievalFusionEngine};
pub use provider::{ProviderAdapter, ProviderError, ProviderResult};
pub use providers::{HotListProvider, StaticProvider, WebSearchProvider};
