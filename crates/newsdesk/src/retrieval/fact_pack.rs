//! Fact Pack assembly
//!
//! Merges per-provider outcomes into one immutable evidence bundle with a
//! coverage entry for every configured provider.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EvidenceClass, EvidenceItem, Topic};

use super::provider::{ProviderError, ProviderResult};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Per-provider outcome of a fusion call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageStatus {
    Ok,
    /// Provider answered with partial/mock data
    Degraded,
    Failed,
    /// Still outstanding when the global deadline hit
    TimedOut,
    /// Retrieval disabled for this run
    Skipped,
}

impl CoverageStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, CoverageStatus::Ok | CoverageStatus::Skipped)
    }
}

/// Coverage bookkeeping for one configured provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCoverage {
    pub provider_id: String,
    pub class: EvidenceClass,
    pub status: CoverageStatus,
    pub item_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// How a single provider's fetch ended
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Completed(ProviderResult),
    Failed(ProviderError),
    TimedOut,
}

/// One slot per configured provider, in configuration order
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider_id: String,
    pub class: EvidenceClass,
    pub outcome: FetchOutcome,
    pub elapsed_ms: u64,
}

/// The fused, deduplicated evidence bundle handed to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPack {
    pub id: Uuid,
    pub topic: Topic,
    pub hard: Vec<EvidenceItem>,
    pub soft: Vec<EvidenceItem>,
    pub provider_coverage: Vec<ProviderCoverage>,
    pub generated_at: DateTime<Utc>,
}

impl FactPack {
    /// Merge provider outcomes.
    ///
    /// Providers are merged in slice order and items in returned order.
    /// A headline already seen (after normalisation) is dropped.
    /// `max_per_provider` of 0 means no cap.
    pub fn assemble(topic: Topic, outcomes: Vec<ProviderOutcome>, max_per_provider: usize) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let mut hard = Vec::new();
        let mut soft = Vec::new();
        let mut coverage = Vec::with_capacity(outcomes.len());

        for slot in outcomes {
            let (status, item_count, error) = match slot.outcome {
                FetchOutcome::Completed(result) => {
                    let status = if result.partial {
                        CoverageStatus::Degraded
                    } else {
                        CoverageStatus::Ok
                    };

                    let cap = if max_per_provider == 0 {
                        result.items.len()
                    } else {
                        max_per_provider
                    };

                    let target = match slot.class {
                        EvidenceClass::Hard => &mut hard,
                        EvidenceClass::Soft => &mut soft,
                    };

                    let mut kept = 0;
                    for item in result.items.into_iter().take(cap) {
                        if seen.insert(normalize_headline(&item.headline)) {
                            target.push(item);
                            kept += 1;
                        }
                    }
                    (status, kept, None)
                }
                FetchOutcome::Failed(e) => (CoverageStatus::Failed, 0, Some(e.to_string())),
                FetchOutcome::TimedOut => (
                    CoverageStatus::TimedOut,
                    0,
                    Some("abandoned at global retrieval deadline".to_string()),
                ),
            };

            coverage.push(ProviderCoverage {
                provider_id: slot.provider_id,
                class: slot.class,
                status,
                item_count,
                error,
                elapsed_ms: slot.elapsed_ms,
            });
        }

        Self {
            id: Uuid::new_v4(),
            topic,
            hard,
            soft,
            provider_coverage: coverage,
            generated_at: Utc::now(),
        }
    }

    /// Pack for a run with retrieval switched off
    pub fn skipped(topic: Topic, providers: &[(String, EvidenceClass)]) -> Self {
        let coverage = providers
            .iter()
            .map(|(id, class)| ProviderCoverage {
                provider_id: id.clone(),
                class: *class,
                status: CoverageStatus::Skipped,
                item_count: 0,
                error: None,
                elapsed_ms: 0,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            topic,
            hard: Vec::new(),
            soft: Vec::new(),
            provider_coverage: coverage,
            generated_at: Utc::now(),
        }
    }

    pub fn evidence_count(&self) -> usize {
        self.hard.len() + self.soft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence_count() == 0
    }

    /// All evidence, hard group first
    pub fn evidence(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.hard.iter().chain(self.soft.iter())
    }

    pub fn coverage_for(&self, provider_id: &str) -> Option<&ProviderCoverage> {
        self.provider_coverage
            .iter()
            .find(|c| c.provider_id == provider_id)
    }

    /// Any configured provider that did not deliver a full answer
    pub fn is_degraded(&self) -> bool {
        self.provider_coverage.iter().any(|c| !c.status.is_healthy())
    }

    pub fn status_label(&self) -> &'static str {
        let all_skipped = !self.provider_coverage.is_empty()
            && self
                .provider_coverage
                .iter()
                .all(|c| c.status == CoverageStatus::Skipped);

        if all_skipped {
            "skipped"
        } else if self.is_empty() {
            "empty"
        } else if self.is_degraded() {
            "degraded"
        } else {
            "ready"
        }
    }

    /// JSON-compatible form used for persistence and debugging
    pub fn to_document(&self) -> FactPackDocument {
        FactPackDocument {
            metadata: FactPackMetadata {
                topic: self.topic.title.clone(),
                status: self.status_label().to_string(),
                fact_pack_id: self.id,
                generated_at: self.generated_at,
                provider_coverage: self.provider_coverage.clone(),
            },
            hard_facts_global: self.hard.clone(),
            soft_emotions_domestic: self.soft.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPackMetadata {
    pub topic: String,
    pub status: String,
    pub fact_pack_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub provider_coverage: Vec<ProviderCoverage>,
}

/// Serialized form of a Fact Pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPackDocument {
    pub metadata: FactPackMetadata,
    pub hard_facts_global: Vec<EvidenceItem>,
    pub soft_emotions_domestic: Vec<EvidenceItem>,
}

/// Dedup key: trimmed, whitespace collapsed, lowercased
pub fn normalize_headline(headline: &str) -> String {
    WHITESPACE
        .replace_all(headline.trim(), " ")
        .to_lowercase()
}
