//! Provider trait and common types for evidence retrieval

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EvidenceClass, EvidenceItem};

/// Error type for provider operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider task panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Transport(format!("request timed out: {}", e))
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// What one provider returned for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_id: String,
    pub items: Vec<EvidenceItem>,
    pub fetched_at: DateTime<Utc>,
    /// Degraded or mock data rather than a real answer
    #[serde(default)]
    pub partial: bool,
}

impl ProviderResult {
    pub fn new(provider_id: impl Into<String>, items: Vec<EvidenceItem>) -> Self {
        Self {
            provider_id: provider_id.into(),
            items,
            fetched_at: Utc::now(),
            partial: false,
        }
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Reject payloads that break the evidence contract
    pub fn validate(&self) -> Result<(), ProviderError> {
        for (idx, item) in self.items.iter().enumerate() {
            if item.headline.trim().is_empty() {
                return Err(ProviderError::Malformed(format!(
                    "item {} has an empty headline",
                    idx
                )));
            }
            if !(0.0..=1.0).contains(&item.confidence) {
                return Err(ProviderError::Malformed(format!(
                    "item {} has confidence {} outside [0, 1]",
                    idx, item.confidence
                )));
            }
        }
        Ok(())
    }
}

/// Trait that all evidence providers must implement
///
/// Implementations must honor `timeout`, must not block indefinitely and
/// must not touch memory shared with other providers.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used for coverage bookkeeping
    fn id(&self) -> &str;

    /// Evidence group this provider feeds
    fn class(&self) -> EvidenceClass;

    /// Fetch evidence for a query
    async fn fetch(&self, query: &str, timeout: Duration) -> Result<ProviderResult, ProviderError>;
}
