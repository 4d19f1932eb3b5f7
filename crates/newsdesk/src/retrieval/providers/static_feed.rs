//! Fixed-content provider for offline runs and fixtures

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    retrieval::provider::{ProviderAdapter, ProviderError, ProviderResult},
    types::{EvidenceClass, EvidenceItem},
};

/// Returns the same items for every query
#[derive(Debug, Clone)]
pub struct StaticProvider {
    id: String,
    class: EvidenceClass,
    items: Vec<EvidenceItem>,
    partial: bool,
}

impl StaticProvider {
    pub fn new(id: impl Into<String>, class: EvidenceClass, items: Vec<EvidenceItem>) -> Self {
        Self {
            id: id.into(),
            class,
            items,
            partial: false,
        }
    }

    /// Mark results as mock/degraded data
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }
}

#[async_trait]
impl ProviderAdapter for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> EvidenceClass {
        self.class
    }

    async fn fetch(&self, _query: &str, _timeout: Duration) -> Result<ProviderResult, ProviderError> {
        let result = ProviderResult::new(self.id.clone(), self.items.clone());
        Ok(if self.partial { result.partial() } else { result })
    }
}
