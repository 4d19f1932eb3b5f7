//! Web Search Provider
//!
//! Queries an Exa-style neural search API and maps each hit to a hard
//! evidence item. The API's own relevance score becomes the confidence hint;
//! hits without a usable score get 0.0 rather than a made-up value.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    retrieval::provider::{ProviderAdapter, ProviderError, ProviderResult},
    types::{EvidenceClass, EvidenceItem},
};

use super::http_error;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.exa.ai/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Search engine provider
#[derive(Debug, Clone)]
pub struct WebSearchProvider {
    id: String,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    num_results: usize,
}

impl WebSearchProvider {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            id: id.into(),
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            num_results: 5,
        }
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results.max(1);
        self
    }

    fn source_label(url: Option<&str>) -> String {
        url.and_then(|u| reqwest::Url::parse(u).ok())
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| "web".to_string())
    }
}

impl SearchHit {
    /// Hits without a title are dropped
    fn into_evidence(self) -> Option<EvidenceItem> {
        let headline = self.title.filter(|t| !t.trim().is_empty())?;
        let label = WebSearchProvider::source_label(self.url.as_deref());
        let confidence = self
            .score
            .filter(|s| s.is_finite())
            .map_or(0.0, |s| s.clamp(0.0, 1.0));

        let mut item = EvidenceItem::new(label, headline, confidence)
            .with_snippet(self.text.unwrap_or_default().chars().take(500).collect::<String>());
        if let Some(url) = self.url {
            item = item.with_url(url);
        }
        Some(item)
    }
}

#[async_trait]
impl ProviderAdapter for WebSearchProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> EvidenceClass {
        EvidenceClass::Hard
    }

    async fn fetch(&self, query: &str, timeout: Duration) -> Result<ProviderResult, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured(format!("{}: no search API key", self.id)))?;

        tracing::debug!("[WEB_SEARCH] {} searching: {}", self.id, query);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "query": query,
                "num_results": self.num_results,
                "use_autoprompt": true,
                "type": "neural"
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let body: SearchResponse = response.json().await?;

        let items = body.results.into_iter().filter_map(SearchHit::into_evidence).collect();

        Ok(ProviderResult::new(self.id.clone(), items))
    }
}
