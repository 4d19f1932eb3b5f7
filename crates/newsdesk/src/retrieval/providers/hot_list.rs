//! Hot List Provider
//!
//! Reads one platform's trending list from a DailyHot-style aggregator
//! (`GET {base}/{platform}`) and keeps entries mentioning the query.
//! Feeds the soft (sentiment) group.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    retrieval::provider::{ProviderAdapter, ProviderError, ProviderResult},
    types::{EvidenceClass, EvidenceItem},
};

use super::http_error;

#[derive(Debug, Deserialize)]
struct HotListResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    data: Vec<HotEntry>,
}

#[derive(Debug, Deserialize)]
struct HotEntry {
    title: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    hot: Option<serde_json::Value>,
}

impl HotEntry {
    /// Heat is reported as a number or a numeric string depending on platform
    fn heat(&self) -> f64 {
        match &self.hot {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HotListProvider {
    id: String,
    client: Client,
    base_url: String,
    platform: String,
    label: String,
    limit: usize,
}

impl HotListProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, platform: impl Into<String>) -> Self {
        let platform = platform.into();
        Self {
            id: id.into(),
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            label: platform.clone(),
            platform,
            limit: 10,
        }
    }

    /// Human-readable source label, e.g. "Weibo Hot Search"
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    fn matches(query_terms: &[String], entry: &HotEntry) -> bool {
        if query_terms.is_empty() {
            return true;
        }
        let title = entry.title.to_lowercase();
        let desc = entry.desc.as_deref().unwrap_or("").to_lowercase();
        query_terms
            .iter()
            .any(|term| title.contains(term.as_str()) || desc.contains(term.as_str()))
    }

    fn to_items(&self, query: &str, entries: Vec<HotEntry>) -> Vec<EvidenceItem> {
        let terms: Vec<String> = query
            .split_whitespace()
            .filter(|t| t.chars().count() >= 2)
            .map(|t| t.to_lowercase())
            .collect();

        let top_heat = entries.iter().map(HotEntry::heat).fold(0.0_f64, f64::max);

        entries
            .into_iter()
            .filter(|e| Self::matches(&terms, e))
            .take(self.limit)
            .map(|e| {
                let confidence = if top_heat > 0.0 {
                    (e.heat() / top_heat).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let mut item = EvidenceItem::new(self.label.clone(), e.title, confidence)
                    .with_snippet(e.desc.unwrap_or_default());
                if let Some(url) = e.url {
                    item = item.with_url(url);
                }
                item
            })
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for HotListProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> EvidenceClass {
        EvidenceClass::Soft
    }

    async fn fetch(&self, query: &str, timeout: Duration) -> Result<ProviderResult, ProviderError> {
        let url = format!("{}/{}", self.base_url, self.platform);
        tracing::debug!("[HOT_LIST] {} fetching {}", self.id, url);

        let response = self.client.get(&url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let body: HotListResponse = response.json().await?;
        if let Some(code) = body.code {
            if code != 200 {
                return Err(ProviderError::Malformed(format!(
                    "{} answered with code {}",
                    self.platform, code
                )));
            }
        }

        let items = self.to_items(query, body.data);
        Ok(ProviderResult::new(self.id.clone(), items))
    }
}
