//! Publishing finished articles
//!
//! The pipeline itself never publishes; callers decide based on the run
//! status and hand the result to a [`PublishSink`].

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{RunResult, RunStatus, Topic};

pub const DEFAULT_AUTHOR: &str = "Newsdesk";

const TITLE_MAX_CHARS: usize = 50;
const DIGEST_MAX_CHARS: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Run {0} has no final draft")]
    NoDraft(Uuid),

    #[error("Run status {0} is not publishable")]
    NotPublishable(RunStatus),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Success always publishes, Partial only when explicitly allowed
pub fn is_publishable(status: RunStatus, allow_partial: bool) -> bool {
    match status {
        RunStatus::Success => true,
        RunStatus::Partial => allow_partial,
        RunStatus::Failed => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    pub source_topic_id: String,
    pub run_id: Uuid,
    pub run_status: RunStatus,
    pub rounds_used: u32,
    pub unresolved_issues: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl PublishRequest {
    pub fn from_run(topic: &Topic, result: &RunResult) -> Result<Self, PublishError> {
        let draft = result
            .final_draft
            .as_ref()
            .ok_or(PublishError::NoDraft(result.run_id))?;

        Ok(Self {
            title: topic.title.trim().chars().take(TITLE_MAX_CHARS).collect(),
            author: DEFAULT_AUTHOR.to_string(),
            digest: digest(&draft.content),
            content: draft.content.clone(),
            source_topic_id: result.topic_id.clone(),
            run_id: result.run_id,
            run_status: result.status,
            rounds_used: result.rounds_used,
            unresolved_issues: result.unresolved_issues.clone(),
            timestamp: Utc::now(),
        })
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

fn digest(content: &str) -> String {
    content
        .chars()
        .take(DIGEST_MAX_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub location: String,
    pub published_at: DateTime<Utc>,
}

#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError>;
}

/// Writes each article as `publish_<timestamp>.json` in a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PublishSink for JsonFileSink {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!("publish_{}.json", request.timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let path = self.dir.join(name);
        let body = serde_json::to_vec_pretty(request)?;
        tokio::fs::write(&path, body).await?;

        tracing::info!("[PUBLISH] Wrote {} ({} chars)", path.display(), request.content.chars().count());

        Ok(PublishReceipt {
            location: path.display().to_string(),
            published_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Draft, RunResult};

    fn result(status: RunStatus, content: Option<&str>) -> RunResult {
        let now = Utc::now();
        RunResult {
            run_id: Uuid::new_v4(),
            topic_id: "t1".to_string(),
            status,
            final_draft: content.map(|c| Draft {
                content: c.to_string(),
                round: 1,
                provenance_fact_pack_id: Uuid::new_v4(),
            }),
            fact_pack_id: None,
            fact_pack_coverage: Vec::new(),
            rounds_used: 1,
            review_state: None,
            unresolved_issues: vec!["intro too long".to_string()],
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_publish_policy() {
        assert!(is_publishable(RunStatus::Success, false));
        assert!(!is_publishable(RunStatus::Partial, false));
        assert!(is_publishable(RunStatus::Partial, true));
        assert!(!is_publishable(RunStatus::Failed, true));
    }

    #[test]
    fn test_request_truncates_title_and_flattens_digest() {
        let topic = Topic::new("t1", "x".repeat(80));
        let body = format!("First line\nsecond line\r\n{}", "y".repeat(200));
        let request = PublishRequest::from_run(&topic, &result(RunStatus::Success, Some(&body))).unwrap();

        assert_eq!(request.title.chars().count(), 50);
        assert!(request.digest.starts_with("First line second line"));
        assert!(!request.digest.contains('\n'));
        assert!(request.digest.chars().count() <= 120);
        assert_eq!(request.content, body);
        assert_eq!(request.unresolved_issues, vec!["intro too long"]);
    }

    #[test]
    fn test_request_requires_draft() {
        let topic = Topic::new("t1", "Title");
        let err = PublishRequest::from_run(&topic, &result(RunStatus::Failed, None)).unwrap_err();
        assert!(matches!(err, PublishError::NoDraft(_)));
    }

    #[tokio::test]
    async fn test_json_file_sink_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out"));
        let topic = Topic::new("t1", "Chip export rules");
        let request = PublishRequest::from_run(&topic, &result(RunStatus::Success, Some("Body")))
            .unwrap()
            .with_author("Desk");

        let receipt = sink.publish(&request).await.unwrap();
        assert!(receipt.location.contains("publish_"));

        let written = std::fs::read_to_string(&receipt.location).unwrap();
        let parsed: PublishRequest = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, request);
        assert_eq!(parsed.author, "Desk");
    }
}
