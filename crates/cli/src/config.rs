//! Configuration management for the Newsdesk CLI
//!
//! One TOML file carries the pipeline sections (`[modules]`, `[retrieval]`,
//! `[review]`, `[generation]`, `[run]`) plus the CLI-only wiring:
//! `[backend]`, `[publish]` and a `[[providers]]` list.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use newsdesk::{
    brain::OPENAI_CHAT_ENDPOINT, retrieval::providers::DEFAULT_SEARCH_ENDPOINT, CritiqueBackend,
    EvidenceClass, EvidenceItem, GenerationBackend, HeuristicCritic, HotListProvider, LlmCritic, OpenAiCompatibleBackend,
    PipelineConfig, ProviderAdapter, StaticProvider, WebSearchProvider,
};
use serde::{Deserialize, Serialize};

const CLI_SECTIONS: [&str; 3] = ["backend", "providers", "publish"];

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub backend: BackendSettings,
    pub providers: Vec<ProviderSpec>,
    pub publish: PublishSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CliSections {
    #[serde(default)]
    backend: BackendSettings,
    #[serde(default)]
    providers: Vec<ProviderSpec>,
    #[serde(default)]
    publish: PublishSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticKind {
    Llm,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSettings {
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_critic")]
    pub critic: CriticKind,

    /// Defaults to `generation.model`
    #[serde(default)]
    pub critic_model: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_chat_endpoint() -> String {
    OPENAI_CHAT_ENDPOINT.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_critic() -> CriticKind {
    CriticKind::Llm
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            critic: default_critic(),
            critic_model: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSettings {
    #[serde(default = "default_publish_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub author: Option<String>,
}

fn default_publish_dir() -> PathBuf {
    PathBuf::from("published")
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            dir: default_publish_dir(),
            author: None,
        }
    }
}

/// One `[[providers]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProviderSpec {
    WebSearch {
        id: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default = "default_search_key_env")]
        api_key_env: String,
        #[serde(default)]
        num_results: Option<usize>,
    },
    HotList {
        id: String,
        base_url: String,
        platform: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },
    Static {
        id: String,
        class: EvidenceClass,
        #[serde(default)]
        partial: bool,
        #[serde(default)]
        items: Vec<EvidenceItem>,
    },
}

fn default_search_key_env() -> String {
    "EXA_API_KEY".to_string()
}

impl ProviderSpec {
    pub fn id(&self) -> &str {
        match self {
            ProviderSpec::WebSearch { id, .. }
            | ProviderSpec::HotList { id, .. }
            | ProviderSpec::Static { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderSpec::WebSearch { .. } => "web_search",
            ProviderSpec::HotList { .. } => "hot_list",
            ProviderSpec::Static { .. } => "static",
        }
    }

    fn build(&self) -> Arc<dyn ProviderAdapter> {
        match self {
            ProviderSpec::WebSearch {
                id,
                endpoint,
                api_key_env,
                num_results,
            } => {
                let endpoint = endpoint
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SEARCH_ENDPOINT.to_string());
                let mut provider = WebSearchProvider::new(id.clone(), endpoint, std::env::var(api_key_env).ok());
                if let Some(n) = num_results {
                    provider = provider.with_num_results(*n);
                }
                Arc::new(provider)
            }
            ProviderSpec::HotList {
                id,
                base_url,
                platform,
                label,
                limit,
            } => {
                let mut provider = HotListProvider::new(id.clone(), base_url.clone(), platform.clone());
                if let Some(label) = label {
                    provider = provider.with_label(label.clone());
                }
                if let Some(limit) = limit {
                    provider = provider.with_limit(*limit);
                }
                Arc::new(provider)
            }
            ProviderSpec::Static {
                id,
                class,
                partial,
                items,
            } => {
                let provider = StaticProvider::new(id.clone(), *class, items.clone());
                Arc::new(if *partial { provider.partial() } else { provider })
            }
        }
    }
}

impl AppConfig {
    /// `./newsdesk.toml`, then `~/.newsdesk/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from("newsdesk.toml");
        if local.exists() {
            return Some(local);
        }
        dirs::home_dir()
            .map(|home| home.join(".newsdesk").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Load from an explicit path, the default locations, or built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        tracing::debug!("Loading config from {}", path.display());

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            let pipeline = PipelineConfig::load(&path)
                .with_context(|| format!("invalid pipeline config {}", path.display()))?;
            return Ok(Self {
                pipeline,
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)?;

        let mut cli = toml::Table::new();
        for key in CLI_SECTIONS {
            if let Some(value) = table.remove(key) {
                cli.insert(key.to_string(), value);
            }
        }

        let sections: CliSections = toml::Value::Table(cli).try_into()?;
        let pipeline = PipelineConfig::from_toml_value(toml::Value::Table(table))?;

        let config = Self {
            pipeline,
            backend: sections.backend,
            providers: sections.providers,
            publish: sections.publish,
        };
        config.validate_providers()?;
        Ok(config)
    }

    /// Provider ids must be unique and non-empty
    fn validate_providers(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.id().trim().is_empty() {
                bail!("Provider of kind '{}' has an empty id", provider.kind());
            }
            if !seen.insert(provider.id()) {
                bail!("Duplicate provider id: {}", provider.id());
            }
        }
        Ok(())
    }

    pub fn build_providers(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.providers.iter().map(ProviderSpec::build).collect()
    }

    pub fn build_backend(&self) -> Arc<dyn GenerationBackend> {
        let api_key = std::env::var(&self.backend.api_key_env).ok();
        let mut backend = OpenAiCompatibleBackend::new(self.backend.endpoint.clone(), api_key)
            .with_retries(self.backend.max_retries, std::time::Duration::from_secs(1));
        if let Some(temperature) = self.backend.temperature {
            backend = backend.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.backend.max_tokens {
            backend = backend.with_max_tokens(max_tokens);
        }
        Arc::new(backend)
    }

    pub fn build_critic(&self, backend: Arc<dyn GenerationBackend>) -> Arc<dyn CritiqueBackend> {
        match self.backend.critic {
            CriticKind::Heuristic => Arc::new(HeuristicCritic::new()),
            CriticKind::Llm => {
                let model = self
                    .backend
                    .critic_model
                    .clone()
                    .unwrap_or_else(|| self.pipeline.generation.model.clone());
                Arc::new(LlmCritic::new(backend, model))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[modules]
deep_research = true
multi_agent_review = false

[review]
max_rounds = 3

[generation]
model = "gpt-4o"

[backend]
endpoint = "http://localhost:11434/v1/chat/completions"
critic = "heuristic"

[publish]
dir = "out"
author = "Desk"

[[providers]]
id = "exa"
kind = "web_search"
num_results = 3

[[providers]]
id = "weibo"
kind = "hot_list"
base_url = "http://localhost:6688"
platform = "weibo"
label = "Weibo Hot Search"

[[providers]]
id = "fixture"
kind = "static"
class = "soft"
partial = true
items = [{ source_label = "fixture", headline = "Offline trend", confidence = 0.4 }]
"#;

    #[test]
    fn test_full_file_splits_into_sections() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();

        assert!(!config.pipeline.enable_multi_agent_review());
        assert_eq!(config.pipeline.max_review_rounds(), 3);
        assert_eq!(config.pipeline.generation.model, "gpt-4o");
        assert_eq!(config.backend.critic, CriticKind::Heuristic);
        assert_eq!(config.publish.dir, PathBuf::from("out"));

        let kinds: Vec<&str> = config.providers.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, vec!["web_search", "hot_list", "static"]);

        let providers = config.build_providers();
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["exa", "weibo", "fixture"]);
        assert_eq!(providers[2].class(), EvidenceClass::Soft);
    }

    #[test]
    fn test_unknown_keys_rejected_everywhere() {
        assert!(AppConfig::from_toml_str("[modules]\ndeep_reserch = true\n").is_err());
        assert!(AppConfig::from_toml_str("[backend]\nendpiont = \"x\"\n").is_err());
        assert!(AppConfig::from_toml_str("[telemetry]\nenabled = true\n").is_err());
        assert!(AppConfig::from_toml_str(
            "[[providers]]\nid = \"x\"\nkind = \"static\"\nclass = \"hard\"\ncolour = \"red\"\n"
        )
        .is_err());
        assert!(AppConfig::from_toml_str("[[providers]]\nid = \"x\"\nkind = \"rss\"\n").is_err());
    }

    #[test]
    fn test_duplicate_provider_ids_rejected() {
        let content = r#"
[[providers]]
id = "dup"
kind = "static"
class = "hard"

[[providers]]
id = "dup"
kind = "hot_list"
base_url = "http://localhost:6688"
platform = "weibo"
"#;
        let err = AppConfig::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("Duplicate provider id: dup"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsdesk.toml");
        std::fs::write(&path, content).unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_backend_sampling_settings() {
        let config = AppConfig::from_toml_str("[backend]\ntemperature = 0.2\nmax_tokens = 2048\n").unwrap();
        assert_eq!(config.backend.temperature, Some(0.2));
        assert_eq!(config.backend.max_tokens, Some(2048));
        assert_eq!(config.backend.endpoint, OPENAI_CHAT_ENDPOINT);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert!(config.providers.is_empty());
        assert_eq!(config.backend.critic, CriticKind::Llm);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_example_config_parses() {
        let config = AppConfig::from_toml_str(include_str!("../../../newsdesk.example.toml")).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_json_pipeline_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline_config.json");
        std::fs::write(&path, r#"{"modules": {"deep_research": false}}"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.pipeline.enable_deep_research());
        assert!(config.providers.is_empty());
    }
}
