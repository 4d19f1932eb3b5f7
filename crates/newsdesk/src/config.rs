//! Pipeline configuration
//!
//! A closed, typed structure: every recognised key is a named field and any
//! unknown key is rejected at load time, so a typo cannot silently disable
//! a module. Loaded from TOML or JSON.

use std::{path::Path, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound on review rounds accepted from configuration
pub const MAX_REVIEW_ROUNDS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid timeout `{field}`: {reason}")]
    InvalidTimeout { field: &'static str, reason: String },

    #[error("Invalid review rounds {0}: must be at most {MAX_REVIEW_ROUNDS}")]
    InvalidRounds(u32),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Duplicate provider id: {0}")]
    DuplicateProvider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime module toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModuleToggles {
    /// Fan out to evidence providers before writing
    #[serde(default = "default_true")]
    pub deep_research: bool,
    /// Run the critic/reviser loop on the first draft
    #[serde(default = "default_true")]
    pub multi_agent_review: bool,
}

impl Default for ModuleToggles {
    fn default() -> Self {
        Self {
            deep_research: true,
            multi_agent_review: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_per_provider_timeout_ms")]
    pub per_provider_timeout_ms: u64,
    #[serde(default = "default_global_deadline_ms")]
    pub global_deadline_ms: u64,
    /// Items kept per provider before dedup (0 = unlimited)
    #[serde(default = "default_max_results")]
    pub max_results_per_provider: usize,
}

impl RetrievalConfig {
    pub fn per_provider_timeout(&self) -> Duration {
        Duration::from_millis(self.per_provider_timeout_ms)
    }

    pub fn global_deadline(&self) -> Duration {
        Duration::from_millis(self.global_deadline_ms)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout_ms: default_per_provider_timeout_ms(),
            global_deadline_ms: default_global_deadline_ms(),
            max_results_per_provider: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_critique_timeout_ms")]
    pub critique_timeout_ms: u64,
}

impl ReviewConfig {
    pub fn critique_timeout(&self) -> Duration {
        Duration::from_millis(self.critique_timeout_ms)
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            critique_timeout_ms: default_critique_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Style directive handed to the writer
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Tried when the primary model fails
    #[serde(default)]
    pub fallback_model: Option<String>,
    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,
    /// Outline first, then draft the sections concurrently
    #[serde(default = "default_true")]
    pub outline: bool,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Models in the order they should be tried
    pub fn model_chain(&self) -> Vec<String> {
        let mut chain = vec![self.model.clone()];
        if let Some(fallback) = &self.fallback_model {
            if !fallback.trim().is_empty() && fallback != &self.model {
                chain.push(fallback.clone());
            }
        }
        chain
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            model: default_model(),
            fallback_model: None,
            timeout_ms: default_generation_timeout_ms(),
            outline: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Whole-run deadline in milliseconds (0 = none)
    #[serde(default)]
    pub deadline_ms: u64,
}

impl RunConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub modules: ModuleToggles,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub run: RunConfig,
}

fn default_true() -> bool {
    true
}

fn default_per_provider_timeout_ms() -> u64 {
    8_000
}

fn default_global_deadline_ms() -> u64 {
    15_000
}

fn default_max_results() -> usize {
    5
}

fn default_max_rounds() -> u32 {
    2
}

fn default_critique_timeout_ms() -> u64 {
    60_000
}

fn default_style() -> String {
    "explanatory".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generation_timeout_ms() -> u64 {
    120_000
}

impl PipelineConfig {
    pub fn enable_deep_research(&self) -> bool {
        self.modules.deep_research
    }

    pub fn enable_multi_agent_review(&self) -> bool {
        self.modules.multi_agent_review
    }

    pub fn max_review_rounds(&self) -> u32 {
        self.review.max_rounds
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Accepts the legacy `pipeline_config.json` shape (`{"modules": {...}}`)
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize from an already-parsed TOML table
    pub fn from_toml_value(value: toml::Value) -> Result<Self, ConfigError> {
        let config: Self = value.try_into().map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;
        if r.per_provider_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "retrieval.per_provider_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if r.global_deadline_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "retrieval.global_deadline_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if r.per_provider_timeout_ms > r.global_deadline_ms {
            return Err(ConfigError::InvalidTimeout {
                field: "retrieval.per_provider_timeout_ms",
                reason: format!(
                    "{}ms exceeds the global deadline of {}ms",
                    r.per_provider_timeout_ms, r.global_deadline_ms
                ),
            });
        }

        if self.review.max_rounds > MAX_REVIEW_ROUNDS {
            return Err(ConfigError::InvalidRounds(self.review.max_rounds));
        }
        if self.review.critique_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "review.critique_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        let g = &self.generation;
        if g.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "generation.timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if g.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "generation.model",
                reason: "must not be empty".to_string(),
            });
        }
        if g.style.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "generation.style",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// JSON schema describing the configuration file
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(PipelineConfig)).unwrap_or_default()
    }
}
