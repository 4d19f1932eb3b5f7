//! CLI subcommand handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use newsdesk::{
    is_publishable, CancellationToken, ContentGenerator, JsonFileSink, PipelineConfig, PipelineOrchestrator,
    PublishReceipt, PublishRequest, PublishSink, RetrievalFusionEngine, RunArtifacts, RunResult, RunStatus,
    Topic,
};

use crate::{
    config::AppConfig,
    output::{self, OutputFormat},
};

/// Where the topic comes from
#[derive(Debug, Clone)]
pub struct TopicArgs {
    pub title: Option<String>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub file: Option<PathBuf>,
}

impl TopicArgs {
    pub fn resolve(&self) -> Result<Topic> {
        if let Some(path) = &self.file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read topic file {}", path.display()))?;
            let topic: Topic = serde_json::from_str(&content)
                .with_context(|| format!("invalid topic file {}", path.display()))?;
            return Ok(topic);
        }

        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .context("a topic title or --topic-file is required")?;

        let id = self.id.clone().unwrap_or_else(|| slug(title));
        let mut topic = Topic::new(id, title).with_tags(self.tags.clone());
        if let Some(description) = &self.description {
            topic = topic.with_description(description.clone());
        }
        Ok(topic)
    }
}

/// Lowercased alphanumerics joined by dashes
fn slug(title: &str) -> String {
    let mut out = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "topic".to_string()
    } else {
        out
    }
}

pub struct RunOptions {
    pub format: OutputFormat,
    pub publish: bool,
    pub allow_partial: bool,
    pub fact_pack_out: Option<PathBuf>,
}

/// Run the full pipeline; returns the process exit code
pub async fn run(config: &AppConfig, topic: Topic, options: RunOptions) -> Result<i32> {
    let backend = config.build_backend();
    let generator = ContentGenerator::from_config(backend.clone(), &config.pipeline.generation);
    let critic = config.build_critic(backend);

    let orchestrator =
        PipelineOrchestrator::new(config.pipeline.clone(), config.build_providers(), generator, critic)?;
    tracing::debug!("Providers: {}", orchestrator.provider_ids().join(", "));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_ctrl_c.cancel();
        }
    });

    let artifacts = orchestrator.execute(&topic, cancel).await;
    Ok(report(config, &topic, artifacts, &options).await)
}

/// Print the result, then write side outputs; returns the run's exit code
async fn report(config: &AppConfig, topic: &Topic, artifacts: RunArtifacts, options: &RunOptions) -> i32 {
    let result = artifacts.result;

    match options.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Could not serialize run result: {}", e),
        },
        OutputFormat::Text => output::print_run_summary(&result),
    }

    // Side-output failures keep the run's exit code
    if let (Some(path), Some(pack)) = (&options.fact_pack_out, &artifacts.fact_pack) {
        match write_json(path, &pack.to_document()) {
            Ok(()) => tracing::info!("Fact pack written to {}", path.display()),
            Err(e) => tracing::error!("Could not write fact pack: {:#}", e),
        }
    }

    if options.publish {
        match publish(config, topic, &result, options.allow_partial).await {
            Ok(Some(receipt)) if options.format == OutputFormat::Text => {
                output::print_success(&format!("Published to {}", receipt.location))
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Publish failed: {:#}", e),
        }
    }

    result.exit_code()
}

/// Publish per policy; `None` when the run is not publishable
async fn publish(
    config: &AppConfig,
    topic: &Topic,
    result: &RunResult,
    allow_partial: bool,
) -> Result<Option<PublishReceipt>> {
    if !is_publishable(result.status, allow_partial) {
        if result.status == RunStatus::Partial {
            tracing::warn!("Run is partial, not publishing (pass --allow-partial to override)");
        } else {
            tracing::warn!("Run failed, nothing to publish");
        }
        return Ok(None);
    }

    let mut request = PublishRequest::from_run(topic, result)?;
    if let Some(author) = &config.publish.author {
        request = request.with_author(author.clone());
    }
    let receipt = JsonFileSink::new(&config.publish.dir).publish(&request).await?;
    tracing::info!("Published to {}", receipt.location);
    Ok(Some(receipt))
}

/// Retrieval only: print the fused fact pack
pub async fn fuse(config: &AppConfig, topic: Topic, format: OutputFormat) -> Result<i32> {
    let providers = config.build_providers();
    let engine = RetrievalFusionEngine::from_config(&config.pipeline.retrieval);
    let pack = engine.fuse(&topic, &providers).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pack.to_document())?),
        OutputFormat::Text => output::print_fact_pack(&pack),
    }

    Ok(if pack.is_degraded() { 1 } else { 0 })
}

/// Print the JSON schema of the pipeline configuration
pub fn schema() -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(&PipelineConfig::json_schema())?);
    Ok(0)
}

/// Validate configuration without touching the network
pub fn check_config(config: &AppConfig, path: Option<&Path>) -> Result<i32> {
    config.pipeline.validate()?;

    output::print_header("Configuration");
    match path.map(Path::to_path_buf).or_else(AppConfig::default_path) {
        Some(p) => output::print_info(&format!("Loaded from {}", p.display())),
        None => output::print_info("Using built-in defaults"),
    }
    println!("{}", toml::to_string_pretty(&config.pipeline)?);

    if config.providers.is_empty() {
        output::print_warning("No providers configured; fact packs will be empty.");
    }
    for provider in &config.providers {
        println!("  {:<20} {}", provider.id(), provider.kind());
    }

    output::print_success("Configuration is valid");
    Ok(0)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("failed to write {}", path.display()))
}
