//! Newsdesk CLI
//!
//! Runs topics through the retrieval → draft → review pipeline and exits
//! with the run status: 0 success, 1 partial, 2 failed or misconfigured.

mod commands;
mod config;
mod output;

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    commands::{RunOptions, TopicArgs},
    config::AppConfig,
    output::OutputFormat,
};

/// Newsdesk - fact-grounded article pipeline
#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fuse evidence, draft an article and put it through editorial review")]
#[command(long_about = r#"
Newsdesk queries every configured evidence provider in parallel, fuses the
answers into a Fact Pack, drafts an article from it and runs a bounded
editor/rewriter loop before handing back the result.

Examples:
  newsdesk run "Open-weight video models" --tag sora
  newsdesk run --topic-file topic.json --publish --allow-partial
  newsdesk fuse "Chip export rules" --format json
  newsdesk check-config --config newsdesk.toml
"#)]
struct Cli {
    /// Config file (TOML, or a pipeline-only JSON file)
    #[arg(short, long, env = "NEWSDESK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TopicOpts {
    /// Topic title
    title: Option<String>,

    /// Topic id (defaults to a slug of the title)
    #[arg(long)]
    topic_id: Option<String>,

    /// Background handed to the writer
    #[arg(long)]
    description: Option<String>,

    /// Extra query terms
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// Read the topic from a JSON file instead
    #[arg(long, conflicts_with = "title")]
    topic_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl From<&TopicOpts> for TopicArgs {
    fn from(opts: &TopicOpts) -> Self {
        TopicArgs {
            title: opts.title.clone(),
            id: opts.topic_id.clone(),
            description: opts.description.clone(),
            tags: opts.tags.clone(),
            file: opts.topic_file.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one topic
    Run {
        #[command(flatten)]
        topic: TopicOpts,

        /// Publish the article when the run succeeds
        #[arg(long)]
        publish: bool,

        /// Also publish partial runs
        #[arg(long, requires = "publish")]
        allow_partial: bool,

        /// Write the fact pack document to this path
        #[arg(long)]
        fact_pack_out: Option<PathBuf>,
    },

    /// Retrieval only: fuse evidence and print the fact pack
    Fuse {
        #[command(flatten)]
        topic: TopicOpts,
    },

    /// Validate the configuration and show the effective settings
    CheckConfig,

    /// Print the JSON schema of the pipeline configuration
    Schema,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("newsdesk={0},newsdesk_cli={0},warn", log_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    if let Commands::Schema = cli.command {
        return commands::schema();
    }

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            topic,
            publish,
            allow_partial,
            fact_pack_out,
        } => {
            let resolved = TopicArgs::from(&topic).resolve()?;
            let options = RunOptions {
                format: topic.format,
                publish,
                allow_partial,
                fact_pack_out,
            };
            commands::run(&config, resolved, options).await
        }
        Commands::Fuse { topic } => {
            let resolved = TopicArgs::from(&topic).resolve()?;
            commands::fuse(&config, resolved, topic.format).await
        }
        Commands::CheckConfig => commands::check_config(&config, cli.config.as_deref()),
        Commands::Schema => commands::schema(),
    }
}
