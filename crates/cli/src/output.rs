//! Output formatting and terminal rendering

use colored::Colorize;
use newsdesk::{CoverageStatus, FactPack, ProviderCoverage, RunResult, RunStatus};

/// How results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a section header
pub fn print_header(text: &str) {
    println!();
    println!("{}", format!("▶ {}", text).bright_yellow().bold());
    println!("{}", "─".repeat(60).dimmed());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".bright_green(), text.bright_white());
}

pub fn print_warning(text: &str) {
    println!("{} {}", "⚠".bright_yellow(), text.yellow());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".bright_red(), text.bright_red());
}

pub fn print_info(text: &str) {
    println!("{} {}", "ℹ".bright_blue(), text);
}

fn status_badge(status: CoverageStatus) -> String {
    match status {
        CoverageStatus::Ok => "OK".bright_green().to_string(),
        CoverageStatus::Degraded => "DEGRADED".yellow().to_string(),
        CoverageStatus::Failed => "FAILED".bright_red().to_string(),
        CoverageStatus::TimedOut => "TIMED OUT".red().to_string(),
        CoverageStatus::Skipped => "SKIPPED".dimmed().to_string(),
    }
}

pub fn print_coverage(coverage: &[ProviderCoverage]) {
    if coverage.is_empty() {
        print_info("No providers configured.");
        return;
    }

    println!(
        "  {:<20} {:<6} {:<12} {:>6} {:>8}",
        "PROVIDER".dimmed(),
        "CLASS".dimmed(),
        "STATUS".dimmed(),
        "ITEMS".dimmed(),
        "MS".dimmed()
    );
    for entry in coverage {
        println!(
            "  {:<20} {:<6} {:<12} {:>6} {:>8}",
            entry.provider_id,
            entry.class.to_string(),
            status_badge(entry.status),
            entry.item_count,
            entry.elapsed_ms
        );
        if let Some(error) = &entry.error {
            println!("      {}", error.dimmed());
        }
    }
}

pub fn print_fact_pack(pack: &FactPack) {
    print_header(&format!("Fact pack for '{}'", pack.topic.title));
    print_coverage(&pack.provider_coverage);

    for (label, items) in [("Hard facts", &pack.hard), ("Soft signals", &pack.soft)] {
        println!();
        println!("  {} ({})", label.bold(), items.len());
        for item in items.iter() {
            println!("    {} {}", format!("[{}]", item.source_label).cyan(), item.headline);
        }
    }
}

pub fn print_run_summary(result: &RunResult) {
    print_header("Run summary");

    let status = match result.status {
        RunStatus::Success => "SUCCESS".bright_green().bold(),
        RunStatus::Partial => "PARTIAL".yellow().bold(),
        RunStatus::Failed => "FAILED".bright_red().bold(),
    };
    println!("  {} {}", "Status:".dimmed(), status);
    println!("  {} {}", "Run:".dimmed(), result.run_id);
    println!("  {} {}", "Topic:".dimmed(), result.topic_id);
    if let Some(state) = result.review_state {
        println!("  {} {} ({} revisions)", "Review:".dimmed(), state, result.rounds_used);
    }
    println!("  {} {}ms", "Duration:".dimmed(), result.duration_ms);

    println!();
    print_coverage(&result.fact_pack_coverage);

    if !result.unresolved_issues.is_empty() {
        println!();
        print_warning("Unresolved editor issues:");
        for issue in &result.unresolved_issues {
            println!("    - {}", issue);
        }
    }

    if !result.errors.is_empty() {
        println!();
        for error in &result.errors {
            let origin = match &error.provider_id {
                Some(id) => format!("{}/{}", error.stage, id),
                None => error.stage.clone(),
            };
            print_error(&format!("[{}] {}", origin, error.message));
        }
    }

    if let Some(draft) = &result.final_draft {
        print_header(&format!("Final draft (round {})", draft.round));
        println!("{}", draft.content);
    }
}
