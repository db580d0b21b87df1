//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table of rows
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format utilization as percentage
pub fn format_utilization(utilization: f64) -> String {
    format!("{:.1}%", utilization * 100.0)
}

/// Color utilization against the congestion threshold
pub fn color_utilization(utilization: f64, threshold: f64) -> String {
    let formatted = format_utilization(utilization);
    if utilization > threshold {
        formatted.red().bold().to_string()
    } else if utilization > threshold * 0.75 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Color a reward; closer to zero is better
pub fn color_reward(reward: f64) -> String {
    let formatted = format!("{:.3}", reward);
    if reward == 0.0 {
        formatted.green().to_string()
    } else {
        formatted.yellow().to_string()
    }
}

/// Color an outcome label
pub fn color_outcome(outcome: &str) -> String {
    match outcome {
        "completed" | "available" => outcome.green().to_string(),
        "no_target" => outcome.blue().to_string(),
        "no_candidates" | "no_alternatives" | "declined" => outcome.yellow().to_string(),
        _ => outcome.red().to_string(),
    }
}
