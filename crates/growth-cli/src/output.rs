//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Print a table from a list of rows
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
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

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a fraction as a percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Format an optional confidence, "-" when the model has no estimates
pub fn format_confidence(confidence: Option<f64>) -> String {
    confidence.map(format_percent).unwrap_or_else(|| "-".to_string())
}

/// Yes/no marker for presence columns
pub fn format_present(present: bool) -> String {
    if present {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

/// Color a lifecycle state
pub fn color_state(state: &str) -> String {
    match state.to_lowercase().as_str() {
        "ready" => state.green().to_string(),
        "loading" | "training" => state.blue().to_string(),
        "uninitialized" => state.yellow().to_string(),
        "failed" => state.red().to_string(),
        _ => state.to_string(),
    }
}

/// Color a growth label; anything but "Normal" is highlighted
pub fn color_label(label: &str) -> String {
    if label.eq_ignore_ascii_case("normal") {
        label.green().to_string()
    } else if label.to_lowercase().contains("severely") {
        label.red().bold().to_string()
    } else {
        label.yellow().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(None), "-");
        assert_eq!(format_confidence(Some(0.875)), "87.5%");
    }

    #[test]
    fn test_output_format_from_name() {
        assert_eq!(OutputFormat::from_name("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_name("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_name("yaml"), None);
    }

    #[test]
    fn test_color_label_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_label("Stunted"), "Stunted");
        assert_eq!(color_state("ready"), "ready");
    }
}
