//! Formatting utilities for CLI output.
//!
//! Provides consistent formatting for configuration values and styled help
//! text for CLI commands.

use serde_json::Value;

use crate::config_store::ConfigChange;

/// ANSI escape codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";

    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Blue color
    pub const BLUE: &'static str = "\x1b[34m";
    /// Cyan color
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Formats section headers with styling
pub fn format_header(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::CYAN, text, Colors::RESET)
}

/// Formats command names with styling
pub fn format_command(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::GREEN, text, Colors::RESET)
}

/// Formats category names with styling
pub fn format_category(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::BLUE, text, Colors::RESET)
}

/// Formats descriptions with muted styling
pub fn format_description(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats usage examples with styling
pub fn format_usage(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Formats a configuration value for human-readable CLI output.
///
/// Scalars print as themselves (strings quoted); sequences and mappings
/// print as compact JSON.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stratum::cli::formatting::format_value;
///
/// assert_eq!(format_value(&json!("hello")), "\"hello\"");
/// assert_eq!(format_value(&json!(42)), "42");
/// assert_eq!(format_value(&json!({"a": [1, 2]})), "{\"a\":[1,2]}");
/// ```
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Formats one change as `path: old -> new`; absent old values print as `(unset)`.
pub fn format_change(change: &ConfigChange) -> String {
    let old = change
        .old_value
        .as_ref()
        .map_or_else(|| "(unset)".to_string(), format_value);

    format!("{}: {} -> {}", change.path, old, format_value(&change.new_value))
}
