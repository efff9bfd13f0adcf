use async_trait::async_trait;
use thiserror::Error;

use crate::config_store::ConfigError;

/// Errors that can occur during CLI command execution.
///
/// Covers everything from command discovery failures to errors raised by the
/// configuration store while a command runs.
#[derive(Error, Debug)]
pub enum CliError {
    /// A command or category was not found in the registry.
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Invalid arguments were provided to a command.
    ///
    /// Returned when argument validation fails, such as missing required
    /// arguments, too many arguments, or values that cannot be parsed.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// An error occurred in the configuration store.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A general service error occurred.
    #[error("Service error: {0}")]
    ServiceError(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Type alias for command execution results.
///
/// Commands return their output as a String on success.
pub type CommandResult = Result<String, CliError>;

/// Description of a single command argument.
#[derive(Debug, Clone)]
pub struct CommandArg {
    /// The name of the argument (e.g., "path", "value").
    pub name: String,

    /// Human-readable description of what this argument does.
    pub description: String,

    /// Whether this argument is required for command execution.
    pub required: bool,

    /// The expected type of this argument for help display.
    pub value_type: ArgType,
}

/// Type classification for command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// A general string value, or a value whose type is auto-detected.
    String,

    /// A hash path expression.
    Path,

    /// A hash path expression that may contain wildcards.
    Pattern,
}

impl ArgType {
    /// Short label used in help output.
    pub fn label(self) -> &'static str {
        match self {
            ArgType::String => "value",
            ArgType::Path => "path",
            ArgType::Pattern => "pattern",
        }
    }
}

/// Complete metadata for a CLI command.
///
/// Single source of truth for a command's identity, arguments, usage
/// examples and category. Used for help generation and argument validation.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// The command name (e.g., "get", "set", "watch").
    pub name: String,

    /// Brief description of what this command does.
    pub description: String,

    /// Every argument this command accepts.
    pub args: Vec<CommandArg>,

    /// Example usage strings to show in help text.
    pub examples: Vec<String>,

    /// Category this command belongs to (e.g., "config").
    pub category: String,
}

/// Interface for all CLI commands.
///
/// Commands receive their dependencies through their constructors.
#[async_trait]
pub trait Command: Send + Sync {
    /// Executes the command with the provided arguments.
    ///
    /// The registry has already checked the argument count against
    /// [`Command::metadata`]; commands validate argument values themselves.
    ///
    /// # Errors
    ///
    /// Returns `CliError` for invalid argument values, configuration store
    /// failures and I/O failures.
    async fn execute(&self, args: &[String]) -> CommandResult;

    /// Returns the complete metadata for this command.
    fn metadata(&self) -> CommandMetadata;
}
