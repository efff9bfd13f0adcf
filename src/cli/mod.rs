//! Command-line interface for configuration management.
//!
//! Provides a hierarchical command system for reading, writing and watching
//! a configuration file through a [`ConfigStore`](crate::config_store::ConfigStore).
//! Commands are organized by category and generate help text from metadata.

mod commands;
pub mod formatting;
mod registry;
mod service;
mod types;

#[cfg(test)]
mod tests;

pub use commands::config::{DeleteCommand, DumpCommand, GetCommand, SetCommand, WatchCommand};
pub use registry::CommandRegistry;
pub use service::CliService;
pub use types::{ArgType, CliError, Command, CommandArg, CommandMetadata, CommandResult};
