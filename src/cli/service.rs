use crate::config_store::ConfigStore;

use super::{CliError, CommandRegistry};

/// High-level service for executing CLI commands.
///
/// Owns a [`CommandRegistry`] with every built-in command registered against
/// one configuration store.
pub struct CliService {
    registry: CommandRegistry,
}

impl CliService {
    /// Creates a CLI service with all available commands registered.
    pub fn new(store: ConfigStore) -> Self {
        let mut registry = CommandRegistry::new(store);
        registry.register_all_commands();

        CliService { registry }
    }

    /// Executes a command by category and name.
    ///
    /// `help` as the category, or an empty command name, returns help text.
    ///
    /// # Errors
    /// Returns `CliError::CommandNotFound` if the command doesn't exist in the
    /// category, or the command's own error if it fails.
    pub async fn execute_command(
        &self,
        category: &str,
        command_name: &str,
        args: &[String],
    ) -> Result<String, CliError> {
        if category == "help" || command_name.is_empty() {
            return Ok(self.registry.help());
        }

        self.registry.execute(category, command_name, args).await
    }

    /// Lists all available commands organized by category.
    pub fn list_all(&self) -> Vec<(String, Vec<String>)> {
        self.registry.list_commands()
    }
}
