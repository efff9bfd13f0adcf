use std::collections::HashMap;

use crate::config_store::ConfigStore;

use super::{
    CliError, Command,
    commands::config,
    formatting::{format_category, format_command, format_description, format_header, format_usage},
    types::CommandMetadata,
};

/// Registry for CLI commands organized by category.
///
/// ```text
/// registry
/// └── config
///     ├── delete
///     ├── dump
///     ├── get
///     ├── set
///     └── watch
/// ```
pub struct CommandRegistry {
    /// category name -> (command name -> command implementation)
    categories: HashMap<String, HashMap<String, Box<dyn Command>>>,
    store: ConfigStore,
}

impl CommandRegistry {
    /// Creates an empty registry whose commands will operate on `store`.
    pub fn new(store: ConfigStore) -> Self {
        Self {
            categories: HashMap::new(),
            store,
        }
    }

    /// Registers a command in the specified category.
    ///
    /// The command's metadata name is its key within the category; an
    /// existing command with the same name is replaced.
    pub fn register_command(&mut self, category: &str, command: Box<dyn Command>) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(command.metadata().name, command);
    }

    /// Registers every built-in command.
    pub fn register_all_commands(&mut self) {
        let store = self.store.clone();
        config::register_commands(self, store);
    }

    /// Executes a command by category and name.
    ///
    /// # Errors
    ///
    /// Returns `CliError::CommandNotFound` if the category or command does not
    /// exist, `CliError::InvalidArguments` if the argument count is wrong, and
    /// any error raised by the command itself.
    pub async fn execute(
        &self,
        category: &str,
        command_name: &str,
        args: &[String],
    ) -> Result<String, CliError> {
        let found_category = self.categories.get(category).ok_or_else(|| {
            CliError::CommandNotFound(format!("Failed to find category '{category}'"))
        })?;

        let found_command = found_category.get(command_name).ok_or_else(|| {
            CliError::CommandNotFound(format!("Failed to find command '{command_name}'"))
        })?;

        Self::validate_args(&found_command.metadata(), args)?;

        found_command.execute(args).await
    }

    /// Lists all registered commands by category, both sorted alphabetically.
    pub fn list_commands(&self) -> Vec<(String, Vec<String>)> {
        let mut categories: Vec<(String, Vec<String>)> = self
            .categories
            .iter()
            .map(|(category, commands)| {
                let mut command_list: Vec<String> = commands.keys().cloned().collect();
                command_list.sort();

                (category.clone(), command_list)
            })
            .collect();

        categories.sort();

        categories
    }

    /// Metadata for one command, if registered.
    pub fn metadata(&self, category: &str, command_name: &str) -> Option<CommandMetadata> {
        self.categories
            .get(category)?
            .get(command_name)
            .map(|command| command.metadata())
    }

    /// Renders help text for every registered command.
    pub fn help(&self) -> String {
        let mut out = format_header("Usage: stratum --file <path> <category> <command> [args]");
        out.push('\n');

        for (category, commands) in self.list_commands() {
            out.push_str(&format!("\n{}\n", format_category(&category)));

            for name in commands {
                let Some(metadata) = self.metadata(&category, &name) else {
                    continue;
                };

                let args: Vec<String> = metadata
                    .args
                    .iter()
                    .map(|arg| {
                        if arg.required {
                            format!("<{}>", arg.name)
                        } else {
                            format!("[{}]", arg.name)
                        }
                    })
                    .collect();

                out.push_str(&format!(
                    "  {} {}  {}\n",
                    format_command(&name),
                    args.join(" "),
                    format_description(&metadata.description)
                ));

                for example in &metadata.examples {
                    out.push_str(&format!("      {}\n", format_usage(example)));
                }
            }
        }

        out
    }

    fn validate_args(metadata: &CommandMetadata, args: &[String]) -> Result<(), CliError> {
        let required_count = metadata.args.iter().filter(|arg| arg.required).count();
        let total_count = metadata.args.len();

        if args.len() < required_count {
            return Err(CliError::InvalidArguments(format!(
                "Expected at least {} arguments, got {}",
                required_count,
                args.len(),
            )));
        }

        if args.len() > total_count {
            return Err(CliError::InvalidArguments(format!(
                "Expected at most {} arguments, got {}",
                total_count,
                args.len(),
            )));
        }

        Ok(())
    }
}
