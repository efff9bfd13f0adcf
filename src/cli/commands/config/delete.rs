use async_trait::async_trait;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    config_store::ConfigStore,
};

/// Command for removing values and saving the file.
pub struct DeleteCommand {
    store: ConfigStore,
}

impl DeleteCommand {
    /// Creates a new DeleteCommand over `store`.
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Command for DeleteCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'delete' command".to_string())
        })?;
        let removed = self.store.delete(path)?;

        if removed.is_empty() {
            return Ok(format!("Nothing matched '{path}'"));
        }

        self.store.save()?;
        Ok(format!("Deleted {} value(s) at '{path}'", removed.len()))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "delete".to_string(),
            description: "Delete configuration values".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "path".to_string(),
                description: "Hash path, wildcards allowed".to_string(),
                required: true,
                value_type: ArgType::Pattern,
            }],
            examples: vec!["stratum --file app.yaml config delete server.legacy".to_string()],
        }
    }
}
