use async_trait::async_trait;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        formatting::format_value,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    config_store::{ConfigError, ConfigStore},
};

/// Command for reading values from the effective configuration.
///
/// Wildcard paths print every match, one per line.
///
/// # Example Usage
///
/// ```bash
/// stratum --file app.yaml config get server.port
/// stratum --file app.yaml config get 'servers[*].host'
/// ```
pub struct GetCommand {
    store: ConfigStore,
}

impl GetCommand {
    /// Creates a new GetCommand over `store`.
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'get' command".to_string())
        })?;
        let values = self.store.get_all(path);

        match values.as_slice() {
            [] => Err(ConfigError::InvalidPath(format!("'{path}' matches nothing")).into()),
            [value] => Ok(format!("{path}: {}", format_value(value))),
            many => Ok(many
                .iter()
                .map(|value| format!("- {}", format_value(value)))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "get".to_string(),
            description: "Get configuration value".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "path".to_string(),
                description: "Hash path, wildcards allowed (e.g., server.port)".to_string(),
                required: true,
                value_type: ArgType::Pattern,
            }],
            examples: vec![
                "stratum --file app.yaml config get server.port".to_string(),
                "stratum --file app.yaml config get 'servers[*].host'".to_string(),
            ],
        }
    }
}
