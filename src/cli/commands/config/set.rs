use async_trait::async_trait;
use serde_json::Value;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    config_store::ConfigStore,
};

/// Command for writing a value and saving the file.
pub struct SetCommand {
    store: ConfigStore,
}

impl SetCommand {
    /// Creates a new SetCommand over `store`.
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Detects the value's type: bool, integer, float, JSON sequence or
    /// mapping, and otherwise a plain string.
    pub(crate) fn parse_config_value(value_str: &str) -> Result<Value, CliError> {
        if let Ok(b) = value_str.parse::<bool>() {
            return Ok(Value::Bool(b));
        }

        if let Ok(i) = value_str.parse::<i64>() {
            return Ok(Value::from(i));
        }

        if let Ok(f) = value_str.parse::<f64>() {
            return serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| CliError::InvalidArguments(format!("'{value_str}' is not finite")));
        }

        if value_str.starts_with(['[', '{']) {
            return serde_json::from_str(value_str).map_err(|e| {
                CliError::InvalidArguments(format!("'{value_str}' is not valid JSON: {e}"))
            });
        }

        Ok(Value::String(value_str.to_string()))
    }
}

#[async_trait]
impl Command for SetCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'set' command".to_string())
        })?;
        let value_str = args.get(1).ok_or_else(|| {
            CliError::InvalidArguments("Expected <value> argument for 'set' command".to_string())
        })?;
        let value = Self::parse_config_value(value_str)?;

        self.store.set(path, value)?;
        self.store.save()?;

        Ok(format!("Set new value '{value_str}' at path '{path}'"))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "set".to_string(),
            description: "Set configuration value".to_string(),
            category: "config".to_string(),
            args: vec![
                CommandArg {
                    name: "path".to_string(),
                    description: "Hash path".to_string(),
                    required: true,
                    value_type: ArgType::Path,
                },
                CommandArg {
                    name: "value".to_string(),
                    description: "New value (auto-detected type)".to_string(),
                    required: true,
                    value_type: ArgType::String,
                },
            ],
            examples: vec![
                "stratum --file app.yaml config set server.port 8080".to_string(),
                "stratum --file app.yaml config set server.hosts '[\"a\", \"b\"]'".to_string(),
            ],
        }
    }
}
