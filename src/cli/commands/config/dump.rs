use async_trait::async_trait;

use crate::{
    cli::{Command, CommandResult, types::CommandMetadata},
    config_store::ConfigStore,
    formats::{Codec, Format, JsonCodec},
};

/// Command that prints the whole effective configuration.
///
/// Output uses the backing file's format, or JSON for stores without one.
pub struct DumpCommand {
    store: ConfigStore,
}

impl DumpCommand {
    /// Creates a new DumpCommand over `store`.
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Command for DumpCommand {
    async fn execute(&self, _args: &[String]) -> CommandResult {
        let snapshot = self.store.snapshot();

        let document = match self.store.format() {
            Format::Memory => JsonCodec.encode(&snapshot)?,
            _ => self.store.codec().encode(&snapshot)?,
        };

        Ok(document.trim_end().to_string())
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "dump".to_string(),
            description: "Print the effective configuration".to_string(),
            category: "config".to_string(),
            args: vec![],
            examples: vec!["stratum --file app.toml config dump".to_string()],
        }
    }
}
