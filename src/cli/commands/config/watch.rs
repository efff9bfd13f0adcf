use async_trait::async_trait;
use chrono::Local;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        formatting::format_change,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    config_store::ConfigStore,
};

/// Command that prints changes under a pattern until Ctrl+C.
///
/// Turns on `sync_up` so external edits to the file are picked up.
pub struct WatchCommand {
    store: ConfigStore,
}

impl WatchCommand {
    /// Creates a new WatchCommand over `store`.
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Command for WatchCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let pattern = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <pattern> argument for 'watch' command".to_string())
        })?;
        let mut subscription = self.store.subscribe(pattern)?;
        self.store.set_sync_up(true)?;

        println!("Watching changes on '{pattern}' in {}...", self.store.path().display());
        println!("Press Ctrl+C to stop");

        loop {
            tokio::select! {
                change = subscription.recv() => {
                    let Some(change) = change else {
                        break;
                    };
                    println!("[{}] {}", Local::now().format("%H:%M:%S"), format_change(&change));
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| {
                        CliError::ServiceError(format!("Failed to listen for Ctrl+C: {e}"))
                    })?;
                    break;
                }
            }
        }

        self.store.stop_watching();
        Ok("Watch ended".to_string())
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "watch".to_string(),
            description: "Watch configuration changes under a path".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "pattern".to_string(),
                description: "Hash path to watch; '*' watches everything".to_string(),
                required: true,
                value_type: ArgType::Pattern,
            }],
            examples: vec![
                "stratum --file app.yaml config watch server".to_string(),
                "stratum --file app.yaml config watch '*'".to_string(),
            ],
        }
    }
}
