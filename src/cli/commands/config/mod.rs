//! Configuration management commands.
mod delete;
mod dump;
mod get;
mod set;
mod watch;

pub use delete::DeleteCommand;
pub use dump::DumpCommand;
pub use get::GetCommand;
pub use set::SetCommand;
pub use watch::WatchCommand;

use crate::{cli::CommandRegistry, config_store::ConfigStore};

/// Registers all configuration commands in the "config" category.
pub fn register_commands(registry: &mut CommandRegistry, store: ConfigStore) {
    const CATEGORY_NAME: &str = "config";

    registry.register_command(CATEGORY_NAME, Box::new(GetCommand::new(store.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(SetCommand::new(store.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(DeleteCommand::new(store.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(DumpCommand::new(store.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(WatchCommand::new(store)));
}
