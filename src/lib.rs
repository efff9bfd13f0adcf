//! stratum - layered, self-refreshing configuration store.
//!
//! Loads a mapping from a JSON, YAML or TOML file, compiles it with
//! in-memory defaults and an overlay, optionally watches the file for
//! external edits, and notifies listeners when the paths they care about
//! change.
//!
//! - Hash path addressing with wildcards, globs, regexes and sequence indexes
//! - Reload policies that decide whether disk or memory wins
//! - Pattern-bound events and channel subscriptions with per-listener
//!   failure isolation
//! - A small CLI over a backing file
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stratum::config_store::ConfigStore;
//!
//! # async fn run() -> Result<(), stratum::config_store::ConfigError> {
//! let store = ConfigStore::sync_file("settings.yaml")?;
//!
//! store.on("server.*", |matched, pattern| {
//!     println!("{pattern} changed: {:?}", matched.first());
//!     Ok(())
//! })?;
//!
//! store.set("server.port", 8080)?;
//! let port: u16 = store.get_as("server.port")?;
//! # let _ = port;
//! # Ok(())
//! # }
//! ```

/// Command-line interface over a configuration file.
pub mod cli;

/// Layered configuration store with change tracking.
pub mod config_store;

/// Backing-file formats and format detection.
pub mod formats;

/// Tracing subscriber setup.
pub mod tracing_config;

pub use config_store::{ConfigChange, ConfigError, ConfigStore, Mapping};
pub use formats::Format;
