//! Layered, self-refreshing configuration store.
//!
//! A [`ConfigStore`] loads a mapping from a backing file, compiles it
//! together with in-memory defaults and an overlay, optionally watches the
//! file for external edits, and notifies listeners when paths they care about
//! change. Paths are addressed with [`HashPath`] expressions.

mod changes;
mod diff;
mod events;
mod file_watcher;
mod file_watching;
mod merging;
mod path_ops;
mod store;

#[cfg(test)]
mod tests;

/// An ordered mapping of string keys to values; the unit every layer is made of.
pub type Mapping = serde_json::Map<String, serde_json::Value>;

pub use changes::{ConfigChange, ConfigError, ListenerFailure};
pub use diff::{ChangeSet, detect_changes, expand, flatten, incoming_from_locations};
pub use events::{
    Event, EventId, EventPattern, EventRegistry, ListenerError, Matched, Processor, Subscription,
};
pub use file_watcher::{FileEvent, FileEventKind, FileWatcher};
pub use merging::{ReloadPolicy, compile, deep_merge};
pub use path_ops::{
    HashPath, Step, delete_path, format_location, resolve_all, resolve_first, set_path, value_at,
};
pub use store::{ChangeHook, ConfigStore, ConfigStoreBuilder, ReloadHook};
