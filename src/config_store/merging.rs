use serde_json::Value;

use super::Mapping;

/// Deep merges two mappings, with `overlay` taking precedence.
///
/// Nested mappings are merged key by key. For any other value (including
/// sequences) the overlay completely replaces the base; sequences are never
/// merged element-wise. Keys keep the base's order, new keys are appended.
pub fn deep_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay.clone());
    merged
}

fn merge_into(base: &mut Mapping, overlay: Mapping) {
    for (key, overlay_value) in overlay {
        match overlay_value {
            Value::Object(overlay_table) => match base.get_mut(&key) {
                Some(Value::Object(base_table)) => merge_into(base_table, overlay_table),
                _ => {
                    base.insert(key, Value::Object(overlay_table));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Compiles the effective configuration from its three layers.
///
/// Precedence, lowest to highest: `defaults`, `configuration`, `overlay`.
/// Computed as `deep_merge(defaults, deep_merge(configuration, overlay))`.
pub fn compile(configuration: &Mapping, defaults: &Mapping, overlay: &Mapping) -> Mapping {
    deep_merge(defaults, &deep_merge(configuration, overlay))
}

/// How a reload combines freshly loaded file contents with in-memory values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// The file fully replaces the in-memory configuration.
    Replace,
    /// Both are kept; in-memory values win conflicts.
    PreferMemory,
    /// Both are kept; file values win conflicts.
    PreferDisk,
}

impl ReloadPolicy {
    /// Picks the policy for the `persist_memory` / `prefer_memory` flag pair.
    pub fn from_flags(persist_memory: bool, prefer_memory: bool) -> Self {
        match (persist_memory, prefer_memory) {
            (false, _) => Self::Replace,
            (true, true) => Self::PreferMemory,
            (true, false) => Self::PreferDisk,
        }
    }

    /// Produces the new raw configuration from the current one and the loaded file.
    pub fn apply(self, memory: &Mapping, loaded: Mapping) -> Mapping {
        match self {
            Self::Replace => loaded,
            Self::PreferMemory => deep_merge(&loaded, memory),
            Self::PreferDisk => deep_merge(memory, &loaded),
        }
    }
}
