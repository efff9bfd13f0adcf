use std::time::Instant;

use serde_json::Value;

use super::{
    ConfigChange, Mapping,
    path_ops::{Step, format_location, value_at},
};

/// Result of comparing an incoming change-set against the effective configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// The change-set as it was submitted, in nested form.
    pub incoming: Mapping,
    /// Only the entries of `incoming` that actually differ, in nested form.
    pub diff: Mapping,
    /// One record per changed leaf, in document order.
    pub changes: Vec<ConfigChange>,
    /// Location of each entry in `changes`.
    pub(crate) locations: Vec<Vec<Step>>,
}

impl ChangeSet {
    /// True when nothing in the change-set differs from the current configuration.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Flattens a nested mapping into `(location, leaf)` pairs.
///
/// Only mappings are descended into; sequences and empty mappings are leaves.
pub fn flatten(map: &Mapping) -> Vec<(Vec<Step>, Value)> {
    let mut pairs = Vec::new();
    let mut prefix = Vec::new();

    for (key, value) in map {
        prefix.push(Step::Key(key.clone()));
        flatten_into(&mut prefix, value, &mut pairs);
        prefix.pop();
    }

    pairs
}

fn flatten_into(prefix: &mut Vec<Step>, value: &Value, pairs: &mut Vec<(Vec<Step>, Value)>) {
    match value {
        Value::Object(table) if !table.is_empty() => {
            for (key, child) in table {
                prefix.push(Step::Key(key.clone()));
                flatten_into(prefix, child, pairs);
                prefix.pop();
            }
        }
        leaf => pairs.push((prefix.clone(), leaf.clone())),
    }
}

/// Rebuilds a nested mapping from flattened pairs. Index steps are ignored.
pub fn expand<I>(pairs: I) -> Mapping
where
    I: IntoIterator<Item = (Vec<Step>, Value)>,
{
    let mut root = Mapping::new();

    for (location, value) in pairs {
        insert_at(&mut root, &location, value);
    }

    root
}

fn insert_at(root: &mut Mapping, location: &[Step], value: Value) {
    let keys: Vec<&String> = location
        .iter()
        .filter_map(|step| match step {
            Step::Key(key) => Some(key),
            Step::Index(_) => None,
        })
        .collect();

    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    let mut table = root;
    for key in parents {
        let slot = table
            .entry((*key).clone())
            .or_insert_with(|| Value::Object(Mapping::new()));
        if !slot.is_object() {
            *slot = Value::Object(Mapping::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        table = next;
    }

    table.insert((*last).clone(), value);
}

/// Builds the nested change-set for a batch of written locations.
///
/// Locations that pass through a sequence index are cut back to the sequence
/// itself, and the sequence's value is taken from `written`.
pub fn incoming_from_locations(written: &Mapping, locations: &[Vec<Step>]) -> Mapping {
    let mut incoming = Mapping::new();

    for location in locations {
        let cut = location
            .iter()
            .position(|step| matches!(step, Step::Index(_)))
            .unwrap_or(location.len());
        let truncated = &location[..cut];

        if let Some(value) = value_at(written, truncated) {
            insert_at(&mut incoming, truncated, value.clone());
        }
    }

    incoming
}

/// Computes which pairs of `incoming` are new or different in `current`.
///
/// Both sides are flattened; a pair counts as changed when `current` has no
/// identical pair at the same location. Keys that are not part of `incoming`
/// are never reported.
pub fn detect_changes(current: &Mapping, incoming: Mapping) -> ChangeSet {
    let timestamp = Instant::now();
    let mut changed = Vec::new();
    let mut changes = Vec::new();

    for (location, new_value) in flatten(&incoming) {
        let old_value = value_at(current, &location);
        if old_value == Some(&new_value) {
            continue;
        }

        changes.push(ConfigChange {
            path: format_location(&location),
            old_value: old_value.cloned(),
            new_value: new_value.clone(),
            timestamp,
        });
        changed.push((location, new_value));
    }

    let locations = changed.iter().map(|(location, _)| location.clone()).collect();

    ChangeSet {
        incoming,
        diff: expand(changed),
        changes,
        locations,
    }
}
