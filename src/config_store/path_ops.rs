use std::{fmt, iter::Peekable, str::Chars, str::FromStr};

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{ConfigError, Mapping};

/// One parsed component of a hash path expression.
#[derive(Debug, Clone)]
enum Segment {
    /// Literal mapping key
    Key(String),
    /// `*`: every child of a mapping or every element of a sequence
    Any,
    /// Key containing `*` wildcards, anchored
    Glob(Regex),
    /// `/regex/` matched against mapping keys
    Pattern(Regex),
    /// `[n]`, negative values count from the end
    Index(i64),
    /// `[*]`
    AnyIndex,
}

impl Segment {
    fn is_pattern(&self) -> bool {
        !matches!(self, Segment::Key(_) | Segment::Index(_))
    }

    fn matches_step(&self, step: &Step) -> bool {
        match (self, step) {
            (Segment::Any, _) => true,
            (Segment::Key(key), Step::Key(actual)) => key == actual,
            (Segment::Glob(re) | Segment::Pattern(re), Step::Key(actual)) => re.is_match(actual),
            (Segment::Index(index), Step::Index(actual)) => {
                usize::try_from(*index).is_ok_and(|index| index == *actual)
            }
            (Segment::AnyIndex, Step::Index(_)) => true,
            _ => false,
        }
    }
}

/// A concrete step inside a nested mapping: a key or a sequence position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
}

/// A parsed hash path expression.
///
/// Segments are separated by `.` (escape a literal dot with `\.`). Each segment
/// is a key, optionally followed by `[n]` indexes:
///
/// * `name` - literal key
/// * `*` - every child of a mapping or every element of a sequence
/// * `host*` - keys matching a glob
/// * `/^db_\d+$/` - keys matching a regex
/// * `[2]`, `[-1]`, `[*]` - sequence positions
///
/// # Examples
/// * `"server.port"`
/// * `"servers[0].host"`
/// * `"db.*"`
#[derive(Debug, Clone)]
pub struct HashPath {
    raw: String,
    segments: Vec<Segment>,
}

impl HashPath {
    /// Parses a hash path expression.
    ///
    /// An empty expression parses to a path that matches nothing.
    ///
    /// # Errors
    /// Returns `ConfigError::PatternError` for unterminated brackets or regexes,
    /// empty segments, non-numeric indexes, or invalid regular expressions.
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let trimmed = expr.trim();
        let mut segments = Vec::new();

        if !trimmed.is_empty() {
            let mut chars = trimmed.chars().peekable();
            loop {
                parse_segment(&mut chars, &mut segments, expr)?;
                match chars.next() {
                    None => break,
                    Some('.') => continue,
                    Some(c) => return Err(pattern_error(expr, format!("unexpected '{c}'"))),
                }
            }
        }

        Ok(Self {
            raw: expr.to_string(),
            segments,
        })
    }

    /// The expression this path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the path can match more than one location.
    pub fn is_pattern(&self) -> bool {
        self.segments.iter().any(Segment::is_pattern)
    }

    /// True when the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Enumerates every concrete location matched by this path, in document order.
    pub fn locations(&self, root: &Mapping) -> Vec<Vec<Step>> {
        self.matches(root).into_iter().map(|(loc, _)| loc).collect()
    }

    /// Returns clones of every matching value, in document order.
    pub fn resolve_all(&self, root: &Mapping) -> Vec<Value> {
        self.matches(root)
            .into_iter()
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Returns the first matching value, if any.
    pub fn resolve_first(&self, root: &Mapping) -> Option<Value> {
        self.matches(root)
            .into_iter()
            .next()
            .map(|(_, value)| value.clone())
    }

    /// Checks whether a concrete location falls under this path.
    ///
    /// Matching is by prefix: `"db"` and `"db.*"` both match `db.host`, and
    /// `"*"` matches everything.
    pub fn matches_location(&self, location: &[Step]) -> bool {
        if self.segments.is_empty() || self.segments.len() > location.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(location)
            .all(|(segment, step)| segment.matches_step(step))
    }

    /// Writes `value` at this path.
    ///
    /// Literal paths create intermediate mappings (or sequences, when the next
    /// segment is an index) and replace scalars standing in the way. Pattern
    /// paths overwrite every existing match. Returns the locations written.
    pub fn set(&self, root: &mut Mapping, value: Value) -> Vec<Vec<Step>> {
        if !self.is_pattern() {
            return set_literal(root, &self.segments, value)
                .into_iter()
                .collect();
        }

        let locations = self.locations(root);
        for location in &locations {
            if let Some(slot) = value_at_mut(root, location) {
                *slot = value.clone();
            }
        }

        locations
    }

    /// Removes every matching value and returns what was removed.
    pub fn delete(&self, root: &mut Mapping) -> Vec<Value> {
        let mut removed = Vec::new();

        // Reverse order keeps earlier sequence indexes valid while removing.
        for location in self.locations(root).into_iter().rev() {
            if let Some(value) = remove_at(root, &location) {
                removed.push(value);
            }
        }

        removed.reverse();
        removed
    }

    fn matches<'a>(&self, root: &'a Mapping) -> Vec<(Vec<Step>, &'a Value)> {
        let Some((first, rest)) = self.segments.split_first() else {
            return Vec::new();
        };

        let mut frontier: Vec<(Vec<Step>, &'a Value)> = expand_map(root, first)
            .into_iter()
            .map(|(step, value)| (vec![step], value))
            .collect();

        for segment in rest {
            frontier = frontier
                .into_iter()
                .flat_map(|(location, value)| {
                    expand_value(value, segment)
                        .into_iter()
                        .map(move |(step, child)| {
                            let mut next = location.clone();
                            next.push(step);
                            (next, child)
                        })
                })
                .collect();
        }

        frontier
    }
}

impl FromStr for HashPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HashPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolves every match of `path`, treating unparseable paths as no match.
pub fn resolve_all(root: &Mapping, path: &str) -> Vec<Value> {
    parse_permissive(path)
        .map(|path| path.resolve_all(root))
        .unwrap_or_default()
}

/// Resolves the first match of `path`, treating unparseable paths as no match.
pub fn resolve_first(root: &Mapping, path: &str) -> Option<Value> {
    parse_permissive(path).and_then(|path| path.resolve_first(root))
}

/// Writes `value` at `path`; unparseable paths are a no-op.
pub fn set_path(root: &mut Mapping, path: &str, value: Value) -> Vec<Vec<Step>> {
    parse_permissive(path)
        .map(|path| path.set(root, value))
        .unwrap_or_default()
}

/// Deletes every match of `path`; unparseable paths are a no-op.
pub fn delete_path(root: &mut Mapping, path: &str) -> Vec<Value> {
    parse_permissive(path)
        .map(|path| path.delete(root))
        .unwrap_or_default()
}

/// Looks up the value at a concrete location.
pub fn value_at<'a>(root: &'a Mapping, location: &[Step]) -> Option<&'a Value> {
    let (Step::Key(first), rest) = location.split_first()? else {
        return None;
    };

    let mut current = root.get(first)?;
    for step in rest {
        current = match (step, current) {
            (Step::Key(key), Value::Object(map)) => map.get(key)?,
            (Step::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Renders a concrete location back into hash path syntax (e.g. `servers[0].host`).
pub fn format_location(location: &[Step]) -> String {
    let mut out = String::new();

    for step in location {
        match step {
            Step::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                for c in key.chars() {
                    if matches!(c, '.' | '[' | ']' | '*' | '\\') {
                        out.push('\\');
                    }
                    out.push(c);
                }
            }
            Step::Index(index) => out.push_str(&format!("[{index}]")),
        }
    }

    out
}

fn parse_permissive(path: &str) -> Option<HashPath> {
    match HashPath::parse(path) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(path, error = %e, "Ignoring unparseable hash path");
            None
        }
    }
}

fn pattern_error(pattern: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::PatternError {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

fn parse_segment(
    chars: &mut Peekable<Chars<'_>>,
    segments: &mut Vec<Segment>,
    expr: &str,
) -> Result<(), ConfigError> {
    if chars.peek() == Some(&'/') {
        chars.next();
        let mut source = String::new();

        loop {
            match chars.next() {
                None => return Err(pattern_error(expr, "unterminated regex segment")),
                Some('/') => break,
                Some('\\') if chars.peek() == Some(&'/') => {
                    chars.next();
                    source.push('/');
                }
                Some(c) => source.push(c),
            }
        }

        let re = Regex::new(&source).map_err(|e| pattern_error(expr, e.to_string()))?;
        segments.push(Segment::Pattern(re));
        return Ok(());
    }

    let mut key = String::new();
    let mut glob = String::new();
    let mut has_glob = false;

    while let Some(&c) = chars.peek() {
        match c {
            '.' | '[' => break,
            ']' => return Err(pattern_error(expr, "unexpected ']'")),
            '\\' => {
                chars.next();
                let escaped = chars
                    .next()
                    .ok_or_else(|| pattern_error(expr, "dangling escape"))?;
                key.push(escaped);
                glob.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
            }
            '*' => {
                chars.next();
                has_glob = true;
                key.push('*');
                glob.push_str(".*");
            }
            _ => {
                chars.next();
                key.push(c);
                glob.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            }
        }
    }

    if !key.is_empty() {
        let segment = if has_glob && key == "*" {
            Segment::Any
        } else if has_glob {
            let re = Regex::new(&format!("^{glob}$"))
                .map_err(|e| pattern_error(expr, e.to_string()))?;
            Segment::Glob(re)
        } else {
            Segment::Key(key.clone())
        };
        segments.push(segment);
    }

    let mut indexed = false;
    while chars.peek() == Some(&'[') {
        chars.next();
        let mut inner = String::new();

        loop {
            match chars.next() {
                None => return Err(pattern_error(expr, "unterminated index")),
                Some(']') => break,
                Some(c) => inner.push(c),
            }
        }

        let inner = inner.trim();
        let segment = if inner == "*" {
            Segment::AnyIndex
        } else {
            let index = inner
                .parse::<i64>()
                .map_err(|_| pattern_error(expr, format!("invalid index '{inner}'")))?;
            Segment::Index(index)
        };
        segments.push(segment);
        indexed = true;
    }

    if key.is_empty() && !indexed {
        return Err(pattern_error(expr, "empty segment"));
    }

    Ok(())
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = usize::try_from(index).ok()?;
        (index < len).then_some(index)
    } else {
        let back = usize::try_from(index.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

fn expand_map<'a>(map: &'a Mapping, segment: &Segment) -> Vec<(Step, &'a Value)> {
    match segment {
        Segment::Key(key) => map
            .get(key)
            .map(|value| vec![(Step::Key(key.clone()), value)])
            .unwrap_or_default(),
        Segment::Any => map
            .iter()
            .map(|(key, value)| (Step::Key(key.clone()), value))
            .collect(),
        Segment::Glob(re) | Segment::Pattern(re) => map
            .iter()
            .filter(|(key, _)| re.is_match(key))
            .map(|(key, value)| (Step::Key(key.clone()), value))
            .collect(),
        Segment::Index(_) | Segment::AnyIndex => Vec::new(),
    }
}

fn expand_seq<'a>(items: &'a [Value], segment: &Segment) -> Vec<(Step, &'a Value)> {
    match segment {
        Segment::Index(index) => normalize_index(*index, items.len())
            .map(|index| vec![(Step::Index(index), &items[index])])
            .unwrap_or_default(),
        Segment::Any | Segment::AnyIndex => items
            .iter()
            .enumerate()
            .map(|(index, value)| (Step::Index(index), value))
            .collect(),
        _ => Vec::new(),
    }
}

fn expand_value<'a>(value: &'a Value, segment: &Segment) -> Vec<(Step, &'a Value)> {
    match value {
        Value::Object(map) => expand_map(map, segment),
        Value::Array(items) => expand_seq(items, segment),
        _ => Vec::new(),
    }
}

/// How many `null` slots a single write may add past the end of a sequence.
const MAX_SEQUENCE_GROWTH: usize = 1024;

fn set_literal(root: &mut Mapping, segments: &[Segment], value: Value) -> Option<Vec<Step>> {
    let (Segment::Key(first), rest) = segments.split_first()? else {
        return None;
    };

    let mut location = vec![Step::Key(first.clone())];
    let mut top = root.get(first).cloned().unwrap_or(Value::Null);
    let mut slot = &mut top;

    for segment in rest {
        slot = descend_or_create(slot, segment, &mut location)?;
    }

    *slot = value;
    root.insert(first.clone(), top);
    Some(location)
}

fn descend_or_create<'a>(
    slot: &'a mut Value,
    segment: &Segment,
    location: &mut Vec<Step>,
) -> Option<&'a mut Value> {
    match segment {
        Segment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Mapping::new());
            }
            let map = slot.as_object_mut()?;
            location.push(Step::Key(key.clone()));
            Some(map.entry(key.clone()).or_insert(Value::Null))
        }
        Segment::Index(index) => {
            let len = slot.as_array().map_or(0, Vec::len);
            let position = if *index < 0 {
                normalize_index(*index, len)?
            } else {
                usize::try_from(*index).ok()?
            };
            if position.saturating_sub(len) > MAX_SEQUENCE_GROWTH {
                debug!(index = *index, len, "Index too far past the end of the sequence, write skipped");
                return None;
            }

            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot.as_array_mut()?;
            if position >= items.len() {
                items.resize(position + 1, Value::Null);
            }
            location.push(Step::Index(position));
            items.get_mut(position)
        }
        _ => None,
    }
}

fn value_at_mut<'a>(root: &'a mut Mapping, location: &[Step]) -> Option<&'a mut Value> {
    let (Step::Key(first), rest) = location.split_first()? else {
        return None;
    };

    let mut current = root.get_mut(first)?;
    for step in rest {
        current = match (step, current) {
            (Step::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (Step::Index(index), Value::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }

    Some(current)
}

fn remove_at(root: &mut Mapping, location: &[Step]) -> Option<Value> {
    let (last, parent) = location.split_last()?;

    if parent.is_empty() {
        let Step::Key(key) = last else {
            return None;
        };
        return root.shift_remove(key);
    }

    match (last, value_at_mut(root, parent)?) {
        (Step::Key(key), Value::Object(map)) => map.shift_remove(key),
        (Step::Index(index), Value::Array(items)) if *index < items.len() => {
            Some(items.remove(*index))
        }
        _ => None,
    }
}
