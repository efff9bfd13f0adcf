//! Backing-file formats.
//!
//! Each format is a [`Codec`] that knows how to decode a document into a
//! [`Mapping`], encode one back, and recognise files of its kind. The
//! [`FormatRegistry`] holds the closed set of codecs used for detection.

mod json;
mod toml;
mod yaml;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config_store::{ConfigError, Mapping};

pub use json::JsonCodec;
pub use self::toml::TomlCodec;
pub use yaml::YamlCodec;

/// Identifies a backing-file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON document
    Json,
    /// YAML document
    Yaml,
    /// TOML document
    Toml,
    /// No backing file; loads are empty and saves are dropped
    Memory,
}

impl Format {
    /// Lowercase name of the format.
    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
            Format::Memory => "memory",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            "memory" | "none" => Ok(Format::Memory),
            other => Err(ConfigError::PatternError {
                pattern: other.to_string(),
                reason: "unknown format, expected json, yaml, toml or memory".to_string(),
            }),
        }
    }
}

/// A backing-file format adapter.
///
/// Implementors provide `decode`/`encode`; `load`, `save` and `matches` have
/// file-based default implementations.
pub trait Codec: Send + Sync {
    /// The format this codec handles.
    fn format(&self) -> Format;

    /// File extensions (lowercase, without the dot) associated with the format.
    fn extensions(&self) -> &'static [&'static str];

    /// Parses a document into a mapping.
    ///
    /// When `stringify_keys` is true, non-string mapping keys (numbers,
    /// booleans, null) are converted to strings; otherwise they are rejected.
    ///
    /// # Errors
    /// Returns `ConfigError::ParseError` for malformed documents or documents
    /// whose top level is not a mapping.
    fn decode(&self, text: &str, stringify_keys: bool) -> Result<Mapping, ConfigError>;

    /// Serializes a mapping into a document.
    ///
    /// # Errors
    /// Returns `ConfigError::SerializationError` if the mapping cannot be
    /// represented in this format.
    fn encode(&self, config: &Mapping) -> Result<String, ConfigError>;

    /// Reads and parses the backing file.
    ///
    /// A missing file is an empty mapping. Read or parse failures are logged
    /// and also produce an empty mapping, so reloads never fail.
    fn load(&self, path: &Path, stringify_keys: bool) -> Mapping {
        if !path.exists() {
            debug!(path = %path.display(), "Backing file does not exist yet");
            return Mapping::new();
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file");
                return Mapping::new();
            }
        };

        match self.decode(&text, stringify_keys) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    format = %self.format(),
                    error = %e,
                    "Failed to load config file, using an empty configuration"
                );
                Mapping::new()
            }
        }
    }

    /// Encodes the mapping and atomically replaces the backing file.
    ///
    /// # Errors
    /// Returns `ConfigError::SerializationError` if encoding fails and
    /// `ConfigError::PersistenceError` if the file cannot be written.
    fn save(&self, path: &Path, config: &Mapping) -> Result<(), ConfigError> {
        let document = self.encode(config)?;
        write_atomic(path, &document)
    }

    /// Reports whether `path` is a file of this format.
    ///
    /// Existing files must decode successfully; missing files are judged by
    /// their extension.
    fn matches(&self, path: &Path) -> bool {
        if path.exists() {
            fs::read_to_string(path).is_ok_and(|text| self.decode(&text, true).is_ok())
        } else {
            has_extension(path, self.extensions())
        }
    }
}

/// Codec for stores without a backing file.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryCodec;

impl Codec for MemoryCodec {
    fn format(&self) -> Format {
        Format::Memory
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn decode(&self, _text: &str, _stringify_keys: bool) -> Result<Mapping, ConfigError> {
        Ok(Mapping::new())
    }

    fn encode(&self, _config: &Mapping) -> Result<String, ConfigError> {
        Ok(String::new())
    }

    fn load(&self, _path: &Path, _stringify_keys: bool) -> Mapping {
        Mapping::new()
    }

    fn save(&self, _path: &Path, _config: &Mapping) -> Result<(), ConfigError> {
        Ok(())
    }

    fn matches(&self, _path: &Path) -> bool {
        false
    }
}

/// The closed set of codecs available for format detection.
#[derive(Clone)]
pub struct FormatRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self {
            codecs: vec![
                Arc::new(JsonCodec),
                Arc::new(YamlCodec),
                Arc::new(TomlCodec),
            ],
        }
    }
}

impl FormatRegistry {
    /// Creates a registry with no codecs.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Adds a codec, replacing any codec already registered for the same format.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.retain(|existing| existing.format() != codec.format());
        self.codecs.push(codec);
    }

    /// Formats registered, in detection order.
    pub fn formats(&self) -> Vec<Format> {
        self.codecs.iter().map(|codec| codec.format()).collect()
    }

    /// Looks up the codec for a format. `Format::Memory` is always available.
    pub fn get(&self, format: Format) -> Option<Arc<dyn Codec>> {
        if format == Format::Memory {
            return Some(Arc::new(MemoryCodec));
        }

        self.codecs
            .iter()
            .find(|codec| codec.format() == format)
            .cloned()
    }

    /// Picks the codec for `path`.
    ///
    /// Codecs whose extension matches are tried first, then every codec by
    /// content. Falls back to the memory codec when nothing matches.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn detect(&self, path: &Path) -> Arc<dyn Codec> {
        let by_extension = self
            .codecs
            .iter()
            .filter(|codec| has_extension(path, codec.extensions()))
            .find(|codec| codec.matches(path));

        let detected = by_extension.or_else(|| self.codecs.iter().find(|codec| codec.matches(path)));

        match detected {
            Some(codec) => {
                debug!(format = %codec.format(), "Detected config format");
                Arc::clone(codec)
            }
            None => {
                warn!("No format matches, changes will not be persisted");
                Arc::new(MemoryCodec)
            }
        }
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

fn write_atomic(path: &Path, document: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::PersistenceError {
            path: parent.to_path_buf(),
            details: format!("Failed to create config directory: {e}"),
        })?;
    }

    let temp_path = temp_path_for(path);

    fs::write(&temp_path, document).map_err(|e| ConfigError::PersistenceError {
        path: temp_path.clone(),
        details: e.to_string(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::PersistenceError {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    info!(path = %path.display(), "Configuration saved");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

pub(crate) fn parse_error(format: Format, details: impl fmt::Display) -> ConfigError {
    ConfigError::ParseError {
        format: format.to_string(),
        location: "string".to_string(),
        details: details.to_string(),
    }
}

pub(crate) fn serialization_error(format: Format, details: impl fmt::Display) -> ConfigError {
    ConfigError::SerializationError {
        content_type: format.to_string(),
        details: details.to_string(),
    }
}
