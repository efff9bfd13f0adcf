use std::{fmt, path::PathBuf, time::Instant};

use serde_json::Value;

/// A single leaf-level configuration change.
///
/// Change detection produces one of these for every flattened key whose value
/// differs between the effective configuration and an incoming change-set.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    /// Path to the changed field using dot notation (e.g., "database.pool.size").
    pub path: String,
    /// The previous effective value of the field, if it existed.
    pub old_value: Option<Value>,
    /// The new value of the field.
    pub new_value: Value,
    /// Timestamp when the change was detected.
    pub timestamp: Instant,
}

/// A listener that failed while a change was being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Which listener failed ("on_change", "on_reload", or the event pattern).
    pub listener: String,
    /// Error or panic message reported by the listener.
    pub details: String,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.listener, self.details)
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The specified configuration path does not resolve to a value.
    #[error("Invalid config path: {0}")]
    InvalidPath(String),

    /// The value type does not match the expected type for the field.
    #[error("Type mismatch at {path}: Expected {expected_type}, got {actual_value}")]
    TypeMismatch {
        /// The path where the type mismatch occurred.
        path: String,
        /// The expected type name.
        expected_type: &'static str,
        /// The actual value that was found.
        actual_value: Value,
    },

    /// Error in path pattern matching or parsing
    #[error("invalid path pattern '{pattern}': {reason}")]
    PatternError {
        /// The pattern that failed to parse
        pattern: String,
        /// Reason why the pattern is invalid
        reason: String,
    },

    /// Error occurred while persisting configuration to disk
    #[error("failed to persist config to '{path}': {details}")]
    PersistenceError {
        /// Path where persistence failed
        path: PathBuf,
        /// Error details from the persistence operation
        details: String,
    },

    /// Error occurred while serializing configuration
    #[error("failed to serialize {content_type}: {details}")]
    SerializationError {
        /// Format being produced (e.g., "json", "yaml")
        content_type: String,
        /// Serialization error details
        details: String,
    },

    /// Failed to parse a configuration document
    #[error("failed to parse {format} from {location}: {details}")]
    ParseError {
        /// Format that was being parsed
        format: String,
        /// Location of the document (file path, "string", etc.)
        location: String,
        /// Parse error details
        details: String,
    },

    /// Failed to initialize or run the file watcher
    #[error("file watcher error for '{path}': {details}")]
    FileWatchError {
        /// Path being watched when error occurred
        path: PathBuf,
        /// File watcher error details
        details: String,
    },

    /// Error occurred during file I/O operations
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// Error occurred while acquiring locks for thread-safe access
    #[error("failed to acquire {lock_type} lock: {details}")]
    LockError {
        /// Type of lock that failed (read, write)
        lock_type: String,
        /// Lock error details
        details: String,
    },

    /// A required service is unavailable
    #[error("{service} service unavailable: {details}")]
    ServiceUnavailable {
        /// Name of the service that is unavailable
        service: String,
        /// Details about why the service is unavailable
        details: String,
    },

    /// One or more listeners failed while a change was dispatched.
    ///
    /// The mutation or reload that triggered the dispatch has already been
    /// applied when this is returned.
    #[error("{} listener(s) failed: {}", .0.len(), join_failures(.0))]
    ListenerFailures(Vec<ListenerFailure>),
}

fn join_failures(failures: &[ListenerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigChange {
    /// Creates a new configuration change.
    ///
    /// # Arguments
    ///
    /// * `path` - The dot-separated path to the configuration field
    /// * `old_value` - The previous value of the field (if known)
    /// * `new_value` - The new value of the field
    pub fn new(path: String, old_value: Option<Value>, new_value: Value) -> Self {
        Self {
            path,
            old_value,
            new_value,
            timestamp: Instant::now(),
        }
    }

    /// Extracts the new value as a specific type.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::TypeMismatch` if the value cannot be deserialized
    /// into the requested type.
    pub fn extract<T>(&self) -> Result<T, ConfigError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.new_value.clone()).map_err(|_| ConfigError::TypeMismatch {
            path: self.path.clone(),
            expected_type: std::any::type_name::<T>(),
            actual_value: self.new_value.clone(),
        })
    }

    /// Attempts to extract the new value as a string.
    ///
    /// Returns `None` if the value is not a string.
    pub fn as_string(&self) -> Option<String> {
        match &self.new_value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}
