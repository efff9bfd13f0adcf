use serde_json::{Number, Value};

use super::{Codec, Format, parse_error, serialization_error};
use crate::config_store::{ConfigError, Mapping};

/// TOML backing files.
///
/// TOML has no null; encoding a mapping that contains one fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn format(&self) -> Format {
        Format::Toml
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["toml"]
    }

    fn decode(&self, text: &str, _stringify_keys: bool) -> Result<Mapping, ConfigError> {
        let table: toml::Table = toml::from_str(text).map_err(|e| parse_error(Format::Toml, e))?;

        Ok(table
            .into_iter()
            .map(|(key, value)| (key, to_json(value)))
            .collect())
    }

    fn encode(&self, config: &Mapping) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| serialization_error(Format::Toml, e))
    }
}

fn to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, to_json(value)))
                .collect(),
        ),
    }
}
