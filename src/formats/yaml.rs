use serde_json::{Number, Value};
use serde_yaml::Value as Yaml;

use super::{Codec, Format, parse_error, serialization_error, value_kind};
use crate::config_store::{ConfigError, Mapping};

/// YAML backing files.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn decode(&self, text: &str, stringify_keys: bool) -> Result<Mapping, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Mapping::new());
        }

        let document: Yaml =
            serde_yaml::from_str(text).map_err(|e| parse_error(Format::Yaml, e))?;

        match to_json(document, stringify_keys).map_err(|e| parse_error(Format::Yaml, e))? {
            Value::Object(config) => Ok(config),
            Value::Null => Ok(Mapping::new()),
            other => Err(parse_error(
                Format::Yaml,
                format!("top level must be a mapping, found {}", value_kind(&other)),
            )),
        }
    }

    fn encode(&self, config: &Mapping) -> Result<String, ConfigError> {
        serde_yaml::to_string(config).map_err(|e| serialization_error(Format::Yaml, e))
    }
}

fn to_json(value: Yaml, stringify_keys: bool) -> Result<Value, String> {
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => number(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(|item| to_json(item, stringify_keys))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut table = Mapping::new();
            for (key, child) in entries {
                table.insert(key_to_string(key, stringify_keys)?, to_json(child, stringify_keys)?);
            }
            Value::Object(table)
        }
        Yaml::Tagged(tagged) => to_json(tagged.value, stringify_keys)?,
    })
}

fn number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

fn key_to_string(key: Yaml, stringify_keys: bool) -> Result<String, String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) if stringify_keys => Ok(b.to_string()),
        Yaml::Number(n) if stringify_keys => Ok(n.to_string()),
        Yaml::Null if stringify_keys => Ok("null".to_string()),
        other => Err(format!("unsupported mapping key: {other:?}")),
    }
}
