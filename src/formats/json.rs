use serde_json::Value;

use super::{Codec, Format, parse_error, serialization_error, value_kind};
use crate::config_store::{ConfigError, Mapping};

/// JSON backing files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn decode(&self, text: &str, _stringify_keys: bool) -> Result<Mapping, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Mapping::new());
        }

        match serde_json::from_str::<Value>(text).map_err(|e| parse_error(Format::Json, e))? {
            Value::Object(config) => Ok(config),
            Value::Null => Ok(Mapping::new()),
            other => Err(parse_error(
                Format::Json,
                format!("top level must be a mapping, found {}", value_kind(&other)),
            )),
        }
    }

    fn encode(&self, config: &Mapping) -> Result<String, ConfigError> {
        let mut document =
            serde_json::to_string_pretty(config).map_err(|e| serialization_error(Format::Json, e))?;
        document.push('\n');
        Ok(document)
    }
}
