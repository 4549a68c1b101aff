use super::FormatParser;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;

pub struct YamlParser;

impl FormatParser for YamlParser {
    fn format_name(&self) -> &str {
        "yaml"
    }

    fn supported_extensions(&self) -> Vec<&str> {
        vec!["yaml", "yml"]
    }

    fn parse(&self, text: &str) -> Result<Value, String> {
        let yaml: YamlValue = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        yaml_to_json(yaml)
    }
}

/// Convert a YAML tree to a JSON tree
///
/// Mapping keys become strings (`200:` is a status code, not a number), tags
/// are dropped in favour of their value, and non-finite floats are rejected.
pub fn yaml_to_json(yaml: YamlValue) -> Result<Value, String> {
    Ok(match yaml {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("unsupported non-finite number {}", n))?
            }
        }
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, value) in mapping {
                object.insert(key_to_string(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn key_to_string(key: YamlValue) -> Result<String, String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        YamlValue::Tagged(tagged) => key_to_string(tagged.value),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => {
            Err("mapping keys must be scalars".to_string())
        }
    }
}
