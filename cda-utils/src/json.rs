use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{to_string_pretty, to_value, Map, Value};
use std::{fs, path::Path};

pub fn jsonify_pretty<T>(obj: &T) -> String
where
    T: Serialize,
{
    to_string_pretty(&jsonify_internal(
        &to_value(obj).expect("to_value failed on serializable object"),
    ))
    .expect("to_string failed on serializable object")
}

pub fn jsonify_internal(json_value: &Value) -> Value {
    match json_value {
        Value::Object(obj) => {
            let mut sorted_map = Map::new();
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = obj.get(key) {
                    sorted_map.insert(key.clone(), jsonify_internal(value));
                }
            }
            Value::Object(sorted_map)
        }
        Value::Array(items) => Value::Array(items.iter().map(jsonify_internal).collect()),
        _ => json_value.clone(),
    }
}

/// Parses `input` as JSON, or reads it from disk first when it names a `.json` file.
pub fn load_json<T>(input: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = if input.ends_with(".json") {
        fs::read_to_string(input).map_err(|e| anyhow!("Failed to read '{}': {}", input, e))?
    } else {
        input.to_string()
    };
    serde_json::from_str::<T>(&content).map_err(|e| anyhow!("Failed to parse json: {}", e))
}

pub fn write_json<T, P>(obj: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    fs::write(path.as_ref(), jsonify_pretty(obj))
        .map_err(|e| anyhow!("Failed to write '{}': {}", path.as_ref().display(), e))
}
