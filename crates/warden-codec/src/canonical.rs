use serde_json::{Map, Value};

/// Serialize a JSON value with object keys sorted recursively.
///
/// The signature covers the payload, so its serialization must be
/// byte-stable regardless of the key order a serializer happens to
/// produce. Arrays keep their order; only object keys are sorted.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
