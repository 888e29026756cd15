//! Canonical JSON encoding used as the sole input to content hashing.
//!
//! Every declared or derived value (identifying tuples, generator
//! definitions, node definitions) must go through this encoder before being
//! hashed — never hash a live value/object graph directly (§9). Object keys
//! are sorted via a `BTreeMap`; array order is preserved; `null` encodes to
//! the literal `null`, distinct from any string value.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut ordered = BTreeMap::new();
            for (k, v) in map {
                ordered.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = ordered
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(&k).unwrap(), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let a = to_canonical_json(&json!({"b": 1, "a": 2}));
        let b = to_canonical_json(&json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn null_is_distinct_from_string_sentinel() {
        assert_eq!(to_canonical_json(&Value::Null), "null");
        assert_ne!(to_canonical_json(&Value::Null), to_canonical_json(&json!("null")));
    }
}
