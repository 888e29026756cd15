//! Content hashing. BLAKE3 is used throughout so a node's, generator's or
//! row's identity never depends on process memory addresses or insertion
//! order — only on its canonical encoding.

use serde_json::Value;
use uuid::Uuid;

use super::to_canonical_json;

pub fn hash_str(input: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(input.as_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Derives a row's primary key from its entity name and canonicalized
/// identifying values (§3 "Row identity"). The first 16 bytes of the
/// BLAKE3 digest become a UUID so the column type stays `UUID` as required
/// by the entity invariant, while remaining a pure function of the
/// canonical encoding.
pub fn hash_to_uuid(entity_name: &str, identifying: &Value) -> Uuid {
    let canonical = to_canonical_json(identifying);
    let mut hasher = blake3::Hasher::new();
    hasher.update(entity_name.as_bytes());
    hasher.update(b"||");
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 16] = digest.as_bytes()[..16].try_into().expect("16 bytes");
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_identifying_values_produce_same_pk() {
        let a = hash_to_uuid("widget", &json!({"label": "x"}));
        let b = hash_to_uuid("widget", &json!({"label": "x"}));
        assert_eq!(a, b);
    }

    #[test]
    fn different_entity_name_changes_pk() {
        let a = hash_to_uuid("widget", &json!({"label": "x"}));
        let b = hash_to_uuid("gadget", &json!({"label": "x"}));
        assert_ne!(a, b);
    }
}
