//! Content-addressing helpers shared by the resource cache resolver.
//!
//! Grounded on `atc/db/resource_cache_factory.go`'s `mapHash`/`paramsHash`
//! and the `version_md5 = md5(?)` SQL expression it issues: a value is
//! canonicalised to a stable JSON encoding (keys sorted, so two maps with
//! the same entries in different insertion order hash identically) and then
//! MD5'd. The hash is never used for anything cryptographic — it is a
//! dedup key.

use md5::{Digest, Md5};
use serde_json::{Map, Value};

/// Canonicalise a JSON value to a string with object keys sorted
/// recursively, so structurally-equal documents always encode identically
/// regardless of field order.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// MD5 hex digest of a string, as used for `version_md5`, `params_hash`,
/// and `source_hash`.
#[must_use]
pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a JSON value directly: canonicalise then MD5.
#[must_use]
pub fn md5_of_json(value: &Value) -> String {
    md5_hex(&canonical_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_is_insensitive_to_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let a = json!({"outer": {"z": 1, "y": 2}});
        let b = json!({"outer": {"y": 2, "z": 1}});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn md5_of_json_is_deterministic() {
        let v = json!({"ref": "abc123"});
        assert_eq!(md5_of_json(&v), md5_of_json(&v));
    }

    #[test]
    fn different_content_hashes_differently() {
        let a = json!({"ref": "abc123"});
        let b = json!({"ref": "def456"});
        assert_ne!(md5_of_json(&a), md5_of_json(&b));
    }

    #[test]
    fn md5_hex_matches_known_vector() {
        // md5("") == d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
