//! Description fingerprints for schema integrity verification

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::Result;
use crate::field::Field;

/// SHA256 over the canonical form of a field description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a description; key order does not matter
    pub fn of_description(description: &Value) -> Self {
        let canonical = canonicalize(description).to_string();
        Self(format!("{:x}", Sha256::digest(canonical.as_bytes())))
    }

    /// Fingerprint the non-verbose description of `field`
    pub fn of_field(field: &Field) -> Result<Self> {
        Ok(Self::of_description(&field.describe(None, false)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does `field` still describe as the schema this fingerprint was taken from
    pub fn verify(&self, field: &Field) -> Result<bool> {
        Ok(Self::of_field(field)? == *self)
    }
}

/// Copy of `value` with every mapping's keys sorted
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(entries.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&entries[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::reconstruct;
    use crate::fields::Structure;
    use serde_json::json;

    #[test]
    fn test_key_order_is_irrelevant() {
        let first = Fingerprint::of_description(&json!({"fieldtype": "text", "name": "a"}));
        let second = Fingerprint::of_description(&json!({"name": "a", "fieldtype": "text"}));
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_different_schemas_differ() {
        let first = Fingerprint::of_field(&Field::integer()).unwrap();
        let second = Fingerprint::of_field(&Field::integer().required()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_after_reconstruction() {
        let field = Structure::builder()
            .field("a", Field::integer())
            .field("b", Field::text().required())
            .build()
            .unwrap();
        let fingerprint = Fingerprint::of_field(&field).unwrap();
        let rebuilt = reconstruct(field.describe(None, false).unwrap()).unwrap();
        assert!(fingerprint.verify(&rebuilt).unwrap());
        assert!(!fingerprint.verify(&Field::text()).unwrap());
    }
}
