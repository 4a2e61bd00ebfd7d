//! Hierarchical validation errors
//!
//! A [`StructuralError`] mirrors the shape of the value that failed: it holds
//! the errors raised at its own node plus an optional substructure, keyed for
//! structures and maps, positional for sequences, tuples and unions. Entries
//! in the substructure are either child errors or the values that processed
//! successfully alongside them.
//!
//! ## Wire form
//!
//! ```text
//! [own_errors | null, substructure | null]
//!
//! [null, {"b": [[{"token": "required", ...}], null]}]
//! ```
//!
//! Only error nodes survive serialization: positional entries holding values
//! become `null` and keyed entries holding values are dropped.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

/// A single error raised at one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEntry {
    /// Machine-readable error token (`required`, `invalid`, ...)
    pub token: Option<String>,
    /// Short human-readable title
    pub title: Option<String>,
    /// Rendered human-readable message
    pub message: Option<String>,
    /// Arbitrary parameters carried with the error
    pub params: Map<String, Value>,
}

impl ErrorEntry {
    /// Build an entry for `token`, rendering the token's message template
    /// against `location` and `params`.
    pub fn new(token: &str, location: &str, params: Map<String, Value>) -> Self {
        let (title, message) = match template(token) {
            Some((title, message)) => (Some(title.to_string()), Some(render(message, location, &params))),
            None => (None, None),
        };
        Self {
            token: Some(token.to_string()),
            title,
            message,
            params,
        }
    }

    /// An entry carrying only a free-form message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Wire representation of this entry
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        if let Some(token) = &self.token {
            object.insert("token".to_string(), Value::String(token.clone()));
        }
        if let Some(title) = &self.title {
            object.insert("title".to_string(), Value::String(title.clone()));
        }
        if let Some(message) = &self.message {
            object.insert("message".to_string(), Value::String(message.clone()));
        }
        for (key, value) in &self.params {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Rebuild an entry from its wire representation; non-object data yields `None`
    pub fn from_value(data: &Value) -> Option<Self> {
        let object = data.as_object()?;
        let mut entry = ErrorEntry::default();
        for (key, value) in object {
            match (key.as_str(), value) {
                ("token", Value::String(text)) => entry.token = Some(text.clone()),
                ("title", Value::String(text)) => entry.title = Some(text.clone()),
                ("message", Value::String(text)) => entry.message = Some(text.clone()),
                _ => {
                    entry.params.insert(key.clone(), value.clone());
                }
            }
        }
        Some(entry)
    }
}

impl Serialize for ErrorEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// One slot of a substructure
#[derive(Debug, Clone)]
pub enum Entry {
    Error(StructuralError),
    Value(Value),
}

impl Entry {
    pub fn is_error(&self) -> bool {
        matches!(self, Entry::Error(_))
    }

    /// The error in this slot, if any
    pub fn as_error(&self) -> Option<&StructuralError> {
        match self {
            Entry::Error(error) => Some(error),
            Entry::Value(_) => None,
        }
    }

    /// Fold a child outcome into a slot.
    ///
    /// Validation failures become [`Entry::Error`] and clear `valid`; any
    /// other error is a fault and is returned as-is.
    pub(crate) fn collect(outcome: crate::Result<Value>, valid: &mut bool) -> crate::Result<Entry> {
        match outcome {
            Ok(value) => Ok(Entry::Value(value)),
            Err(error) => {
                let error = error.into_structural()?;
                *valid = false;
                Ok(Entry::Error(error))
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            Entry::Value(value) => value,
            Entry::Error(_) => Value::Null,
        }
    }
}

/// Children of an error node, shaped like the value that failed
#[derive(Debug, Clone)]
pub enum Substructure {
    Mapping(IndexMap<String, Entry>),
    Sequence(Vec<Entry>),
}

impl Substructure {
    fn is_substantive(&self) -> bool {
        let substantive = |entry: &Entry| entry.as_error().is_some_and(StructuralError::is_substantive);
        match self {
            Substructure::Mapping(entries) => entries.values().any(substantive),
            Substructure::Sequence(entries) => entries.iter().any(substantive),
        }
    }

    /// Collapse a fully successful substructure back into a value
    pub(crate) fn into_value(self) -> Value {
        match self {
            Substructure::Mapping(entries) => Value::Object(
                entries.into_iter().map(|(key, entry)| (key, entry.into_value())).collect(),
            ),
            Substructure::Sequence(entries) => {
                Value::Array(entries.into_iter().map(Entry::into_value).collect())
            }
        }
    }
}

/// Hierarchical, serializable validation failure
#[derive(Debug, Clone, Default)]
pub struct StructuralError {
    errors: Vec<ErrorEntry>,
    structure: Option<Substructure>,
    location: Option<String>,
    traces: Vec<String>,
    serialized: OnceLock<Value>,
}

impl StructuralError {
    /// Create an empty (non-substantive) error node
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a templated `token` error located at `location`
    pub fn raise(token: &str, location: &str) -> Self {
        Self::raise_with(token, location, Map::new())
    }

    /// Raise a templated `token` error with parameters
    pub fn raise_with(token: &str, location: &str, params: Map<String, Value>) -> Self {
        let mut error = Self::at(location);
        error.errors.push(ErrorEntry::new(token, location, params));
        error
    }

    /// An empty error node located at `location`
    pub fn at(location: &str) -> Self {
        Self {
            location: Some(location.to_string()),
            ..Default::default()
        }
    }

    /// Errors raised at this node
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Child errors, if any were attached
    pub fn structure(&self) -> Option<&Substructure> {
        self.structure.as_ref()
    }

    /// Location of the field that raised this error
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Captured diagnostic traces; never part of the wire form
    pub fn traces(&self) -> &[String] {
        &self.traces
    }

    /// Tokens of the errors raised at this node
    pub fn tokens(&self) -> Vec<&str> {
        self.errors.iter().filter_map(|entry| entry.token.as_deref()).collect()
    }

    /// Set the substructure of this node
    pub fn attach(&mut self, structure: Substructure) -> &mut Self {
        self.structure = Some(structure);
        self.serialized = OnceLock::new();
        self
    }

    /// Builder form of [`attach`](Self::attach)
    pub fn with_structure(mut self, structure: Substructure) -> Self {
        self.attach(structure);
        self
    }

    /// Add an error to this node
    pub fn append(&mut self, entry: ErrorEntry) -> &mut Self {
        self.errors.push(entry);
        self.serialized = OnceLock::new();
        self
    }

    /// Record the fault that caused this error as diagnostic data
    pub fn capture(mut self, fault: impl fmt::Display) -> Self {
        self.traces.push(fault.to_string());
        self
    }

    /// Concatenate another node's own errors into this one
    pub fn merge(&mut self, other: StructuralError) -> &mut Self {
        self.errors.extend(other.errors);
        self.traces.extend(other.traces);
        self.serialized = OnceLock::new();
        self
    }

    /// Carries at least one error, here or in any child
    pub fn is_substantive(&self) -> bool {
        !self.errors.is_empty() || self.structure.as_ref().is_some_and(Substructure::is_substantive)
    }

    /// Child error under `key`, for keyed substructures
    pub fn child(&self, key: &str) -> Option<&StructuralError> {
        match &self.structure {
            Some(Substructure::Mapping(entries)) => entries.get(key)?.as_error(),
            _ => None,
        }
    }

    /// Child error at `index`, for positional substructures
    pub fn item(&self, index: usize) -> Option<&StructuralError> {
        match &self.structure {
            Some(Substructure::Sequence(entries)) => entries.get(index)?.as_error(),
            _ => None,
        }
    }

    /// The wire form, computed once and memoized
    pub fn serialize(&self) -> &Value {
        self.serialized.get_or_init(|| self.render())
    }

    /// Discard every memoized wire form in this tree and recompute it
    pub fn reserialize(&mut self) -> &Value {
        self.invalidate();
        StructuralError::serialize(self)
    }

    fn invalidate(&mut self) {
        self.serialized = OnceLock::new();
        let children: Box<dyn Iterator<Item = &mut Entry>> = match &mut self.structure {
            Some(Substructure::Mapping(entries)) => Box::new(entries.values_mut()),
            Some(Substructure::Sequence(entries)) => Box::new(entries.iter_mut()),
            None => Box::new(std::iter::empty()),
        };
        for entry in children {
            if let Entry::Error(error) = entry {
                error.invalidate();
            }
        }
    }

    fn render(&self) -> Value {
        let errors = if self.errors.is_empty() {
            Value::Null
        } else {
            Value::Array(self.errors.iter().map(ErrorEntry::to_value).collect())
        };

        let structure = match &self.structure {
            None => Value::Null,
            Some(Substructure::Sequence(entries)) => Value::Array(
                entries
                    .iter()
                    .map(|entry| match entry {
                        Entry::Error(error) => error.serialize().clone(),
                        Entry::Value(_) => Value::Null,
                    })
                    .collect(),
            ),
            Some(Substructure::Mapping(entries)) => Value::Object(
                entries
                    .iter()
                    .filter_map(|(key, entry)| {
                        entry.as_error().map(|error| (key.clone(), error.serialize().clone()))
                    })
                    .collect(),
            ),
        };

        Value::Array(vec![errors, structure])
    }

    /// Rebuild an error tree from its wire form.
    ///
    /// The input is trusted: slots of an unexpected shape are ignored.
    pub fn unserialize(data: &Value) -> Self {
        let mut error = Self::new();
        let (errors, structure) = match data {
            Value::Array(slots) => (slots.first(), slots.get(1)),
            _ => (None, None),
        };

        if let Some(Value::Array(entries)) = errors {
            error.errors = entries.iter().filter_map(ErrorEntry::from_value).collect();
        }

        error.structure = match structure {
            Some(Value::Array(entries)) => Some(Substructure::Sequence(
                entries
                    .iter()
                    .map(|entry| match entry {
                        Value::Null => Entry::Value(Value::Null),
                        other => Entry::Error(Self::unserialize(other)),
                    })
                    .collect(),
            )),
            Some(Value::Object(entries)) => Some(Substructure::Mapping(
                entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), Entry::Error(Self::unserialize(entry))))
                    .collect(),
            )),
            _ => None,
        };

        error
    }

    /// Every error in the tree paired with its relative path
    /// (`""` for this node, `.key` and `[index]` below it).
    pub fn flatten(&self) -> Vec<(String, ErrorEntry)> {
        let mut collected = Vec::new();
        self.flatten_into(String::new(), &mut collected);
        collected
    }

    fn flatten_into(&self, path: String, collected: &mut Vec<(String, ErrorEntry)>) {
        for entry in &self.errors {
            collected.push((path.clone(), entry.clone()));
        }
        match &self.structure {
            Some(Substructure::Mapping(entries)) => {
                for (key, entry) in entries {
                    if let Entry::Error(error) = entry {
                        error.flatten_into(format!("{}.{}", path, key), collected);
                    }
                }
            }
            Some(Substructure::Sequence(entries)) => {
                for (index, entry) in entries.iter().enumerate() {
                    if let Entry::Error(error) = entry {
                        error.flatten_into(format!("{}[{}]", path, index), collected);
                    }
                }
            }
            None => {}
        }
    }
}

impl PartialEq for StructuralError {
    fn eq(&self, other: &Self) -> bool {
        self.serialize() == other.serialize()
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flattened = self.flatten();
        if flattened.is_empty() {
            return write!(f, "validation failed");
        }
        let rendered: Vec<String> = flattened
            .iter()
            .map(|(path, entry)| {
                let message = entry
                    .message
                    .as_deref()
                    .or(entry.token.as_deref())
                    .unwrap_or("error");
                if path.is_empty() {
                    message.to_string()
                } else {
                    format!("{}: {}", path, message)
                }
            })
            .collect();
        write!(f, "validation failed: {}", rendered.join("; "))
    }
}

impl std::error::Error for StructuralError {}

impl Serialize for StructuralError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        StructuralError::serialize(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StructuralError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let data = Value::deserialize(deserializer)?;
        Ok(StructuralError::unserialize(&data))
    }
}

// =============================================================================
// Token templates
// =============================================================================

fn template(token: &str) -> Option<(&'static str, &'static str)> {
    let template = match token {
        "invalid" => ("invalid value", "{field} has an invalid value"),
        "nonnull" => ("null value", "{field} must be a non-null value"),
        "required" => ("required field", "{field} is missing required field '{name}'"),
        "unknown" => ("unknown field", "{field} includes an unknown field '{name}'"),
        "unrecognized" => (
            "unrecognized polymorphic identity",
            "{field} must specify a recognized polymorphic identity",
        ),
        "min_length" => ("minimum length", "{field} must have a length of at least {min_length}"),
        "max_length" => ("maximum length", "{field} must have a length of at most {max_length}"),
        "duplicate" => ("duplicate value", "{field} must not contain duplicate values"),
        "length" => ("invalid length", "{field} must contain exactly {length} values"),
        "invalidkeys" => ("invalid keys", "{field} must have valid keys"),
        "invalidfield" => ("invalid field", "{field} must be one of the permitted field types"),
        "pattern" => ("invalid value", "{field} must match the required pattern"),
        "minimum" => ("minimum value", "{field} must be greater than or equal to {minimum}"),
        "maximum" => ("maximum value", "{field} must be less than or equal to {maximum}"),
        _ => return None,
    };
    Some(template)
}

fn render(message: &str, location: &str, params: &Map<String, Value>) -> String {
    let mut rendered = message.replace("{field}", location);
    for (key, value) in params {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&format!("{{{}}}", key), &text);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn required(location: &str, name: &str) -> StructuralError {
        let mut params = Map::new();
        params.insert("name".to_string(), json!(name));
        StructuralError::raise_with("required", location, params)
    }

    #[test]
    fn test_empty_error_is_not_substantive() {
        let error = StructuralError::new();
        assert!(!error.is_substantive());
        assert_eq!(error.serialize(), &json!([null, null]));
    }

    #[test]
    fn test_templated_message() {
        let error = required("user", "email");
        assert_eq!(error.tokens(), vec!["required"]);
        assert_eq!(
            error.errors()[0].message.as_deref(),
            Some("user is missing required field 'email'")
        );
        assert_eq!(error.location(), Some("user"));
    }

    #[test]
    fn test_serialize_keeps_only_errors() {
        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), Entry::Value(json!(1)));
        entries.insert("b".to_string(), Entry::Error(StructuralError::new().with_structure(
            Substructure::Sequence(vec![Entry::Value(json!(2)), Entry::Error(StructuralError::raise("invalid", "b[1]"))]),
        )));
        let error = StructuralError::new().with_structure(Substructure::Mapping(entries));

        let wire = error.serialize();
        assert_eq!(wire[0], Value::Null);
        assert!(wire[1].get("a").is_none());
        assert_eq!(wire[1]["b"][1][0], Value::Null);
        assert_eq!(wire[1]["b"][1][1][0][0]["token"], json!("invalid"));
        assert!(error.is_substantive());
    }

    #[test]
    fn test_unserialize_simple_errors() {
        let error = StructuralError::unserialize(&json!([[{"token": "error"}, {"message": "simple-error"}], null]));
        assert_eq!(error.errors().len(), 2);
        assert_eq!(error.errors()[0].token.as_deref(), Some("error"));
        assert_eq!(error.errors()[1].message.as_deref(), Some("simple-error"));
        assert!(error.structure().is_none());
        assert_eq!(
            error.serialize(),
            &json!([[{"token": "error"}, {"message": "simple-error"}], null])
        );
    }

    #[test]
    fn test_unserialize_nested() {
        let wire = json!([null, {"a": [[{"token": "invalid"}], null]}]);
        let error = StructuralError::unserialize(&wire);
        assert!(error.is_substantive());
        assert_eq!(error.child("a").map(|e| e.tokens()), Some(vec!["invalid"]));
        assert_eq!(error.serialize(), &wire);
    }

    #[test]
    fn test_merge_and_reserialize() {
        let mut error = StructuralError::raise("invalid", "field");
        assert_eq!(error.serialize()[0].as_array().map(Vec::len), Some(1));

        error.merge(StructuralError::raise("nonnull", "field"));
        assert_eq!(error.tokens(), vec!["invalid", "nonnull"]);
        assert_eq!(error.reserialize()[0].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_capture_is_not_serialized() {
        let error = StructuralError::raise("invalid", "field").capture("preprocessor exploded");
        assert_eq!(error.traces(), &["preprocessor exploded".to_string()]);
        assert!(!error.serialize().to_string().contains("exploded"));
    }

    #[test]
    fn test_flatten_paths() {
        let mut entries = IndexMap::new();
        entries.insert("items".to_string(), Entry::Error(StructuralError::new().with_structure(
            Substructure::Sequence(vec![Entry::Error(StructuralError::raise("invalid", "root.items[0]"))]),
        )));
        let error = StructuralError::new().with_structure(Substructure::Mapping(entries));

        let flattened = error.flatten();
        assert_eq!(flattened.len(), 1);
        assert_eq!(flattened[0].0, ".items[0]");
        assert!(error.to_string().contains(".items[0]"));
    }

    #[test]
    fn test_serde_roundtrip_through_wire_form() {
        let error = required("user", "email");
        let encoded = serde_json::to_value(&error).unwrap();
        let decoded: StructuralError = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, error);
    }
}
