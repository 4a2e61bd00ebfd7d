//! Text leaf

use regex::Regex;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::leaf::{LeafKind, Violation};
use super::{take_bool, take_string, take_usize};
use crate::error::{Result, SchemeError};
use crate::field::{Field, FieldKind, Parameters, Phase};

/// String values with optional length and pattern constraints
#[derive(Debug, Clone)]
pub struct Text {
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) strip: bool,
}

impl Text {
    pub fn new() -> Self {
        Self {
            min_length: None,
            max_length: None,
            pattern: None,
            strip: true,
        }
    }

    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Inbound values are trimmed before checks (on by default)
    pub fn strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern)
            .map_err(|e| SchemeError::Configuration(format!("invalid text pattern: {}", e)))?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let mut text = Text::new();
        text.min_length = take_usize(params, "min_length")?;
        text.max_length = take_usize(params, "max_length")?;
        if let Some(strip) = take_bool(params, "strip")? {
            text.strip = strip;
        }
        if let Some(pattern) = take_string(params, "pattern")? {
            text = text.pattern(&pattern)?;
        }
        Ok(text.into())
    }
}

impl Default for Text {
    fn default() -> Self {
        Self::new()
    }
}

impl LeafKind for Text {
    fn fieldtype(&self) -> &str {
        "text"
    }

    fn coerce(&self, value: Value, phase: Phase, _serialized: bool) -> std::result::Result<Value, Violation> {
        let Value::String(mut text) = value else {
            return Err(Violation::invalid());
        };
        if self.strip && phase == Phase::Inbound {
            text = text.trim().to_string();
        }

        let length = text.chars().count();
        if let Some(min_length) = self.min_length {
            if length < min_length {
                return Err(Violation::new("min_length").with_param("min_length", min_length));
            }
        }
        if let Some(max_length) = self.max_length {
            if length > max_length {
                return Err(Violation::new("max_length").with_param("max_length", max_length));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&text) {
                return Err(Violation::new("pattern"));
            }
        }
        Ok(Value::String(text))
    }

    fn describe(&self, description: &mut Parameters) {
        if let Some(min_length) = self.min_length {
            description.insert("min_length".to_string(), min_length.into());
        }
        if let Some(max_length) = self.max_length {
            description.insert("max_length".to_string(), max_length.into());
        }
        if let Some(pattern) = &self.pattern {
            description.insert("pattern".to_string(), pattern.as_str().into());
        }
        if !self.strip {
            description.insert("strip".to_string(), false.into());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Text> for Field {
    fn from(text: Text) -> Self {
        Field::new(FieldKind::Leaf(Arc::new(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Phase::{Inbound, Outbound};
    use serde_json::json;

    fn token(field: &Field, value: Value) -> Vec<String> {
        match field.process(value, Inbound, false) {
            Err(error) => error
                .structural()
                .map(|e| e.tokens().into_iter().map(String::from).collect())
                .unwrap_or_default(),
            Ok(value) => panic!("Expected failure, got {}", value),
        }
    }

    #[test]
    fn test_strip_and_lengths() {
        let field: Field = Text::new().min_length(2).max_length(4).into();
        assert_eq!(field.process(json!("  abc  "), Inbound, false).unwrap(), json!("abc"));
        assert_eq!(token(&field, json!("a")), vec!["min_length"]);
        assert_eq!(token(&field, json!("abcde")), vec!["max_length"]);
        assert_eq!(token(&field, json!(12)), vec!["invalid"]);
    }

    #[test]
    fn test_no_strip_outbound() {
        let field: Field = Text::new().into();
        assert_eq!(field.process(json!(" a "), Outbound, true).unwrap(), json!(" a "));
    }

    #[test]
    fn test_pattern() {
        let field: Field = Text::new().pattern(r"^\d+$").unwrap().into();
        assert_eq!(field.process(json!("123"), Inbound, false).unwrap(), json!("123"));
        assert_eq!(token(&field, json!("12a")), vec!["pattern"]);
        assert!(Text::new().pattern("(").is_err());
    }

    #[test]
    fn test_nonempty() {
        let field = Field::text().nonempty();
        assert!(field.is_required());
        assert_eq!(token(&field, json!("")), vec!["min_length"]);
        assert_eq!(token(&field, Value::Null), vec!["nonnull"]);
    }
}
