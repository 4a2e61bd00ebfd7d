//! Enumeration leaf

use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::leaf::{scalar_text, LeafKind, Violation};
use crate::error::{Result, SchemeError};
use crate::field::{Field, FieldKind, Parameters, Phase};

/// How [`Field::redefine`] combines new values with existing ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Append,
    Replace,
}

/// One of a fixed set of scalar values
#[derive(Debug, Clone)]
pub struct Enumeration {
    pub(crate) values: Vec<Value>,
    pub(crate) ignored_values: Vec<Value>,
}

impl Enumeration {
    pub fn new<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = scalars(values.into_iter().map(Into::into).collect())?;
        Ok(Self {
            values,
            ignored_values: Vec::new(),
        })
    }

    /// Values accepted but processed to null
    pub fn ignoring<I, V>(mut self, ignored: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.ignored_values = scalars(ignored.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let values = match params.remove("enumeration") {
            Some(Value::Array(values)) => values,
            other => {
                return Err(SchemeError::InvalidDescription(format!(
                    "enumeration requires an 'enumeration' list, got {:?}",
                    other
                )))
            }
        };
        let mut enumeration = Enumeration::new(values)?;
        if let Some(Value::Array(ignored)) = params.remove("ignored_values") {
            enumeration = enumeration.ignoring(ignored)?;
        }
        Ok(enumeration.into())
    }
}

fn scalars(values: Vec<Value>) -> Result<Vec<Value>> {
    if let Some(bad) = values.iter().find(|v| v.is_array() || v.is_object()) {
        return Err(SchemeError::Configuration(format!(
            "enumeration values must be scalars, got {}",
            bad
        )));
    }
    Ok(values)
}

impl LeafKind for Enumeration {
    fn fieldtype(&self) -> &str {
        "enumeration"
    }

    fn coerce(&self, value: Value, phase: Phase, serialized: bool) -> std::result::Result<Value, Violation> {
        if self.ignored_values.contains(&value) {
            return Ok(Value::Null);
        }
        if self.values.contains(&value) {
            return Ok(value);
        }
        if let (Value::String(text), true, Phase::Inbound) = (&value, serialized, phase) {
            if let Some(known) = self.values.iter().find(|v| scalar_text(v) == *text) {
                return Ok(known.clone());
            }
        }
        Err(Violation::invalid())
    }

    fn describe(&self, description: &mut Parameters) {
        description.insert("enumeration".to_string(), Value::Array(self.values.clone()));
        if !self.ignored_values.is_empty() {
            description.insert("ignored_values".to_string(), Value::Array(self.ignored_values.clone()));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Enumeration> for Field {
    fn from(enumeration: Enumeration) -> Self {
        Field::new(FieldKind::Leaf(Arc::new(enumeration)))
    }
}

impl Field {
    /// New enumeration field with its values appended to or replaced by `values`
    pub fn redefine<I, V>(&self, values: I, strategy: Strategy) -> Result<Field>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let current = match self.kind() {
            FieldKind::Leaf(leaf) => leaf.as_any().downcast_ref::<Enumeration>(),
            _ => None,
        }
        .ok_or_else(|| {
            SchemeError::Configuration(format!("cannot redefine a {} field", self.fieldtype()))
        })?;

        let incoming = scalars(values.into_iter().map(Into::into).collect())?;
        let mut redefined = current.clone();
        match strategy {
            Strategy::Replace => redefined.values = incoming,
            Strategy::Append => {
                for value in incoming {
                    if !redefined.values.contains(&value) {
                        redefined.values.push(value);
                    }
                }
            }
        }
        Ok(self.with_kind(FieldKind::Leaf(Arc::new(redefined))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Phase::Inbound;
    use serde_json::json;

    #[test]
    fn test_enumeration() {
        let field: Field = Enumeration::new(["alpha", "beta"]).unwrap().into();
        assert_eq!(field.process(json!("alpha"), Inbound, false).unwrap(), json!("alpha"));
        assert!(field.process(json!("gamma"), Inbound, false).is_err());
    }

    #[test]
    fn test_serialized_numbers() {
        let field: Field = Enumeration::new([1, 2]).unwrap().into();
        assert_eq!(field.process(json!("2"), Inbound, true).unwrap(), json!(2));
        assert!(field.process(json!("2"), Inbound, false).is_err());
    }

    #[test]
    fn test_ignored_values() {
        let field: Field = Enumeration::new(["a"]).unwrap().ignoring([""]).unwrap().into();
        assert_eq!(field.process(json!(""), Inbound, false).unwrap(), Value::Null);
    }

    #[test]
    fn test_redefine() {
        let field: Field = Enumeration::new(["a", "b"]).unwrap().into();
        let appended = field.redefine(["c"], Strategy::Append).unwrap();
        assert!(appended.process(json!("a"), Inbound, false).is_ok());
        assert!(appended.process(json!("c"), Inbound, false).is_ok());
        assert!(field.process(json!("c"), Inbound, false).is_err());

        let replaced = field.redefine(["c"], Strategy::Replace).unwrap();
        assert!(replaced.process(json!("a"), Inbound, false).is_err());

        assert!(Field::integer().redefine([1], Strategy::Append).is_err());
        assert!(Enumeration::new([json!([1])]).is_err());
    }
}
