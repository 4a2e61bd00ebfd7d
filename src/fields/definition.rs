//! Field descriptions as values

use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::leaf::{LeafKind, Violation};
use super::invalid_parameter;
use crate::describe::reconstruct_value;
use crate::error::Result;
use crate::field::{Field, FieldKind, Parameters, Phase};

/// A value that is itself a field description.
///
/// Processing reconstructs the description and yields its normalized form,
/// so a schema can carry schemas. `valid_fields` limits the accepted types.
#[derive(Debug, Clone, Default)]
pub struct FieldDefinition {
    pub(crate) valid_fields: Option<Vec<String>>,
}

impl FieldDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid_fields<I, S>(mut self, fieldtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_fields = Some(fieldtypes.into_iter().map(Into::into).collect());
        self
    }

    pub fn permitted(&self) -> Option<&[String]> {
        self.valid_fields.as_deref()
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let valid_fields = match params.remove("valid_fields") {
            None | Some(Value::Null) => None,
            Some(Value::String(names)) => Some(names.split_whitespace().map(str::to_string).collect()),
            Some(Value::Array(names)) => Some(
                names
                    .iter()
                    .map(|name| {
                        name.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| invalid_parameter("valid_fields", "a list of field types", name))
                    })
                    .collect::<Result<_>>()?,
            ),
            Some(other) => return Err(invalid_parameter("valid_fields", "a list of field types", &other)),
        };
        Ok(Self { valid_fields }.into())
    }
}

impl LeafKind for FieldDefinition {
    fn fieldtype(&self) -> &str {
        "definition"
    }

    fn coerce(&self, value: Value, _phase: Phase, _serialized: bool) -> std::result::Result<Value, Violation> {
        let fieldtype = match value.get("fieldtype") {
            Some(Value::String(fieldtype)) => fieldtype.clone(),
            _ => return Err(Violation::invalid()),
        };
        if let Some(valid) = &self.valid_fields {
            if !valid.contains(&fieldtype) {
                return Err(Violation::new("invalidfield").with_param("fieldtype", fieldtype));
            }
        }
        let field = reconstruct_value(&value).map_err(|error| {
            tracing::debug!(%fieldtype, %error, "field description rejected");
            Violation::invalid()
        })?;
        field.describe(None, false).map_err(|_| Violation::invalid())
    }

    fn describe(&self, description: &mut Parameters) {
        if let Some(valid) = &self.valid_fields {
            description.insert(
                "valid_fields".to_string(),
                valid.iter().cloned().map(Value::String).collect(),
            );
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<FieldDefinition> for Field {
    fn from(definition: FieldDefinition) -> Self {
        Field::new(FieldKind::Leaf(Arc::new(definition)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::reconstruct;
    use crate::error::SchemeError;
    use crate::field::Phase::{Inbound, Outbound};
    use serde_json::json;

    #[test]
    fn test_construction() {
        let field = reconstruct(json!({"fieldtype": "definition", "valid_fields": "text integer"})).unwrap();
        assert_eq!(
            field.describe(None, false).unwrap(),
            json!({"fieldtype": "definition", "valid_fields": ["text", "integer"]})
        );

        assert!(matches!(
            reconstruct(json!({"fieldtype": "definition", "valid_fields": true})),
            Err(SchemeError::InvalidDescription(_))
        ));
        assert!(matches!(
            reconstruct(json!({"fieldtype": "definition", "valid_fields": [true]})),
            Err(SchemeError::InvalidDescription(_))
        ));
    }

    #[test]
    fn test_processing() {
        let field: Field = FieldDefinition::new().into();
        assert_eq!(field.process(Value::Null, Inbound, false).unwrap(), Value::Null);

        let error = field.process(json!(true), Inbound, false).unwrap_err();
        assert_eq!(error.structural().unwrap().tokens(), vec!["invalid"]);

        let text = Field::text().named("test").required();
        let serialized = field.process(text.describe(None, false).unwrap(), Outbound, true).unwrap();
        assert_eq!(serialized, json!({"fieldtype": "text", "name": "test", "required": true}));

        let unserialized = field.process(serialized, Inbound, true).unwrap();
        let rebuilt = reconstruct(unserialized).unwrap();
        assert_eq!(rebuilt.fieldtype(), "text");
        assert_eq!(rebuilt.name(), Some("test"));
        assert!(rebuilt.is_required());
    }

    #[test]
    fn test_malformed_description_is_invalid() {
        let field: Field = FieldDefinition::new().into();
        for value in [json!({"fieldtype": "nonexistent"}), json!({"fieldtype": "integer", "minimum": "x"})] {
            let error = field.process(value, Inbound, true).unwrap_err();
            assert_eq!(error.structural().unwrap().tokens(), vec!["invalid"]);
        }
    }

    #[test]
    fn test_valid_fields() {
        let field: Field = FieldDefinition::new().valid_fields(["integer", "text"]).into();
        for phase in [Inbound, Outbound] {
            let described = Field::text().named("test").describe(None, false).unwrap();
            assert_eq!(field.process(described.clone(), phase, true).unwrap(), described);

            let boolean = Field::boolean().named("test").describe(None, false).unwrap();
            let error = field.process(boolean, phase, true).unwrap_err();
            assert_eq!(error.structural().unwrap().tokens(), vec!["invalidfield"]);
        }
    }
}
