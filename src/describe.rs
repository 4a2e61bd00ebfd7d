//! Schema as data
//!
//! [`Field::describe`] turns a field graph into plain data. This module goes
//! the other way: a process-wide registry maps each `fieldtype` tag to a
//! factory, and [`reconstruct`] rebuilds a graph from a description.
//! Reconstructing a description yields a field whose description is equal
//! to the original.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::{Result, SchemeError};
use crate::field::{Attribute, Field, FieldAttributes, Parameters};
use crate::fields::{Enumeration, FieldDefinition, Float, Integer, Map, Sequence, Structure, Text, Tuple, Union};
use crate::undefined::Undefined;

/// Builds a field from the kind-specific parameters of a description
pub type Factory = Arc<dyn Fn(&mut Parameters) -> Result<Field> + Send + Sync>;

/// Rewrites the nested field descriptions of a description in place
pub type Visitor =
    Arc<dyn Fn(&mut Parameters, &mut dyn FnMut(&Value) -> Result<Value>) -> Result<()> + Send + Sync>;

/// A registered field type
#[derive(Clone)]
pub struct FieldType {
    name: String,
    factory: Factory,
    visitor: Option<Visitor>,
}

impl FieldType {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&mut Parameters) -> Result<Field> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            visitor: None,
        }
    }

    /// Needed only for types whose descriptions nest other descriptions
    pub fn with_visitor(
        mut self,
        visitor: impl Fn(&mut Parameters, &mut dyn FnMut(&Value) -> Result<Value>) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.visitor = Some(Arc::new(visitor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("name", &self.name)
            .field("visitor", &self.visitor.is_some())
            .finish()
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
struct FieldTypeRegistry {
    types: HashMap<String, FieldType>,
}

impl FieldTypeRegistry {
    fn builtin() -> Self {
        let mut registry = Self::default();
        for fieldtype in [
            FieldType::new("field", |_| Ok(Field::any())),
            FieldType::new("text", Text::construct),
            FieldType::new("integer", Integer::construct),
            FieldType::new("float", Float::construct),
            FieldType::new("boolean", |_| Ok(Field::boolean())),
            FieldType::new("enumeration", Enumeration::construct),
            FieldType::new("definition", FieldDefinition::construct),
            FieldType::new("sequence", Sequence::construct).with_visitor(|params, callback| {
                visit_single(params, "item", callback)
            }),
            FieldType::new("tuple", Tuple::construct)
                .with_visitor(|params, callback| visit_list(params, "values", callback)),
            FieldType::new("union", Union::construct)
                .with_visitor(|params, callback| visit_list(params, "fields", callback)),
            FieldType::new("map", Map::construct).with_visitor(|params, callback| {
                visit_single(params, "value", callback)?;
                visit_single(params, "key", callback)
            }),
            FieldType::new("structure", Structure::construct).with_visitor(visit_structure),
            FieldType::new("undefined", construct_reference),
        ] {
            registry.types.insert(fieldtype.name.clone(), fieldtype);
        }
        registry
    }
}

fn registry() -> &'static RwLock<FieldTypeRegistry> {
    static REGISTRY: OnceLock<RwLock<FieldTypeRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(FieldTypeRegistry::builtin()))
}

/// Register a field type for [`reconstruct`].
///
/// Registration is append-only: a type whose name is already taken is
/// ignored and `false` is returned.
pub fn register_fieldtype(fieldtype: FieldType) -> bool {
    let mut registry = registry().write().unwrap_or_else(PoisonError::into_inner);
    if registry.types.contains_key(&fieldtype.name) {
        tracing::debug!(fieldtype = %fieldtype.name, "field type already registered");
        return false;
    }
    tracing::debug!(fieldtype = %fieldtype.name, "registered field type");
    registry.types.insert(fieldtype.name.clone(), fieldtype);
    true
}

/// Look up a registered field type
pub fn lookup_fieldtype(name: &str) -> Option<FieldType> {
    let registry = registry().read().unwrap_or_else(PoisonError::into_inner);
    registry.types.get(name).cloned()
}

/// Names of all registered field types, sorted
pub fn fieldtypes() -> Vec<String> {
    let registry = registry().read().unwrap_or_else(PoisonError::into_inner);
    let mut names: Vec<String> = registry.types.keys().cloned().collect();
    names.sort();
    names
}

// =============================================================================
// Reconstruction
// =============================================================================

/// Either a live field or its description
#[derive(Debug, Clone)]
pub enum Specification {
    Field(Field),
    Description(Value),
}

impl From<Field> for Specification {
    fn from(field: Field) -> Self {
        Specification::Field(field)
    }
}

impl From<Value> for Specification {
    fn from(description: Value) -> Self {
        Specification::Description(description)
    }
}

/// Build a field from a description; a live field is returned unchanged
pub fn reconstruct(specification: impl Into<Specification>) -> Result<Field> {
    match specification.into() {
        Specification::Field(field) => Ok(field),
        Specification::Description(description) => reconstruct_value(&description),
    }
}

pub(crate) fn reconstruct_value(description: &Value) -> Result<Field> {
    let mut params = description
        .as_object()
        .cloned()
        .ok_or_else(|| SchemeError::InvalidDescription(format!("expected a field description, got {}", description)))?;
    let fieldtype = take_fieldtype(&mut params)?;
    construct(&fieldtype, params)
}

/// Build a field of a registered type from description parameters.
///
/// Parameters that neither the common attributes nor the type consume
/// become extension attributes; nested descriptions among them are
/// reconstructed into fields.
pub fn construct(fieldtype: &str, mut params: Parameters) -> Result<Field> {
    let registered =
        lookup_fieldtype(fieldtype).ok_or_else(|| SchemeError::UnknownFieldType(fieldtype.to_string()))?;

    let mut attrs = FieldAttributes::take_common(&mut params)?;
    let field = (registered.factory)(&mut params)?;

    for (key, value) in params {
        let attribute = if is_description(&value) {
            Attribute::Field(reconstruct_value(&value)?)
        } else {
            Attribute::Value(value)
        };
        attrs.extensions.insert(key, attribute);
    }

    let built = field.attributes();
    attrs.preprocessor = built.preprocessor.clone();
    attrs.extractor = built.extractor.clone();
    attrs.instantiator = built.instantiator.clone();
    attrs.interpolator = built.interpolator.clone();
    Ok(field.with_attributes(attrs))
}

/// Rebuild `description` with `callback` applied to each nested field
/// description, following the type's composite shape
pub fn visit(description: &Value, callback: &mut dyn FnMut(&Value) -> Result<Value>) -> Result<Value> {
    let mut params = description
        .as_object()
        .cloned()
        .ok_or_else(|| SchemeError::InvalidDescription(format!("expected a field description, got {}", description)))?;
    let fieldtype = match params.get("fieldtype") {
        Some(Value::String(fieldtype)) => fieldtype.clone(),
        _ => return Err(SchemeError::InvalidDescription("description has no fieldtype".to_string())),
    };
    let registered =
        lookup_fieldtype(&fieldtype).ok_or_else(|| SchemeError::UnknownFieldType(fieldtype.clone()))?;
    if let Some(visitor) = &registered.visitor {
        visitor(&mut params, callback)?;
    }
    Ok(Value::Object(params))
}

fn take_fieldtype(params: &mut Parameters) -> Result<String> {
    match params.remove("fieldtype") {
        Some(Value::String(fieldtype)) => Ok(fieldtype),
        Some(other) => Err(SchemeError::InvalidDescription(format!(
            "fieldtype must be a string, got {}",
            other
        ))),
        None => Err(SchemeError::InvalidDescription("description has no fieldtype".to_string())),
    }
}

fn is_description(value: &Value) -> bool {
    matches!(value.get("fieldtype"), Some(Value::String(_)))
}

fn construct_reference(params: &mut Parameters) -> Result<Field> {
    match params.remove("target") {
        Some(Value::String(target)) => Ok(Undefined::named(target).field()),
        _ => Err(SchemeError::InvalidDescription(
            "undefined requires a 'target' name".to_string(),
        )),
    }
}

fn visit_single(
    params: &mut Parameters,
    key: &str,
    callback: &mut dyn FnMut(&Value) -> Result<Value>,
) -> Result<()> {
    if let Some(nested) = params.get_mut(key) {
        if !nested.is_null() {
            *nested = callback(nested)?;
        }
    }
    Ok(())
}

fn visit_list(
    params: &mut Parameters,
    key: &str,
    callback: &mut dyn FnMut(&Value) -> Result<Value>,
) -> Result<()> {
    if let Some(Value::Array(nested)) = params.get_mut(key) {
        for item in nested.iter_mut() {
            *item = callback(item)?;
        }
    }
    Ok(())
}

fn visit_structure(params: &mut Parameters, callback: &mut dyn FnMut(&Value) -> Result<Value>) -> Result<()> {
    let polymorphic = params.get("polymorphic_on").is_some_and(|on| !on.is_null());
    visit_single(params, "polymorphic_on", callback)?;
    let Some(Value::Object(structure)) = params.get_mut("structure") else {
        return Ok(());
    };
    for nested in structure.values_mut() {
        match nested {
            Value::Object(variant) if polymorphic => {
                for field in variant.values_mut() {
                    *field = callback(field)?;
                }
            }
            _ => *nested = callback(nested)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Phase::Inbound;
    use serde_json::json;

    fn roundtrip(field: &Field) {
        let description = field.describe(None, false).unwrap();
        let rebuilt = reconstruct(description.clone()).unwrap();
        assert_eq!(rebuilt.describe(None, false).unwrap(), description);
    }

    #[test]
    fn test_builtin_types_registered() {
        let names = fieldtypes();
        for name in ["field", "text", "integer", "definition", "structure", "undefined"] {
            assert!(names.iter().any(|n| n == name), "missing {}", name);
        }
    }

    #[test]
    fn test_reconstruct_preserves_descriptions() {
        roundtrip(&Field::text().named("label").required());
        roundtrip(&Integer::new().minimum(1).maximum(5).into());
        roundtrip(&Sequence::new(Field::integer()).min_length(1).unique().into());
        roundtrip(&Map::new(Field::boolean()).key(Field::text()).required_keys(["a"]).into());
        roundtrip(
            &Structure::builder()
                .polymorphic_on("type")
                .variant("alpha", [("a", Field::integer().required())])
                .variant("beta", [("b", Field::text().with_default("x"))])
                .build()
                .unwrap(),
        );
        roundtrip(&Field::integer().with_attribute("nested", Field::text()));
    }

    #[test]
    fn test_reconstruct_live_field() {
        let field = Field::integer();
        assert!(reconstruct(field.clone()).unwrap().ptr_eq(&field));
    }

    #[test]
    fn test_reconstruct_failures() {
        assert!(matches!(
            reconstruct(json!({"fieldtype": "nope"})),
            Err(SchemeError::UnknownFieldType(_))
        ));
        assert!(matches!(reconstruct(json!({"name": "x"})), Err(SchemeError::InvalidDescription(_))));
        assert!(matches!(reconstruct(json!("text")), Err(SchemeError::InvalidDescription(_))));
        assert!(reconstruct(json!({"fieldtype": "sequence"})).is_err());
    }

    #[test]
    fn test_nested_description_becomes_field_attribute() {
        let field = reconstruct(json!({"fieldtype": "integer", "hint": {"fieldtype": "text"}, "label": "n"})).unwrap();
        assert_eq!(field.attribute("hint").and_then(Attribute::as_field).map(Field::fieldtype), Some("text"));
        assert_eq!(field.attribute("label").and_then(Attribute::as_value), Some(&json!("n")));
    }

    #[test]
    fn test_register_is_append_only() {
        assert!(!register_fieldtype(FieldType::new("text", |_| Ok(Field::any()))));
        assert!(register_fieldtype(FieldType::new("even", |_| {
            Ok(Field::integer().with_preprocessor(|v| match v.as_i64() {
                Some(n) if n % 2 == 0 => Ok(v),
                _ => Err("odd".to_string()),
            }))
        })));
        let field = construct("even", Parameters::new()).unwrap();
        assert!(field.process(json!(2), Inbound, false).is_ok());
        assert!(field.process(json!(3), Inbound, false).is_err());
    }

    #[test]
    fn test_visit_follows_shape() {
        let description = Structure::builder()
            .field("a", Field::integer())
            .field("b", Sequence::new(Field::text()))
            .build()
            .unwrap()
            .describe(None, false)
            .unwrap();

        let mut seen = Vec::new();
        let visited = visit(&description, &mut |nested| {
            seen.push(nested["fieldtype"].clone());
            let mut nested = nested.clone();
            nested["visited"] = json!(true);
            Ok(nested)
        })
        .unwrap();
        assert_eq!(seen, vec![json!("integer"), json!("sequence")]);
        assert_eq!(visited["structure"]["a"]["visited"], json!(true));
        assert!(visited["structure"]["b"]["item"].get("visited").is_none());
    }
}
