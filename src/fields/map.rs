//! Keyed collections with a single value field

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};

use super::take_field;
use crate::error::{Result, SchemeError};
use crate::field::{
    transform_child, Field, FieldKind, Interpolator, Parameters, Pass, Path, Phase, Transformation,
};
use crate::structural::{Entry, StructuralError, Substructure};

/// Arbitrary string keys mapped to values of one field.
///
/// An optional key field validates every key in its text form.
#[derive(Debug, Clone)]
pub struct Map {
    pub(crate) value: Field,
    pub(crate) key: Option<Field>,
    pub(crate) required_keys: Vec<String>,
}

impl Map {
    pub fn new(value: impl Into<Field>) -> Self {
        Self {
            value: value.into(),
            key: None,
            required_keys: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<Field>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn value(&self) -> &Field {
        &self.value
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let value = take_field(params, "value")?.ok_or_else(|| {
            SchemeError::InvalidDescription("map requires a 'value' field".to_string())
        })?;
        let mut map = Map::new(value);
        map.key = take_field(params, "key")?;
        match params.remove("required_keys") {
            None | Some(Value::Null) => {}
            Some(Value::Array(keys)) => {
                map.required_keys = keys
                    .into_iter()
                    .map(|key| match key {
                        Value::String(key) => Ok(key),
                        other => Err(SchemeError::InvalidDescription(format!(
                            "required keys must be strings, got {}",
                            other
                        ))),
                    })
                    .collect::<Result<_>>()?;
            }
            Some(other) => {
                return Err(SchemeError::InvalidDescription(format!(
                    "parameter 'required_keys' must be a list, got {}",
                    other
                )))
            }
        }
        Ok(map.into())
    }

    pub(crate) fn process(&self, value: Value, pass: Pass<'_>) -> Result<Value> {
        let Value::Object(entries) = value else {
            return Err(StructuralError::raise("invalid", &pass.location()).into());
        };

        if let Some(key_field) = &self.key {
            let mut valid = true;
            for key in entries.keys() {
                let path = Path::Key(pass.path, key);
                // keys are text in both directions
                let key_pass = pass.descend(&path)?.with_mode(Phase::Inbound, true);
                Entry::collect(key_field.run(Value::String(key.clone()), key_pass), &mut valid)?;
            }
            if !valid {
                return Err(StructuralError::raise("invalidkeys", &pass.location()).into());
            }
        }

        let mut valid = true;
        let mut processed = IndexMap::with_capacity(entries.len());
        for (key, item) in entries {
            let path = Path::Key(pass.path, &key);
            let outcome = self.value.run(item, pass.descend(&path)?);
            let entry = Entry::collect(outcome, &mut valid)?;
            processed.insert(key, entry);
        }

        for key in &self.required_keys {
            if !processed.contains_key(key) {
                valid = false;
                let mut params = JsonMap::new();
                params.insert("name".to_string(), Value::String(key.clone()));
                let error = StructuralError::raise_with("required", &pass.location(), params);
                processed.insert(key.clone(), Entry::Error(error));
            }
        }

        if valid {
            Ok(Substructure::Mapping(processed).into_value())
        } else {
            let error = StructuralError::at(&pass.location()).with_structure(Substructure::Mapping(processed));
            Err(error.into())
        }
    }

    pub(crate) fn describe(
        &self,
        description: &mut Parameters,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<()> {
        description.insert("value".to_string(), self.value.describe(parameters, verbose)?);
        if let Some(key) = &self.key {
            description.insert("key".to_string(), key.describe(parameters, verbose)?);
        }
        if !self.required_keys.is_empty() {
            description.insert(
                "required_keys".to_string(),
                self.required_keys.iter().cloned().map(Value::String).collect(),
            );
        }
        Ok(())
    }

    pub(crate) fn extract(&self, subject: &Value, strict: bool, screen: Option<&Parameters>) -> Result<Value> {
        let Value::Object(entries) = subject else {
            return Err(SchemeError::CannotExtract("extraction candidate must be a mapping".to_string()));
        };
        let mut extraction = JsonMap::new();
        for (key, item) in entries {
            extraction.insert(key.clone(), self.value.extract(item, strict, screen)?);
        }
        Ok(Value::Object(extraction))
    }

    pub(crate) fn instantiate(&self, value: Value) -> Result<Value> {
        let Value::Object(entries) = value else {
            return Err(SchemeError::CannotInstantiate("value must be a mapping".to_string()));
        };
        let mut instantiated = JsonMap::new();
        for (key, item) in entries {
            let item = self.value.instantiate(item, Some(&key))?;
            instantiated.insert(key, item);
        }
        Ok(Value::Object(instantiated))
    }

    /// Entries referencing undefined parameters are left out
    pub(crate) fn interpolate(
        &self,
        subject: Value,
        parameters: &Parameters,
        interpolator: Option<&Interpolator>,
    ) -> Result<Value> {
        let Value::Object(entries) = subject else {
            return Err(SchemeError::CannotInterpolate("interpolation candidate must be a mapping".to_string()));
        };
        let mut interpolation = JsonMap::new();
        for (key, item) in &entries {
            match self.value.interpolate(item, parameters, interpolator) {
                Ok(value) => {
                    interpolation.insert(key.clone(), value);
                }
                Err(SchemeError::UndefinedParameter(_)) => continue,
                Err(fault) => return Err(fault),
            }
        }
        Ok(Value::Object(interpolation))
    }

    pub(crate) fn filter(&self, all: bool, params: &Parameters) -> Result<Option<Self>> {
        match self.value.filter(all, params)? {
            None => Err(SchemeError::CannotFilter(
                "the value field of a map cannot be excluded".to_string(),
            )),
            Some(value) if value.ptr_eq(&self.value) => Ok(None),
            Some(value) => Ok(Some(Self { value, ..self.clone() })),
        }
    }

    pub(crate) fn transform(&self, transformer: &mut dyn FnMut(&Field) -> Transformation) -> Option<Self> {
        let mut changed = false;
        let value = transform_child(&self.value, transformer, &mut changed);
        let key = self
            .key
            .as_ref()
            .map(|key| transform_child(key, transformer, &mut changed));
        changed.then(|| Self {
            value,
            key,
            required_keys: self.required_keys.clone(),
        })
    }

    pub(crate) fn children(&self) -> Vec<&Field> {
        std::iter::once(&self.value).chain(self.key.as_ref()).collect()
    }
}

impl From<Map> for Field {
    fn from(map: Map) -> Self {
        Field::new(FieldKind::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Phase::{Inbound, Outbound};
    use crate::fields::Text;
    use serde_json::json;

    #[test]
    fn test_values_processed_by_key() {
        let field: Field = Map::new(Field::integer()).into();
        assert_eq!(
            field.process(json!({"a": 1, "b": 2}), Inbound, false).unwrap(),
            json!({"a": 1, "b": 2})
        );

        let error = field.process(json!({"a": 1, "b": "x"}), Inbound, false).unwrap_err();
        let structural = error.structural().unwrap();
        assert!(structural.child("a").is_none());
        assert_eq!(structural.child("b").unwrap().tokens(), vec!["invalid"]);
        assert_eq!(structural.child("b").unwrap().location(), Some("(field).b"));
    }

    #[test]
    fn test_invalid_keys() {
        let field: Field = Map::new(Field::integer())
            .key(Text::new().pattern("^[a-z]+$").unwrap())
            .into();
        assert!(field.process(json!({"abc": 1}), Inbound, false).is_ok());
        let error = field.process(json!({"ABC": 1}), Inbound, false).unwrap_err();
        assert_eq!(error.structural().unwrap().tokens(), vec!["invalidkeys"]);
    }

    #[test]
    fn test_keys_validated_as_text_in_both_phases() {
        let field: Field = Map::new(Field::integer()).key(Field::integer()).into();
        for (phase, serialized) in [(Inbound, false), (Inbound, true), (Outbound, false), (Outbound, true)] {
            assert_eq!(field.process(json!({"1": 1}), phase, serialized).unwrap(), json!({"1": 1}));
            let error = field.process(json!({"one": 1}), phase, serialized).unwrap_err();
            assert_eq!(error.structural().unwrap().tokens(), vec!["invalidkeys"]);
        }
    }

    #[test]
    fn test_required_keys() {
        let field: Field = Map::new(Field::integer()).required_keys(["a"]).into();
        assert!(field.process(json!({"a": 1, "b": 2}), Inbound, false).is_ok());
        let error = field.process(json!({"b": 2}), Inbound, false).unwrap_err();
        assert_eq!(error.structural().unwrap().child("a").unwrap().tokens(), vec!["required"]);
    }

    #[test]
    fn test_interpolate_skips_undefined_parameters() {
        let field: Field = Map::new(Field::integer()).into();
        let params = json!({"n": 1}).as_object().cloned().unwrap();
        assert_eq!(
            field.interpolate(&json!({"a": "${n}", "b": "${missing}"}), &params, None).unwrap(),
            json!({"a": 1})
        );
    }
}
