//! Fixed-length heterogeneous sequences

use serde_json::{Map as JsonMap, Value};

use super::{describe_all, take_fields};
use crate::error::{Result, SchemeError};
use crate::field::{transform_child, Field, FieldKind, Interpolator, Parameters, Pass, Path, Transformation};
use crate::structural::{Entry, StructuralError, Substructure};

/// A list with one field per position
#[derive(Debug, Clone)]
pub struct Tuple {
    pub(crate) values: Vec<Field>,
}

impl Tuple {
    pub fn new<I, F>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let values: Vec<Field> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(SchemeError::Configuration("a tuple requires at least one field".to_string()));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[Field] {
        &self.values
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        Ok(Tuple::new(take_fields(params, "values")?)?.into())
    }

    fn expect_length<'v>(&self, value: &'v Value) -> Option<&'v Vec<Value>> {
        value.as_array().filter(|items| items.len() == self.values.len())
    }

    pub(crate) fn process(&self, value: Value, pass: Pass<'_>) -> Result<Value> {
        let Value::Array(items) = value else {
            return Err(StructuralError::raise("invalid", &pass.location()).into());
        };
        if items.len() != self.values.len() {
            let mut params = JsonMap::new();
            params.insert("length".to_string(), self.values.len().into());
            return Err(StructuralError::raise_with("length", &pass.location(), params).into());
        }

        let mut valid = true;
        let mut entries = Vec::with_capacity(items.len());
        for (index, (field, item)) in self.values.iter().zip(items).enumerate() {
            let path = Path::Index(pass.path, index);
            let outcome = field.run(item, pass.descend(&path)?);
            entries.push(Entry::collect(outcome, &mut valid)?);
        }

        if valid {
            Ok(Substructure::Sequence(entries).into_value())
        } else {
            let error = StructuralError::at(&pass.location()).with_structure(Substructure::Sequence(entries));
            Err(error.into())
        }
    }

    pub(crate) fn describe(
        &self,
        description: &mut Parameters,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<()> {
        description.insert("values".to_string(), describe_all(&self.values, parameters, verbose)?);
        Ok(())
    }

    pub(crate) fn extract(&self, subject: &Value, strict: bool, screen: Option<&Parameters>) -> Result<Value> {
        let items = self.expect_length(subject).ok_or_else(|| {
            SchemeError::CannotExtract(format!(
                "extraction candidate must be a list of {} values",
                self.values.len()
            ))
        })?;
        self.values
            .iter()
            .zip(items)
            .map(|(field, item)| field.extract(item, strict, screen))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn instantiate(&self, value: Value) -> Result<Value> {
        let Value::Array(items) = value else {
            return Err(SchemeError::CannotInstantiate("value must be a list".to_string()));
        };
        self.values
            .iter()
            .zip(items)
            .map(|(field, item)| field.instantiate(item, None))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn interpolate(
        &self,
        subject: Value,
        parameters: &Parameters,
        interpolator: Option<&Interpolator>,
    ) -> Result<Value> {
        let items = self.expect_length(&subject).ok_or_else(|| {
            SchemeError::CannotInterpolate(format!(
                "interpolation candidate must be a list of {} values",
                self.values.len()
            ))
        })?;
        self.values
            .iter()
            .zip(items)
            .map(|(field, item)| field.interpolate(item, parameters, interpolator))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn filter(&self, all: bool, params: &Parameters) -> Result<Option<Self>> {
        let mut changed = false;
        let mut values = Vec::with_capacity(self.values.len());
        for field in &self.values {
            let filtered = field.filter(all, params)?.ok_or_else(|| {
                SchemeError::CannotFilter("the positional fields of a tuple cannot be excluded".to_string())
            })?;
            changed |= !filtered.ptr_eq(field);
            values.push(filtered);
        }
        Ok(changed.then_some(Self { values }))
    }

    pub(crate) fn transform(&self, transformer: &mut dyn FnMut(&Field) -> Transformation) -> Option<Self> {
        let mut changed = false;
        let values = self
            .values
            .iter()
            .map(|field| transform_child(field, transformer, &mut changed))
            .collect();
        changed.then_some(Self { values })
    }

    pub(crate) fn children(&self) -> Vec<&Field> {
        self.values.iter().collect()
    }
}

impl From<Tuple> for Field {
    fn from(tuple: Tuple) -> Self {
        Field::new(FieldKind::Tuple(tuple))
    }
}
