//! Homogeneous sequences

use serde_json::{Map as JsonMap, Value};

use super::{take_bool, take_field, take_usize};
use crate::error::{Result, SchemeError};
use crate::field::{transform_child, Field, FieldKind, Interpolator, Parameters, Pass, Path, Transformation};
use crate::structural::{Entry, StructuralError, Substructure};

/// A list whose items all share one field
#[derive(Debug, Clone)]
pub struct Sequence {
    pub(crate) item: Field,
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) unique: bool,
}

impl Sequence {
    pub fn new(item: impl Into<Field>) -> Self {
        Self {
            item: item.into(),
            min_length: None,
            max_length: None,
            unique: false,
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

    /// Reject sequences containing equal processed items
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn item(&self) -> &Field {
        &self.item
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let item = take_field(params, "item")?.ok_or_else(|| {
            SchemeError::InvalidDescription("sequence requires an 'item' field".to_string())
        })?;
        let mut sequence = Sequence::new(item);
        sequence.min_length = take_usize(params, "min_length")?;
        sequence.max_length = take_usize(params, "max_length")?;
        sequence.unique = take_bool(params, "unique")?.unwrap_or(false);
        Ok(sequence.into())
    }

    pub(crate) fn process(&self, value: Value, pass: Pass<'_>) -> Result<Value> {
        let Value::Array(items) = value else {
            return Err(StructuralError::raise("invalid", &pass.location()).into());
        };

        if let Some(min_length) = self.min_length {
            if items.len() < min_length {
                return Err(length_error("min_length", min_length, &pass));
            }
        }
        if let Some(max_length) = self.max_length {
            if items.len() > max_length {
                return Err(length_error("max_length", max_length, &pass));
            }
        }

        let mut valid = true;
        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let path = Path::Index(pass.path, index);
            let outcome = self.item.run(item, pass.descend(&path)?);
            entries.push(Entry::collect(outcome, &mut valid)?);
        }

        if !valid {
            let error = StructuralError::at(&pass.location()).with_structure(Substructure::Sequence(entries));
            return Err(error.into());
        }

        let processed = Substructure::Sequence(entries).into_value();
        if self.unique {
            if let Value::Array(values) = &processed {
                let duplicated = values
                    .iter()
                    .enumerate()
                    .any(|(i, value)| values[..i].contains(value));
                if duplicated {
                    return Err(StructuralError::raise("duplicate", &pass.location()).into());
                }
            }
        }
        Ok(processed)
    }

    pub(crate) fn describe(
        &self,
        description: &mut Parameters,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<()> {
        description.insert("item".to_string(), self.item.describe(parameters, verbose)?);
        if let Some(min_length) = self.min_length {
            description.insert("min_length".to_string(), min_length.into());
        }
        if let Some(max_length) = self.max_length {
            description.insert("max_length".to_string(), max_length.into());
        }
        if self.unique || verbose {
            description.insert("unique".to_string(), self.unique.into());
        }
        Ok(())
    }

    pub(crate) fn extract(&self, subject: &Value, strict: bool, screen: Option<&Parameters>) -> Result<Value> {
        let Value::Array(items) = subject else {
            return Err(SchemeError::CannotExtract("extraction candidate must be a list".to_string()));
        };
        items
            .iter()
            .map(|item| self.item.extract(item, strict, screen))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn instantiate(&self, value: Value) -> Result<Value> {
        let Value::Array(items) = value else {
            return Err(SchemeError::CannotInstantiate("value must be a list".to_string()));
        };
        items
            .into_iter()
            .map(|item| self.item.instantiate(item, None))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn interpolate(
        &self,
        subject: Value,
        parameters: &Parameters,
        interpolator: Option<&Interpolator>,
    ) -> Result<Value> {
        let Value::Array(items) = subject else {
            return Err(SchemeError::CannotInterpolate("interpolation candidate must be a list".to_string()));
        };
        items
            .iter()
            .map(|item| self.item.interpolate(item, parameters, interpolator))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn filter(&self, all: bool, params: &Parameters) -> Result<Option<Self>> {
        match self.item.filter(all, params)? {
            None => Err(SchemeError::CannotFilter(
                "the item field of a sequence cannot be excluded".to_string(),
            )),
            Some(item) if item.ptr_eq(&self.item) => Ok(None),
            Some(item) => Ok(Some(Self { item, ..self.clone() })),
        }
    }

    pub(crate) fn transform(&self, transformer: &mut dyn FnMut(&Field) -> Transformation) -> Option<Self> {
        let mut changed = false;
        let item = transform_child(&self.item, transformer, &mut changed);
        changed.then(|| Self { item, ..self.clone() })
    }

    pub(crate) fn children(&self) -> Vec<&Field> {
        vec![&self.item]
    }
}

fn length_error(token: &str, bound: usize, pass: &Pass<'_>) -> SchemeError {
    let mut params = JsonMap::new();
    params.insert(token.to_string(), bound.into());
    StructuralError::raise_with(token, &pass.location(), params).into()
}

impl From<Sequence> for Field {
    fn from(sequence: Sequence) -> Self {
        Field::new(FieldKind::Sequence(sequence))
    }
}
