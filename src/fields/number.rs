//! Integer and float leaves

use serde_json::{Number, Value};
use std::any::Any;
use std::sync::Arc;

use super::leaf::{LeafKind, Violation};
use crate::error::{Result, SchemeError};
use crate::field::{Field, FieldKind, Parameters, Phase};

/// Whole numbers with optional bounds
#[derive(Debug, Clone, Default)]
pub struct Integer {
    pub(crate) minimum: Option<i64>,
    pub(crate) maximum: Option<i64>,
}

impl Integer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minimum(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: i64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let mut integer = Integer::new();
        integer.minimum = take_bound(params, "minimum", Value::as_i64)?;
        integer.maximum = take_bound(params, "maximum", Value::as_i64)?;
        Ok(integer.into())
    }
}

impl LeafKind for Integer {
    fn fieldtype(&self) -> &str {
        "integer"
    }

    fn coerce(&self, value: Value, phase: Phase, serialized: bool) -> std::result::Result<Value, Violation> {
        let number = match &value {
            Value::Number(number) => number.as_i64().ok_or_else(Violation::invalid)?,
            Value::String(text) if serialized && phase == Phase::Inbound => {
                text.trim().parse::<i64>().map_err(|_| Violation::invalid())?
            }
            _ => return Err(Violation::invalid()),
        };

        if let Some(minimum) = self.minimum {
            if number < minimum {
                return Err(Violation::new("minimum").with_param("minimum", minimum));
            }
        }
        if let Some(maximum) = self.maximum {
            if number > maximum {
                return Err(Violation::new("maximum").with_param("maximum", maximum));
            }
        }
        Ok(Value::from(number))
    }

    fn describe(&self, description: &mut Parameters) {
        if let Some(minimum) = self.minimum {
            description.insert("minimum".to_string(), minimum.into());
        }
        if let Some(maximum) = self.maximum {
            description.insert("maximum".to_string(), maximum.into());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Integer> for Field {
    fn from(integer: Integer) -> Self {
        Field::new(FieldKind::Leaf(Arc::new(integer)))
    }
}

/// Floating point numbers with optional bounds
#[derive(Debug, Clone, Default)]
pub struct Float {
    pub(crate) minimum: Option<f64>,
    pub(crate) maximum: Option<f64>,
}

impl Float {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let mut float = Float::new();
        float.minimum = take_bound(params, "minimum", Value::as_f64)?;
        float.maximum = take_bound(params, "maximum", Value::as_f64)?;
        Ok(float.into())
    }
}

impl LeafKind for Float {
    fn fieldtype(&self) -> &str {
        "float"
    }

    fn coerce(&self, value: Value, phase: Phase, serialized: bool) -> std::result::Result<Value, Violation> {
        let number = match &value {
            Value::Number(number) => number.as_f64().ok_or_else(Violation::invalid)?,
            Value::String(text) if serialized && phase == Phase::Inbound => {
                text.trim().parse::<f64>().map_err(|_| Violation::invalid())?
            }
            _ => return Err(Violation::invalid()),
        };

        if let Some(minimum) = self.minimum {
            if number < minimum {
                return Err(Violation::new("minimum").with_param("minimum", minimum));
            }
        }
        if let Some(maximum) = self.maximum {
            if number > maximum {
                return Err(Violation::new("maximum").with_param("maximum", maximum));
            }
        }
        Number::from_f64(number).map(Value::Number).ok_or_else(Violation::invalid)
    }

    fn describe(&self, description: &mut Parameters) {
        if let Some(minimum) = self.minimum {
            description.insert("minimum".to_string(), minimum.into());
        }
        if let Some(maximum) = self.maximum {
            description.insert("maximum".to_string(), maximum.into());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Float> for Field {
    fn from(float: Float) -> Self {
        Field::new(FieldKind::Leaf(Arc::new(float)))
    }
}

fn take_bound<T>(params: &mut Parameters, key: &str, convert: fn(&Value) -> Option<T>) -> Result<Option<T>> {
    match params.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert(&value).map(Some).ok_or_else(|| {
            SchemeError::Configuration(format!("parameter '{}' must be a number, got {}", key, value))
        }),
    }
}
