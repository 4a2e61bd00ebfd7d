//! Field kinds
//!
//! Leaves (`text`, `integer`, `float`, `boolean`, `enumeration`,
//! `definition` and the untyped `field`) implement
//! [`LeafKind`](leaf::LeafKind). Composites hold child [`Field`]s and
//! aggregate child errors positionally or by key.

pub mod boolean;
pub mod definition;
pub mod enumeration;
pub mod leaf;
pub mod map;
pub mod number;
pub mod sequence;
pub mod structure;
pub mod text;
pub mod tuple;
pub mod union;

pub use boolean::Boolean;
pub use definition::FieldDefinition;
pub use enumeration::{Enumeration, Strategy};
pub use leaf::{AnyValue, LeafKind, Violation};
pub use map::Map;
pub use number::{Float, Integer};
pub use sequence::Sequence;
pub use structure::{Definition, Structure, StructureBuilder};
pub use text::Text;
pub use tuple::Tuple;
pub use union::Union;

use serde_json::Value;

use crate::error::{Result, SchemeError};
use crate::field::{Field, Parameters};
use crate::describe::reconstruct_value;

// =============================================================================
// Description parameter helpers
// =============================================================================

pub(crate) fn take_usize(params: &mut Parameters, key: &str) -> Result<Option<usize>> {
    match params.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid_parameter(key, "a non-negative integer", &value)),
    }
}

pub(crate) fn take_bool(params: &mut Parameters, key: &str) -> Result<Option<bool>> {
    match params.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(value) => Err(invalid_parameter(key, "a boolean", &value)),
    }
}

pub(crate) fn take_string(params: &mut Parameters, key: &str) -> Result<Option<String>> {
    match params.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(value) => Err(invalid_parameter(key, "a string", &value)),
    }
}

/// Reconstruct the nested field description under `key`
pub(crate) fn take_field(params: &mut Parameters, key: &str) -> Result<Option<Field>> {
    match params.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => reconstruct_value(&value).map(Some),
    }
}

/// Reconstruct a list of nested field descriptions under `key`
pub(crate) fn take_fields(params: &mut Parameters, key: &str) -> Result<Vec<Field>> {
    match params.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values.iter().map(reconstruct_value).collect(),
        Some(value) => Err(invalid_parameter(key, "a list of field descriptions", &value)),
    }
}

fn invalid_parameter(key: &str, expected: &str, value: &Value) -> SchemeError {
    SchemeError::InvalidDescription(format!("parameter '{}' must be {}, got {}", key, expected, value))
}

/// Describe each field in order
pub(crate) fn describe_all(
    fields: &[Field],
    parameters: Option<&Parameters>,
    verbose: bool,
) -> Result<Value> {
    fields
        .iter()
        .map(|field| field.describe(parameters, verbose))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}
