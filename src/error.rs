//! Error types for the scheme engine
//!
//! Validation failures and faults travel through the same `Result`, but they
//! are kept apart: [`SchemeError::Validation`] carries a [`StructuralError`]
//! tree and is the normal outcome of processing bad input, while every other
//! variant is a fault that aborts the whole operation.

use thiserror::Error;

use crate::structural::StructuralError;

/// Result type for scheme operations
pub type Result<T> = std::result::Result<T, SchemeError>;

/// Scheme engine errors
#[derive(Error, Debug)]
pub enum SchemeError {
    #[error("{0}")]
    Validation(Box<StructuralError>),

    #[error("Invalid schema configuration: {0}")]
    Configuration(String),

    #[error("Undefined field: {0}")]
    UndefinedField(String),

    #[error("Cannot extract value: {0}")]
    CannotExtract(String),

    #[error("Field excluded: {0}")]
    FieldExcluded(String),

    #[error("Cannot interpolate value: {0}")]
    CannotInterpolate(String),

    #[error("Undefined parameter: {0}")]
    UndefinedParameter(String),

    #[error("Cannot filter field: {0}")]
    CannotFilter(String),

    #[error("Cannot instantiate value: {0}")]
    CannotInstantiate(String),

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Invalid field description: {0}")]
    InvalidDescription(String),

    #[error("Recursion limit of {limit} exceeded at {location}")]
    RecursionLimit { limit: usize, location: String },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SchemeError {
    /// True for everything except a structural validation failure
    pub fn is_fault(&self) -> bool {
        !matches!(self, SchemeError::Validation(_))
    }

    /// The validation tree, if this is a validation failure
    pub fn structural(&self) -> Option<&StructuralError> {
        match self {
            SchemeError::Validation(error) => Some(error),
            _ => None,
        }
    }

    /// Split a validation failure from a fault.
    ///
    /// Composites use this to collect child failures into their own
    /// substructure while letting faults propagate untouched.
    pub fn into_structural(self) -> std::result::Result<StructuralError, SchemeError> {
        match self {
            SchemeError::Validation(error) => Ok(*error),
            fault => Err(fault),
        }
    }
}

impl From<StructuralError> for SchemeError {
    fn from(error: StructuralError) -> Self {
        SchemeError::Validation(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        let validation: SchemeError = StructuralError::new().into();
        assert!(!validation.is_fault());
        assert!(validation.structural().is_some());

        let fault = SchemeError::Configuration("bad".to_string());
        assert!(fault.is_fault());
        assert!(fault.into_structural().is_err());
    }
}
