//! Scalar leaf kinds
//!
//! Leaves have no recursive structure. Each one supplies a coercion rule for
//! both phases and both serialization modes, and its own error tokens; the
//! engine handles null checks, constants, mediators and error placement.

use serde_json::Value;
use std::any::Any;
use std::fmt;

use crate::field::{Parameters, Phase};

/// Why a leaf rejected a value
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub token: String,
    pub params: Parameters,
}

impl Violation {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            params: Parameters::new(),
        }
    }

    /// The catch-all `invalid` violation
    pub fn invalid() -> Self {
        Self::new("invalid")
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Coercion contract for scalar field kinds
pub trait LeafKind: fmt::Debug + Send + Sync + 'static {
    /// Registered type tag, emitted as `fieldtype`
    fn fieldtype(&self) -> &str;

    /// Convert `value` in the direction of `phase`.
    ///
    /// With `serialized` set, inbound values may arrive in wire-text form and
    /// outbound values must be rendered in it.
    fn coerce(&self, value: Value, phase: Phase, serialized: bool) -> Result<Value, Violation>;

    /// Add kind-specific parameters to a description
    fn describe(&self, _description: &mut Parameters) {}

    fn as_any(&self) -> &dyn Any;
}

/// Accepts any value unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyValue;

impl LeafKind for AnyValue {
    fn fieldtype(&self) -> &str {
        "field"
    }

    fn coerce(&self, value: Value, _phase: Phase, _serialized: bool) -> Result<Value, Violation> {
        Ok(value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Text form of a scalar, used for identities and map keys
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
