//! Boolean leaf

use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::leaf::{LeafKind, Violation};
use crate::field::{Field, FieldKind, Phase};

#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl Boolean {
    pub fn new() -> Self {
        Self
    }
}

impl LeafKind for Boolean {
    fn fieldtype(&self) -> &str {
        "boolean"
    }

    fn coerce(&self, value: Value, phase: Phase, serialized: bool) -> Result<Value, Violation> {
        match value {
            Value::Bool(flag) => Ok(Value::Bool(flag)),
            Value::String(text) if serialized && phase == Phase::Inbound => match text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(Violation::invalid()),
            },
            _ => Err(Violation::invalid()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Boolean> for Field {
    fn from(boolean: Boolean) -> Self {
        Field::new(FieldKind::Leaf(Arc::new(boolean)))
    }
}
