//! Field attributes and mediators
//!
//! The engine interprets a fixed set of typed attributes. Everything else a
//! caller attaches lives in the extension map as one of the closed
//! [`Attribute`] variants; only `Value` and `Field` extensions are
//! representable in a description.

use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Field;
use crate::error::{Result, SchemeError};

/// Named parameters, descriptions and screening predicates
pub type Parameters = serde_json::Map<String, Value>;

/// Applied to a non-null value before the field's own checks
pub type Preprocessor = Arc<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Pulls a canonical value out of an arbitrary subject
pub type Extractor = Arc<dyn Fn(&Field, &Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Builds a domain value from a canonical value and the key it was found under
pub type Instantiator =
    Arc<dyn Fn(&Field, Value, Option<&str>) -> std::result::Result<Value, String> + Send + Sync>;

/// Overrides template substitution for a string subject
pub type Interpolator = Arc<dyn Fn(&str, &Parameters) -> Result<Value> + Send + Sync>;

/// Attribute names interpreted by the engine itself
pub const COMMON_ATTRIBUTES: [&str; 7] = [
    "name",
    "description",
    "required",
    "nonnull",
    "ignore_null",
    "default",
    "constant",
];

/// Value of an extension attribute
#[derive(Clone)]
pub enum Attribute {
    /// Plain data, emitted by `describe`
    Value(Value),
    /// A nested field, emitted as its own description
    Field(Field),
    /// Anything else; omitted from descriptions and dropped by `clone_with`
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Attribute {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attribute::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Attribute::Field(field) => Some(field),
            _ => None,
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Value(value) => write!(f, "Value({})", value),
            Attribute::Field(field) => write!(f, "Field({:?})", field),
            Attribute::Opaque(_) => write!(f, "Opaque"),
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Value(value)
    }
}

impl From<Field> for Attribute {
    fn from(field: Field) -> Self {
        Attribute::Field(field)
    }
}

/// Attributes shared by every field
#[derive(Clone, Default)]
pub struct FieldAttributes {
    pub name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub nonnull: bool,
    /// Null values are treated as absent by an enclosing structure
    pub ignore_null: bool,
    /// Canonical value substituted for an absent key on inbound processing
    pub default: Option<Value>,
    /// The only value this field accepts
    pub constant: Option<Value>,
    pub extensions: BTreeMap<String, Attribute>,
    pub preprocessor: Option<Preprocessor>,
    pub extractor: Option<Extractor>,
    pub instantiator: Option<Instantiator>,
    pub interpolator: Option<Interpolator>,
}

impl fmt::Debug for FieldAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAttributes")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("nonnull", &self.nonnull)
            .field("ignore_null", &self.ignore_null)
            .field("default", &self.default)
            .field("constant", &self.constant)
            .field("extensions", &self.extensions)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("extractor", &self.extractor.is_some())
            .field("instantiator", &self.instantiator.is_some())
            .field("interpolator", &self.interpolator.is_some())
            .finish()
    }
}

impl FieldAttributes {
    /// Current value of an attribute as data, for screening.
    ///
    /// Typed attributes are always present; extensions only when they hold
    /// plain data.
    pub fn value_of(&self, key: &str) -> Option<Value> {
        match key {
            "name" => self.name.clone().map(Value::String),
            "description" => self.description.clone().map(Value::String),
            "required" => Some(Value::Bool(self.required)),
            "nonnull" => Some(Value::Bool(self.nonnull)),
            "ignore_null" => Some(Value::Bool(self.ignore_null)),
            "default" => self.default.clone(),
            "constant" => self.constant.clone(),
            _ => self.extensions.get(key).and_then(Attribute::as_value).cloned(),
        }
    }

    /// Match this field against attribute predicates.
    ///
    /// Null predicates and predicates naming attributes the field does not
    /// carry are ignored. With `all` every remaining predicate must match,
    /// otherwise any one suffices. No remaining predicates always matches.
    pub fn screen(&self, all: bool, params: &Parameters) -> bool {
        let mut outcomes = params
            .iter()
            .filter(|(_, expected)| !expected.is_null())
            .filter_map(|(key, expected)| self.value_of(key).map(|actual| actual == *expected))
            .peekable();

        if outcomes.peek().is_none() {
            return true;
        }
        if all {
            outcomes.all(|matched| matched)
        } else {
            outcomes.any(|matched| matched)
        }
    }

    pub(crate) fn describe_common(&self, description: &mut Parameters, verbose: bool) {
        if let Some(name) = &self.name {
            description.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(text) = &self.description {
            description.insert("description".to_string(), Value::String(text.clone()));
        }
        for (key, flag) in [
            ("required", self.required),
            ("nonnull", self.nonnull),
            ("ignore_null", self.ignore_null),
        ] {
            if flag || verbose {
                description.insert(key.to_string(), Value::Bool(flag));
            }
        }
        if let Some(default) = &self.default {
            description.insert("default".to_string(), default.clone());
        }
        if let Some(constant) = &self.constant {
            description.insert("constant".to_string(), constant.clone());
        }
    }

    pub(crate) fn describe_extensions(
        &self,
        description: &mut Parameters,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<()> {
        for (key, attribute) in &self.extensions {
            if let Some(value) = self.describe_extension(attribute, parameters, verbose)? {
                description.insert(key.clone(), value);
            }
        }
        Ok(())
    }

    pub(crate) fn describe_extension(
        &self,
        attribute: &Attribute,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<Option<Value>> {
        Ok(match attribute {
            Attribute::Value(value) => Some(value.clone()),
            Attribute::Field(field) => Some(field.describe(parameters, verbose)?),
            Attribute::Opaque(_) => None,
        })
    }

    /// Copy of these attributes without the values that cannot be copied
    pub(crate) fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.extensions
            .retain(|_, attribute| !matches!(attribute, Attribute::Opaque(_)));
        copy
    }

    /// Set one attribute from data
    pub(crate) fn apply(&mut self, key: &str, value: Value) -> Result<()> {
        match key {
            "name" => self.name = optional_text(key, value)?,
            "description" => self.description = optional_text(key, value)?,
            "required" => self.required = flag(key, &value)?,
            "nonnull" => self.nonnull = flag(key, &value)?,
            "ignore_null" => self.ignore_null = flag(key, &value)?,
            "default" => self.default = Some(value).filter(|v| !v.is_null()),
            "constant" => {
                self.constant = Some(value).filter(|v| !v.is_null());
                if self.constant.is_some() {
                    self.required = true;
                    self.nonnull = true;
                }
            }
            _ => {
                self.extensions.insert(key.to_string(), Attribute::Value(value));
            }
        }
        Ok(())
    }

    /// Remove and parse the common attributes of a description
    pub(crate) fn take_common(description: &mut Parameters) -> Result<Self> {
        let mut attrs = FieldAttributes::default();
        for key in COMMON_ATTRIBUTES {
            if let Some(value) = description.remove(key) {
                attrs.apply(key, value)?;
            }
        }
        Ok(attrs)
    }
}

fn optional_text(key: &str, value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        other => Err(SchemeError::Configuration(format!(
            "attribute '{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn flag(key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        other => Err(SchemeError::Configuration(format!(
            "attribute '{}' must be a boolean, got {}",
            key, other
        ))),
    }
}
