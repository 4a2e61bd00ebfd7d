//! Wire formats
//!
//! A [`Format`] converts canonical values to and from text. Formats whose
//! scalars are typed (JSON, YAML) are processed with `serialized` unset;
//! text-only formats would set it so leaves coerce their text forms.

use serde_json::Value;
use std::path::Path;

use crate::error::{Result, SchemeError};
use crate::field::{Field, Phase, ProcessOptions};

/// Text codec for canonical values
pub trait Format: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extensions including the leading dot
    fn extensions(&self) -> &'static [&'static str];

    fn mimetype(&self) -> &'static str;

    /// Scalars keep their types through the codec
    fn typed(&self) -> bool {
        true
    }

    fn serialize(&self, value: &Value) -> Result<String>;

    fn unserialize(&self, content: &str) -> Result<Value>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Format for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".json"]
    }

    fn mimetype(&self) -> &'static str {
        "application/json"
    }

    fn serialize(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn unserialize(&self, content: &str) -> Result<Value> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl Format for Yaml {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".yaml", ".yml"]
    }

    fn mimetype(&self) -> &'static str {
        "application/x-yaml"
    }

    fn serialize(&self, value: &Value) -> Result<String> {
        Ok(serde_yaml::to_string(value)?)
    }

    fn unserialize(&self, content: &str) -> Result<Value> {
        Ok(serde_yaml::from_str(content)?)
    }
}

static FORMATS: [&dyn Format; 2] = [&Json, &Yaml];

/// All built-in formats
pub fn formats() -> &'static [&'static dyn Format] {
    &FORMATS
}

/// Format registered under `name`
pub fn format_named(name: &str) -> Result<&'static dyn Format> {
    FORMATS
        .iter()
        .copied()
        .find(|format| format.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| SchemeError::UnknownFormat(name.to_string()))
}

/// Format matching the extension of `path`
pub fn format_for_path(path: &Path) -> Result<&'static dyn Format> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .ok_or_else(|| SchemeError::UnknownFormat(path.display().to_string()))?;
    FORMATS
        .iter()
        .copied()
        .find(|format| format.extensions().contains(&extension.as_str()))
        .ok_or_else(|| SchemeError::UnknownFormat(extension))
}

impl Field {
    /// Process `value` outbound and encode it
    pub fn serialize(&self, value: Value, format: &dyn Format) -> Result<String> {
        let options = ProcessOptions::new(Phase::Outbound).serialized(!format.typed());
        let value = self.process_with(value, &options)?;
        format.serialize(&value)
    }

    /// Decode `content` and process it inbound
    pub fn unserialize(&self, content: &str, format: &dyn Format) -> Result<Value> {
        let value = format.unserialize(content)?;
        let options = ProcessOptions::new(Phase::Inbound).serialized(!format.typed());
        self.process_with(value, &options)
    }
}
