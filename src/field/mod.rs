//! The field contract
//!
//! A [`Field`] is an immutable, cheaply cloneable schema node. Every node
//! supports the same operations (process, describe, extract, instantiate,
//! interpolate, filter, transform, screen, clone) and composites delegate
//! them recursively to their children.
//!
//! Builder methods such as [`Field::required`] consume the handle and copy
//! the node only when it is shared, so composing schemas never mutates a
//! graph someone else holds.

mod attributes;
mod context;

pub use attributes::{
    Attribute, Extractor, FieldAttributes, Instantiator, Interpolator, Parameters, Preprocessor,
    COMMON_ATTRIBUTES,
};
pub use context::{Phase, ProcessOptions, DEFAULT_MAX_DEPTH};
pub(crate) use context::{Pass, Path};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SchemeError};
use crate::fields::leaf::{AnyValue, LeafKind, Violation};
use crate::fields::{Boolean, Float, Integer, Map, Sequence, Structure, Text, Tuple, Union};
use crate::interpolation::interpolate_parameters;
use crate::structural::StructuralError;
use crate::undefined::Undefined;

/// The closed set of node kinds
#[derive(Debug, Clone)]
pub enum FieldKind {
    Leaf(Arc<dyn LeafKind>),
    Sequence(Sequence),
    Tuple(Tuple),
    Union(Union),
    Map(Map),
    Structure(Structure),
    Undefined(Undefined),
}

/// Outcome of a transformer applied to one node
#[derive(Debug, Clone)]
pub enum Transformation {
    /// Use this field instead; its children are not visited
    Replace(Field),
    /// Keep the node and visit its children
    Unchanged,
    /// Keep the node and skip its children
    Prune,
}

#[derive(Clone)]
struct FieldNode {
    attrs: FieldAttributes,
    kind: FieldKind,
}

/// Schema node
#[derive(Clone)]
pub struct Field {
    node: Arc<FieldNode>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("fieldtype", &self.fieldtype())
            .field("attrs", &self.node.attrs)
            .field("kind", &self.node.kind)
            .finish()
    }
}

// =============================================================================
// Construction
// =============================================================================

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            node: Arc::new(FieldNode {
                attrs: FieldAttributes::default(),
                kind,
            }),
        }
    }

    /// Accepts any value
    pub fn any() -> Self {
        Self::new(FieldKind::Leaf(Arc::new(AnyValue)))
    }

    pub fn text() -> Self {
        Text::new().into()
    }

    pub fn integer() -> Self {
        Integer::new().into()
    }

    pub fn float() -> Self {
        Float::new().into()
    }

    pub fn boolean() -> Self {
        Boolean::new().into()
    }

    /// Leaf of a custom kind
    pub fn leaf(kind: impl LeafKind) -> Self {
        Self::new(FieldKind::Leaf(Arc::new(kind)))
    }

    /// Forward reference to a schema declared under `target`, bound by
    /// [`SchemaBuilder::link`](crate::SchemaBuilder::link)
    pub fn reference(target: impl Into<String>) -> Self {
        Undefined::named(target).field()
    }

    fn update(mut self, apply: impl FnOnce(&mut FieldAttributes)) -> Self {
        apply(&mut Arc::make_mut(&mut self.node).attrs);
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.name() == Some(name.as_str()) {
            return self;
        }
        self.update(|attrs| attrs.name = Some(name))
    }

    pub fn required(self) -> Self {
        self.update(|attrs| attrs.required = true)
    }

    pub fn optional(self) -> Self {
        self.update(|attrs| attrs.required = false)
    }

    pub fn nonnull(self) -> Self {
        self.update(|attrs| attrs.nonnull = true)
    }

    /// Required, non-null and, for text, at least one character long
    pub fn nonempty(self) -> Self {
        let field = self.update(|attrs| {
            attrs.required = true;
            attrs.nonnull = true;
        });
        let text = match field.kind() {
            FieldKind::Leaf(leaf) => leaf.as_any().downcast_ref::<Text>().cloned(),
            _ => None,
        };
        match text {
            Some(text) if text.min_length.is_none() => {
                field.with_kind(FieldKind::Leaf(Arc::new(Text { min_length: Some(1), ..text })))
            }
            _ => field,
        }
    }

    pub fn ignore_null(self) -> Self {
        self.update(|attrs| attrs.ignore_null = true)
    }

    pub fn with_default(self, default: impl Into<Value>) -> Self {
        let default = default.into();
        self.update(|attrs| attrs.default = Some(default).filter(|v| !v.is_null()))
    }

    /// Pin the field to `constant`; implies required and non-null
    pub fn with_constant(self, constant: impl Into<Value>) -> Self {
        let constant = constant.into();
        self.update(|attrs| {
            attrs.constant = Some(constant);
            attrs.required = true;
            attrs.nonnull = true;
        })
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.update(|attrs| attrs.description = Some(description))
    }

    pub fn with_attribute(self, key: impl Into<String>, attribute: impl Into<Attribute>) -> Self {
        let (key, attribute) = (key.into(), attribute.into());
        self.update(|attrs| {
            attrs.extensions.insert(key, attribute);
        })
    }

    pub fn with_preprocessor(
        self,
        preprocessor: impl Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.update(|attrs| attrs.preprocessor = Some(Arc::new(preprocessor)))
    }

    pub fn with_extractor(
        self,
        extractor: impl Fn(&Field, &Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.update(|attrs| attrs.extractor = Some(Arc::new(extractor)))
    }

    pub fn with_instantiator(
        self,
        instantiator: impl Fn(&Field, Value, Option<&str>) -> std::result::Result<Value, String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.update(|attrs| attrs.instantiator = Some(Arc::new(instantiator)))
    }

    pub fn with_interpolator(
        self,
        interpolator: impl Fn(&str, &Parameters) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.update(|attrs| attrs.interpolator = Some(Arc::new(interpolator)))
    }

    /// Same attributes, different kind
    pub(crate) fn with_kind(&self, kind: FieldKind) -> Field {
        Field {
            node: Arc::new(FieldNode {
                attrs: self.node.attrs.clone(),
                kind,
            }),
        }
    }

    /// Replace every typed attribute at once
    pub(crate) fn with_attributes(mut self, attrs: FieldAttributes) -> Self {
        Arc::make_mut(&mut self.node).attrs = attrs;
        self
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl Field {
    pub fn name(&self) -> Option<&str> {
        self.node.attrs.name.as_deref()
    }

    pub fn attributes(&self) -> &FieldAttributes {
        &self.node.attrs
    }

    pub fn kind(&self) -> &FieldKind {
        &self.node.kind
    }

    pub fn is_required(&self) -> bool {
        self.node.attrs.required
    }

    pub fn is_nonnull(&self) -> bool {
        self.node.attrs.nonnull
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.node.attrs.default.as_ref()
    }

    pub fn constant(&self) -> Option<&Value> {
        self.node.attrs.constant.as_ref()
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.node.attrs.extensions.get(key)
    }

    /// Registered type tag of this node
    pub fn fieldtype(&self) -> &str {
        match &self.node.kind {
            FieldKind::Leaf(leaf) => leaf.fieldtype(),
            FieldKind::Sequence(_) => "sequence",
            FieldKind::Tuple(_) => "tuple",
            FieldKind::Union(_) => "union",
            FieldKind::Map(_) => "map",
            FieldKind::Structure(_) => "structure",
            FieldKind::Undefined(_) => "undefined",
        }
    }

    /// The structure behind this field, if it is one
    pub fn as_structure(&self) -> Option<&Structure> {
        match &self.node.kind {
            FieldKind::Structure(structure) => Some(structure),
            _ => None,
        }
    }

    /// Both handles point at the same node
    pub fn ptr_eq(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Address of the shared node, stable while any handle is alive
    pub(crate) fn node_id(&self) -> usize {
        Arc::as_ptr(&self.node) as usize
    }

    /// Name used in locations and diagnostics
    pub fn label(&self) -> String {
        match (&self.node.attrs.name, &self.node.kind) {
            (Some(name), _) => name.clone(),
            (None, FieldKind::Undefined(placeholder)) => placeholder
                .target()
                .map(str::to_string)
                .unwrap_or_else(|| "(field)".to_string()),
            (None, _) => "(field)".to_string(),
        }
    }

    /// Follow forward references to the field they stand for
    pub fn resolve(&self) -> Result<&Field> {
        match &self.node.kind {
            FieldKind::Undefined(placeholder) => placeholder
                .get()
                .ok_or_else(|| SchemeError::UndefinedField(format!("'{}' is undefined", self.label())))?
                .resolve(),
            _ => Ok(self),
        }
    }

    /// Immediate children of this node; forward references are not followed
    pub fn children(&self) -> Vec<&Field> {
        let mut children: Vec<&Field> = match &self.node.kind {
            FieldKind::Leaf(_) | FieldKind::Undefined(_) => Vec::new(),
            FieldKind::Sequence(sequence) => sequence.children(),
            FieldKind::Tuple(tuple) => tuple.children(),
            FieldKind::Union(union) => union.children(),
            FieldKind::Map(map) => map.children(),
            FieldKind::Structure(structure) => structure.children(),
        };
        children.extend(self.node.attrs.extensions.values().filter_map(Attribute::as_field));
        children
    }
}

// =============================================================================
// Processing
// =============================================================================

impl Field {
    /// Validate and convert `value` in the direction of `phase`
    pub fn process(&self, value: Value, phase: Phase, serialized: bool) -> Result<Value> {
        self.process_with(value, &ProcessOptions::new(phase).serialized(serialized))
    }

    pub fn process_with(&self, value: Value, options: &ProcessOptions) -> Result<Value> {
        let label = self.label();
        let root = options.ancestry.as_deref().unwrap_or(&label);
        let path = Path::Root(root);
        self.run(value, Pass::new(options, &path))
    }

    pub(crate) fn run(&self, value: Value, pass: Pass<'_>) -> Result<Value> {
        match &self.node.kind {
            FieldKind::Undefined(placeholder) => placeholder.resolve(pass.path)?.run(value, pass),
            FieldKind::Leaf(leaf) => self.admit(value, &pass, None, |value| {
                leaf.coerce(value, pass.phase, pass.serialized)
                    .map_err(|violation| violated(violation, &pass))
            }),
            FieldKind::Sequence(sequence) => {
                self.admit(value, &pass, Some(Value::is_array), |value| sequence.process(value, pass))
            }
            FieldKind::Tuple(tuple) => {
                self.admit(value, &pass, Some(Value::is_array), |value| tuple.process(value, pass))
            }
            FieldKind::Union(union) => self.admit(value, &pass, None, |value| union.process(value, pass)),
            FieldKind::Map(map) => self.admit(value, &pass, Some(Value::is_object), |value| map.process(value, pass)),
            FieldKind::Structure(structure) => {
                self.admit(value, &pass, Some(Value::is_object), |value| structure.process(value, pass))
            }
        }
    }

    /// Null handling, shape check, preprocessor and constant around the
    /// kind-specific `process` step
    fn admit(
        &self,
        value: Value,
        pass: &Pass<'_>,
        shape: Option<fn(&Value) -> bool>,
        process: impl FnOnce(Value) -> Result<Value>,
    ) -> Result<Value> {
        let attrs = &self.node.attrs;

        if value.is_null() {
            if attrs.nonnull {
                return Err(StructuralError::raise("nonnull", &pass.location()).into());
            }
            return Ok(Value::Null);
        }

        if shape.is_some_and(|matches| !matches(&value)) {
            return Err(StructuralError::raise("invalid", &pass.location()).into());
        }

        let value = match &attrs.preprocessor {
            Some(preprocessor) => preprocessor(value)
                .map_err(|fault| StructuralError::raise("invalid", &pass.location()).capture(fault))?,
            None => value,
        };

        if let (Some(constant), Phase::Outbound) = (&attrs.constant, pass.phase) {
            if value != *constant {
                return Err(StructuralError::raise("invalid", &pass.location()).into());
            }
        }

        let processed = process(value)?;

        if let (Some(constant), Phase::Inbound) = (&attrs.constant, pass.phase) {
            if processed != *constant {
                return Err(StructuralError::raise("invalid", &pass.location()).into());
            }
        }

        Ok(processed)
    }
}

fn violated(violation: Violation, pass: &Pass<'_>) -> SchemeError {
    StructuralError::raise_with(&violation.token, &pass.location(), violation.params).into()
}

// =============================================================================
// Schema as data
// =============================================================================

impl Field {
    /// Data-only description of this field.
    ///
    /// `parameters` are merged into every description in the tree; a null
    /// parameter copies the field's own extension attribute of that name
    /// when it is representable.
    pub fn describe(&self, parameters: Option<&Parameters>, verbose: bool) -> Result<Value> {
        if let FieldKind::Undefined(placeholder) = &self.node.kind {
            return placeholder.describe(self, parameters, verbose);
        }

        let attrs = &self.node.attrs;
        let mut description = Parameters::new();
        description.insert("fieldtype".to_string(), Value::String(self.fieldtype().to_string()));
        attrs.describe_common(&mut description, verbose);

        match &self.node.kind {
            FieldKind::Leaf(leaf) => leaf.describe(&mut description),
            FieldKind::Sequence(sequence) => sequence.describe(&mut description, parameters, verbose)?,
            FieldKind::Tuple(tuple) => tuple.describe(&mut description, parameters, verbose)?,
            FieldKind::Union(union) => union.describe(&mut description, parameters, verbose)?,
            FieldKind::Map(map) => map.describe(&mut description, parameters, verbose)?,
            FieldKind::Structure(structure) => structure.describe(attrs, &mut description, parameters, verbose)?,
            FieldKind::Undefined(_) => {}
        }

        attrs.describe_extensions(&mut description, parameters, verbose)?;

        for (key, value) in parameters.into_iter().flatten() {
            if !value.is_null() {
                description.insert(key.clone(), value.clone());
            } else if !description.contains_key(key) {
                if let Some(attribute) = attrs.extensions.get(key) {
                    if let Some(value) = attrs.describe_extension(attribute, parameters, verbose)? {
                        description.insert(key.clone(), value);
                    }
                }
            }
        }

        Ok(Value::Object(description))
    }

    /// Copy of this field with attributes overridden from data; fails on an
    /// undefined placeholder.
    ///
    /// Opaque extension attributes are dropped from the copy.
    pub fn clone_with(&self, overrides: &Parameters) -> Result<Field> {
        self.resolve()?;
        let mut attrs = self.node.attrs.duplicate();
        for (key, value) in overrides {
            attrs.apply(key, value.clone())?;
        }
        Ok(Field {
            node: Arc::new(FieldNode {
                attrs,
                kind: self.node.kind.clone(),
            }),
        })
    }
}

// =============================================================================
// Extraction, instantiation and interpolation
// =============================================================================

impl Field {
    /// Does this field match every non-null predicate in `params`
    pub fn screen(&self, params: &Parameters) -> bool {
        self.node.attrs.screen(true, params)
    }

    /// Pull this field's value out of `subject`.
    ///
    /// Structures read keys from an object; with `strict` unset a subject of
    /// another shape yields no keys instead of failing. When `screen` is
    /// given, fields that do not match it are excluded.
    pub fn extract(&self, subject: &Value, strict: bool, screen: Option<&Parameters>) -> Result<Value> {
        let field = self.resolve()?;
        let attrs = &field.node.attrs;

        if let Some(params) = screen {
            if !params.is_empty() && !attrs.screen(true, params) {
                return Err(SchemeError::FieldExcluded(field.label()));
            }
        }
        if subject.is_null() {
            return Ok(Value::Null);
        }

        let subject = match &attrs.extractor {
            Some(extractor) => Cow::Owned(
                extractor(field, subject)
                    .map_err(|fault| SchemeError::CannotExtract(format!("extractor failed: {}", fault)))?,
            ),
            None => Cow::Borrowed(subject),
        };

        match &field.node.kind {
            FieldKind::Leaf(_) | FieldKind::Undefined(_) => Ok(subject.into_owned()),
            FieldKind::Sequence(sequence) => sequence.extract(&subject, strict, screen),
            FieldKind::Tuple(tuple) => tuple.extract(&subject, strict, screen),
            FieldKind::Union(union) => union.extract(&subject, strict, screen),
            FieldKind::Map(map) => map.extract(&subject, strict, screen),
            FieldKind::Structure(structure) => structure.extract(&subject, strict, screen),
        }
    }

    /// Non-strict extraction from any serializable value
    pub fn extract_from<T: Serialize>(&self, subject: &T, screen: Option<&Parameters>) -> Result<Value> {
        let subject = serde_json::to_value(subject)?;
        self.extract(&subject, false, screen)
    }

    /// Build a domain value from a canonical value.
    ///
    /// Children are instantiated first, then this field's instantiator, if
    /// any, is applied to the result.
    pub fn instantiate(&self, value: Value, key: Option<&str>) -> Result<Value> {
        let field = self.resolve()?;
        if value.is_null() {
            return Ok(Value::Null);
        }

        let value = match &field.node.kind {
            FieldKind::Leaf(_) | FieldKind::Undefined(_) => value,
            FieldKind::Sequence(sequence) => sequence.instantiate(value)?,
            FieldKind::Tuple(tuple) => tuple.instantiate(value)?,
            FieldKind::Union(_) => value,
            FieldKind::Map(map) => map.instantiate(value)?,
            FieldKind::Structure(structure) => structure.instantiate(value)?,
        };

        match &field.node.attrs.instantiator {
            Some(instantiator) => instantiator(field, value, key).map_err(SchemeError::CannotInstantiate),
            None => Ok(value),
        }
    }

    /// Instantiate, then deserialize into a typed domain object
    pub fn instantiate_as<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        let value = self.instantiate(value, None)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Substitute `${name}` parameters throughout `subject`
    pub fn interpolate(
        &self,
        subject: &Value,
        parameters: &Parameters,
        interpolator: Option<&Interpolator>,
    ) -> Result<Value> {
        let field = self.resolve()?;
        let interpolator = field.node.attrs.interpolator.as_ref().or(interpolator);

        let subject = match subject {
            Value::Null => return Ok(Value::Null),
            Value::String(template) => interpolate_parameters(template, parameters, true, interpolator)?,
            other => other.clone(),
        };

        match &field.node.kind {
            FieldKind::Leaf(_) | FieldKind::Undefined(_) | FieldKind::Union(_) => Ok(subject),
            FieldKind::Sequence(sequence) => sequence.interpolate(subject, parameters, interpolator),
            FieldKind::Tuple(tuple) => tuple.interpolate(subject, parameters, interpolator),
            FieldKind::Map(map) => map.interpolate(subject, parameters, interpolator),
            FieldKind::Structure(structure) => structure.interpolate(subject, parameters, interpolator),
        }
    }
}

// =============================================================================
// Graph rewriting
// =============================================================================

impl Field {
    /// Screen this field and its children.
    ///
    /// `None` excludes the field entirely; otherwise the result is this same
    /// node when nothing below it was excluded, or a copy without the
    /// excluded children.
    pub fn filter(&self, all: bool, params: &Parameters) -> Result<Option<Field>> {
        // placeholders must be defined but are not entered
        self.resolve()?;
        if !self.node.attrs.screen(all, params) {
            return Ok(None);
        }

        let kind = match &self.node.kind {
            FieldKind::Leaf(_) | FieldKind::Undefined(_) => None,
            FieldKind::Sequence(sequence) => sequence.filter(all, params)?.map(FieldKind::Sequence),
            FieldKind::Tuple(tuple) => tuple.filter(all, params)?.map(FieldKind::Tuple),
            FieldKind::Union(union) => union.filter(all, params)?.map(FieldKind::Union),
            FieldKind::Map(map) => map.filter(all, params)?.map(FieldKind::Map),
            FieldKind::Structure(structure) => structure.filter(all, params)?.map(FieldKind::Structure),
        };

        Ok(Some(match kind {
            Some(kind) => self.with_kind(kind),
            None => self.clone(),
        }))
    }

    /// Apply `transformer` to this field and, unless it replaces or prunes a
    /// node, to that node's children.
    ///
    /// Placeholders are visited but never entered, whether defined or not,
    /// so recursive graphs terminate. A node is copied only when at least one child changed, so an
    /// untouched graph comes back as the same node.
    pub fn transform(&self, mut transformer: impl FnMut(&Field) -> Transformation) -> Field {
        self.transform_with(&mut transformer)
    }

    pub(crate) fn transform_with(&self, transformer: &mut dyn FnMut(&Field) -> Transformation) -> Field {
        match transformer(self) {
            Transformation::Replace(field) => return field,
            Transformation::Prune => return self.clone(),
            Transformation::Unchanged => {}
        }

        let kind = match &self.node.kind {
            FieldKind::Leaf(_) | FieldKind::Undefined(_) => None,
            FieldKind::Sequence(sequence) => sequence.transform(transformer).map(FieldKind::Sequence),
            FieldKind::Tuple(tuple) => tuple.transform(transformer).map(FieldKind::Tuple),
            FieldKind::Union(union) => union.transform(transformer).map(FieldKind::Union),
            FieldKind::Map(map) => map.transform(transformer).map(FieldKind::Map),
            FieldKind::Structure(structure) => structure.transform(transformer).map(FieldKind::Structure),
        };

        match kind {
            Some(kind) => self.with_kind(kind),
            None => self.clone(),
        }
    }
}

/// Transform a child, reporting whether it came back as a different node
pub(crate) fn transform_child(
    field: &Field,
    transformer: &mut dyn FnMut(&Field) -> Transformation,
    changed: &mut bool,
) -> Field {
    let candidate = field.transform_with(transformer);
    if !candidate.ptr_eq(field) {
        *changed = true;
    }
    candidate
}
