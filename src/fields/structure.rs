//! Keyed composites with optional polymorphic variants
//!
//! A structure maps keys to fields. A polymorphic structure holds one such
//! definition per identity and picks one using the value of its
//! discriminator key. Every variant carries a copy of the discriminator
//! pinned to its own identity.
//!
//! ```text
//! Structure::builder()
//!     .polymorphic_on("type")
//!     .common([("id", Field::integer())])      // merged into every variant
//!     .variant("alpha", [("a", Field::integer())])
//!     .variant("beta", [("b", Field::text())])
//!     .build()?
//! ```

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};
use std::collections::HashMap;

use super::leaf::scalar_text;
use super::{take_bool, take_field, Enumeration};
use crate::describe::reconstruct_value;
use crate::error::{Result, SchemeError};
use crate::field::{
    transform_child, Field, FieldKind, FieldAttributes, Interpolator, Parameters, Pass, Path, Phase,
    Transformation,
};
use crate::structural::{Entry, StructuralError, Substructure};

/// Key to field mapping of one structure or one variant
pub type Definition = IndexMap<String, Field>;

/// Identity under which fields common to every variant are declared
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone)]
pub(crate) enum Layout {
    Single(Definition),
    Polymorphic {
        on: Field,
        variants: IndexMap<String, Definition>,
    },
}

/// Structure node data
#[derive(Debug, Clone)]
pub struct Structure {
    pub(crate) layout: Layout,
    pub(crate) strict: bool,
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Debug, Clone)]
enum Discriminator {
    Name(String),
    Field(Field),
}

/// Declares a structure; see the module documentation
#[derive(Debug, Clone)]
pub struct StructureBuilder {
    fields: Definition,
    variants: IndexMap<String, Definition>,
    common: Definition,
    discriminator: Option<Discriminator>,
    strict: bool,
    key_order: Option<Vec<String>>,
    variant_key_order: HashMap<String, Vec<String>>,
    generate_default: Option<Option<String>>,
}

impl Default for StructureBuilder {
    fn default() -> Self {
        Self {
            fields: Definition::new(),
            variants: IndexMap::new(),
            common: Definition::new(),
            discriminator: None,
            strict: true,
            key_order: None,
            variant_key_order: HashMap::new(),
            generate_default: None,
        }
    }
}

impl StructureBuilder {
    pub fn field(mut self, key: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(key.into(), field.into());
        self
    }

    pub fn fields<I, K, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        for (key, field) in fields {
            self.fields.insert(key.into(), field.into());
        }
        self
    }

    /// Declare a variant; the `*` identity declares common fields
    pub fn variant<I, K, F>(mut self, identity: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        let identity = identity.into();
        let target = if identity == WILDCARD {
            &mut self.common
        } else {
            self.variants.entry(identity).or_default()
        };
        for (key, field) in fields {
            target.insert(key.into(), field.into());
        }
        self
    }

    /// Fields merged into every variant, overriding same-named variant fields
    pub fn common<I, K, F>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        self.variant(WILDCARD, fields)
    }

    /// Discriminate on `name`, generating an enumeration of the variant identities
    pub fn polymorphic_on(mut self, name: impl Into<String>) -> Self {
        self.discriminator = Some(Discriminator::Name(name.into()));
        self
    }

    /// Discriminate using a named field of any kind
    pub fn polymorphic_on_field(mut self, field: Field) -> Self {
        self.discriminator = Some(Discriminator::Field(field));
        self
    }

    /// Reject unknown keys (on by default)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn key_order<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_order = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn variant_key_order<I, S>(mut self, identity: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variant_key_order
            .insert(identity.into(), keys.into_iter().map(Into::into).collect());
        self
    }

    /// Use the children's defaults as the structure's default
    pub fn generate_default(mut self) -> Self {
        self.generate_default = Some(None);
        self
    }

    /// Use the defaults of one variant as the structure's default
    pub fn generate_default_for(mut self, identity: impl Into<String>) -> Self {
        self.generate_default = Some(Some(identity.into()));
        self
    }

    pub fn build(self) -> Result<Field> {
        let strict = self.strict;
        let layout = match self.discriminator {
            None => {
                if !self.variants.is_empty() || !self.common.is_empty() {
                    return Err(SchemeError::Configuration(
                        "variants require a polymorphic discriminator".to_string(),
                    ));
                }
                let definition = name_children(self.fields);
                let definition = match &self.key_order {
                    Some(order) => apply_key_order(definition, order)?,
                    None => definition,
                };
                Layout::Single(definition)
            }
            Some(discriminator) => {
                if !self.fields.is_empty() {
                    return Err(SchemeError::Configuration(
                        "a polymorphic structure declares its fields per variant".to_string(),
                    ));
                }
                if self.variants.is_empty() {
                    return Err(SchemeError::Configuration(
                        "a polymorphic structure requires at least one variant".to_string(),
                    ));
                }

                let on = match discriminator {
                    Discriminator::Name(name) => {
                        let mut identities: Vec<&String> = self.variants.keys().collect();
                        identities.sort();
                        Field::from(Enumeration::new(identities.into_iter().cloned())?)
                            .nonempty()
                            .named(name)
                    }
                    Discriminator::Field(field) => {
                        if field.name().is_none() {
                            return Err(SchemeError::Configuration(
                                "the discriminator field must have a name".to_string(),
                            ));
                        }
                        field.required()
                    }
                };
                let name = on.label();

                let mut variants = IndexMap::with_capacity(self.variants.len());
                for (identity, mut definition) in self.variants {
                    for (key, field) in &self.common {
                        definition.insert(key.clone(), field.clone());
                    }
                    let constant = on
                        .process(Value::String(identity.clone()), Phase::Inbound, true)
                        .map_err(|_| {
                            SchemeError::Configuration(format!(
                                "'{}' is not a valid identity for discriminator '{}'",
                                identity, name
                            ))
                        })?;

                    let mut injected = Definition::with_capacity(definition.len() + 1);
                    injected.insert(name.clone(), on.clone().with_constant(constant));
                    definition.shift_remove(&name);
                    injected.extend(name_children(definition));

                    let order = self.variant_key_order.get(&identity).or(self.key_order.as_ref());
                    let injected = match order {
                        Some(order) => apply_key_order(injected, order)?,
                        None => injected,
                    };
                    variants.insert(identity, injected);
                }

                tracing::debug!(
                    discriminator = %name,
                    variants = variants.len(),
                    "declared polymorphic structure"
                );
                Layout::Polymorphic { on, variants }
            }
        };

        let structure = Structure { layout, strict };
        let default = match &self.generate_default {
            None => None,
            Some(identity) => Some(structure.generate_defaults(identity.as_deref(), true)?),
        };

        let field = Field::new(FieldKind::Structure(structure));
        Ok(match default {
            Some(default) => field.with_default(default),
            None => field,
        })
    }
}

fn name_children(definition: Definition) -> Definition {
    definition
        .into_iter()
        .map(|(key, field)| {
            let field = field.named(key.clone());
            (key, field)
        })
        .collect()
}

fn apply_key_order(mut definition: Definition, order: &[String]) -> Result<Definition> {
    let mut ordered = Definition::with_capacity(definition.len());
    for key in order {
        let field = definition.shift_remove(key).ok_or_else(|| {
            SchemeError::Configuration(format!("key_order names unknown key '{}'", key))
        })?;
        ordered.insert(key.clone(), field);
    }
    ordered.extend(definition);
    Ok(ordered)
}

// =============================================================================
// Structure
// =============================================================================

impl Structure {
    pub fn builder() -> StructureBuilder {
        StructureBuilder::default()
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.layout, Layout::Polymorphic { .. })
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The discriminator field, when polymorphic
    pub fn polymorphic_on(&self) -> Option<&Field> {
        match &self.layout {
            Layout::Polymorphic { on, .. } => Some(on),
            Layout::Single(_) => None,
        }
    }

    /// Variant identities in declaration order
    pub fn identities(&self) -> Vec<&str> {
        match &self.layout {
            Layout::Polymorphic { variants, .. } => variants.keys().map(String::as_str).collect(),
            Layout::Single(_) => Vec::new(),
        }
    }

    /// The definition for `identity`, or the only definition when not polymorphic
    pub fn definition(&self, identity: Option<&str>) -> Option<&Definition> {
        match (&self.layout, identity) {
            (Layout::Single(definition), None) => Some(definition),
            (Layout::Polymorphic { variants, .. }, Some(identity)) => variants.get(identity),
            _ => None,
        }
    }

    /// Field under `key` of a non-polymorphic structure
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.definition(None)?.get(key)
    }

    /// A polymorphic structure always requires its discriminator
    pub fn has_required_fields(&self) -> bool {
        match &self.layout {
            Layout::Polymorphic { .. } => true,
            Layout::Single(definition) => definition
                .values()
                .any(|field| field.is_required() && field.default_value().is_none()),
        }
    }

    fn definitions(&self) -> Box<dyn Iterator<Item = &Definition> + '_> {
        match &self.layout {
            Layout::Single(definition) => Box::new(std::iter::once(definition)),
            Layout::Polymorphic { variants, .. } => Box::new(variants.values()),
        }
    }

    fn discriminator_name(&self) -> Option<String> {
        self.polymorphic_on().map(Field::label)
    }

    /// Definition selected by the raw discriminator value in `subject`
    fn definition_of(&self, subject: Option<&JsonMap<String, Value>>) -> Option<&Definition> {
        match &self.layout {
            Layout::Single(definition) => Some(definition),
            Layout::Polymorphic { on, variants } => {
                let identity = subject?.get(&on.label())?;
                variants.get(&scalar_text(identity))
            }
        }
    }

    pub(crate) fn children(&self) -> Vec<&Field> {
        let mut children: Vec<&Field> = self.definitions().flat_map(|d| d.values()).collect();
        if let Some(on) = self.polymorphic_on() {
            children.push(on);
        }
        children
    }

    /// Collect each child's default (or constant) into a mapping.
    ///
    /// Sparse output omits children with neither; otherwise they map to null.
    /// A polymorphic structure without an `identity` yields one mapping per
    /// variant.
    pub fn generate_defaults(&self, identity: Option<&str>, sparse: bool) -> Result<Value> {
        match (&self.layout, identity) {
            (Layout::Single(definition), None) => default_values(definition, sparse),
            (Layout::Single(_), Some(identity)) => Err(SchemeError::Configuration(format!(
                "'{}' given as identity of a non-polymorphic structure",
                identity
            ))),
            (Layout::Polymorphic { variants, .. }, Some(identity)) => {
                let definition = variants.get(identity).ok_or_else(|| {
                    SchemeError::Configuration(format!("'{}' is not a polymorphic identity", identity))
                })?;
                default_values(definition, sparse)
            }
            (Layout::Polymorphic { variants, .. }, None) => {
                let mut defaults = JsonMap::new();
                for (identity, definition) in variants {
                    defaults.insert(identity.clone(), default_values(definition, sparse)?);
                }
                Ok(Value::Object(defaults))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Processing
    // -------------------------------------------------------------------------

    pub(crate) fn process(&self, value: Value, pass: Pass<'_>) -> Result<Value> {
        let Value::Object(mut input) = value else {
            return Err(StructuralError::raise("invalid", &pass.location()).into());
        };

        let definition = match &self.layout {
            Layout::Single(definition) => definition,
            Layout::Polymorphic { on, variants } => {
                let name = on.label();
                let raw = match input.get(&name) {
                    Some(raw) if !raw.is_null() => raw.clone(),
                    _ => return Err(required(&pass, &name).into()),
                };
                let path = Path::Key(pass.path, &name);
                let identity = match on.run(raw.clone(), pass.descend(&path)?) {
                    Ok(identity) => scalar_text(&identity),
                    Err(error) => {
                        let mut entries = IndexMap::new();
                        entries.insert(name.clone(), Entry::Error(error.into_structural()?));
                        let error = unrecognized(&pass, scalar_text(&raw));
                        return Err(error.with_structure(Substructure::Mapping(entries)).into());
                    }
                };
                match variants.get(&identity) {
                    Some(definition) => {
                        tracing::trace!(identity = %identity, location = %pass.path, "selected variant");
                        definition
                    }
                    None => return Err(unrecognized(&pass, identity).into()),
                }
            }
        };

        let mut valid = true;
        let mut entries = IndexMap::with_capacity(definition.len());
        for (key, field) in definition {
            let target = field.resolve()?;
            let value = match input.remove(key) {
                Some(value) => value,
                None if pass.partial => continue,
                None => {
                    let default = field.default_value().or(target.default_value());
                    match default {
                        Some(default) if pass.phase == Phase::Inbound => default.clone(),
                        _ if field.is_required() || target.is_required() => {
                            valid = false;
                            entries.insert(key.clone(), Entry::Error(required(&pass, key)));
                            continue;
                        }
                        _ => continue,
                    }
                }
            };

            let ignore_null = field.attributes().ignore_null || target.attributes().ignore_null;
            if value.is_null() && ignore_null {
                continue;
            }

            let path = Path::Key(pass.path, key);
            let outcome = field.run(value, pass.descend(&path)?);
            entries.insert(key.clone(), Entry::collect(outcome, &mut valid)?);
        }

        if self.strict {
            for (key, _) in input {
                valid = false;
                let mut params = JsonMap::new();
                params.insert("name".to_string(), Value::String(key.clone()));
                let error = StructuralError::raise_with("unknown", &pass.location(), params);
                entries.insert(key, Entry::Error(error));
            }
        }

        if valid {
            Ok(Substructure::Mapping(entries).into_value())
        } else {
            let error = StructuralError::at(&pass.location()).with_structure(Substructure::Mapping(entries));
            Err(error.into())
        }
    }

    // -------------------------------------------------------------------------
    // Schema as data
    // -------------------------------------------------------------------------

    pub(crate) fn describe(
        &self,
        _attrs: &FieldAttributes,
        description: &mut Parameters,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<()> {
        let structure = match &self.layout {
            Layout::Single(definition) => describe_definition(definition, None, parameters, verbose)?,
            Layout::Polymorphic { on, variants } => {
                let name = on.label();
                let mut described = JsonMap::new();
                for (identity, definition) in variants {
                    described.insert(
                        identity.clone(),
                        describe_definition(definition, Some(&name), parameters, verbose)?,
                    );
                }
                description.insert("polymorphic_on".to_string(), on.describe(parameters, verbose)?);
                Value::Object(described)
            }
        };
        description.insert("structure".to_string(), structure);
        if !self.strict || verbose {
            description.insert("strict".to_string(), Value::Bool(self.strict));
        }
        Ok(())
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        let strict = take_bool(params, "strict")?.unwrap_or(true);
        let on = take_field(params, "polymorphic_on")?;
        let structure = match params.remove("structure") {
            Some(Value::Object(structure)) => structure,
            other => {
                return Err(SchemeError::InvalidDescription(format!(
                    "structure requires a 'structure' mapping, got {:?}",
                    other
                )))
            }
        };

        let mut builder = Structure::builder().strict(strict);
        match on {
            None => {
                for (key, description) in &structure {
                    builder = builder.field(key.clone(), reconstruct_value(description)?);
                }
            }
            Some(on) => {
                for (identity, definition) in &structure {
                    let definition = definition.as_object().ok_or_else(|| {
                        SchemeError::InvalidDescription(format!("variant '{}' must be a mapping", identity))
                    })?;
                    let mut fields = Vec::with_capacity(definition.len());
                    for (key, description) in definition {
                        fields.push((key.clone(), reconstruct_value(description)?));
                    }
                    builder = builder.variant(identity.clone(), fields);
                }
                builder = builder.polymorphic_on_field(on);
            }
        }
        builder.build()
    }

    // -------------------------------------------------------------------------
    // Extraction, instantiation and interpolation
    // -------------------------------------------------------------------------

    pub(crate) fn extract(&self, subject: &Value, strict: bool, screen: Option<&Parameters>) -> Result<Value> {
        let entries = match subject {
            Value::Object(entries) => Some(entries),
            _ if !strict => None,
            _ => {
                return Err(SchemeError::CannotExtract(
                    "extraction candidate must be a mapping".to_string(),
                ))
            }
        };
        let definition = self.definition_of(entries).ok_or_else(|| {
            SchemeError::CannotExtract("extraction candidate has no recognized polymorphic identity".to_string())
        })?;

        let mut extraction = JsonMap::new();
        for (key, field) in definition {
            let value = match entries.and_then(|entries| entries.get(key)) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            match field.extract(value, strict, screen) {
                Ok(value) => {
                    extraction.insert(key.clone(), value);
                }
                Err(SchemeError::FieldExcluded(_)) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(Value::Object(extraction))
    }

    pub(crate) fn instantiate(&self, value: Value) -> Result<Value> {
        let Value::Object(entries) = value else {
            return Err(SchemeError::CannotInstantiate("value must be a mapping".to_string()));
        };
        let definition = self.definition_of(Some(&entries)).ok_or_else(|| {
            SchemeError::CannotInstantiate("value has no recognized polymorphic identity".to_string())
        })?;

        let mut instantiated = JsonMap::new();
        for (key, value) in entries {
            let field = definition.get(&key).ok_or_else(|| {
                SchemeError::CannotInstantiate(format!("'{}' is not a key of this structure", key))
            })?;
            let value = field.instantiate(value, Some(&key))?;
            instantiated.insert(key, value);
        }
        Ok(Value::Object(instantiated))
    }

    /// Keys referencing undefined parameters are left out
    pub(crate) fn interpolate(
        &self,
        subject: Value,
        parameters: &Parameters,
        interpolator: Option<&Interpolator>,
    ) -> Result<Value> {
        let Value::Object(entries) = subject else {
            return Err(SchemeError::CannotInterpolate(
                "interpolation candidate must be a mapping".to_string(),
            ));
        };
        let definition = self.definition_of(Some(&entries)).ok_or_else(|| {
            SchemeError::CannotInterpolate("candidate has no recognized polymorphic identity".to_string())
        })?;

        let mut interpolation = JsonMap::new();
        for (key, field) in definition {
            let Some(value) = entries.get(key) else {
                continue;
            };
            match field.interpolate(value, parameters, interpolator) {
                Ok(value) => {
                    interpolation.insert(key.clone(), value);
                }
                Err(SchemeError::UndefinedParameter(_)) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(Value::Object(interpolation))
    }

    // -------------------------------------------------------------------------
    // Graph rewriting
    // -------------------------------------------------------------------------

    /// Apply `rewrite` to every definition; `None` when no definition changed
    fn rewrite(&self, mut rewrite: impl FnMut(&Definition) -> Result<Option<Definition>>) -> Result<Option<Self>> {
        let layout = match &self.layout {
            Layout::Single(definition) => rewrite(definition)?.map(Layout::Single),
            Layout::Polymorphic { on, variants } => {
                let mut changed = false;
                let mut rewritten = IndexMap::with_capacity(variants.len());
                for (identity, definition) in variants {
                    match rewrite(definition)? {
                        Some(definition) => {
                            changed = true;
                            rewritten.insert(identity.clone(), definition);
                        }
                        None => {
                            rewritten.insert(identity.clone(), definition.clone());
                        }
                    }
                }
                changed.then(|| Layout::Polymorphic {
                    on: on.clone(),
                    variants: rewritten,
                })
            }
        };
        Ok(layout.map(|layout| Self {
            layout,
            strict: self.strict,
        }))
    }

    pub(crate) fn filter(&self, all: bool, params: &Parameters) -> Result<Option<Self>> {
        let discriminator = self.discriminator_name();
        self.rewrite(|definition| {
            let mut changed = false;
            let mut filtered = Definition::with_capacity(definition.len());
            for (key, field) in definition {
                if discriminator.as_deref() == Some(key.as_str()) {
                    filtered.insert(key.clone(), field.clone());
                    continue;
                }
                match field.filter(all, params)? {
                    Some(candidate) => {
                        changed |= !candidate.ptr_eq(field);
                        filtered.insert(key.clone(), candidate);
                    }
                    None => changed = true,
                }
            }
            Ok(changed.then_some(filtered))
        })
    }

    pub(crate) fn transform(&self, transformer: &mut dyn FnMut(&Field) -> Transformation) -> Option<Self> {
        let rewritten = self.rewrite(|definition| {
            let mut changed = false;
            let transformed: Definition = definition
                .iter()
                .map(|(key, field)| (key.clone(), transform_child(field, transformer, &mut changed)))
                .collect();
            Ok(changed.then_some(transformed))
        });
        rewritten.ok().flatten()
    }

    fn guard_discriminator<'k>(&self, keys: impl IntoIterator<Item = &'k String>) -> Result<()> {
        if let Some(name) = self.discriminator_name() {
            if keys.into_iter().any(|key| *key == name) {
                return Err(SchemeError::Configuration(format!(
                    "the discriminator '{}' cannot be modified",
                    name
                )));
            }
        }
        Ok(())
    }

    fn put(&self, incoming: &Definition, overwrite: bool, only_existing: bool) -> Result<Option<Self>> {
        self.guard_discriminator(incoming.keys())?;
        self.rewrite(|definition| {
            let mut updated = definition.clone();
            let mut changed = false;
            for (key, field) in incoming {
                let exists = updated.contains_key(key);
                if (exists && !overwrite) || (!exists && only_existing) {
                    continue;
                }
                updated.insert(key.clone(), field.clone().named(key.clone()));
                changed = true;
            }
            Ok(changed.then_some(updated))
        })
    }
}

fn required(pass: &Pass<'_>, name: &str) -> StructuralError {
    let mut params = JsonMap::new();
    params.insert("name".to_string(), Value::String(name.to_string()));
    StructuralError::raise_with("required", &pass.location(), params)
}

fn unrecognized(pass: &Pass<'_>, identity: String) -> StructuralError {
    let mut params = JsonMap::new();
    params.insert("identity".to_string(), Value::String(identity));
    StructuralError::raise_with("unrecognized", &pass.location(), params)
}

fn default_values(definition: &Definition, sparse: bool) -> Result<Value> {
    let mut defaults = JsonMap::new();
    for (key, field) in definition {
        let target = field.resolve()?;
        let value = field
            .default_value()
            .or(target.default_value())
            .or(target.constant())
            .cloned();
        match value {
            Some(value) => {
                defaults.insert(key.clone(), value);
            }
            None if !sparse => {
                defaults.insert(key.clone(), Value::Null);
            }
            None => {}
        }
    }
    Ok(Value::Object(defaults))
}

fn describe_definition(
    definition: &Definition,
    skip: Option<&str>,
    parameters: Option<&Parameters>,
    verbose: bool,
) -> Result<Value> {
    let mut described = JsonMap::new();
    for (key, field) in definition {
        if skip == Some(key.as_str()) {
            continue;
        }
        described.insert(key.clone(), field.describe(parameters, verbose)?);
    }
    Ok(Value::Object(described))
}

fn collect_definition<I, K, F>(fields: I) -> Result<Definition>
where
    I: IntoIterator<Item = (K, F)>,
    K: Into<String>,
    F: Into<Field>,
{
    Ok(fields
        .into_iter()
        .map(|(key, field)| (key.into(), field.into()))
        .collect())
}

// =============================================================================
// Schema authoring on fields
// =============================================================================

impl Field {
    fn restructure(&self, apply: impl FnOnce(&Structure) -> Result<Option<Structure>>) -> Result<Field> {
        let structure = self.as_structure().ok_or_else(|| {
            SchemeError::Configuration(format!("a {} field is not a structure", self.fieldtype()))
        })?;
        Ok(match apply(structure)? {
            Some(structure) => self.with_kind(FieldKind::Structure(structure)),
            None => self.clone(),
        })
    }

    /// New structure with `fields` added, replacing same-named keys
    pub fn extend<I, K, F>(&self, fields: I) -> Result<Field>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        let incoming = collect_definition(fields)?;
        self.restructure(|structure| structure.put(&incoming, true, false))
    }

    /// New structure with a named `field` added under its name
    pub fn insert(&self, field: Field, overwrite: bool) -> Result<Field> {
        let name = field
            .name()
            .ok_or_else(|| SchemeError::Configuration("an inserted field must have a name".to_string()))?
            .to_string();
        let mut incoming = Definition::new();
        incoming.insert(name, field);
        self.restructure(|structure| structure.put(&incoming, overwrite, false))
    }

    /// New structure with `fields` merged in.
    ///
    /// Colliding keys keep the existing field unless `prefer` is set.
    pub fn merge<I, K, F>(&self, fields: I, prefer: bool) -> Result<Field>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        let incoming = collect_definition(fields)?;
        self.restructure(|structure| structure.put(&incoming, prefer, false))
    }

    /// New structure with the fields under `keys` replaced; unknown keys are
    /// ignored and the same node is returned when nothing matched
    pub fn replace<I, K, F>(&self, fields: I) -> Result<Field>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        let incoming = collect_definition(fields)?;
        self.restructure(|structure| structure.put(&incoming, true, true))
    }

    /// New structure without the fields under `keys`
    pub fn remove(&self, keys: &[&str]) -> Result<Field> {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        self.restructure(|structure| {
            structure.guard_discriminator(&keys)?;
            structure.rewrite(|definition| {
                if !keys.iter().any(|key| definition.contains_key(key)) {
                    return Ok(None);
                }
                let mut updated = definition.clone();
                for key in &keys {
                    updated.shift_remove(key);
                }
                Ok(Some(updated))
            })
        })
    }

    /// See [`Structure::generate_defaults`]
    pub fn generate_defaults(&self, identity: Option<&str>, sparse: bool) -> Result<Value> {
        let structure = self.resolve()?.as_structure().ok_or_else(|| {
            SchemeError::Configuration(format!("a {} field is not a structure", self.fieldtype()))
        })?;
        structure.generate_defaults(identity, sparse)
    }
}
