//! Forward references
//!
//! An [`Undefined`] placeholder stands in for a field that is not known yet.
//! Its proxy nodes can be placed anywhere in a graph, including inside the
//! field that will later define it. Until [`Undefined::define`] is called,
//! every operation reaching a proxy fails with
//! [`SchemeError::UndefinedField`]; afterwards the proxy is transparent.
//!
//! Most schemas do not use placeholders directly: named references created
//! with [`Field::reference`] are bound by [`SchemaBuilder`](crate::SchemaBuilder).

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::{Result, SchemeError};
use crate::field::{Field, FieldKind, Parameters};

type Callback = Box<dyn FnOnce(&Field) + Send>;

struct Placeholder {
    target: Option<String>,
    field: OnceLock<Field>,
    pending: Mutex<Vec<Callback>>,
}

/// Shared handle to a placeholder; clones refer to the same placeholder
#[derive(Clone)]
pub struct Undefined {
    inner: Arc<Placeholder>,
}

impl Undefined {
    /// Anonymous placeholder
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Placeholder for the schema declared under `target`
    pub fn named(target: impl Into<String>) -> Self {
        Self::build(Some(target.into()))
    }

    /// Placeholder that is already defined
    pub fn with_field(field: Field) -> Self {
        let placeholder = Self::new();
        let _ = placeholder.inner.field.set(field);
        placeholder
    }

    fn build(target: Option<String>) -> Self {
        Self {
            inner: Arc::new(Placeholder {
                target,
                field: OnceLock::new(),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.inner.target.as_deref()
    }

    pub fn is_defined(&self) -> bool {
        self.inner.field.get().is_some()
    }

    pub fn get(&self) -> Option<&Field> {
        self.inner.field.get()
    }

    /// Both handles refer to the same placeholder
    pub fn same(&self, other: &Undefined) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A new proxy node for this placeholder
    pub fn field(&self) -> Field {
        Field::new(FieldKind::Undefined(self.clone()))
    }

    /// Run `callback` with the defining field, immediately if already defined
    pub fn register(&self, callback: impl FnOnce(&Field) + Send + 'static) {
        if let Some(field) = self.inner.field.get() {
            callback(field);
            return;
        }
        let mut pending = self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match self.inner.field.get() {
            Some(field) => {
                drop(pending);
                callback(field);
            }
            None => pending.push(Box::new(callback)),
        }
    }

    /// Bind the placeholder to `field` and replay registered callbacks.
    ///
    /// A placeholder can be defined once, and never as a proxy of itself.
    pub fn define(&self, field: Field) -> Result<()> {
        if let FieldKind::Undefined(other) = field.kind() {
            if self.same(other) {
                return Err(SchemeError::Configuration(format!(
                    "placeholder {} cannot be defined as itself",
                    self
                )));
            }
        }

        let callbacks = {
            let mut pending = self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if self.inner.field.set(field).is_err() {
                return Err(SchemeError::Configuration(format!(
                    "placeholder {} is already defined",
                    self
                )));
            }
            std::mem::take(&mut *pending)
        };

        tracing::debug!(placeholder = %self, callbacks = callbacks.len(), "defined placeholder");
        if let Some(field) = self.inner.field.get() {
            for callback in callbacks {
                callback(field);
            }
        }
        Ok(())
    }

    /// The defining field, or an error naming `location`
    pub(crate) fn resolve(&self, location: &dyn fmt::Display) -> Result<&Field> {
        self.inner.field.get().ok_or_else(|| {
            SchemeError::UndefinedField(format!("{} refers to undefined {}", location, self))
        })
    }

    /// Named placeholders describe as a reference so recursive graphs
    /// terminate; anonymous ones describe the field they stand for.
    pub(crate) fn describe(&self, proxy: &Field, parameters: Option<&Parameters>, verbose: bool) -> Result<Value> {
        match &self.inner.target {
            Some(target) => {
                let mut description = Parameters::new();
                description.insert("fieldtype".to_string(), Value::String("undefined".to_string()));
                description.insert("target".to_string(), Value::String(target.clone()));
                proxy.attributes().describe_common(&mut description, verbose);
                Ok(Value::Object(description))
            }
            None => self.resolve(&proxy.label())?.describe(parameters, verbose),
        }
    }
}

impl Default for Undefined {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Undefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.target {
            Some(target) => write!(f, "'{}'", target),
            None => write!(f, "(anonymous)"),
        }
    }
}

impl fmt::Debug for Undefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Undefined")
            .field("target", &self.inner.target)
            .field("defined", &self.is_defined())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Phase::Inbound;
    use crate::fields::Sequence;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_undefined_until_defined() {
        let placeholder = Undefined::new();
        let field: Field = Sequence::new(placeholder.field()).into();

        match field.process(json!([1, 2]), Inbound, false) {
            Err(SchemeError::UndefinedField(message)) => assert!(message.contains("(field)[0]")),
            other => panic!("Expected UndefinedField, got {:?}", other),
        }
        assert!(field.describe(None, false).is_err());

        placeholder.define(Field::integer()).unwrap();
        assert_eq!(field.process(json!([1, 2]), Inbound, false).unwrap(), json!([1, 2]));
        assert!(field.process(json!(["x"]), Inbound, false).is_err());
        assert_eq!(
            field.describe(None, false).unwrap(),
            json!({"fieldtype": "sequence", "item": {"fieldtype": "integer"}})
        );
    }

    #[test]
    fn test_empty_sequence_never_reaches_placeholder() {
        let field: Field = Sequence::new(Undefined::new().field()).into();
        assert_eq!(field.process(json!([]), Inbound, false).unwrap(), json!([]));
    }

    #[test]
    fn test_with_field_is_transparent() {
        let field = Undefined::with_field(Field::boolean()).field();
        assert_eq!(field.process(json!(true), Inbound, false).unwrap(), json!(true));
        assert_eq!(field.resolve().unwrap().fieldtype(), "boolean");
    }

    #[test]
    fn test_register_replays_on_define() {
        let placeholder = Undefined::new();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            placeholder.register(move |field| {
                assert_eq!(field.fieldtype(), "text");
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        placeholder.define(Field::text()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        let late = Arc::clone(&seen);
        placeholder.register(move |_| {
            late.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_define_once() {
        let placeholder = Undefined::named("node");
        assert!(placeholder.define(placeholder.field()).is_err());
        placeholder.define(Field::integer()).unwrap();
        assert!(matches!(
            placeholder.define(Field::text()),
            Err(SchemeError::Configuration(_))
        ));
    }

    #[test]
    fn test_named_placeholder_describes_as_reference() {
        let placeholder = Undefined::named("node");
        let proxy = placeholder.field().required();
        assert_eq!(
            proxy.describe(None, false).unwrap(),
            json!({"fieldtype": "undefined", "target": "node", "required": true})
        );
        placeholder.define(Field::integer()).unwrap();
        assert_eq!(proxy.describe(None, false).unwrap()["fieldtype"], json!("undefined"));
    }
}
