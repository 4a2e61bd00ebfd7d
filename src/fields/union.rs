//! Ordered alternatives

use serde_json::Value;

use super::{describe_all, take_fields};
use crate::error::{Result, SchemeError};
use crate::field::{transform_child, Field, FieldKind, Parameters, Pass, Transformation};
use crate::structural::StructuralError;

/// Accepts a value if any candidate field does; candidates are tried in order
#[derive(Debug, Clone)]
pub struct Union {
    pub(crate) fields: Vec<Field>,
}

impl Union {
    pub fn new<I, F>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let fields: Vec<Field> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(SchemeError::Configuration("a union requires at least one field".to_string()));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn construct(params: &mut Parameters) -> Result<Field> {
        Ok(Union::new(take_fields(params, "fields")?)?.into())
    }

    /// First candidate to succeed wins; faults from any candidate abort
    pub(crate) fn process(&self, value: Value, pass: Pass<'_>) -> Result<Value> {
        let candidate = pass.deepen()?;
        for field in &self.fields {
            match field.run(value.clone(), candidate) {
                Ok(processed) => return Ok(processed),
                Err(error) if !error.is_fault() => continue,
                Err(fault) => return Err(fault),
            }
        }
        Err(StructuralError::raise("invalid", &pass.location()).into())
    }

    pub(crate) fn describe(
        &self,
        description: &mut Parameters,
        parameters: Option<&Parameters>,
        verbose: bool,
    ) -> Result<()> {
        description.insert("fields".to_string(), describe_all(&self.fields, parameters, verbose)?);
        Ok(())
    }

    pub(crate) fn extract(&self, subject: &Value, strict: bool, screen: Option<&Parameters>) -> Result<Value> {
        for field in &self.fields {
            match field.extract(subject, strict, screen) {
                Err(SchemeError::CannotExtract(_)) => continue,
                outcome => return outcome,
            }
        }
        Err(SchemeError::CannotExtract("no candidate field of this union can extract the value".to_string()))
    }

    /// Candidates that fail the screen are dropped; dropping all of them is an error
    pub(crate) fn filter(&self, all: bool, params: &Parameters) -> Result<Option<Self>> {
        let mut changed = false;
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match field.filter(all, params)? {
                Some(filtered) => {
                    changed |= !filtered.ptr_eq(field);
                    fields.push(filtered);
                }
                None => changed = true,
            }
        }
        if fields.is_empty() {
            return Err(SchemeError::CannotFilter("every candidate of this union was excluded".to_string()));
        }
        Ok(changed.then_some(Self { fields }))
    }

    pub(crate) fn transform(&self, transformer: &mut dyn FnMut(&Field) -> Transformation) -> Option<Self> {
        let mut changed = false;
        let fields = self
            .fields
            .iter()
            .map(|field| transform_child(field, transformer, &mut changed))
            .collect();
        changed.then_some(Self { fields })
    }

    pub(crate) fn children(&self) -> Vec<&Field> {
        self.fields.iter().collect()
    }
}

impl From<Union> for Field {
    fn from(union: Union) -> Self {
        Field::new(FieldKind::Union(union))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Phase::Inbound;
    use crate::undefined::Undefined;
    use serde_json::json;

    #[test]
    fn test_first_success_wins() {
        let field: Field = Union::new([Field::boolean(), Field::integer()]).unwrap().into();
        assert_eq!(field.process(json!(true), Inbound, false).unwrap(), json!(true));
        assert_eq!(field.process(json!(1), Inbound, false).unwrap(), json!(1));

        let error = field.process(json!("x"), Inbound, false).unwrap_err();
        let structural = error.structural().unwrap();
        assert_eq!(structural.tokens(), vec!["invalid"]);
        assert!(structural.structure().is_none());
    }

    #[test]
    fn test_self_referential_candidate_hits_recursion_limit() {
        let placeholder = Undefined::new();
        let field: Field = Union::new([placeholder.field(), Field::integer()]).unwrap().into();
        placeholder.define(field.clone()).unwrap();

        let options = crate::field::ProcessOptions::inbound().max_depth(16);
        match field.process_with(json!(1), &options) {
            Err(SchemeError::RecursionLimit { limit, .. }) => assert_eq!(limit, 16),
            other => panic!("Expected RecursionLimit, got {:?}", other),
        }
    }

    #[test]
    fn test_order_is_priority() {
        let field: Field = Union::new([Field::integer(), Field::text()]).unwrap().into();
        assert_eq!(field.process(json!("12"), Inbound, true).unwrap(), json!(12));

        let field: Field = Union::new([Field::text(), Field::integer()]).unwrap().into();
        assert_eq!(field.process(json!("12"), Inbound, true).unwrap(), json!("12"));
    }

    #[test]
    fn test_undefined_candidate_propagates() {
        let placeholder = Undefined::new();
        let field: Field = Union::new([Field::boolean(), placeholder.field()]).unwrap().into();
        match field.process(json!(1), Inbound, false) {
            Err(SchemeError::UndefinedField(_)) => {}
            other => panic!("Expected UndefinedField, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_drops_candidates() {
        let field: Field = Union::new([
            Field::integer().with_attribute("public", json!(true)),
            Field::text().with_attribute("public", json!(false)),
        ])
        .unwrap()
        .into();
        let params = json!({"public": true}).as_object().cloned().unwrap();
        let filtered = field.filter(true, &params).unwrap().unwrap();
        assert!(filtered.process(json!("a"), Inbound, false).is_err());
        assert!(filtered.process(json!(1), Inbound, false).is_ok());
    }
}
