//! Two-phase schema linking
//!
//! Schemas that refer to themselves, or to each other, are declared under
//! names first and linked afterwards:
//!
//! ```text
//! let node = Structure::builder()
//!     .field("value", Field::integer())
//!     .field("children", Sequence::new(Field::reference("node")))
//!     .build()?;
//! let schemas = SchemaBuilder::new().declare("node", node).link()?;
//! ```
//!
//! [`SchemaBuilder::link`] binds every named reference to its declared
//! schema, so a linked graph never fails with an undefined field.
//! Dependencies between declared schemas are kept in a petgraph graph and
//! its strongly connected components are reported as recursive groups.

use indexmap::IndexMap;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::{Map as JsonMap, Value};
use std::collections::{HashMap, HashSet};

use crate::describe::reconstruct_value;
use crate::error::{Result, SchemeError};
use crate::field::{Field, FieldKind};
use crate::undefined::Undefined;

/// Declaration phase
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    declared: IndexMap<String, Field>,
    duplicates: Vec<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `field` under `name`; each name may be declared once
    pub fn declare(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        let name = name.into();
        if self.declared.contains_key(&name) {
            self.duplicates.push(name);
        } else {
            self.declared.insert(name, field.into());
        }
        self
    }

    /// Bind every named reference reachable from the declared schemas
    pub fn link(self) -> Result<Schemas> {
        if !self.duplicates.is_empty() {
            return Err(SchemeError::Configuration(format!(
                "schemas declared more than once: {}",
                self.duplicates.join(", ")
            )));
        }

        let mut graph: DiGraph<String, ()> = DiGraph::with_capacity(self.declared.len(), self.declared.len() * 2);
        let indices: HashMap<String, NodeIndex> = self
            .declared
            .keys()
            .map(|name| (name.clone(), graph.add_node(name.clone())))
            .collect();

        let mut bindings: Vec<(Undefined, String)> = Vec::new();
        for (name, field) in &self.declared {
            for placeholder in references(field) {
                let Some(target) = placeholder.target().map(str::to_string) else {
                    continue;
                };
                let target_idx = *indices.get(&target).ok_or_else(|| {
                    SchemeError::Configuration(format!(
                        "schema '{}' references undeclared schema '{}'",
                        name, target
                    ))
                })?;
                let from_idx = indices[name];
                if graph.find_edge(from_idx, target_idx).is_none() {
                    graph.add_edge(from_idx, target_idx, ());
                }
                bindings.push((placeholder, target));
            }
        }

        self.check_aliases()?;

        let mut defined = 0;
        for (placeholder, target) in bindings {
            if placeholder.is_defined() {
                continue;
            }
            placeholder.define(self.declared[&target].clone())?;
            defined += 1;
        }

        let recursive_groups: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || graph
                        .edges_directed(scc[0], Direction::Outgoing)
                        .any(|edge| edge.target() == scc[0])
            })
            .map(|scc| {
                let mut members: Vec<String> = scc
                    .into_iter()
                    .filter_map(|idx| graph.node_weight(idx).cloned())
                    .collect();
                members.sort();
                members
            })
            .collect();

        for group in &recursive_groups {
            tracing::debug!(members = ?group, "recursive schema group");
        }
        tracing::debug!(
            schemas = self.declared.len(),
            references = defined,
            recursive = recursive_groups.len(),
            "linked schemas"
        );

        Ok(Schemas {
            fields: self.declared,
            graph,
            indices,
            recursive_groups,
        })
    }

    /// A declared schema that is only a reference must not lead back to itself
    fn check_aliases(&self) -> Result<()> {
        for name in self.declared.keys() {
            let mut seen = HashSet::new();
            let mut current = name.as_str();
            while let Some(FieldKind::Undefined(placeholder)) = self.declared.get(current).map(Field::kind) {
                if !seen.insert(current) {
                    return Err(SchemeError::Configuration(format!(
                        "schema '{}' is an alias cycle",
                        name
                    )));
                }
                match placeholder.target() {
                    Some(target) => current = target,
                    None => break,
                }
            }
        }
        Ok(())
    }
}

/// Placeholders reachable from `field` without following any reference
fn references(field: &Field) -> Vec<Undefined> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![field];
    while let Some(current) = stack.pop() {
        if !visited.insert(current.node_id()) {
            continue;
        }
        if let FieldKind::Undefined(placeholder) = current.kind() {
            found.push(placeholder.clone());
        }
        stack.extend(current.children());
    }
    found
}

/// Linked schemas
#[derive(Debug)]
pub struct Schemas {
    fields: IndexMap<String, Field>,
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    recursive_groups: Vec<Vec<String>>,
}

impl Schemas {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Declared names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Schemas that `name` references directly, sorted
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut targets: Vec<&str> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|edge| self.graph.node_weight(edge.target()).map(String::as_str))
            .collect();
        targets.sort();
        targets
    }

    /// Groups of schemas that reach themselves through references
    pub fn recursive_groups(&self) -> &[Vec<String>] {
        &self.recursive_groups
    }

    pub fn is_recursive(&self, name: &str) -> bool {
        self.recursive_groups.iter().any(|group| group.iter().any(|member| member == name))
    }

    /// Descriptions of every schema keyed by name; references stay references
    pub fn describe(&self, verbose: bool) -> Result<Value> {
        let mut descriptions = JsonMap::new();
        for (name, field) in &self.fields {
            descriptions.insert(name.clone(), field.describe(None, verbose)?);
        }
        Ok(Value::Object(descriptions))
    }

    /// Reconstruct and link the output of [`Schemas::describe`]
    pub fn reconstruct(descriptions: &Value) -> Result<Schemas> {
        let descriptions = descriptions.as_object().ok_or_else(|| {
            SchemeError::InvalidDescription("schema set must map names to descriptions".to_string())
        })?;
        descriptions
            .iter()
            .try_fold(SchemaBuilder::new(), |builder, (name, description)| {
                Ok::<_, SchemeError>(builder.declare(name.clone(), reconstruct_value(description)?))
            })?
            .link()
    }
}
