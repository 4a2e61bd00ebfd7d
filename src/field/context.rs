//! Processing options and the per-call pass state

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SchemeError};

/// Default maximum nesting depth of a processed value
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Direction of conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// External representation to canonical
    #[default]
    Inbound,
    /// Canonical representation to external
    Outbound,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Inbound => write!(f, "inbound"),
            Phase::Outbound => write!(f, "outbound"),
        }
    }
}

/// Options for a single `process` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    pub phase: Phase,
    /// Scalars are in wire-text form and must be coerced
    pub serialized: bool,
    /// Skip required and default handling for absent keys at the top level
    pub partial: bool,
    /// Location of the root, defaults to the field name or `(field)`
    pub ancestry: Option<String>,
    pub max_depth: usize,
}

impl ProcessOptions {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            serialized: false,
            partial: false,
            ancestry: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn inbound() -> Self {
        Self::new(Phase::Inbound)
    }

    pub fn outbound() -> Self {
        Self::new(Phase::Outbound)
    }

    pub fn serialized(mut self, serialized: bool) -> Self {
        self.serialized = serialized;
        self
    }

    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn ancestry(mut self, ancestry: impl Into<String>) -> Self {
        self.ancestry = Some(ancestry.into());
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self::inbound()
    }
}

/// Location of the node being processed, linked back to the root
#[derive(Debug, Clone, Copy)]
pub(crate) enum Path<'a> {
    Root(&'a str),
    Key(&'a Path<'a>, &'a str),
    Index(&'a Path<'a>, usize),
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Root(name) => write!(f, "{}", name),
            Path::Key(parent, key) => write!(f, "{}.{}", parent, key),
            Path::Index(parent, index) => write!(f, "{}[{}]", parent, index),
        }
    }
}

/// State threaded through one recursive processing pass
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pass<'a> {
    pub phase: Phase,
    pub serialized: bool,
    pub partial: bool,
    pub depth: usize,
    pub max_depth: usize,
    pub path: &'a Path<'a>,
}

impl<'a> Pass<'a> {
    pub fn new(options: &ProcessOptions, path: &'a Path<'a>) -> Self {
        Self {
            phase: options.phase,
            serialized: options.serialized,
            partial: options.partial,
            depth: 0,
            max_depth: options.max_depth,
            path,
        }
    }

    /// Human-readable location of the current node
    pub fn location(&self) -> String {
        self.path.to_string()
    }

    /// Pass state for a child located at `path`; `partial` never carries over
    pub fn descend<'b>(&self, path: &'b Path<'b>) -> Result<Pass<'b>> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(SchemeError::RecursionLimit {
                limit: self.max_depth,
                location: path.to_string(),
            });
        }
        Ok(Pass {
            phase: self.phase,
            serialized: self.serialized,
            partial: false,
            depth,
            max_depth: self.max_depth,
            path,
        })
    }

    /// Pass state one level deeper at the same location, for composites
    /// that hand the whole value to a candidate
    pub fn deepen(&self) -> Result<Pass<'a>> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(SchemeError::RecursionLimit {
                limit: self.max_depth,
                location: self.location(),
            });
        }
        Ok(Pass { depth, ..*self })
    }

    /// Same node, same depth, different phase or serialization mode
    pub fn with_mode(&self, phase: Phase, serialized: bool) -> Pass<'a> {
        Pass {
            phase,
            serialized,
            ..*self
        }
    }
}
