//! Familiar Scheme
//!
//! Declarative schemas for validating and converting structured values, and
//! for shipping those schemas between processes as plain data.
//!
//! ## Features
//!
//! - **Field graphs**: immutable, shareable schema nodes built from leaves
//!   (text, numbers, booleans, enumerations) and composites (sequences,
//!   tuples, unions, maps, structures)
//! - **Polymorphic structures**: variants selected by a discriminator key,
//!   with fields common to every variant merged in
//! - **Structural errors**: failures mirror the shape of the rejected value
//!   and survive a round trip through their wire form
//! - **Forward references**: self-referential and mutually recursive
//!   schemas, bound by a two-phase [`SchemaBuilder`]
//! - **Schema as data**: [`Field::describe`] and [`reconstruct`] convert
//!   between graphs and descriptions
//!
//! ## Example
//!
//! ```
//! use familiar_scheme::{Field, Phase, Structure};
//! use serde_json::json;
//!
//! let point = Structure::builder()
//!     .field("x", Field::integer().required())
//!     .field("y", Field::integer().with_default(0))
//!     .build()
//!     .unwrap();
//!
//! let value = point.process(json!({"x": 3}), Phase::Inbound, false).unwrap();
//! assert_eq!(value, json!({"x": 3, "y": 0}));
//!
//! let error = point.process(json!({"x": "three"}), Phase::Inbound, false).unwrap_err();
//! assert_eq!(error.structural().unwrap().child("x").unwrap().tokens(), vec!["invalid"]);
//! ```

pub mod builder;
pub mod config;
pub mod describe;
pub mod error;
pub mod field;
pub mod fields;
pub mod fingerprint;
pub mod format;
pub mod interpolation;
pub mod structural;
pub mod undefined;

pub use builder::{SchemaBuilder, Schemas};
pub use config::SchemeConfig;
pub use describe::{construct, reconstruct, register_fieldtype, visit, FieldType, Specification};
pub use error::{Result, SchemeError};
pub use field::{Attribute, Field, FieldKind, Parameters, Phase, ProcessOptions, Transformation};
pub use fields::{
    Boolean, Definition, Enumeration, FieldDefinition, Float, Integer, LeafKind, Map, Sequence, Strategy,
    Structure, StructureBuilder, Text, Tuple, Union, Violation,
};
pub use fingerprint::Fingerprint;
pub use format::{Format, Json, Yaml};
pub use interpolation::interpolate_parameters;
pub use structural::{Entry, ErrorEntry, StructuralError, Substructure};
pub use undefined::Undefined;
