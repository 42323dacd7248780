//! Schema layer for scriptwire.
//!
//! A [`Schema`] is an ordered list of typed fields. It is validated once at
//! construction and then drives both directions of the codec:
//! [`Schema::encode`] writes a [`Record`] field by field through the
//! primitive catalog, and [`Schema::decode`] reads it back.
//!
//! Peers agree on type identity through the canonical [`signature`] of a
//! schema. Schemas can also be declared in JSON files, see [`decl`].

pub mod codec;
pub mod config;
pub mod decl;
pub mod error;
pub mod json;
pub mod signature;
pub mod types;
pub mod value;

pub use config::SchemaLoadConfig;
pub use decl::{DeclKind, Declaration, Declarations, TypeExpr};
pub use error::{Result, SchemaError};
pub use signature::{signature, Builtin, BuiltinIds};
pub use types::{Field, FieldKey, Layout, Schema, TypeId, WireType};
pub use value::{Record, Value};
