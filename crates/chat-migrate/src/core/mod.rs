//! Core abstractions shared by every pipeline.
//!
//! - [`identifier`]: deterministic source-id to UUID translation
//! - [`schema`]: destination relation catalogue
//! - [`value`]: store-neutral column values
//! - [`traits`]: source and target collaborator traits

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use identifier::{translate, translate_bson, NAMESPACE};
pub use schema::{Relation, StoreKind};
pub use traits::{DocumentStream, RelationRows, SourceReader, TargetWriter};
pub use value::{Row, SqlNullType, SqlValue};
