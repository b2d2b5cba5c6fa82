//! Trait schemas for the stratum engine
//!
//! - [`declaration`]: trait kinds and declarations
//! - [`schema`]: ordered trait schemas, removal markers, deferred references
//! - [`mix`]: composing schemas from fragments
//! - [`describe`]: JSON-Schema-shaped documentation output

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod declaration;
pub mod describe;
pub mod mix;
pub mod schema;

pub use declaration::{
    IdProperty, MergeStrategy, PrimitiveType, TraitDeclaration, TraitKind, INDEX_FIELD,
};
pub use describe::{describe, describe_with, DescribeOptions, DEFAULT_SCHEMA_URI};
pub use mix::mix_traits;
pub use schema::{RemovalMarker, SchemaRef, TraitSchema, TraitSchemaBuilder};
