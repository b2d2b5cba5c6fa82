//! Resolution engine for layered catalog entities
//!
//! This crate turns schemas and strata into effective values:
//! - Entity: per-owner stratum storage, typed resolution, writes
//! - Views: nested entities projected from their owner's storage
//! - Resolvers: first-wins, tombstones, identity merge of object arrays
//! - Catalog: stratum order, kind factory, entity registry
//! - JSON import/export and TOML configuration
//!
//! Resolution never fails: missing values resolve to the declared default or
//! to nothing. Writes are validated against the schema and return
//! `StrataResult`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod entity;
pub mod notify;
pub mod resolve;
pub mod serialize;
pub mod view;

pub use catalog::Catalog;
pub use config::{CatalogConfig, DescribeConfig, StratumConfig, CONFIG_FILE_NAME};
pub use entity::Entity;
pub use notify::{Listener, SubscriptionId, TraitChanged};
pub use serialize::{import_stratum, stratum_from_json, stratum_to_json, validate_stratum, ImportReport};
pub use view::PathSegment;
