//! Strata catalog - layered trait resolution for typed catalog models
//!
//! Every catalog entity (a map layer, a group, a data source) has a fixed set
//! of typed traits. Any number of named strata (a base definition, a user
//! customization, values loaded from a server) each supply a partial value for
//! some of those traits, and the engine resolves one effective value per trait.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use strata_catalog::{Catalog, CommonStrata, PrimitiveType, TraitDeclaration, TraitSchema};
//!
//! let catalog = Catalog::new();
//! let schema = TraitSchema::builder("LayerTraits")
//!     .add(TraitDeclaration::scalar("opacity", PrimitiveType::Number).with_default(0.8))
//!     .build()?;
//! catalog.register_kind("layer", Arc::new(schema));
//!
//! let roads = catalog.create_entity("layer", Some("roads"))?;
//! assert_eq!(roads.get_number("opacity"), Some(0.8));
//!
//! roads.set_trait(CommonStrata::DEFINITION, "opacity", 0.5)?;
//! roads.set_trait(CommonStrata::USER, "opacity", 0.25)?;
//! assert_eq!(roads.get_number("opacity"), Some(0.25));
//! # Ok::<(), strata_catalog::StrataError>(())
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: values, strata, stratum order, errors
//! - `strata-schema`: trait declarations, schemas, mixing, introspection
//! - `strata-engine`: entities, views, resolvers, catalog, JSON, config

pub use strata_core::*;
pub use strata_engine::*;
pub use strata_schema::*;
