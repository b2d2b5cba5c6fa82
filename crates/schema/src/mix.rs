//! Schema composition
//!
//! Entity kinds are assembled from reusable fragments: a tabular data source
//! is catalog-member traits + layer traits + table traits. Mixing produces the
//! union of the fragments' declarations.
//!
//! When two fragments declare the same id:
//! - compatible kinds ([`is_same_type`](crate::declaration::TraitKind::is_same_type)): the later declaration
//!   replaces the earlier one in place, so the earlier position is kept and a
//!   more specific fragment can refine description or default
//! - incompatible kinds: `SchemaComposition` error

use crate::declaration::TraitDeclaration;
use crate::schema::TraitSchema;
use strata_core::{StrataError, StrataResult};
use tracing::debug;

/// Mix `fragments` into a new schema called `name`
///
/// # Errors
///
/// Returns `SchemaComposition` on the first id declared with incompatible kinds.
pub fn mix_traits(name: &str, fragments: &[&TraitSchema]) -> StrataResult<TraitSchema> {
    fragments
        .iter()
        .fold(TraitSchema::builder(name), |builder, fragment| builder.mix(fragment))
        .build()
}

/// Add `incoming` to `traits`, applying the mixing rules
pub(crate) fn merge_declaration(
    schema: &str,
    traits: &mut Vec<TraitDeclaration>,
    incoming: TraitDeclaration,
) -> StrataResult<()> {
    match traits.iter_mut().find(|d| d.id() == incoming.id()) {
        None => {
            traits.push(incoming);
            Ok(())
        }
        Some(existing) if existing.kind().is_same_type(incoming.kind()) => {
            debug!(schema, trait_id = incoming.id(), "Mixed trait replaces earlier declaration");
            *existing = incoming;
            Ok(())
        }
        Some(existing) => Err(StrataError::SchemaComposition {
            schema: schema.to_string(),
            trait_id: incoming.id().to_string(),
            existing: existing.kind().kind_name(),
            incoming: incoming.kind().kind_name(),
        }),
    }
}
