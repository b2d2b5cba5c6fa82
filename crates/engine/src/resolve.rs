//! Trait resolvers
//!
//! Pure functions computing effective values from a top-to-bottom list of
//! [`Layer`]s. An entity's layers are its own strata; a nested view's layers
//! are projections of its owner's layers (see [`project_object`] and
//! [`project_element`]).
//!
//! | Trait kind | Resolver |
//! |------------|----------|
//! | scalar, opaque, primitive array | [`resolve_first`] |
//! | object | [`project_object`] builds the nested view's layers |
//! | object array | [`resolve_element_ids`] + [`project_element`] per id |
//! | reference array | [`resolve_reference_ids`] |
//!
//! None of these can fail: absence is a normal result.

use std::collections::HashSet;
use strata_core::{Stratum, TraitValue};
use strata_schema::{IdProperty, MergeStrategy, TraitSchema, INDEX_FIELD};

/// One stratum as seen by an entity: its name and the bag it contributes
pub type Layer<'a> = (&'a str, &'a Stratum);

/// First value for `trait_id`, walking layers top to bottom
pub fn resolve_first<'a>(layers: &[Layer<'a>], trait_id: &str) -> Option<&'a TraitValue> {
    layers.iter().find_map(|(_, bag)| bag.get(trait_id))
}

/// Name of the layer that supplies the effective value of `trait_id`
pub fn source_of<'a>(layers: &[Layer<'a>], trait_id: &str) -> Option<&'a str> {
    layers
        .iter()
        .find(|(_, bag)| bag.contains(trait_id))
        .map(|(name, _)| *name)
}

/// Layers of the nested object stored under `trait_id`
///
/// A layer whose slot holds an object contributes that object. A layer whose
/// slot is `null` is a tombstone: it and every layer below it are cut off.
pub fn project_object<'a>(layers: &[Layer<'a>], trait_id: &str) -> Vec<Layer<'a>> {
    let mut projected = Vec::new();
    for (name, bag) in layers {
        match bag.get(trait_id) {
            Some(TraitValue::Object(inner)) => projected.push((*name, inner)),
            Some(TraitValue::Null) => break,
            _ => {}
        }
    }
    projected
}

/// Identity of an object-array element
///
/// `index` is the element's position within its own stratum's array; an
/// explicit [`INDEX_FIELD`] takes precedence over it. Elements missing their
/// id field have no identity and never resolve.
pub fn element_id(id_property: &IdProperty, element: &Stratum, index: usize) -> Option<String> {
    match id_property {
        IdProperty::Index => match element.get(INDEX_FIELD) {
            Some(TraitValue::Int(explicit)) if *explicit >= 0 => Some(explicit.to_string()),
            _ => Some(index.to_string()),
        },
        IdProperty::Field(field) => match element.get(field)? {
            TraitValue::String(s) => Some(s.clone()),
            TraitValue::Int(i) => Some(i.to_string()),
            TraitValue::Float(f) => Some(f.to_string()),
            TraitValue::Bool(b) => Some(b.to_string()),
            _ => None,
        },
    }
}

/// Position of the first element with id `id` in one stratum's array
pub fn find_element(elements: &[Stratum], id_property: &IdProperty, id: &str) -> Option<usize> {
    elements
        .iter()
        .enumerate()
        .position(|(i, element)| element_id(id_property, element, i).as_deref() == Some(id))
}

/// One past the largest id found in any of `arrays` of an index-keyed trait
///
/// Removal markers count, so a new element never revives a removed id.
pub fn next_index<'a>(arrays: impl IntoIterator<Item = &'a [Stratum]>) -> usize {
    arrays
        .into_iter()
        .flat_map(|elements| elements.iter().enumerate())
        .filter_map(|(i, element)| element_id(&IdProperty::Index, element, i)?.parse::<usize>().ok())
        .map(|id| id + 1)
        .max()
        .unwrap_or(0)
}

/// Parameters of an object-array trait needed to resolve it
#[derive(Debug, Clone, Copy)]
pub struct ElementSpec<'s> {
    /// Trait id of the array
    pub trait_id: &'s str,
    /// Element identity
    pub id_property: &'s IdProperty,
    /// Element schema (supplies the removal marker)
    pub schema: &'s TraitSchema,
    /// Merge strategy
    pub merge: MergeStrategy,
}

/// Ids of the elements of an object-array trait, in resolved order
///
/// Walks layers top to bottom. A removal marker hides its id in every lower
/// layer; ids are ordered by first appearance, so the topmost layer's order
/// wins. With [`MergeStrategy::TopStratum`] only ids present in the topmost
/// layer that specifies the array survive.
pub fn resolve_element_ids(layers: &[Layer<'_>], spec: ElementSpec<'_>) -> Vec<String> {
    let mut removed: HashSet<String> = HashSet::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut present: Vec<String> = Vec::new();
    let mut top_ids: Option<HashSet<String>> = None;

    for (_, bag) in layers {
        let Some(elements) = bag.get(spec.trait_id).and_then(TraitValue::as_object_array) else {
            continue;
        };

        let mut ids_here = HashSet::new();
        for (i, element) in elements.iter().enumerate() {
            let Some(id) = element_id(spec.id_property, element, i) else {
                continue;
            };
            if spec.schema.is_removal(element) {
                removed.insert(id);
                continue;
            }
            if removed.contains(&id) {
                continue;
            }
            ids_here.insert(id.clone());
            if seen.insert(id.clone()) {
                present.push(id);
            }
        }

        if top_ids.is_none() {
            top_ids = Some(ids_here);
        }
    }

    if spec.merge == MergeStrategy::TopStratum {
        if let Some(top_ids) = top_ids {
            present.retain(|id| top_ids.contains(id));
        }
    }
    present
}

/// Layers of the element `element_id` of an object-array trait
///
/// Each layer contributes the first element carrying the id. A removal marker
/// is a tombstone for the element: it and the layers below are cut off. With
/// [`MergeStrategy::None`] only the topmost contributing layer is kept.
pub fn project_element<'a>(
    layers: &[Layer<'a>],
    spec: ElementSpec<'_>,
    element_id: &str,
) -> Vec<Layer<'a>> {
    let mut projected = Vec::new();
    for (name, bag) in layers {
        let Some(elements) = bag.get(spec.trait_id).and_then(TraitValue::as_object_array) else {
            continue;
        };
        let Some(position) = find_element(elements, spec.id_property, element_id) else {
            continue;
        };
        let element = &elements[position];
        if spec.schema.is_removal(element) {
            break;
        }
        projected.push((*name, element));
        if spec.merge == MergeStrategy::None {
            break;
        }
    }
    projected
}

/// Ids of a reference-array trait, in resolved order
///
/// Same walk as [`resolve_element_ids`]: `Removed` entries hide the id below,
/// duplicates across layers collapse to one.
pub fn resolve_reference_ids(layers: &[Layer<'_>], trait_id: &str) -> Vec<String> {
    let mut removed: HashSet<&str> = HashSet::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut present = Vec::new();

    for (_, bag) in layers {
        let Some(references) = bag.get(trait_id).and_then(TraitValue::as_references) else {
            continue;
        };
        for reference in references {
            let id = reference.id();
            if reference.is_removal() {
                removed.insert(id);
            } else if !removed.contains(id) && seen.insert(id) {
                present.push(id.to_string());
            }
        }
    }
    present
}
