//! Derived views
//!
//! A nested entity (the value of an object trait, or one element of an
//! object-array trait) owns no storage. It is a path from its owner:
//!
//! ```text
//! owner ── Field("options") ── Element { trait_id: "styles", element_id: "fill" } ── ...
//! ```
//!
//! Reading walks the owner's strata top to bottom and projects each one along
//! the path ([`project_layers`]). Writing into stratum `S` allocates the path
//! inside the owner's stratum `S` on first use ([`allocate`]), so ownership of
//! the data always stays with the owner.

use crate::resolve::{find_element, project_element, project_object, ElementSpec, Layer};
use smallvec::SmallVec;
use std::sync::Arc;
use strata_core::{Stratum, TraitValue};
use strata_schema::{
    IdProperty, MergeStrategy, PrimitiveType, RemovalMarker, TraitKind, TraitSchema, INDEX_FIELD,
};

/// One step from an owner to a nested view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object trait
    Field(String),
    /// Element of an object-array trait
    Element {
        /// Array trait id
        trait_id: String,
        /// Element id
        element_id: String,
    },
}

/// Path from an owner to a nested view, used as the view cache key
pub(crate) type ViewPath = SmallVec<[PathSegment; 4]>;

/// A path segment plus what is needed to project it
#[derive(Debug, Clone)]
pub(crate) enum ViewStep {
    Field {
        trait_id: String,
    },
    Element {
        trait_id: String,
        element_id: String,
        id_property: IdProperty,
        merge: MergeStrategy,
        schema: Arc<TraitSchema>,
    },
}

impl ViewStep {
    pub(crate) fn segment(&self) -> PathSegment {
        match self {
            ViewStep::Field { trait_id } => PathSegment::Field(trait_id.clone()),
            ViewStep::Element {
                trait_id,
                element_id,
                ..
            } => PathSegment::Element {
                trait_id: trait_id.clone(),
                element_id: element_id.clone(),
            },
        }
    }
}

/// Project owner layers along `steps`
pub(crate) fn project_layers<'a>(layers: Vec<Layer<'a>>, steps: &[ViewStep]) -> Vec<Layer<'a>> {
    steps.iter().fold(layers, |layers, step| match step {
        ViewStep::Field { trait_id } => project_object(&layers, trait_id),
        ViewStep::Element {
            trait_id,
            element_id,
            id_property,
            merge,
            schema,
        } => project_element(
            &layers,
            ElementSpec {
                trait_id,
                id_property,
                schema,
                merge: *merge,
            },
            element_id,
        ),
    })
}

/// The nested bag at `steps` inside one stratum, if it exists
pub(crate) fn locate<'a>(mut bag: &'a Stratum, steps: &[ViewStep]) -> Option<&'a Stratum> {
    for step in steps {
        bag = match step {
            ViewStep::Field { trait_id } => bag.get(trait_id)?.as_object()?,
            ViewStep::Element {
                trait_id,
                element_id,
                id_property,
                ..
            } => {
                let elements = bag.get(trait_id)?.as_object_array()?;
                &elements[find_element(elements, id_property, element_id)?]
            }
        };
    }
    Some(bag)
}

/// Mutable nested bag at `steps` inside one stratum, without allocating
pub(crate) fn locate_mut<'a>(mut bag: &'a mut Stratum, steps: &[ViewStep]) -> Option<&'a mut Stratum> {
    for step in steps {
        bag = match step {
            ViewStep::Field { trait_id } => match bag.get_mut(trait_id)? {
                TraitValue::Object(inner) => inner,
                _ => return None,
            },
            ViewStep::Element {
                trait_id,
                element_id,
                id_property,
                ..
            } => {
                let elements = match bag.get_mut(trait_id)? {
                    TraitValue::ObjectArray(elements) => elements,
                    _ => return None,
                };
                let position = find_element(elements, id_property, element_id)?;
                &mut elements[position]
            }
        };
    }
    Some(bag)
}

/// Mutable nested bag at `steps` inside one stratum, allocating missing levels
///
/// A missing or `null` object slot becomes an empty object. A missing element
/// is appended carrying its id, so the next resolution finds it.
pub(crate) fn allocate<'a>(mut bag: &'a mut Stratum, steps: &[ViewStep]) -> &'a mut Stratum {
    for step in steps {
        bag = match step {
            ViewStep::Field { trait_id } => bag
                .entry(trait_id.clone())
                .or_insert(TraitValue::Null)
                .make_object(),
            ViewStep::Element {
                trait_id,
                element_id,
                id_property,
                schema,
                ..
            } => {
                let elements = bag
                    .entry(trait_id.clone())
                    .or_insert(TraitValue::Null)
                    .make_object_array();
                let position = match find_element(elements, id_property, element_id) {
                    Some(position) => position,
                    None => push_element(elements, id_property, schema, element_id),
                };
                &mut elements[position]
            }
        };
    }
    bag
}

/// Append a new element with id `element_id`, returning its position
///
/// Index ids are stored as an explicit [`INDEX_FIELD`] on the one new element;
/// the array is never padded.
pub(crate) fn push_element(
    elements: &mut Vec<Stratum>,
    id_property: &IdProperty,
    schema: &TraitSchema,
    element_id: &str,
) -> usize {
    let element = match id_property {
        IdProperty::Field(field) => Stratum::new().with(field.clone(), id_value(schema, field, element_id)),
        IdProperty::Index => match parse_index(element_id) {
            Some(index) => Stratum::new().with(INDEX_FIELD, TraitValue::Int(index)),
            None => Stratum::new(),
        },
    };
    elements.push(element);
    elements.len() - 1
}

/// Explicit index for an index id, `None` unless it is a non-negative integer
pub(crate) fn parse_index(element_id: &str) -> Option<i64> {
    element_id.parse::<i64>().ok().filter(|index| *index >= 0)
}

/// Turn a removal marker back into a live element by dropping its marker field
///
/// Returns false if the element is still a removal marker afterwards (a
/// predicate marker has no field to drop).
pub(crate) fn revive_element(schema: &TraitSchema, element: &mut Stratum) -> bool {
    if !schema.is_removal(element) {
        return true;
    }
    if let Some(field) = schema.removal_marker().and_then(RemovalMarker::field) {
        element.remove(field);
    }
    !schema.is_removal(element)
}

/// Typed value for an id field, following the field's declared type
fn id_value(schema: &TraitSchema, field: &str, element_id: &str) -> TraitValue {
    let ty = schema.get(field).and_then(|d| match d.kind() {
        TraitKind::Scalar { ty } => Some(*ty),
        _ => None,
    });
    match ty {
        Some(PrimitiveType::Integer) | Some(PrimitiveType::Number) => element_id
            .parse::<i64>()
            .map(TraitValue::Int)
            .or_else(|_| element_id.parse::<f64>().map(TraitValue::Float))
            .unwrap_or_else(|_| TraitValue::String(element_id.to_string())),
        Some(PrimitiveType::Boolean) => element_id
            .parse::<bool>()
            .map(TraitValue::Bool)
            .unwrap_or_else(|_| TraitValue::String(element_id.to_string())),
        _ => TraitValue::String(element_id.to_string()),
    }
}
