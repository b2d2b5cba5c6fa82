//! JSON import and export of strata
//!
//! A stratum arrives as a plain JSON object whose keys are trait ids. Import
//! checks every key and value against the schema (recursively for object and
//! object-array traits) and converts it to [`Stratum`]. Export writes keys in
//! schema declaration order, so exporting and re-importing is lossless.
//!
//! Two modes:
//!
//! - strict ([`stratum_from_json`]): the first problem fails the whole import
//! - lenient ([`import_stratum`]): offending keys are dropped and reported in
//!   [`ImportReport::errors`], everything else is kept

use serde_json::{Map, Value};
use strata_core::{Limits, ModelReference, StrataError, StrataResult, Stratum, TraitValue};
use strata_schema::{IdProperty, SchemaRef, TraitDeclaration, TraitKind, TraitSchema, INDEX_FIELD};
use tracing::debug;

/// Property name used in errors about the top-level JSON value itself
const ROOT_PROPERTY: &str = "(root)";

/// Outcome of a lenient import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Everything that was accepted
    pub stratum: Stratum,
    /// Everything that was rejected, in document order
    pub errors: Vec<StrataError>,
}

impl ImportReport {
    /// True if nothing was rejected
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fail with the first rejection, if any
    pub fn into_result(self) -> StrataResult<Stratum> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.stratum),
        }
    }
}

/// Import a stratum, failing on the first unknown key or type mismatch
pub fn stratum_from_json(schema: &TraitSchema, stratum: &str, json: &Value) -> StrataResult<Stratum> {
    import_stratum(schema, stratum, json, &Limits::default()).into_result()
}

/// Import a stratum, collecting problems instead of failing
///
/// A JSON value that exceeds `limits` is rejected as a whole.
pub fn import_stratum(schema: &TraitSchema, stratum: &str, json: &Value, limits: &Limits) -> ImportReport {
    let mut report = ImportReport::default();
    if let Err(e) = limits.validate_json(json) {
        report.errors.push(e.into());
        return report;
    }
    if let Some(bag) = bag_from_json(schema, stratum, ROOT_PROPERTY, json, &mut report.errors) {
        report.stratum = bag;
    }
    debug!(
        schema = schema.name(),
        stratum,
        traits = report.stratum.len(),
        rejected = report.errors.len(),
        "Imported stratum"
    );
    report
}

/// Export a stratum, keys in schema declaration order
pub fn stratum_to_json(schema: &TraitSchema, bag: &Stratum) -> Value {
    let mut out = Map::new();
    for decl in schema.traits() {
        if let Some(value) = bag.get(decl.id()) {
            out.insert(decl.id().to_string(), value_to_json(decl, value));
        }
    }
    // Keys the schema doesn't know cannot get in through the public API, but
    // a raw `Stratum` might carry them. Keep them rather than lose data.
    for (key, value) in bag.iter() {
        if !schema.contains(key) {
            out.insert(key.clone(), value.to_json());
        }
    }
    Value::Object(out)
}

/// Check a whole bag against a schema
pub fn validate_stratum(schema: &TraitSchema, stratum: &str, bag: &Stratum) -> StrataResult<()> {
    for (key, value) in bag.iter() {
        let decl = schema.require(key, stratum)?;
        validate_value(schema, decl, stratum, value)?;
    }
    Ok(())
}

/// Check one value written directly to `decl`
///
/// Nested bags are checked against their own schema. `null` is accepted for
/// a nullable trait and for the schema's removal-marker field.
pub fn validate_value(
    schema: &TraitSchema,
    decl: &TraitDeclaration,
    stratum: &str,
    value: &TraitValue,
) -> StrataResult<()> {
    if value.is_null() && is_removal_field(schema, decl.id()) {
        return Ok(());
    }
    decl.check_value(value).map_err(|expected| {
        StrataError::type_mismatch(schema.name(), decl.id(), stratum, expected, value.type_name())
    })?;
    match (decl.kind(), value) {
        (TraitKind::Object { schema: nested }, TraitValue::Object(bag)) => {
            validate_stratum(bound(nested)?, stratum, bag)
        }
        (
            TraitKind::ObjectArray {
                schema: nested,
                id_property,
                ..
            },
            TraitValue::ObjectArray(elements),
        ) => {
            let nested = bound(nested)?;
            elements
                .iter()
                .try_for_each(|element| validate_element(nested, id_property, stratum, element))
        }
        _ => Ok(()),
    }
}

/// Check one object-array element, allowing an explicit index on index ids
fn validate_element(
    schema: &TraitSchema,
    id_property: &IdProperty,
    stratum: &str,
    element: &Stratum,
) -> StrataResult<()> {
    for (key, value) in element.iter() {
        if takes_explicit_index(schema, id_property, key) {
            if !matches!(value, TraitValue::Int(index) if *index >= 0) {
                return Err(StrataError::type_mismatch(
                    schema.name(),
                    INDEX_FIELD,
                    stratum,
                    "non-negative integer",
                    value.type_name(),
                ));
            }
            continue;
        }
        let decl = schema.require(key, stratum)?;
        validate_value(schema, decl, stratum, value)?;
    }
    Ok(())
}

/// True if `key` is the explicit index of an index-keyed element
fn takes_explicit_index(schema: &TraitSchema, id_property: &IdProperty, key: &str) -> bool {
    *id_property == IdProperty::Index && key == INDEX_FIELD && !schema.contains(INDEX_FIELD)
}

/// Resolve a schema reference, failing if it was never bound
pub(crate) fn bound(schema: &SchemaRef) -> StrataResult<&TraitSchema> {
    schema.get().map(|s| s.as_ref()).ok_or_else(|| {
        StrataError::invalid_operation(format!("schema '{}' is declared but never bound", schema.name()))
    })
}

fn is_removal_field(schema: &TraitSchema, trait_id: &str) -> bool {
    schema
        .removal_marker()
        .and_then(|marker| marker.field())
        .map(|field| field == trait_id)
        .unwrap_or(false)
}

fn bag_from_json(
    schema: &TraitSchema,
    stratum: &str,
    property: &str,
    json: &Value,
    errors: &mut Vec<StrataError>,
) -> Option<Stratum> {
    let Some(object) = json.as_object() else {
        errors.push(StrataError::type_mismatch(
            schema.name(),
            property,
            stratum,
            format!("object<{}>", schema.name()),
            json_type_name(json),
        ));
        return None;
    };

    let mut bag = Stratum::new();
    for (key, value) in object {
        let Some(decl) = schema.get(key) else {
            errors.push(StrataError::unknown_property(schema.name(), key, stratum));
            continue;
        };
        if let Some(value) = value_from_json(schema, decl, stratum, value, errors) {
            bag.set(key.clone(), value);
        }
    }
    Some(bag)
}

fn value_from_json(
    schema: &TraitSchema,
    decl: &TraitDeclaration,
    stratum: &str,
    json: &Value,
    errors: &mut Vec<StrataError>,
) -> Option<TraitValue> {
    if json.is_null() {
        if matches!(decl.kind(), TraitKind::Opaque) {
            return Some(TraitValue::Opaque(Value::Null));
        }
        if decl.is_nullable() || is_removal_field(schema, decl.id()) {
            return Some(TraitValue::Null);
        }
        errors.push(mismatch(schema, decl, stratum, json));
        return None;
    }

    let value = match decl.kind() {
        TraitKind::Scalar { ty } => ty.from_json(json),
        TraitKind::PrimitiveArray { ty } => json.as_array().and_then(|items| {
            items
                .iter()
                .map(|item| ty.from_json(item))
                .collect::<Option<Vec<_>>>()
                .map(TraitValue::Array)
        }),
        TraitKind::Opaque => Some(TraitValue::Opaque(json.clone())),
        TraitKind::ReferenceArray { .. } => json.as_array().and_then(|items| {
            items
                .iter()
                .map(ModelReference::from_json)
                .collect::<Option<Vec<_>>>()
                .map(TraitValue::References)
        }),
        TraitKind::Object { schema: nested } => {
            let nested = match bound(nested) {
                Ok(nested) => nested,
                Err(e) => {
                    errors.push(e);
                    return None;
                }
            };
            return bag_from_json(nested, stratum, decl.id(), json, errors).map(TraitValue::Object);
        }
        TraitKind::ObjectArray {
            schema: nested,
            id_property,
            ..
        } => {
            let nested = match bound(nested) {
                Ok(nested) => nested,
                Err(e) => {
                    errors.push(e);
                    return None;
                }
            };
            let Some(items) = json.as_array() else {
                errors.push(mismatch(schema, decl, stratum, json));
                return None;
            };
            let elements = items
                .iter()
                .filter_map(|item| element_from_json(nested, id_property, stratum, decl.id(), item, errors))
                .collect();
            return Some(TraitValue::ObjectArray(elements));
        }
    };

    if value.is_none() {
        errors.push(mismatch(schema, decl, stratum, json));
    }
    value
}

fn element_from_json(
    schema: &TraitSchema,
    id_property: &IdProperty,
    stratum: &str,
    property: &str,
    json: &Value,
    errors: &mut Vec<StrataError>,
) -> Option<Stratum> {
    let explicit = match json.get(INDEX_FIELD) {
        Some(explicit) if takes_explicit_index(schema, id_property, INDEX_FIELD) => explicit,
        _ => return bag_from_json(schema, stratum, property, json, errors),
    };
    let Some(index) = explicit.as_i64().filter(|index| *index >= 0) else {
        errors.push(StrataError::type_mismatch(
            schema.name(),
            INDEX_FIELD,
            stratum,
            "non-negative integer",
            json_type_name(explicit),
        ));
        return None;
    };
    let mut rest = json.clone();
    if let Some(object) = rest.as_object_mut() {
        object.remove(INDEX_FIELD);
    }
    let mut bag = bag_from_json(schema, stratum, property, &rest, errors)?;
    bag.set(INDEX_FIELD, TraitValue::Int(index));
    Some(bag)
}

fn value_to_json(decl: &TraitDeclaration, value: &TraitValue) -> Value {
    match (decl.kind(), value) {
        (TraitKind::Object { schema }, TraitValue::Object(bag)) => match schema.get() {
            Some(nested) => stratum_to_json(nested, bag),
            None => bag.to_json(),
        },
        (TraitKind::ObjectArray { schema, .. }, TraitValue::ObjectArray(elements)) => match schema.get() {
            Some(nested) => Value::Array(elements.iter().map(|e| stratum_to_json(nested, e)).collect()),
            None => value.to_json(),
        },
        _ => value.to_json(),
    }
}

fn mismatch(schema: &TraitSchema, decl: &TraitDeclaration, stratum: &str, json: &Value) -> StrataError {
    StrataError::type_mismatch(
        schema.name(),
        decl.id(),
        stratum,
        decl.expected_type(),
        json_type_name(json),
    )
}

pub(crate) fn json_type_name(json: &Value) -> &'static str {
    match json {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
