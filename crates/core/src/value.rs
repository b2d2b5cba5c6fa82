//! Value types for trait strata
//!
//! This module defines:
//! - TraitValue: the value a stratum holds for one trait
//! - Stratum: a sparse, partial value bag keyed by trait id
//! - ModelReference: one entry of a reference-array trait
//!
//! ## Absence vs null
//!
//! A key missing from a [`Stratum`] means "this stratum does not specify the
//! trait". A key holding [`TraitValue::Null`] is an explicit value: for nullable
//! object traits and for object-array removal fields it is a tombstone that hides
//! whatever lower strata contribute.
//!
//! ## Type Rules
//!
//! - Different variants are NEVER equal: `Int(1) != Float(1.0)`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - `Opaque` carries arbitrary JSON and is never type-checked

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value stored for one trait in one stratum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraitValue {
    /// Explicit null (tombstone where the trait allows it)
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Primitive array, replaced wholesale across strata
    Array(Vec<TraitValue>),
    /// Partial value bag for a nested object trait
    Object(Stratum),
    /// Partial value bags for the elements of an object-array trait
    ObjectArray(Vec<Stratum>),
    /// Entity references (with removals)
    References(Vec<ModelReference>),
    /// Arbitrary structured value, excluded from schema validation
    Opaque(serde_json::Value),
}

impl TraitValue {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            TraitValue::Null => "null",
            TraitValue::Bool(_) => "boolean",
            TraitValue::Int(_) => "integer",
            TraitValue::Float(_) => "number",
            TraitValue::String(_) => "string",
            TraitValue::Array(_) => "array",
            TraitValue::Object(_) => "object",
            TraitValue::ObjectArray(_) => "object array",
            TraitValue::References(_) => "reference array",
            TraitValue::Opaque(_) => "opaque",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, TraitValue::Null)
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TraitValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TraitValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TraitValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get a numeric value as f64, widening Int
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TraitValue::Float(f) => Some(*f),
            TraitValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TraitValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is an Array value
    pub fn as_array(&self) -> Option<&[TraitValue]> {
        match self {
            TraitValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as &Stratum if this is an Object value
    pub fn as_object(&self) -> Option<&Stratum> {
        match self {
            TraitValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get element bags if this is an ObjectArray value
    pub fn as_object_array(&self) -> Option<&[Stratum]> {
        match self {
            TraitValue::ObjectArray(a) => Some(a),
            _ => None,
        }
    }

    /// Get references if this is a References value
    pub fn as_references(&self) -> Option<&[ModelReference]> {
        match self {
            TraitValue::References(r) => Some(r),
            _ => None,
        }
    }

    /// Get the carried JSON if this is an Opaque value
    pub fn as_opaque(&self) -> Option<&serde_json::Value> {
        match self {
            TraitValue::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Turn this slot into an object (unless it is one) and borrow its bag
    ///
    /// Used when writing through a nested view: a missing or null slot is
    /// replaced by an empty object, so storage is allocated on first write.
    pub fn make_object(&mut self) -> &mut Stratum {
        if !matches!(self, TraitValue::Object(_)) {
            *self = TraitValue::Object(Stratum::new());
        }
        match self {
            TraitValue::Object(bag) => bag,
            _ => unreachable!("slot was just replaced with an object"),
        }
    }

    /// Turn this slot into an object array (unless it is one) and borrow it
    pub fn make_object_array(&mut self) -> &mut Vec<Stratum> {
        if !matches!(self, TraitValue::ObjectArray(_)) {
            *self = TraitValue::ObjectArray(Vec::new());
        }
        match self {
            TraitValue::ObjectArray(elements) => elements,
            _ => unreachable!("slot was just replaced with an object array"),
        }
    }

    /// Convert to plain JSON without consulting a schema
    ///
    /// Non-finite floats become `null`, as JSON has no representation for them.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TraitValue::Null => serde_json::Value::Null,
            TraitValue::Bool(b) => serde_json::Value::Bool(*b),
            TraitValue::Int(i) => serde_json::Value::Number((*i).into()),
            TraitValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            TraitValue::String(s) => serde_json::Value::String(s.clone()),
            TraitValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(TraitValue::to_json).collect())
            }
            TraitValue::Object(bag) => bag.to_json(),
            TraitValue::ObjectArray(elements) => {
                serde_json::Value::Array(elements.iter().map(Stratum::to_json).collect())
            }
            TraitValue::References(refs) => {
                serde_json::Value::Array(refs.iter().map(ModelReference::to_json).collect())
            }
            TraitValue::Opaque(v) => v.clone(),
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for TraitValue {
    fn from(s: &str) -> Self {
        TraitValue::String(s.to_string())
    }
}

impl From<String> for TraitValue {
    fn from(s: String) -> Self {
        TraitValue::String(s)
    }
}

impl From<bool> for TraitValue {
    fn from(b: bool) -> Self {
        TraitValue::Bool(b)
    }
}

impl From<i64> for TraitValue {
    fn from(i: i64) -> Self {
        TraitValue::Int(i)
    }
}

impl From<i32> for TraitValue {
    fn from(i: i32) -> Self {
        TraitValue::Int(i as i64)
    }
}

impl From<f64> for TraitValue {
    fn from(f: f64) -> Self {
        TraitValue::Float(f)
    }
}

impl From<Vec<TraitValue>> for TraitValue {
    fn from(a: Vec<TraitValue>) -> Self {
        TraitValue::Array(a)
    }
}

impl From<Stratum> for TraitValue {
    fn from(o: Stratum) -> Self {
        TraitValue::Object(o)
    }
}

impl From<Vec<Stratum>> for TraitValue {
    fn from(elements: Vec<Stratum>) -> Self {
        TraitValue::ObjectArray(elements)
    }
}

impl From<Vec<ModelReference>> for TraitValue {
    fn from(refs: Vec<ModelReference>) -> Self {
        TraitValue::References(refs)
    }
}

impl From<()> for TraitValue {
    fn from(_: ()) -> Self {
        TraitValue::Null
    }
}

// ============================================================================
// Stratum
// ============================================================================

/// Sparse partial value bag
///
/// Each present key is a trait id. Used both for an entity's named strata and
/// for the nested bags of object and object-array traits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stratum {
    values: HashMap<String, TraitValue>,
}

impl Stratum {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, trait_id: impl Into<String>, value: impl Into<TraitValue>) -> Self {
        self.values.insert(trait_id.into(), value.into());
        self
    }

    /// Value for `trait_id`, `None` when this stratum does not specify it
    pub fn get(&self, trait_id: &str) -> Option<&TraitValue> {
        self.values.get(trait_id)
    }

    /// Mutable value for `trait_id`
    pub fn get_mut(&mut self, trait_id: &str) -> Option<&mut TraitValue> {
        self.values.get_mut(trait_id)
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, trait_id: impl Into<String>, value: TraitValue) -> Option<TraitValue> {
        self.values.insert(trait_id.into(), value)
    }

    /// Make `trait_id` absent again
    pub fn remove(&mut self, trait_id: &str) -> Option<TraitValue> {
        self.values.remove(trait_id)
    }

    /// True when the stratum specifies `trait_id` (null included)
    pub fn contains(&self, trait_id: &str) -> bool {
        self.values.contains_key(trait_id)
    }

    /// True when nothing is specified
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of specified traits
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over specified traits (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TraitValue)> {
        self.values.iter()
    }

    /// Entry for in-place navigation
    pub fn entry(
        &mut self,
        trait_id: impl Into<String>,
    ) -> std::collections::hash_map::Entry<'_, String, TraitValue> {
        self.values.entry(trait_id.into())
    }

    /// Convert to a JSON object without consulting a schema
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, TraitValue)> for Stratum {
    fn from_iter<I: IntoIterator<Item = (String, TraitValue)>>(iter: I) -> Self {
        Stratum {
            values: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// ModelReference
// ============================================================================

/// One entry of a reference-array trait
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelReference {
    /// Reference to the entity with this id
    Id(String),
    /// Removes the id if a lower stratum contributes it
    Removed(String),
}

impl ModelReference {
    /// The referenced id, whether added or removed
    pub fn id(&self) -> &str {
        match self {
            ModelReference::Id(id) | ModelReference::Removed(id) => id,
        }
    }

    /// True for a removal entry
    pub fn is_removal(&self) -> bool {
        matches!(self, ModelReference::Removed(_))
    }

    /// JSON form: `"id"` or `{"removed": "id"}`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ModelReference::Id(id) => serde_json::Value::String(id.clone()),
            ModelReference::Removed(id) => serde_json::json!({ "removed": id }),
        }
    }

    /// Parse the JSON form, `None` if it is neither accepted shape
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(id) => Some(ModelReference::Id(id.clone())),
            serde_json::Value::Object(obj) if obj.len() == 1 => obj
                .get("removed")
                .and_then(|v| v.as_str())
                .map(|id| ModelReference::Removed(id.to_string())),
            _ => None,
        }
    }
}

impl From<&str> for ModelReference {
    fn from(id: &str) -> Self {
        ModelReference::Id(id.to_string())
    }
}
