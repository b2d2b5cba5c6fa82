//! Trait declarations
//!
//! A [`TraitDeclaration`] names one typed attribute of an entity kind. Its
//! [`TraitKind`] decides how the engine resolves the attribute across strata:
//!
//! | Kind | Resolution |
//! |------|------------|
//! | `Scalar` | first stratum that specifies it wins, else the declared default |
//! | `Opaque` | like `Scalar`, never type-checked |
//! | `PrimitiveArray` | like `Scalar`: the whole array is replaced |
//! | `Object` | derived view whose strata project into the owner's strata |
//! | `ObjectArray` | identity merge by `id_property`, with removal tombstones |
//! | `ReferenceArray` | union of ids across strata, with removal tombstones |

use crate::schema::SchemaRef;
use strata_core::TraitValue;

/// Primitive type of a scalar or primitive-array trait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// UTF-8 string
    String,
    /// Any number, stored as f64
    Number,
    /// Whole number, stored as i64
    Integer,
    /// Boolean
    Boolean,
}

impl PrimitiveType {
    /// JSON Schema type name
    pub fn json_type(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
        }
    }

    /// True if `value` is a valid non-null value of this type
    pub fn accepts(&self, value: &TraitValue) -> bool {
        matches!(
            (self, value),
            (PrimitiveType::String, TraitValue::String(_))
                | (PrimitiveType::Number, TraitValue::Float(_))
                | (PrimitiveType::Number, TraitValue::Int(_))
                | (PrimitiveType::Integer, TraitValue::Int(_))
                | (PrimitiveType::Boolean, TraitValue::Bool(_))
        )
    }

    /// Convert a JSON value of this type, `None` on mismatch
    ///
    /// Whole numbers written to a `Number` trait stay `Int`, so exporting them
    /// writes back exactly what was read.
    pub fn from_json(&self, value: &serde_json::Value) -> Option<TraitValue> {
        match (self, value) {
            (PrimitiveType::String, serde_json::Value::String(s)) => {
                Some(TraitValue::String(s.clone()))
            }
            (PrimitiveType::Number, serde_json::Value::Number(n)) => match n.as_i64() {
                Some(i) => Some(TraitValue::Int(i)),
                None => n.as_f64().map(TraitValue::Float),
            },
            (PrimitiveType::Integer, serde_json::Value::Number(n)) => n.as_i64().map(TraitValue::Int),
            (PrimitiveType::Boolean, serde_json::Value::Bool(b)) => Some(TraitValue::Bool(*b)),
            _ => None,
        }
    }
}

/// How object-array elements are identified across strata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdProperty {
    /// The value of this element field (converted to a string) is the id
    Field(String),
    /// The element's [`INDEX_FIELD`] is the id; without one, its position
    /// within its own stratum's array is
    Index,
}

/// Element key holding an explicit id in an [`IdProperty::Index`] array
///
/// Elements added after the fact carry one, so their id stays unique across
/// strata regardless of where they sit in their own stratum's array.
pub const INDEX_FIELD: &str = "index";

impl IdProperty {
    /// Field name, `None` for `Index`
    pub fn field(&self) -> Option<&str> {
        match self {
            IdProperty::Field(name) => Some(name),
            IdProperty::Index => None,
        }
    }
}

/// How object-array elements merge across strata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MergeStrategy {
    /// Elements with the same id merge their values across all strata
    #[default]
    All,
    /// Like `All`, but only ids present in the top-most stratum survive
    TopStratum,
    /// An element takes its values only from the top-most stratum containing it
    None,
}

/// Kind-specific parameters of a trait
#[derive(Debug, Clone)]
pub enum TraitKind {
    /// Single primitive value
    Scalar {
        /// Primitive type
        ty: PrimitiveType,
    },
    /// Nested object with its own schema
    Object {
        /// Nested schema
        schema: SchemaRef,
    },
    /// Array of nested objects merged by identity
    ObjectArray {
        /// Element schema
        schema: SchemaRef,
        /// Element identity
        id_property: IdProperty,
        /// Cross-stratum merge behaviour
        merge: MergeStrategy,
    },
    /// Array of primitives, replaced wholesale
    PrimitiveArray {
        /// Element type
        ty: PrimitiveType,
    },
    /// Arbitrary structured value
    Opaque,
    /// Array of references to other entities by id
    ReferenceArray {
        /// Entity kind the references must resolve to, if restricted
        target_kind: Option<String>,
    },
}

impl TraitKind {
    /// Short kind name used in error messages
    pub fn kind_name(&self) -> String {
        match self {
            TraitKind::Scalar { ty } => format!("scalar<{}>", ty.json_type()),
            TraitKind::Object { schema } => format!("object<{}>", schema.name()),
            TraitKind::ObjectArray { schema, .. } => format!("objectArray<{}>", schema.name()),
            TraitKind::PrimitiveArray { ty } => format!("primitiveArray<{}>", ty.json_type()),
            TraitKind::Opaque => "opaque".to_string(),
            TraitKind::ReferenceArray { .. } => "referenceArray".to_string(),
        }
    }

    /// True if two declarations of the same id may be mixed into one schema
    pub fn is_same_type(&self, other: &TraitKind) -> bool {
        match (self, other) {
            (TraitKind::Scalar { ty: a }, TraitKind::Scalar { ty: b }) => a == b,
            (TraitKind::Object { schema: a }, TraitKind::Object { schema: b }) => {
                a.name() == b.name()
            }
            (
                TraitKind::ObjectArray {
                    schema: a,
                    id_property: id_a,
                    ..
                },
                TraitKind::ObjectArray {
                    schema: b,
                    id_property: id_b,
                    ..
                },
            ) => a.name() == b.name() && id_a == id_b,
            (TraitKind::PrimitiveArray { ty: a }, TraitKind::PrimitiveArray { ty: b }) => a == b,
            (TraitKind::Opaque, TraitKind::Opaque) => true,
            (
                TraitKind::ReferenceArray { target_kind: a },
                TraitKind::ReferenceArray { target_kind: b },
            ) => a == b,
            _ => false,
        }
    }

    /// Nested schema for object and object-array traits
    pub fn nested_schema(&self) -> Option<&SchemaRef> {
        match self {
            TraitKind::Object { schema } | TraitKind::ObjectArray { schema, .. } => Some(schema),
            _ => None,
        }
    }
}

/// A named, typed attribute of an entity kind
#[derive(Debug, Clone)]
pub struct TraitDeclaration {
    id: String,
    name: String,
    description: String,
    kind: TraitKind,
    default: Option<TraitValue>,
    nullable: bool,
}

impl TraitDeclaration {
    fn new(id: impl Into<String>, kind: TraitKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            kind,
            default: None,
            nullable: false,
        }
    }

    /// Scalar trait of primitive type `ty`
    pub fn scalar(id: impl Into<String>, ty: PrimitiveType) -> Self {
        Self::new(id, TraitKind::Scalar { ty })
    }

    /// Nested object trait
    pub fn object(id: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(id, TraitKind::Object { schema })
    }

    /// Object-array trait with elements identified by `id_property`
    pub fn object_array(id: impl Into<String>, schema: SchemaRef, id_property: IdProperty) -> Self {
        Self::new(
            id,
            TraitKind::ObjectArray {
                schema,
                id_property,
                merge: MergeStrategy::All,
            },
        )
    }

    /// Primitive-array trait
    pub fn primitive_array(id: impl Into<String>, ty: PrimitiveType) -> Self {
        Self::new(id, TraitKind::PrimitiveArray { ty })
    }

    /// Opaque trait carrying arbitrary JSON
    pub fn opaque(id: impl Into<String>) -> Self {
        Self::new(id, TraitKind::Opaque)
    }

    /// Reference-array trait
    pub fn reference_array(id: impl Into<String>) -> Self {
        Self::new(id, TraitKind::ReferenceArray { target_kind: None })
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the default used when no stratum specifies the trait
    ///
    /// Checked against the kind when the schema is built.
    pub fn with_default(mut self, default: impl Into<TraitValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Allow an explicit `null`
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the merge strategy of an object-array trait (ignored otherwise)
    pub fn with_merge(mut self, strategy: MergeStrategy) -> Self {
        if let TraitKind::ObjectArray { merge, .. } = &mut self.kind {
            *merge = strategy;
        }
        self
    }

    /// Restrict a reference-array trait to one entity kind (ignored otherwise)
    pub fn with_target_kind(mut self, kind: impl Into<String>) -> Self {
        if let TraitKind::ReferenceArray { target_kind } = &mut self.kind {
            *target_kind = Some(kind.into());
        }
        self
    }

    /// Property name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Kind and kind-specific parameters
    pub fn kind(&self) -> &TraitKind {
        &self.kind
    }

    /// Declared default
    pub fn default_value(&self) -> Option<&TraitValue> {
        self.default.as_ref()
    }

    /// True if `null` is a valid value
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Check a value written directly (not via JSON) against this declaration
    ///
    /// Returns the expected type name on mismatch.
    pub fn check_value(&self, value: &TraitValue) -> Result<(), String> {
        let ok = match (&self.kind, value) {
            (_, TraitValue::Null) => self.nullable,
            (TraitKind::Scalar { ty }, v) => ty.accepts(v),
            (TraitKind::Object { .. }, TraitValue::Object(_)) => true,
            (TraitKind::ObjectArray { .. }, TraitValue::ObjectArray(_)) => true,
            (TraitKind::PrimitiveArray { ty }, TraitValue::Array(items)) => {
                items.iter().all(|item| ty.accepts(item))
            }
            (TraitKind::Opaque, TraitValue::Opaque(_)) => true,
            (TraitKind::ReferenceArray { .. }, TraitValue::References(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(self.expected_type())
        }
    }

    /// Human-readable expected type
    pub fn expected_type(&self) -> String {
        let base = self.kind.kind_name();
        if self.nullable {
            format!("{base} or null")
        } else {
            base
        }
    }
}
