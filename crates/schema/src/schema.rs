//! Trait schemas
//!
//! A [`TraitSchema`] is the static, ordered list of traits an entity kind
//! declares. Schemas are built once at startup with [`TraitSchemaBuilder`],
//! usually by mixing reusable fragments (see [`crate::mix`]), and shared behind
//! an `Arc` through [`SchemaRef`].
//!
//! Recursive schemas (a tree node whose children are tree nodes) use a deferred
//! reference: create it with [`SchemaRef::deferred`], use it in declarations,
//! then [`SchemaRef::bind`] it to the finished schema.

use crate::declaration::{TraitDeclaration, TraitKind};
use crate::mix::merge_declaration;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult, Stratum, TraitValue};

/// Marks an object-array element as a removal of its id
///
/// Per schema: each element schema decides what a tombstone looks like.
#[derive(Clone)]
pub enum RemovalMarker {
    /// The element sets this field to an explicit `null`
    FieldIsNull(String),
    /// The element sets this field to this value
    FieldEquals(String, TraitValue),
    /// Arbitrary test on the element's bag
    Predicate(fn(&Stratum) -> bool),
}

impl RemovalMarker {
    /// True if `element` is a removal marker
    pub fn matches(&self, element: &Stratum) -> bool {
        match self {
            RemovalMarker::FieldIsNull(field) => {
                matches!(element.get(field), Some(TraitValue::Null))
            }
            RemovalMarker::FieldEquals(field, value) => element.get(field) == Some(value),
            RemovalMarker::Predicate(predicate) => predicate(element),
        }
    }

    /// Field the marker inspects, if it inspects one
    pub fn field(&self) -> Option<&str> {
        match self {
            RemovalMarker::FieldIsNull(field) | RemovalMarker::FieldEquals(field, _) => Some(field),
            RemovalMarker::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for RemovalMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalMarker::FieldIsNull(field) => f.debug_tuple("FieldIsNull").field(field).finish(),
            RemovalMarker::FieldEquals(field, value) => f
                .debug_tuple("FieldEquals")
                .field(field)
                .field(value)
                .finish(),
            RemovalMarker::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Ordered set of trait declarations for one entity kind
#[derive(Debug, Clone)]
pub struct TraitSchema {
    name: String,
    description: Option<String>,
    traits: Vec<TraitDeclaration>,
    index: HashMap<String, usize>,
    removal: Option<RemovalMarker>,
}

impl TraitSchema {
    /// Start building a schema called `name`
    pub fn builder(name: impl Into<String>) -> TraitSchemaBuilder {
        TraitSchemaBuilder::new(name)
    }

    /// Schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declarations in declaration order
    pub fn traits(&self) -> &[TraitDeclaration] {
        &self.traits
    }

    /// Declaration of `id`
    pub fn get(&self, id: &str) -> Option<&TraitDeclaration> {
        self.index.get(id).map(|&i| &self.traits[i])
    }

    /// True if `id` is declared
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of declared traits
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    /// True if no traits are declared
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    /// Removal marker for elements of this schema
    pub fn removal_marker(&self) -> Option<&RemovalMarker> {
        self.removal.as_ref()
    }

    /// True if `element` marks its id as removed
    pub fn is_removal(&self, element: &Stratum) -> bool {
        self.removal
            .as_ref()
            .map(|marker| marker.matches(element))
            .unwrap_or(false)
    }

    /// Look up `id`, failing with `UnknownProperty`
    pub fn require(&self, id: &str, stratum: &str) -> StrataResult<&TraitDeclaration> {
        self.get(id)
            .ok_or_else(|| StrataError::unknown_property(&self.name, id, stratum))
    }
}

/// Builder for [`TraitSchema`]
#[derive(Debug)]
pub struct TraitSchemaBuilder {
    name: String,
    description: Option<String>,
    traits: Vec<TraitDeclaration>,
    removal: Option<RemovalMarker>,
    conflicts: Vec<StrataError>,
}

impl TraitSchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            traits: Vec::new(),
            removal: None,
            conflicts: Vec::new(),
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a trait
    pub fn add(mut self, declaration: TraitDeclaration) -> Self {
        if let Err(e) = merge_declaration(&self.name, &mut self.traits, declaration) {
            self.conflicts.push(e);
        }
        self
    }

    /// Mix in every declaration of `fragment`
    ///
    /// The fragment's removal marker is adopted if none is set yet.
    pub fn mix(mut self, fragment: &TraitSchema) -> Self {
        for declaration in fragment.traits() {
            if let Err(e) = merge_declaration(&self.name, &mut self.traits, declaration.clone()) {
                self.conflicts.push(e);
            }
        }
        if self.removal.is_none() {
            self.removal = fragment.removal.clone();
        }
        self
    }

    /// Set the removal marker for elements of this schema
    pub fn removal_marker(mut self, marker: RemovalMarker) -> Self {
        self.removal = Some(marker);
        self
    }

    /// Finish the schema
    ///
    /// # Errors
    ///
    /// - `SchemaComposition` if the same id was declared with incompatible kinds
    /// - `TypeMismatch` if a declared default does not fit its trait
    /// - `UnknownProperty` if the removal marker names an undeclared field
    pub fn build(mut self) -> StrataResult<TraitSchema> {
        if !self.conflicts.is_empty() {
            return Err(self.conflicts.remove(0));
        }

        for declaration in &self.traits {
            if let Some(default) = declaration.default_value() {
                let fits = match declaration.kind() {
                    TraitKind::Scalar { .. } | TraitKind::PrimitiveArray { .. } => {
                        declaration.check_value(default).is_ok()
                    }
                    TraitKind::Opaque => true,
                    _ => false,
                };
                if !fits {
                    return Err(StrataError::type_mismatch(
                        &self.name,
                        declaration.id(),
                        "default",
                        declaration.expected_type(),
                        default.type_name(),
                    ));
                }
            }
        }

        let index: HashMap<String, usize> = self
            .traits
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id().to_string(), i))
            .collect();

        if let Some(field) = self.removal.as_ref().and_then(RemovalMarker::field) {
            if !index.contains_key(field) {
                return Err(StrataError::unknown_property(&self.name, field, "removal marker"));
            }
        }

        Ok(TraitSchema {
            name: self.name,
            description: self.description,
            traits: self.traits,
            index,
            removal: self.removal,
        })
    }
}

/// Shared handle to a schema, possibly bound after use
#[derive(Clone)]
pub struct SchemaRef {
    name: Arc<str>,
    cell: Arc<OnceCell<Arc<TraitSchema>>>,
}

impl SchemaRef {
    /// Wrap a finished schema
    pub fn new(schema: TraitSchema) -> Self {
        Self::from_arc(Arc::new(schema))
    }

    /// Wrap a shared schema
    pub fn from_arc(schema: Arc<TraitSchema>) -> Self {
        let cell = OnceCell::new();
        let name: Arc<str> = Arc::from(schema.name());
        let _ = cell.set(schema);
        Self {
            name,
            cell: Arc::new(cell),
        }
    }

    /// Reference to a schema that will be bound later
    pub fn deferred(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Bind a deferred reference
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if already bound or if the schema's name does
    /// not match the name the reference was created with.
    pub fn bind(&self, schema: Arc<TraitSchema>) -> StrataResult<()> {
        if schema.name() != &*self.name {
            return Err(StrataError::invalid_operation(format!(
                "cannot bind schema '{}' to reference '{}'",
                schema.name(),
                self.name
            )));
        }
        self.cell.set(schema).map_err(|_| {
            StrataError::invalid_operation(format!("schema reference '{}' already bound", self.name))
        })
    }

    /// Schema name (available before binding)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema, `None` while a deferred reference is unbound
    pub fn get(&self) -> Option<&Arc<TraitSchema>> {
        self.cell.get()
    }

    /// True once the reference points at a schema
    pub fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl From<TraitSchema> for SchemaRef {
    fn from(schema: TraitSchema) -> Self {
        SchemaRef::new(schema)
    }
}

impl From<Arc<TraitSchema>> for SchemaRef {
    fn from(schema: Arc<TraitSchema>) -> Self {
        SchemaRef::from_arc(schema)
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Recursive schemas would print forever; the name identifies the schema.
        f.debug_struct("SchemaRef")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}
