//! Schema introspection
//!
//! Produces a JSON-Schema-shaped document describing a [`TraitSchema`] for
//! authoring tools and external validators. The document is descriptive only:
//! import validation is done by the engine's JSON importer, not by this output.
//!
//! Nested schemas are emitted once into `definitions` and referenced by name.
//! A schema that is reached again while its own definition is still being
//! expanded (a recursive schema) finds the placeholder entry and emits a
//! reference instead of recursing.

use crate::declaration::{TraitDeclaration, TraitKind};
use crate::schema::{RemovalMarker, SchemaRef, TraitSchema};
use serde_json::{json, Map, Value};

/// JSON Schema draft written to `$schema` by default
pub const DEFAULT_SCHEMA_URI: &str = "http://json-schema.org/draft-07/schema#";

/// Options for [`describe_with`]
#[derive(Debug, Clone)]
pub struct DescribeOptions {
    /// Value of the top-level `$schema` key
    pub schema_uri: String,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            schema_uri: DEFAULT_SCHEMA_URI.to_string(),
        }
    }
}

/// Describe `schema` with default options
pub fn describe(schema: &TraitSchema) -> Value {
    describe_with(schema, &DescribeOptions::default())
}

/// Describe `schema`
pub fn describe_with(schema: &TraitSchema, options: &DescribeOptions) -> Value {
    let mut describer = Describer::default();
    let root = describer.define(schema);

    let mut doc = Map::new();
    doc.insert("$schema".into(), Value::String(options.schema_uri.clone()));
    doc.insert("title".into(), Value::String(schema.name().to_string()));
    if let Some(description) = schema.description() {
        doc.insert("description".into(), Value::String(description.to_string()));
    }
    doc.insert("$ref".into(), Value::String(root));
    doc.insert("definitions".into(), Value::Object(describer.definitions));
    Value::Object(doc)
}

fn definition_ref(name: &str) -> String {
    format!("#/definitions/{name}")
}

#[derive(Default)]
struct Describer {
    definitions: Map<String, Value>,
}

impl Describer {
    /// Emit `schema` into `definitions` (once) and return its `$ref`
    fn define(&mut self, schema: &TraitSchema) -> String {
        let reference = definition_ref(schema.name());
        if self.definitions.contains_key(schema.name()) {
            return reference;
        }
        // Placeholder: marks the expansion as in progress for recursive schemas.
        self.definitions
            .insert(schema.name().to_string(), Value::Null);

        let removal_field = match schema.removal_marker() {
            Some(RemovalMarker::FieldIsNull(field)) => Some(field.as_str()),
            _ => None,
        };

        let mut properties = Map::new();
        for declaration in schema.traits() {
            let mut property = self.describe_trait(declaration);
            if removal_field == Some(declaration.id()) {
                allow_null(&mut property);
            }
            properties.insert(declaration.id().to_string(), Value::Object(property));
        }

        let mut definition = Map::new();
        definition.insert("type".into(), json!("object"));
        definition.insert("title".into(), json!(schema.name()));
        if let Some(description) = schema.description() {
            definition.insert("description".into(), json!(description));
        }
        definition.insert("properties".into(), Value::Object(properties));
        definition.insert("additionalProperties".into(), json!(false));

        self.definitions
            .insert(schema.name().to_string(), Value::Object(definition));
        reference
    }

    fn nested_ref(&mut self, schema: &SchemaRef) -> Value {
        match schema.get() {
            Some(bound) => json!({ "$ref": self.define(bound) }),
            // An unbound deferred schema cannot be expanded; refer to it by name.
            None => json!({ "$ref": definition_ref(schema.name()) }),
        }
    }

    fn describe_trait(&mut self, declaration: &TraitDeclaration) -> Map<String, Value> {
        let mut property = Map::new();
        property.insert("name".into(), json!(declaration.name()));
        property.insert("description".into(), json!(declaration.description()));

        match declaration.kind() {
            TraitKind::Scalar { ty } => {
                property.insert("type".into(), json!(ty.json_type()));
            }
            TraitKind::Object { schema } => {
                let reference = self.nested_ref(schema);
                if declaration.is_nullable() {
                    property.insert("anyOf".into(), json!([reference, { "type": "null" }]));
                } else if let Value::Object(reference) = reference {
                    property.extend(reference);
                }
            }
            TraitKind::ObjectArray { schema, .. } => {
                property.insert("type".into(), json!("array"));
                property.insert("items".into(), self.nested_ref(schema));
            }
            TraitKind::PrimitiveArray { ty } => {
                property.insert("type".into(), json!("array"));
                property.insert("items".into(), json!({ "type": ty.json_type() }));
            }
            TraitKind::Opaque => {}
            TraitKind::ReferenceArray { .. } => {
                property.insert("type".into(), json!("array"));
                property.insert(
                    "items".into(),
                    json!({
                        "anyOf": [
                            { "type": "string" },
                            {
                                "type": "object",
                                "properties": { "removed": { "type": "string" } },
                                "required": ["removed"],
                                "additionalProperties": false
                            }
                        ]
                    }),
                );
            }
        }

        if declaration.is_nullable() && !matches!(declaration.kind(), TraitKind::Object { .. }) {
            allow_null(&mut property);
        }
        if let Some(default) = declaration.default_value() {
            property.insert("default".into(), default.to_json());
        }
        property
    }
}

/// Turn `"type": "t"` into `"type": ["t", "null"]`
fn allow_null(property: &mut Map<String, Value>) {
    if let Some(Value::String(ty)) = property.get("type") {
        let ty = ty.clone();
        property.insert("type".into(), json!([ty, "null"]));
    }
}
