//! Shared fixtures for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::{Arc, Once};
pub use strata_catalog::{
    Catalog, CommonStrata, Entity, IdProperty, MergeStrategy, ModelReference, PathSegment,
    PrimitiveType, RemovalMarker, SchemaRef, StrataError, Stratum, StratumOrder, SubscriptionId,
    TraitDeclaration, TraitSchema, TraitValue,
};

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness output.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Schemas
// ============================================================================

/// `{name, items: objectArray(id = "key")}` with items `{key, v}`.
pub fn list_schema() -> Arc<TraitSchema> {
    let item = TraitSchema::builder("ItemTraits")
        .add(TraitDeclaration::scalar("key", PrimitiveType::String))
        .add(TraitDeclaration::scalar("v", PrimitiveType::Number))
        .add(TraitDeclaration::scalar("content", PrimitiveType::String))
        .removal_marker(RemovalMarker::FieldIsNull("content".into()))
        .build()
        .unwrap();
    Arc::new(
        TraitSchema::builder("ListTraits")
            .add(TraitDeclaration::scalar("name", PrimitiveType::String))
            .add(TraitDeclaration::object_array(
                "items",
                SchemaRef::new(item),
                IdProperty::Field("key".into()),
            ))
            .build()
            .unwrap(),
    )
}

/// Info section: removal is `content: null`.
pub fn info_section_schema() -> TraitSchema {
    TraitSchema::builder("InfoSectionTraits")
        .description("A section of the feature info panel")
        .add(TraitDeclaration::scalar("name", PrimitiveType::String))
        .add(TraitDeclaration::scalar("content", PrimitiveType::String).with_description("HTML body"))
        .add(TraitDeclaration::scalar("show", PrimitiveType::Boolean).with_default(true))
        .removal_marker(RemovalMarker::FieldIsNull("content".into()))
        .build()
        .unwrap()
}

/// Tile options nested two levels deep: `options.retry.attempts`.
pub fn options_schema() -> TraitSchema {
    let retry = TraitSchema::builder("RetryTraits")
        .add(TraitDeclaration::scalar("attempts", PrimitiveType::Integer).with_default(3))
        .add(TraitDeclaration::scalar("backoff", PrimitiveType::Number))
        .build()
        .unwrap();
    TraitSchema::builder("TileOptionsTraits")
        .add(TraitDeclaration::scalar("maximumLevel", PrimitiveType::Integer))
        .add(TraitDeclaration::scalar("tileWidth", PrimitiveType::Integer).with_default(256))
        .add(TraitDeclaration::object("retry", SchemaRef::new(retry)))
        .build()
        .unwrap()
}

/// A map layer mixed from common fragments.
pub fn layer_schema() -> Arc<TraitSchema> {
    let common = TraitSchema::builder("CatalogMemberTraits")
        .add(TraitDeclaration::scalar("name", PrimitiveType::String).with_name("Name"))
        .add(TraitDeclaration::scalar("description", PrimitiveType::String).nullable())
        .build()
        .unwrap();
    let opacity = TraitSchema::builder("OpacityTraits")
        .add(TraitDeclaration::scalar("opacity", PrimitiveType::Number).with_default(0.8))
        .build()
        .unwrap();

    Arc::new(
        TraitSchema::builder("WebMapServiceTraits")
            .description("A layer served by a Web Map Service")
            .mix(&common)
            .mix(&opacity)
            .add(TraitDeclaration::scalar("url", PrimitiveType::String))
            .add(TraitDeclaration::primitive_array("layers", PrimitiveType::String))
            .add(TraitDeclaration::opaque("parameters"))
            .add(TraitDeclaration::object("options", SchemaRef::new(options_schema())).nullable())
            .add(TraitDeclaration::object_array(
                "info",
                SchemaRef::new(info_section_schema()),
                IdProperty::Field("name".into()),
            ))
            .add(
                TraitDeclaration::object_array(
                    "legends",
                    SchemaRef::new(
                        TraitSchema::builder("LegendTraits")
                            .add(TraitDeclaration::scalar("url", PrimitiveType::String))
                            .build()
                            .unwrap(),
                    ),
                    IdProperty::Index,
                )
                .with_merge(MergeStrategy::TopStratum),
            )
            .build()
            .unwrap(),
    )
}

/// `{inner: objectArray(id = index)}`; an element with `bar: 42` is removed.
pub fn indexed_schema() -> Arc<TraitSchema> {
    let inner = TraitSchema::builder("InnerTraits")
        .add(TraitDeclaration::scalar("foo", PrimitiveType::String))
        .add(TraitDeclaration::scalar("bar", PrimitiveType::Number))
        .removal_marker(RemovalMarker::FieldEquals("bar".into(), TraitValue::Int(42)))
        .build()
        .unwrap();
    Arc::new(
        TraitSchema::builder("OuterTraits")
            .add(TraitDeclaration::object_array(
                "inner",
                SchemaRef::new(inner),
                IdProperty::Index,
            ))
            .build()
            .unwrap(),
    )
}

/// A group whose members reference layers.
pub fn group_schema() -> Arc<TraitSchema> {
    Arc::new(
        TraitSchema::builder("GroupTraits")
            .add(TraitDeclaration::scalar("name", PrimitiveType::String))
            .add(TraitDeclaration::reference_array("members").with_target_kind("wms"))
            .build()
            .unwrap(),
    )
}

/// A recursive tree: nodes hold child nodes.
pub fn tree_schema() -> Arc<TraitSchema> {
    let node = SchemaRef::deferred("NodeTraits");
    let schema = Arc::new(
        TraitSchema::builder("NodeTraits")
            .add(TraitDeclaration::scalar("id", PrimitiveType::String))
            .add(TraitDeclaration::scalar("label", PrimitiveType::String))
            .add(TraitDeclaration::object_array(
                "children",
                node.clone(),
                IdProperty::Field("id".into()),
            ))
            .build()
            .unwrap(),
    );
    node.bind(schema.clone()).unwrap();
    schema
}

// ============================================================================
// Catalogs and entities
// ============================================================================

/// Catalog with `wms` and `group` kinds registered.
pub fn catalog() -> Catalog {
    init_tracing();
    let catalog = Catalog::new();
    catalog.register_kind("wms", layer_schema());
    catalog.register_kind("group", group_schema());
    catalog
}

/// Standalone entity over [`list_schema`] with the common strata.
pub fn list_entity() -> Entity {
    init_tracing();
    Entity::with_id("list", list_schema(), StratumOrder::with_common_strata())
}

/// Standalone entity over [`indexed_schema`] with the common strata.
pub fn indexed_entity() -> Entity {
    init_tracing();
    Entity::with_id("indexed", indexed_schema(), StratumOrder::with_common_strata())
}

/// Resolved `foo` of every element of `inner`.
pub fn foos(entity: &Entity) -> Vec<Option<String>> {
    entity
        .get_object_array("inner")
        .iter()
        .map(|element| element.get_string("foo"))
        .collect()
}

/// Element `{key, v}`.
pub fn item(key: &str, v: i64) -> Stratum {
    Stratum::new().with("key", key).with("v", v)
}

/// Tombstone for element `key`.
pub fn removed_item(key: &str) -> Stratum {
    Stratum::new().with("key", key).with("content", TraitValue::Null)
}

/// Resolved element ids as owned strings.
pub fn ids(entity: &Entity, trait_id: &str) -> Vec<String> {
    entity.element_ids(trait_id).as_ref().clone()
}
