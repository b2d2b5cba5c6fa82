//! Schema introspection output.

use crate::common::*;
use serde_json::json;
use strata_catalog::{describe, mix_traits};

#[test]
fn layer_schema_is_described_with_definitions() {
    let doc = describe(&layer_schema());
    assert_eq!(doc["$ref"], "#/definitions/WebMapServiceTraits");
    assert_eq!(doc["description"], "A layer served by a Web Map Service");

    let layer = &doc["definitions"]["WebMapServiceTraits"];
    assert_eq!(layer["additionalProperties"], json!(false));
    let properties = layer["properties"].as_object().unwrap();
    assert!(properties.contains_key("options"));
    assert_eq!(properties["name"]["name"], "Name");
    assert_eq!(properties["opacity"]["default"], json!(0.8));
    assert_eq!(properties["description"]["type"], json!(["string", "null"]));
    assert_eq!(properties["layers"]["items"], json!({"type": "string"}));
    assert!(properties["parameters"].get("type").is_none());
    assert_eq!(
        properties["info"]["items"],
        json!({"$ref": "#/definitions/InfoSectionTraits"})
    );
    assert_eq!(
        properties["options"]["anyOf"][0],
        json!({"$ref": "#/definitions/TileOptionsTraits"})
    );
}

#[test]
fn nested_definitions_are_emitted_once() {
    let doc = describe(&layer_schema());
    let definitions = doc["definitions"].as_object().unwrap();
    for name in [
        "WebMapServiceTraits",
        "TileOptionsTraits",
        "RetryTraits",
        "InfoSectionTraits",
        "LegendTraits",
    ] {
        assert!(definitions.contains_key(name), "missing {name}");
    }
    let info = &definitions["InfoSectionTraits"]["properties"];
    // The removal field accepts null.
    assert_eq!(info["content"]["type"], json!(["string", "null"]));
    assert_eq!(info["show"]["default"], json!(true));
}

#[test]
fn recursive_schema_terminates() {
    let doc = describe(&tree_schema());
    let node = &doc["definitions"]["NodeTraits"];
    assert_eq!(
        node["properties"]["children"]["items"],
        json!({"$ref": "#/definitions/NodeTraits"})
    );
    assert_eq!(doc["definitions"].as_object().unwrap().len(), 1);
}

#[test]
fn mixed_schema_describes_every_fragment() {
    let a = TraitSchema::builder("A")
        .add(TraitDeclaration::scalar("a", PrimitiveType::String))
        .build()
        .unwrap();
    let b = TraitSchema::builder("B")
        .add(TraitDeclaration::scalar("b", PrimitiveType::Boolean))
        .build()
        .unwrap();
    let mixed = mix_traits("AB", &[&a, &b]).unwrap();
    let doc = describe(&mixed);
    let properties = doc["definitions"]["AB"]["properties"].as_object().unwrap();
    assert_eq!(properties.len(), 2);
    assert_eq!(properties["b"]["type"], "boolean");
}

#[test]
fn catalog_describes_registered_kinds() {
    let catalog = catalog();
    let doc = catalog.describe_kind("group").unwrap();
    let members = &doc["definitions"]["GroupTraits"]["properties"]["members"];
    assert_eq!(members["type"], "array");
    assert_eq!(members["items"]["anyOf"][0], json!({"type": "string"}));
}
