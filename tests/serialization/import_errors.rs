//! Unknown keys and type mismatches are reported with context.

use crate::common::*;
use serde_json::json;
use strata_catalog::{import_stratum, stratum_from_json, Limits, LimitError};

#[test]
fn unknown_key_names_schema_property_and_stratum() {
    let err = stratum_from_json(&layer_schema(), "user", &json!({"opactiy": 1})).unwrap_err();
    match err {
        StrataError::UnknownProperty {
            schema,
            property,
            stratum,
        } => {
            assert_eq!(schema, "WebMapServiceTraits");
            assert_eq!(property, "opactiy");
            assert_eq!(stratum, "user");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn nested_unknown_key_names_nested_schema() {
    let err = stratum_from_json(
        &layer_schema(),
        "user",
        &json!({"info": [{"name": "a", "colour": "red"}]}),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        StrataError::UnknownProperty { ref schema, .. } if schema == "InfoSectionTraits"
    ));
}

#[test]
fn type_mismatch_reports_expected_and_actual() {
    let err = stratum_from_json(&layer_schema(), "user", &json!({"opacity": "half"})).unwrap_err();
    match err {
        StrataError::TypeMismatch {
            property,
            expected,
            actual,
            ..
        } => {
            assert_eq!(property, "opacity");
            assert_eq!(expected, "scalar<number>");
            assert_eq!(actual, "string");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn null_only_where_allowed() {
    let schema = layer_schema();
    assert!(stratum_from_json(&schema, "user", &json!({"description": null})).is_ok());
    assert!(stratum_from_json(&schema, "user", &json!({"options": null})).is_ok());
    assert!(stratum_from_json(&schema, "user", &json!({"url": null}))
        .unwrap_err()
        .is_type_mismatch());
    // `content` is the info section removal field.
    assert!(stratum_from_json(&schema, "user", &json!({"info": [{"name": "a", "content": null}]})).is_ok());
    assert!(stratum_from_json(&schema, "user", &json!({"info": [{"name": null}]}))
        .unwrap_err()
        .is_type_mismatch());
}

#[test]
fn lenient_import_collects_every_problem() {
    let report = import_stratum(
        &layer_schema(),
        "user",
        &json!({
            "name": "ok",
            "bogus": true,
            "opacity": [],
            "options": {"maximumLevel": "high", "tileWidth": 128},
        }),
        &Limits::default(),
    );
    assert_eq!(report.errors.len(), 3);
    assert_eq!(report.stratum.get("name"), Some(&TraitValue::from("ok")));
    assert_eq!(
        report.stratum.get("options"),
        Some(&TraitValue::Object(Stratum::new().with("tileWidth", 128)))
    );
    assert!(!report.is_clean());
}

#[test]
fn deep_documents_are_rejected() {
    let mut deep = json!("leaf");
    for _ in 0..10 {
        deep = json!({ "nested": deep });
    }
    let report = import_stratum(
        &layer_schema(),
        "user",
        &json!({ "parameters": deep }),
        &Limits::with_small_limits(),
    );
    assert!(report.stratum.is_empty());
    assert!(matches!(
        report.errors.as_slice(),
        [StrataError::LimitExceeded(LimitError::NestingTooDeep { .. })]
    ));
}

#[test]
fn failed_update_leaves_entity_untouched() {
    let catalog = catalog();
    let e = catalog.create_entity("wms", Some("x")).unwrap();
    e.update_from_json(CommonStrata::USER, &json!({"name": "before"}))
        .unwrap();
    let err = e
        .update_from_json(CommonStrata::USER, &json!({"name": "after", "opacity": "x"}))
        .unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(e.get_string("name").as_deref(), Some("before"));
}
