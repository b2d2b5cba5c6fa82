//! Object traits: nested views delegate to the owner's strata.

use crate::common::*;

fn layer() -> Entity {
    catalog().create_entity("wms", Some("layer")).unwrap()
}

#[test]
fn nested_fields_merge_per_field() {
    let e = layer();
    e.set_trait(
        CommonStrata::DEFINITION,
        "options",
        Stratum::new().with("maximumLevel", 18).with("tileWidth", 512),
    )
    .unwrap();
    let options = e.get_object("options").unwrap();
    options.set_trait(CommonStrata::USER, "maximumLevel", 12).unwrap();

    assert_eq!(options.get("maximumLevel"), Some(TraitValue::Int(12)));
    assert_eq!(options.get("tileWidth"), Some(TraitValue::Int(512)));
}

#[test]
fn delegation_two_levels_deep() {
    let e = layer();
    let retry = e.get_object("options").unwrap().get_object("retry").unwrap();
    assert_eq!(retry.get("attempts"), Some(TraitValue::Int(3)));

    retry.set_trait(CommonStrata::DEFINITION, "backoff", 1.5).unwrap();
    retry.set_trait(CommonStrata::USER, "attempts", 5).unwrap();

    // The data lives in the owner's strata, keyed by path.
    let user = e.stratum(CommonStrata::USER).unwrap();
    let options = user.get("options").unwrap().as_object().unwrap();
    let stored = options.get("retry").unwrap().as_object().unwrap();
    assert_eq!(stored.get("attempts"), Some(&TraitValue::Int(5)));

    assert_eq!(retry.get_number("backoff"), Some(1.5));
    assert_eq!(retry.get("attempts"), Some(TraitValue::Int(5)));
    assert_eq!(
        retry.path(),
        [
            PathSegment::Field("options".into()),
            PathSegment::Field("retry".into())
        ]
    );
}

#[test]
fn null_object_suppresses_lower_strata() {
    let e = layer();
    e.set_trait(
        CommonStrata::DEFINITION,
        "options",
        Stratum::new().with("maximumLevel", 18),
    )
    .unwrap();
    e.set_trait(CommonStrata::USER, "options", TraitValue::Null).unwrap();

    let options = e.get_object("options").unwrap();
    assert_eq!(options.get("maximumLevel"), None);
    assert_eq!(options.get("tileWidth"), Some(TraitValue::Int(256)));
    assert!(options.strata_top_to_bottom().is_empty());

    e.clear_trait(CommonStrata::USER, "options").unwrap();
    assert_eq!(options.get("maximumLevel"), Some(TraitValue::Int(18)));
}

#[test]
fn resolved_object_flattens_nested_values() {
    let e = layer();
    let options = e.get_object("options").unwrap();
    options.set_trait(CommonStrata::DEFINITION, "maximumLevel", 10).unwrap();
    options
        .get_object("retry")
        .unwrap()
        .set_trait(CommonStrata::USER, "backoff", 2.0)
        .unwrap();

    let resolved = e.get("options").unwrap();
    let bag = resolved.as_object().unwrap();
    assert_eq!(bag.get("maximumLevel"), Some(&TraitValue::Int(10)));
    assert_eq!(bag.get("tileWidth"), Some(&TraitValue::Int(256)));
    let retry = bag.get("retry").unwrap().as_object().unwrap();
    assert_eq!(retry.get("attempts"), Some(&TraitValue::Int(3)));
    assert_eq!(retry.get("backoff"), Some(&TraitValue::Float(2.0)));
}

#[test]
fn stratum_operations_rejected_on_views() {
    let e = layer();
    let options = e.get_object("options").unwrap();
    assert!(matches!(
        options.remove_stratum(CommonStrata::USER),
        Err(StrataError::InvalidOperation(_))
    ));
}

#[test]
fn recursive_schema_resolves_at_every_depth() {
    init_tracing();
    let tree = Entity::with_id("tree", tree_schema(), StratumOrder::with_common_strata());
    tree.set_trait(
        CommonStrata::DEFINITION,
        "children",
        vec![Stratum::new().with("id", "a").with("label", "A").with(
            "children",
            vec![Stratum::new().with("id", "a1").with("label", "A1")],
        )],
    )
    .unwrap();

    let a = tree.get_element("children", "a").unwrap();
    let a1 = a.get_element("children", "a1").unwrap();
    a1.set_trait(CommonStrata::USER, "label", "renamed").unwrap();

    assert_eq!(a1.get_string("label").as_deref(), Some("renamed"));
    assert_eq!(a.get_string("label").as_deref(), Some("A"));
    assert_eq!(a1.path().len(), 2);
}
