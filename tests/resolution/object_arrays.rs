//! Object-array traits: identity merge, removal markers, merge strategies.

use crate::common::*;
use serde_json::json;

#[test]
fn elements_merge_by_id_across_strata() {
    let e = list_entity();
    e.update_from_json(
        CommonStrata::DEFINITION,
        &json!({"name": "A", "items": [{"key": "x", "v": 1}]}),
    )
    .unwrap();
    e.update_from_json(
        CommonStrata::USER,
        &json!({"items": [{"key": "x", "v": 2}, {"key": "y", "v": 3}]}),
    )
    .unwrap();

    assert_eq!(ids(&e, "items"), vec!["x", "y"]);
    let items = e.get_object_array("items");
    assert_eq!(items[0].get_number("v"), Some(2.0));
    assert_eq!(items[1].get_number("v"), Some(3.0));
    assert_eq!(e.get_string("name").as_deref(), Some("A"));
}

#[test]
fn ids_follow_first_appearance_top_to_bottom() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("p", 1), item("q", 1)])
        .unwrap();
    e.set_trait(CommonStrata::USER, "items", vec![item("r", 1), item("q", 2)])
        .unwrap();
    assert_eq!(ids(&e, "items"), vec!["r", "q", "p"]);
}

#[test]
fn tombstone_suppresses_and_higher_stratum_restores() {
    init_tracing();
    let order = StratumOrder::new();
    order.register("c", 1).unwrap();
    order.register("b", 2).unwrap();
    order.register("a", 3).unwrap();
    let e = Entity::with_id("abc", list_schema(), order);

    e.set_trait("c", "items", vec![item("1", 10)]).unwrap();
    e.set_trait("b", "items", vec![removed_item("1")]).unwrap();
    assert!(ids(&e, "items").is_empty());
    assert!(e.get_element("items", "1").is_none());

    e.set_trait("a", "items", vec![item("1", 30)]).unwrap();
    assert_eq!(ids(&e, "items"), vec!["1"]);
    let restored = e.get_element("items", "1").unwrap();
    assert_eq!(restored.get_number("v"), Some(30.0));
    // The tombstone in b also cuts off c's fields.
    assert_eq!(restored.strata_top_to_bottom(), vec!["a"]);
}

#[test]
fn removal_markers_are_per_schema() {
    let catalog = catalog();
    let e = catalog.create_entity("wms", Some("with-info")).unwrap();
    e.update_from_json(
        CommonStrata::DEFINITION,
        &json!({"info": [
            {"name": "Licence", "content": "CC-BY"},
            {"name": "Contact", "content": "someone@example.com"}
        ]}),
    )
    .unwrap();
    e.update_from_json(
        CommonStrata::USER,
        &json!({"info": [{"name": "Contact", "content": null}]}),
    )
    .unwrap();

    let info = e.get_object_array("info");
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].get_string("name").as_deref(), Some("Licence"));
    assert_eq!(info[0].get_bool("show"), Some(true));
}

#[test]
fn top_stratum_keeps_only_topmost_ids() {
    let catalog = catalog();
    let e = catalog.create_entity("wms", Some("legends")).unwrap();
    e.update_from_json(
        CommonStrata::DEFINITION,
        &json!({"legends": [{"url": "a.png"}, {"url": "b.png"}]}),
    )
    .unwrap();
    assert_eq!(e.get_object_array("legends").len(), 2);

    e.update_from_json(CommonStrata::USER, &json!({"legends": [{"url": "c.png"}]}))
        .unwrap();
    let legends = e.get_object_array("legends");
    assert_eq!(legends.len(), 1);
    assert_eq!(legends[0].get_string("url").as_deref(), Some("c.png"));
}

#[test]
fn index_ids_append_with_add_object() {
    let catalog = catalog();
    let e = catalog.create_entity("wms", None).unwrap();
    let first = e.add_object(CommonStrata::USER, "legends", None).unwrap();
    first.set_trait(CommonStrata::USER, "url", "one.png").unwrap();
    let second = e.add_object(CommonStrata::USER, "legends", None).unwrap();
    second.set_trait(CommonStrata::USER, "url", "two.png").unwrap();

    assert_eq!(ids(&e, "legends"), vec!["0", "1"]);
    assert_eq!(
        e.get_object_array("legends")[1].get_string("url").as_deref(),
        Some("two.png")
    );
}

#[test]
fn add_object_with_id_writes_into_chosen_stratum() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("x", 1)]).unwrap();
    let x = e.add_object(CommonStrata::USER, "items", Some("x")).unwrap();
    x.set_trait(CommonStrata::USER, "v", 7).unwrap();

    assert!(x.ptr_eq(&e.get_element("items", "x").unwrap()));
    assert_eq!(x.get_number("v"), Some(7.0));
    assert_eq!(
        e.stratum(CommonStrata::DEFINITION).unwrap(),
        Stratum::new().with("items", vec![item("x", 1)])
    );
}

#[test]
fn element_views_write_through_to_owner() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("x", 1)]).unwrap();
    let x = e.get_element("items", "x").unwrap();
    x.set_trait(CommonStrata::USER, "v", 5).unwrap();

    assert_eq!(
        e.stratum(CommonStrata::USER).unwrap(),
        Stratum::new().with("items", vec![item("x", 5)])
    );
    assert_eq!(x.stratum(CommonStrata::USER), Some(item("x", 5)));
}

#[test]
fn index_ids_continue_past_every_stratum() {
    let e = indexed_entity();

    let first = e.add_object(CommonStrata::DEFINITION, "inner", None).unwrap();
    first.set_trait(CommonStrata::DEFINITION, "foo", "definition").unwrap();
    first.set_trait(CommonStrata::USER, "bar", 10).unwrap();
    assert_eq!(foos(&e), vec![Some("definition".to_string())]);

    first.set_trait(CommonStrata::USER, "bar", 42).unwrap();
    assert!(foos(&e).is_empty());

    let second = e.add_object(CommonStrata::USER, "inner", None).unwrap();
    second.set_trait(CommonStrata::USER, "foo", "user").unwrap();
    second.set_trait(CommonStrata::USER, "bar", 10).unwrap();
    assert_eq!(foos(&e), vec![Some("user".to_string())]);

    let third = e.add_object(CommonStrata::DEFINITION, "inner", None).unwrap();
    assert!(!third.ptr_eq(&second));
    third.set_trait(CommonStrata::USER, "foo", "definition").unwrap();
    third.set_trait(CommonStrata::USER, "bar", 10).unwrap();
    assert_eq!(
        foos(&e),
        vec![Some("user".to_string()), Some("definition".to_string())]
    );

    let fourth = e.add_object(CommonStrata::USER, "inner", None).unwrap();
    fourth.set_trait(CommonStrata::USER, "foo", "user2").unwrap();
    fourth.set_trait(CommonStrata::USER, "bar", 20).unwrap();
    assert_eq!(
        foos(&e),
        vec![
            Some("user".to_string()),
            Some("definition".to_string()),
            Some("user2".to_string())
        ]
    );
    assert_eq!(ids(&e, "inner"), vec!["1", "2", "3"]);
}

#[test]
fn explicit_index_id_adds_one_element() {
    let e = indexed_entity();
    let row = e.add_object(CommonStrata::USER, "inner", Some("20000")).unwrap();
    row.set_trait(CommonStrata::USER, "foo", "far").unwrap();

    assert_eq!(ids(&e, "inner"), vec!["20000"]);
    assert_eq!(foos(&e), vec![Some("far".to_string())]);
    let stored = e.stratum(CommonStrata::USER).unwrap();
    assert_eq!(stored.get("inner").unwrap().as_object_array().unwrap().len(), 1);

    // The next generated id follows the explicit one.
    e.add_object(CommonStrata::DEFINITION, "inner", None).unwrap();
    assert_eq!(ids(&e, "inner"), vec!["20000", "20001"]);

    for bad in ["-3", "row"] {
        assert!(matches!(
            e.add_object(CommonStrata::USER, "inner", Some(bad)),
            Err(StrataError::InvalidOperation(_))
        ));
    }
}

#[test]
fn add_object_over_removal_marker_revives_element() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("1", 3)]).unwrap();
    e.set_trait(CommonStrata::USER, "items", vec![removed_item("1")]).unwrap();
    assert!(ids(&e, "items").is_empty());

    let revived = e.add_object(CommonStrata::USER, "items", Some("1")).unwrap();
    revived.set_trait(CommonStrata::USER, "v", 5).unwrap();

    assert_eq!(ids(&e, "items"), vec!["1"]);
    assert_eq!(revived.get_number("v"), Some(5.0));
    assert_eq!(
        e.stratum(CommonStrata::USER).unwrap(),
        Stratum::new().with("items", vec![item("1", 5)])
    );
}
