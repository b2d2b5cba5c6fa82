//! View identity, memoization and change notification.

use crate::common::*;
use std::sync::{Arc, Mutex};

/// Collects every change seen by a listener.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl Recorder {
    fn attach(&self, entity: &Entity) -> SubscriptionId {
        let sink = self.0.clone();
        entity.subscribe(move |change| {
            sink.lock()
                .unwrap()
                .push((change.stratum.clone(), change.trait_id.clone()));
        })
    }

    fn take(&self) -> Vec<(String, Option<String>)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[test]
fn repeated_resolution_returns_same_views() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("x", 1), item("y", 2)])
        .unwrap();

    let first = e.get_object_array("items");
    let second = e.get_object_array("items");
    assert_eq!(first.len(), 2);
    for (a, b) in first.iter().zip(&second) {
        assert!(a.ptr_eq(b));
    }
}

#[test]
fn identity_survives_unrelated_and_related_writes() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("x", 1)]).unwrap();
    let x = e.get_element("items", "x").unwrap();

    e.set_trait(CommonStrata::USER, "name", "renamed").unwrap();
    e.set_trait(CommonStrata::USER, "items", vec![item("x", 9), item("z", 0)])
        .unwrap();

    let again = e.get_element("items", "x").unwrap();
    assert!(x.ptr_eq(&again));
    // Never stale: the retained view sees the new value.
    assert_eq!(x.get_number("v"), Some(9.0));
}

#[test]
fn element_id_list_is_memoized_until_a_write() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("x", 1)]).unwrap();

    let a = e.element_ids("items");
    let b = e.element_ids("items");
    assert!(Arc::ptr_eq(&a, &b));

    e.set_trait(CommonStrata::USER, "items", vec![item("y", 1)]).unwrap();
    let c = e.element_ids("items");
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.as_slice(), ["y".to_string(), "x".to_string()]);
}

#[test]
fn views_of_different_paths_are_distinct() {
    let e = list_entity();
    e.set_trait(CommonStrata::DEFINITION, "items", vec![item("x", 1), item("y", 2)])
        .unwrap();
    let x = e.get_element("items", "x").unwrap();
    let y = e.get_element("items", "y").unwrap();
    assert!(!x.ptr_eq(&y));
    assert!(x.same_owner(&y));
    assert!(!x.ptr_eq(&e));
}

#[test]
fn listeners_see_every_write_once() {
    let e = list_entity();
    let recorder = Recorder::default();
    let id = recorder.attach(&e);

    e.set_trait(CommonStrata::USER, "name", "a").unwrap();
    let x = e.add_object(CommonStrata::USER, "items", Some("x")).unwrap();
    x.set_trait(CommonStrata::USER, "v", 1).unwrap();
    e.clear_trait(CommonStrata::USER, "name").unwrap();
    e.clear_trait(CommonStrata::USER, "name").unwrap();
    e.remove_stratum(CommonStrata::USER).unwrap();

    let user = CommonStrata::USER.to_string();
    assert_eq!(
        recorder.take(),
        vec![
            (user.clone(), Some("name".to_string())),
            (user.clone(), Some("items".to_string())),
            (user.clone(), Some("v".to_string())),
            (user.clone(), Some("name".to_string())),
            (user, None),
        ]
    );

    assert!(e.unsubscribe(id));
    assert!(!e.unsubscribe(id));
    e.set_trait(CommonStrata::USER, "name", "b").unwrap();
    assert!(recorder.take().is_empty());
}

#[test]
fn rejected_writes_do_not_notify() {
    let e = list_entity();
    let recorder = Recorder::default();
    recorder.attach(&e);
    assert!(e.set_trait(CommonStrata::USER, "name", 1).is_err());
    assert!(recorder.take().is_empty());
}
