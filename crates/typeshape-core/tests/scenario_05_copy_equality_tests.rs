/// Scenario 5: Copies, Equality And Hashing
///
/// Instances compare and hash by structure name and field content. Shallow
/// copies share storage until written; deep copies share nothing.
mod common;

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use typeshape_core::{construct, ConstructOptions, Value};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn test_scenario_05_happy_equal_content_is_equal_and_hashes_alike() {
    // GIVEN two persons built from the same values
    let person = common::person();
    let a = construct(&person, [("age", 5)], &ConstructOptions::default()).unwrap();
    let b = construct(&person, [("age", 5)], &ConstructOptions::default()).unwrap();

    // THEN they are equal, hash alike and share a fingerprint
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint().len(), 64);

    // AND a set holds only one of them
    let set: HashSet<_> = [a, b].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn test_scenario_05_happy_different_content_differs() {
    // GIVEN two persons of different ages
    let person = common::person();
    let a = construct(&person, [("age", 5)], &ConstructOptions::default()).unwrap();
    let b = construct(&person, [("age", 6)], &ConstructOptions::default()).unwrap();

    // THEN they differ and order by content
    assert_ne!(a, b);
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert!(a < b);
}

#[test]
fn test_scenario_05_happy_shallow_copy_is_independent_after_write() {
    // GIVEN a playlist and a shallow copy of it
    let ty = common::playlist();
    let mut original = construct(
        &ty,
        [
            ("title", Value::from("Focus")),
            ("tracks", Value::List(vec![Value::from("intro")])),
        ],
        &ConstructOptions::default(),
    )
    .unwrap();
    let copy = original.shallow_copy();
    assert_eq!(original, copy);

    // WHEN the original's list is edited
    original.seq_mut("tracks").unwrap().push("outro").unwrap();

    // THEN the copy still sees the old list
    assert_eq!(copy.get("tracks").and_then(Value::len), Some(1));
    assert_eq!(original.get("tracks").and_then(Value::len), Some(2));
}

#[test]
fn test_scenario_05_happy_deep_copy_of_nested_records() {
    // GIVEN a customer with a nested address
    let (_, customer) = common::customer();
    let mut address = BTreeMap::new();
    address.insert(Value::from("city"), Value::from("Oslo"));
    address.insert(Value::from("zip"), Value::from("01501"));
    let mut original = construct(
        &customer,
        [
            ("name", Value::from("Ann")),
            ("addresses", Value::List(vec![Value::Map(address)])),
        ],
        &ConstructOptions::default(),
    )
    .unwrap();

    // WHEN deep copying and editing the original's nested record
    let copy = original.deep_copy();
    original
        .proxy("addresses")
        .unwrap()
        .at(0)
        .into_struct()
        .unwrap()
        .set("city", "Bergen")
        .unwrap();

    // THEN the copy keeps the old city
    let city = |c: &typeshape_core::Instance| {
        c.get("addresses")
            .and_then(|list| match list {
                Value::List(items) => items.first().cloned(),
                _ => None,
            })
            .and_then(|item| item.as_instance().and_then(|i| i.get("city").cloned()))
    };
    assert_eq!(city(&copy), Some(Value::from("Oslo")));
    assert_eq!(city(&original), Some(Value::from("Bergen")));
}

#[test]
fn test_scenario_05_happy_display_renders_fields() {
    // GIVEN a person
    let person = common::person();
    let p = construct(&person, [("age", 5)], &ConstructOptions::default()).unwrap();

    // THEN its text form names the structure and the field
    let shown = p.to_string();
    assert!(shown.starts_with("Person"));
    assert!(shown.contains("age"));
}
