/// Scenario 4: In-Place Container Mutation
///
/// Container fields are edited through proxies. Every edit is re-validated
/// against the whole field; a rejected edit leaves the record as it was
/// and retires the proxy.
mod common;

use std::collections::BTreeMap;
use typeshape_core::ops::ProxyState;
use typeshape_core::{construct, ConstructOptions, ExErrorKind, Field, Instance, StructureType, Value};

fn sample_playlist() -> Instance {
    let mut ratings = BTreeMap::new();
    ratings.insert(Value::from("intro"), Value::Int(4));
    construct(
        &common::playlist(),
        [
            ("title", Value::from("Focus")),
            ("tracks", Value::List(vec![Value::from("intro")])),
            ("ratings", Value::Map(ratings)),
            ("tags", Value::List(vec![Value::from("calm")])),
            ("recent", Value::List(vec![Value::Int(1)])),
        ],
        &ConstructOptions::default(),
    )
    .unwrap()
}

#[test]
fn test_scenario_04_happy_list_edits_are_committed() {
    // GIVEN a playlist with one track
    let mut p = sample_playlist();

    // WHEN appending and replacing tracks
    {
        let mut tracks = p.seq_mut("tracks").unwrap();
        tracks.push("outro").unwrap();
        tracks.set(0, "opening").unwrap();
    }

    // THEN the record holds the edited list
    assert_eq!(
        p.get("tracks"),
        Some(&Value::List(vec![Value::from("opening"), Value::from("outro")]))
    );
}

#[test]
fn test_scenario_04_error_invalid_item_rolls_back_and_retires_proxy() {
    // GIVEN a playlist with one track
    let mut p = sample_playlist();
    let before = p.get("tracks").cloned();

    // WHEN appending a track name that is too long
    let mut tracks = p.seq_mut("tracks").unwrap();
    let err = tracks.push("an overly long track").unwrap_err();

    // THEN the item path is reported, the proxy is retired
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
    assert_eq!(err.path_string(), "tracks[1]");
    assert_eq!(tracks.state(), ProxyState::Invalid);
    assert_eq!(tracks.push("ok").unwrap_err().kind(), ExErrorKind::InvalidProxy);

    // AND the record is unchanged
    assert_eq!(p.get("tracks").cloned(), before);
}

#[test]
fn test_scenario_04_error_size_bound_checked_on_whole_field() {
    // GIVEN a playlist limited to three tracks
    let mut p = sample_playlist();

    // WHEN three more tracks are added at once
    let err = p
        .seq_mut("tracks")
        .unwrap()
        .extend(["a", "b", "c"])
        .unwrap_err();

    // THEN none of them are kept
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
    assert_eq!(p.get("tracks").and_then(Value::len), Some(1));
}

#[test]
fn test_scenario_04_happy_caller_mistake_keeps_proxy_live() {
    // GIVEN a list proxy
    let mut p = sample_playlist();
    let mut tracks = p.seq_mut("tracks").unwrap();

    // WHEN removing an index that does not exist
    let err = tracks.remove(5).unwrap_err();

    // THEN the proxy can still be used
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert_eq!(tracks.state(), ProxyState::Live);
    tracks.push("second").unwrap();
    assert_eq!(tracks.len(), 2);
}

#[test]
fn test_scenario_04_happy_map_set_and_deque_edits() {
    // GIVEN a playlist
    let mut p = sample_playlist();

    // WHEN editing the map, set and deque
    p.map_mut("ratings").unwrap().insert("outro", 5).unwrap();
    assert!(p.set_mut("tags").unwrap().insert("night").unwrap());
    {
        let mut recent = p.deque_mut("recent").unwrap();
        recent.push_back(2).unwrap();
        recent.push_back(3).unwrap();
        recent.push_back(4).unwrap();
    }

    // THEN each edit is visible and the deque kept its newest three
    assert_eq!(p.get("ratings").and_then(Value::len), Some(2));
    assert_eq!(p.get("tags").and_then(Value::len), Some(2));
    assert_eq!(
        p.get("recent"),
        Some(&Value::Deque(
            vec![Value::Int(2), Value::Int(3), Value::Int(4)].into()
        ))
    );
}

#[test]
fn test_scenario_04_error_map_value_out_of_range() {
    // GIVEN a playlist
    let mut p = sample_playlist();

    // WHEN a rating above five is inserted
    let err = p.map_mut("ratings").unwrap().insert("bonus", 9).unwrap_err();

    // THEN the entry path is reported and the map is unchanged
    assert_eq!(err.path_string(), "ratings[bonus]");
    assert_eq!(p.get("ratings").and_then(Value::len), Some(1));
}

#[test]
fn test_scenario_04_error_nested_record_edit_validated() {
    // GIVEN a customer with one address
    let (_, customer) = common::customer();
    let mut address = BTreeMap::new();
    address.insert(Value::from("city"), Value::from("Oslo"));
    address.insert(Value::from("zip"), Value::from("01501"));
    let mut c = construct(
        &customer,
        [
            ("name", Value::from("Ann")),
            ("addresses", Value::List(vec![Value::Map(address)])),
        ],
        &ConstructOptions::default(),
    )
    .unwrap();

    // WHEN the nested zip is set to an invalid value through a proxy
    let mut first = c
        .proxy("addresses")
        .unwrap()
        .at(0)
        .into_struct()
        .unwrap();
    let err = first.set("zip", "abc").unwrap_err();

    // THEN the absolute path is reported and the old zip survives
    assert_eq!(err.path_string(), "addresses[0].zip");
    let kept = c
        .proxy("addresses")
        .unwrap()
        .at(0)
        .field("zip")
        .get()
        .cloned();
    assert_eq!(kept, Some(Value::from("01501")));
}

#[test]
fn test_scenario_04_error_tuples_are_not_editable() {
    // GIVEN a record with a tuple field
    let ty = StructureType::builder("Point")
        .field("xy", Field::tuple(vec![Field::integer(), Field::integer()]))
        .build()
        .unwrap();
    let mut point = construct(
        &ty,
        [("xy", Value::List(vec![Value::Int(1), Value::Int(2)]))],
        &ConstructOptions::default(),
    )
    .unwrap();

    // WHEN asking for a list proxy over it
    let result = point.seq_mut("xy");

    // THEN the tuple is reported as immutable
    assert_eq!(common::kind_of(result.map(|_| ())), ExErrorKind::ImmutableViolation);
}
