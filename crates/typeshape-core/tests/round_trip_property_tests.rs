/// Property tests: plain-data round trips and validation determinism
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use typeshape_core::{
    deserialize, migrate, serialize, DeserializeOptions, Field, FieldPath, Mapper,
    SerializeOptions, StructureType, Value,
};

fn record_type() -> Arc<StructureType> {
    StructureType::builder("Record")
        .field("age", Field::positive_int())
        .field("name", Field::sized_string(8))
        .field("tags", Field::set_of(Field::string()))
        .field("scores", Field::map_of(Field::string(), Field::float()))
        .field("window", Field::deque_of(Field::integer()).maxlen(4))
        .required(["age"])
        .build()
        .expect("Record declaration")
}

fn counter_type() -> Arc<StructureType> {
    StructureType::builder("Counter")
        .field("total", Field::integer())
        .versions(vec![
            Mapper::new().rename("total", "count"),
            Mapper::new().constant("total", 0),
        ])
        .build()
        .expect("Counter declaration")
}

fn valid_record() -> impl Strategy<Value = JsonValue> {
    (
        1i64..100_000,
        proptest::option::of("[a-z]{0,8}"),
        proptest::collection::btree_set("[a-z]{1,6}", 0..5),
        proptest::collection::btree_map("[a-z]{1,6}", -1000i32..1000, 0..5),
        proptest::collection::vec(any::<i32>(), 0..5),
    )
        .prop_map(|(age, name, tags, scores, window)| {
            let mut record = serde_json::Map::new();
            record.insert("age".into(), json!(age));
            if let Some(name) = name {
                record.insert("name".into(), json!(name));
            }
            record.insert("tags".into(), json!(tags));
            let scores: serde_json::Map<String, JsonValue> = scores
                .into_iter()
                .map(|(k, v)| (k, json!(f64::from(v) / 4.0)))
                .collect();
            record.insert("scores".into(), JsonValue::Object(scores));
            record.insert("window".into(), json!(window));
            JsonValue::Object(record)
        })
}

proptest! {
    /// Valid plain records survive deserialize then serialize unchanged
    #[test]
    fn round_trip_preserves_valid_records(raw in valid_record()) {
        let ty = record_type();
        let instance = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();
        let out = serialize(&instance, &SerializeOptions::default()).unwrap();
        prop_assert_eq!(out, raw);
    }

    /// The trusted and validated paths agree on valid input
    #[test]
    fn trusted_and_validated_agree(raw in valid_record()) {
        let ty = StructureType::builder("TrustedRecord")
            .extends(&record_type())
            .trusted()
            .build()
            .unwrap();
        let validated = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();
        let trusted = deserialize(&ty, &raw, &DeserializeOptions::default().trusted()).unwrap();
        prop_assert_eq!(validated, trusted);
    }

    /// Both paths keep the newest items of an over-long bounded deque
    #[test]
    fn trusted_and_validated_agree_on_bounded_deques(
        age in 1i64..1000,
        window in proptest::collection::vec(any::<i32>(), 0..12),
    ) {
        let ty = StructureType::builder("TrustedRecord")
            .extends(&record_type())
            .trusted()
            .build()
            .unwrap();
        let raw = json!({"age": age, "tags": [], "scores": {}, "window": window});
        let validated = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();
        let trusted = deserialize(&ty, &raw, &DeserializeOptions::default().trusted()).unwrap();
        prop_assert_eq!(validated.get("window").and_then(Value::len), Some(window.len().min(4)));
        prop_assert_eq!(validated, trusted);
    }

    /// Integer bounds accept exactly the values inside them
    #[test]
    fn integer_bounds_are_exact(value in -50i64..50, low in -20i64..0, high in 0i64..20) {
        let field = Field::integer().minimum(low as f64).maximum(high as f64);
        let accepted = field.validate(value, &FieldPath::field("n")).is_ok();
        prop_assert_eq!(accepted, low <= value && value <= high);
    }

    /// Validation is deterministic for the same input
    #[test]
    fn validation_is_deterministic(text in "\\PC{0,12}") {
        let field = Field::string().max_length(6).pattern("[a-z]");
        let first = field.validate(text.as_str(), &FieldPath::field("s"));
        let second = field.validate(text.as_str(), &FieldPath::field("s"));
        prop_assert_eq!(first, second);
    }

    /// Migrating an already migrated record changes nothing
    #[test]
    fn migration_is_idempotent(count in any::<i64>(), from in 1u32..=3) {
        let ty = counter_type();
        let raw = if from == 1 {
            json!({"count": count})
        } else {
            json!({"total": count, "version": from})
        };
        let once = migrate(&ty, &raw).unwrap();
        let twice = migrate(&ty, &once).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(&once["version"], &json!(3));
    }

    /// Serialized sets are sorted and free of duplicates
    #[test]
    fn sets_serialize_sorted(items in proptest::collection::vec("[a-c]{1,2}", 0..10)) {
        let ty = StructureType::builder("Bag")
            .field("items", Field::set_of(Field::string()))
            .build()
            .unwrap();
        let values: Vec<Value> = items.iter().map(|s| Value::from(s.as_str())).collect();
        let bag = typeshape_core::construct(
            &ty,
            [("items", Value::List(values))],
            &typeshape_core::ConstructOptions::default(),
        )
        .unwrap();
        let out = serialize(&bag, &SerializeOptions::default()).unwrap();
        let mut expected = items.clone();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(out["items"].clone(), json!(expected));
    }
}
