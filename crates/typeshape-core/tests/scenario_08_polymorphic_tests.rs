/// Scenario 8: Polymorphic Fields
///
/// A payment's `details` field holds a card or a bank transfer, chosen by
/// the sibling `method` field. Covers construction, deserialization and
/// unknown discriminator values.
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use typeshape_core::{
    construct, deserialize, serialize, ConstructOptions, DeserializeOptions, Discriminator,
    ExErrorKind, Field, SerializeOptions, StructureType, Value,
};

fn payment() -> Arc<StructureType> {
    let card = StructureType::builder("Card")
        .field("number", Field::string().pattern("^[0-9]{16}$").sensitive())
        .required(["number"])
        .build()
        .unwrap();
    let transfer = StructureType::builder("Transfer")
        .field("iban", Field::string().min_length(15))
        .required(["iban"])
        .build()
        .unwrap();
    StructureType::builder("Payment")
        .field("method", Field::enumeration(["card", "transfer"]))
        .field(
            "details",
            Field::polymorphic(
                Discriminator::by_value("method", [("card", "Card"), ("transfer", "Transfer")]),
                vec![card, transfer],
            ),
        )
        .required(["method", "details"])
        .build()
        .unwrap()
}

fn details(key: &str, value: &str) -> Value {
    let mut map = BTreeMap::new();
    map.insert(Value::from(key), Value::from(value));
    Value::Map(map)
}

#[test]
fn test_scenario_08_happy_sibling_selects_structure() {
    // GIVEN a card payment given as plain values
    let ty = payment();

    // WHEN constructing it
    let p = construct(
        &ty,
        [
            ("method", Value::from("card")),
            ("details", details("number", "4111111111111111")),
        ],
        &ConstructOptions::default(),
    )
    .unwrap();

    // THEN the details became a Card instance
    let nested = p.get("details").and_then(Value::as_instance).unwrap();
    assert_eq!(nested.name(), "Card");
}

#[test]
fn test_scenario_08_error_option_rules_apply() {
    // GIVEN a transfer payment whose iban is too short
    let ty = payment();

    // WHEN constructing it
    let err = construct(
        &ty,
        [
            ("method", Value::from("transfer")),
            ("details", details("iban", "NO93")),
        ],
        &ConstructOptions::default(),
    )
    .unwrap_err();

    // THEN the nested field is reported at its absolute path
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
    assert_eq!(err.path_string(), "details.iban");
}

#[test]
fn test_scenario_08_error_sensitive_values_are_redacted() {
    // GIVEN a card number that fails its pattern
    let ty = payment();

    // WHEN constructing it
    let err = construct(
        &ty,
        [
            ("method", Value::from("card")),
            ("details", details("number", "4111-1111")),
        ],
        &ConstructOptions::default(),
    )
    .unwrap_err();

    // THEN the message does not leak the number
    assert!(!err.to_string().contains("4111"));
}

#[test]
fn test_scenario_08_happy_deserialize_round_trip() {
    // GIVEN a transfer payment in plain form
    let ty = payment();
    let raw = json!({"method": "transfer", "details": {"iban": "NO9386011117947"}});

    // WHEN deserializing and serializing it
    let p = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();

    // THEN the plain form is reproduced
    assert_eq!(
        p.get("details").and_then(Value::as_instance).map(|i| i.name().to_string()),
        Some("Transfer".to_string())
    );
    assert_eq!(serialize(&p, &SerializeOptions::default()).unwrap(), raw);
}

#[test]
fn test_scenario_08_error_unknown_discriminator() {
    // GIVEN a payment structure whose method enum is bypassed by a
    // discriminator function that knows no option
    let ty = payment();
    let odd = StructureType::builder("OddPayment")
        .field("method", Field::string())
        .field(
            "details",
            Field::polymorphic(
                Discriminator::new("method", |v| v.as_str().map(|s| s.to_uppercase())),
                vec![ty],
            ),
        )
        .build()
        .unwrap();

    // WHEN the sibling selects a structure that is not an option
    let err = construct(
        &odd,
        [
            ("method", Value::from("cash")),
            ("details", details("amount", "5")),
        ],
        &ConstructOptions::default(),
    )
    .unwrap_err();

    // THEN the discriminator is reported
    assert_eq!(err.kind(), ExErrorKind::UnknownDiscriminator);
    assert_eq!(err.path_string(), "details");
}

#[test]
fn test_scenario_08_error_discriminator_change_rechecks_dependents() {
    // GIVEN a card payment
    let ty = payment();
    let mut p = construct(
        &ty,
        [
            ("method", Value::from("card")),
            ("details", details("number", "4111111111111111")),
        ],
        &ConstructOptions::default(),
    )
    .unwrap();

    // WHEN the method switches to transfer while details still hold a card
    let err = p.set("method", "transfer").unwrap_err();

    // THEN the change is refused at the dependent field and nothing moved
    assert_eq!(err.kind(), ExErrorKind::TypeMismatch);
    assert_eq!(err.path_string(), "details");
    assert_eq!(p.get("method"), Some(&Value::from("card")));
    assert_eq!(
        p.get("details").and_then(Value::as_instance).map(|i| i.name().to_string()),
        Some("Card".to_string())
    );

    // AND re-assigning the same method is still accepted
    p.set("method", "card").unwrap();
}
