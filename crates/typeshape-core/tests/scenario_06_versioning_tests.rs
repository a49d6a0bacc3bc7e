/// Scenario 6: Versioned Records
///
/// An employee structure has gone through two revisions. Old records are
/// migrated step by step when deserialized; records claiming a future
/// version are refused.
use serde_json::json;
use std::sync::Arc;
use typeshape_core::{
    deserialize, migrate, serialize, DeserializeOptions, ExErrorKind, Field, Mapper,
    SerializeOptions, StructureType, Value,
};

fn employee_v3() -> Arc<StructureType> {
    StructureType::builder("Employee")
        .field("full_name", Field::string())
        .field("yearly_salary", Field::non_negative_int())
        .versions(vec![
            Mapper::new().rename("full_name", "name"),
            Mapper::new().call("yearly_salary", &["yearly_salary"], |args| {
                args.first()
                    .and_then(serde_json::Value::as_i64)
                    .map(|monthly| json!(monthly * 12))
                    .ok_or_else(|| "monthly salary must be an integer".to_string())
            }),
        ])
        .build()
        .unwrap()
}

#[test]
fn test_scenario_06_happy_unversioned_record_runs_every_step() {
    // GIVEN a version 1 record (no version key)
    let ty = employee_v3();
    let raw = json!({"name": "Ann", "yearly_salary": 100});

    // WHEN deserializing it
    let e = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();

    // THEN both steps ran and the record is stamped with version 3
    assert_eq!(e.get("full_name"), Some(&Value::from("Ann")));
    assert_eq!(e.get("yearly_salary"), Some(&Value::Int(1200)));
    assert_eq!(e.version(), Some(3));
}

#[test]
fn test_scenario_06_happy_current_record_round_trips() {
    // GIVEN a current record
    let ty = employee_v3();
    let raw = json!({"full_name": "Ann", "yearly_salary": 1200, "version": 3});

    // WHEN deserializing and serializing it again
    let e = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();
    let out = serialize(&e, &SerializeOptions::default()).unwrap();

    // THEN nothing changed
    assert_eq!(out, raw);
}

#[test]
fn test_scenario_06_happy_migration_is_idempotent() {
    // GIVEN a migrated record
    let ty = employee_v3();
    let once = migrate(&ty, &json!({"name": "Ann", "yearly_salary": 100})).unwrap();

    // WHEN migrating it again
    let twice = migrate(&ty, &once).unwrap();

    // THEN the second pass is a no-op
    assert_eq!(once, twice);
}

#[test]
fn test_scenario_06_error_future_version_rejected() {
    // GIVEN a record from a newer writer
    let ty = employee_v3();
    let raw = json!({"full_name": "Ann", "yearly_salary": 1200, "version": 4});

    // WHEN deserializing it
    let err = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap_err();

    // THEN the version field is reported
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
    assert_eq!(err.path_string(), "version");
}

#[test]
fn test_scenario_06_error_failing_step_names_source_version() {
    // GIVEN a version 2 record whose salary cannot be converted
    let ty = employee_v3();
    let raw = json!({"full_name": "Ann", "yearly_salary": "lots", "version": 2});

    // WHEN deserializing it
    let err = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap_err();

    // THEN the failing step is reported by the version it migrates from
    assert_eq!(err.kind(), ExErrorKind::MigrationFailed);
    assert!(err.to_string().contains("version 2"));
}

#[test]
fn test_scenario_06_error_version_field_is_constant() {
    // GIVEN a deserialized current record
    let ty = employee_v3();
    let mut e = deserialize(
        &ty,
        &json!({"full_name": "Ann", "yearly_salary": 1200}),
        &DeserializeOptions::default(),
    )
    .unwrap();

    // WHEN the stamped version is overwritten
    let err = e.set("version", 1).unwrap_err();

    // THEN the constant is protected
    assert_eq!(err.kind(), ExErrorKind::ConstantViolation);
}
