use typeshape_core::errors::{ExError, ExErrorKind, SchemaError};
use typeshape_core::FieldPath;

#[test]
fn test_missing_required_verifiable_by_kind() {
    let err = SchemaError::MissingRequired {
        path: FieldPath::field("age"),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::MissingRequired);
    assert_eq!(ex_err.code(), "ERR_MISSING_REQUIRED");
    assert_eq!(ex_err.path().map(|p| p.to_string()), Some("age".to_string()));
}

#[test]
fn test_unknown_field_carries_structure() {
    let err = SchemaError::UnknownField {
        path: FieldPath::field("nickname"),
        structure: "Person".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::UnknownField);
    assert_eq!(ex_err.structure(), Some("Person"));
    assert!(ex_err.message().contains("not a field of Person"));
}

#[test]
fn test_no_option_matched_lists_candidates() {
    let err = SchemaError::NoOptionMatched {
        path: FieldPath::field("id"),
        candidates: vec!["Integer".to_string(), "String".to_string()],
        found: "true".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.code(), "ERR_NO_OPTION_MATCHED");
    assert_eq!(
        ex_err.candidates(),
        Some(&["Integer".to_string(), "String".to_string()][..])
    );
}

#[test]
fn test_candidate_rejected_reports_inner_kind_with_source() {
    let err = SchemaError::CandidateRejected {
        path: FieldPath::field("code"),
        index: 1,
        candidate: "String".to_string(),
        reason: Box::new(SchemaError::ConstraintViolation {
            path: FieldPath::field("code"),
            constraint: "must match ^[0-9]+$".to_string(),
            found: "12a4".to_string(),
        }),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::ConstraintViolation);
    assert_eq!(
        ex_err.source_error().map(ExError::kind),
        Some(ExErrorKind::ConstraintViolation)
    );
}

#[test]
fn test_aggregate_flattens_nested_aggregates() {
    let leaf = |name: &str| SchemaError::MissingRequired {
        path: FieldPath::field(name),
    };
    let inner = SchemaError::aggregate(vec![leaf("a"), leaf("b")]);

    let outer = SchemaError::aggregate(vec![inner, leaf("c")]);

    match &outer {
        SchemaError::Aggregate { errors } => assert_eq!(errors.len(), 3),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(outer.violations().len(), 3);
}

#[test]
fn test_migration_failed_has_no_path() {
    let err = SchemaError::MigrationFailed {
        structure: "Employee".to_string(),
        from: 2,
        reason: "salary: expected integer".to_string(),
    };

    assert_eq!(err.path(), None);
    assert_eq!(err.path_string(), FieldPath::root().to_string());

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.kind(), ExErrorKind::MigrationFailed);
    assert_eq!(ex_err.structure(), Some("Employee"));
}

#[test]
fn test_display_includes_code_and_path() {
    let ex_err = ExError::new(ExErrorKind::InvalidProxy)
        .with_op("push")
        .with_path(FieldPath::field("tracks").join_index(2))
        .with_message("proxy was invalidated");

    let shown = ex_err.to_string();

    assert!(shown.starts_with("[ERR_INVALID_PROXY]"));
    assert!(shown.contains("in operation 'push'"));
    assert!(shown.contains("at tracks[2]"));
}

#[test]
fn test_error_kind_code_mapping() {
    // Each kind has a stable code
    let kinds = vec![
        (ExErrorKind::TypeMismatch, "ERR_TYPE_MISMATCH"),
        (ExErrorKind::ConstraintViolation, "ERR_CONSTRAINT_VIOLATION"),
        (ExErrorKind::ConstantViolation, "ERR_CONSTANT_VIOLATION"),
        (ExErrorKind::UniquenessViolation, "ERR_UNIQUENESS_VIOLATION"),
        (ExErrorKind::TrustedNotEnabled, "ERR_TRUSTED_NOT_ENABLED"),
        (ExErrorKind::UnknownDiscriminator, "ERR_UNKNOWN_DISCRIMINATOR"),
        (ExErrorKind::Aggregate, "ERR_AGGREGATE"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}
