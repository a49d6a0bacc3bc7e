//! Multi-step version migration
//!
//! A versioned structure with N mappers is at version N + 1. Step `i`
//! (zero-based) migrates a record at version `i + 1` to `i + 2` using the
//! inbound mapper semantics, so a record at version `v` runs steps
//! `v - 1 .. N` in order and is then stamped with the current version. A
//! record without a `version` key is treated as version 1.

use serde_json::{Map, Value as JsonValue};
use std::time::Instant;
use typeshape_core_types::schema::VERSION_KEY;
use typeshape_core_types::FieldPath;

use crate::errors::{Result, SchemaError};
use crate::model::structure::StructureType;
use crate::{log_op_end, log_op_error, log_op_start};

type JsonMap = Map<String, JsonValue>;

/// Bring a plain record up to the structure's current version
///
/// Records of unversioned structures and records already at the current
/// version are returned unchanged.
///
/// # Errors
///
/// `TypeMismatch` if `raw` is not an object, `ConstraintViolation` on
/// `version` for versions that are not positive integers or are newer
/// than the structure, `MigrationFailed` when a step's transform fails.
pub fn migrate(ty: &StructureType, raw: &JsonValue) -> Result<JsonValue> {
    let start = Instant::now();
    log_op_start!("migrate", structure = ty.name());

    let result = match raw {
        JsonValue::Object(map) => migrate_map(ty, map.clone()).map(JsonValue::Object),
        other => Err(SchemaError::TypeMismatch {
            path: FieldPath::root(),
            expected: ty.name().to_string(),
            found: other.to_string(),
        }),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => {
            log_op_end!("migrate", duration_ms = duration_ms, structure = ty.name());
        }
        Err(e) => {
            log_op_error!("migrate", e, duration_ms = duration_ms, structure = ty.name());
        }
    }
    result
}

fn record_version(raw: Option<&JsonValue>, current: u32) -> Result<u32> {
    let Some(raw) = raw else {
        return Ok(1);
    };
    let version = raw
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v >= 1);
    match version {
        Some(v) if v <= current => Ok(v),
        Some(v) => Err(SchemaError::ConstraintViolation {
            path: FieldPath::field(VERSION_KEY),
            constraint: format!("version {} is newer than the current version {}", v, current),
            found: raw.to_string(),
        }),
        None => Err(SchemaError::ConstraintViolation {
            path: FieldPath::field(VERSION_KEY),
            constraint: format!("must be an integer between 1 and {}", current),
            found: raw.to_string(),
        }),
    }
}

pub(crate) fn migrate_map(ty: &StructureType, input: JsonMap) -> Result<JsonMap> {
    let (Some(steps), Some(current)) = (ty.versions(), ty.current_version()) else {
        return Ok(input);
    };
    let from = record_version(input.get(VERSION_KEY), current)?;
    if from == current {
        return Ok(input);
    }

    let mut record = input;
    for (offset, step) in steps.iter().enumerate().skip(from as usize - 1) {
        let at = offset as u32 + 1;
        record = step
            .apply_inbound(record)
            .map_err(|reason| SchemaError::MigrationFailed {
                structure: ty.name().to_string(),
                from: at,
                reason,
            })?;
        tracing::debug!(structure = %ty.name(), from = at, to = at + 1, "migration step applied");
    }
    record.insert(VERSION_KEY.to_string(), JsonValue::from(current));
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mapper::Mapper;
    use crate::errors::ExErrorKind;
    use crate::model::field::Field;
    use serde_json::json;
    use std::sync::Arc;

    fn employee() -> Arc<StructureType> {
        StructureType::builder("Employee")
            .field("full_name", Field::string())
            .field("salary", Field::integer())
            .versions(vec![
                // v1 -> v2: name became full_name
                Mapper::new().rename("full_name", "name"),
                // v2 -> v3: salary moved from monthly to yearly
                Mapper::new().transform("salary", |v| {
                    v.as_i64()
                        .map(|monthly| json!(monthly * 12))
                        .ok_or_else(|| format!("expected integer, got {}", v))
                }),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_version_runs_every_step() {
        let out = migrate(&employee(), &json!({"name": "Ann", "salary": 100})).unwrap();
        assert_eq!(out, json!({"full_name": "Ann", "salary": 1200, "version": 3}));
    }

    #[test]
    fn test_intermediate_version_skips_applied_steps() {
        let out = migrate(
            &employee(),
            &json!({"full_name": "Ann", "salary": 100, "version": 2}),
        )
        .unwrap();
        assert_eq!(out["salary"], json!(1200));
        assert_eq!(out["version"], json!(3));
    }

    #[test]
    fn test_current_record_is_unchanged() {
        let record = json!({"full_name": "Ann", "salary": 1200, "version": 3});
        assert_eq!(migrate(&employee(), &record).unwrap(), record);
    }

    #[test]
    fn test_future_version_rejected() {
        let err = migrate(&employee(), &json!({"version": 7})).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
        assert_eq!(err.path_string(), "version");
    }

    #[test]
    fn test_failing_step_reports_source_version() {
        let err = migrate(&employee(), &json!({"name": "Ann", "salary": "lots"})).unwrap_err();
        match err {
            SchemaError::MigrationFailed { from, ref reason, .. } => {
                assert_eq!(from, 2);
                assert!(reason.starts_with("salary"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unversioned_structure_passes_through() {
        let ty = StructureType::builder("Plain")
            .field("a", Field::integer())
            .build()
            .unwrap();
        let record = json!({"a": 1, "version": 9});
        assert_eq!(migrate(&ty, &record).unwrap(), record);
    }
}
