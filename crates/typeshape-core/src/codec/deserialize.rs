//! Plain data to instances
//!
//! For each record (top-level or nested) the pipeline is:
//!
//! 1. migrate old versions up to the structure's current version
//! 2. accept keys in the structure's key style
//! 3. apply the deserialization mapper
//! 4. convert raw values guided by each descriptor: arrays for set, tuple
//!    and deque fields, map keys parsed per key descriptor, nested objects
//!    prepared by their own structure, custom fields through their
//!    `from_plain`, combinator fields through the first candidate whose
//!    conversion the combinator accepts
//! 5. construct, validated or trusted
//!
//! Only the top-level record goes through the trusted path; nested records
//! are always validated.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use typeshape_core_types::FieldPath;

use crate::codec::mapper::KeyStyle;
use crate::codec::versioning;
use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::combinator::Combinator;
use crate::model::field::{Field, FieldKind};
use crate::model::structure::StructureType;
use crate::model::Instance;
use crate::ops::construct::{self, ConstructOptions};
use crate::ops::uniqueness::UniquenessIndex;
use crate::rules::validation::{self, Collector, ValidationContext};
use crate::value::Value;
use crate::{log_op_end, log_op_error, log_op_start};

type JsonMap = Map<String, JsonValue>;

#[derive(Debug, Clone, Default)]
pub struct DeserializeOptions {
    pub mode: ValidationMode,
    /// Build the top-level record through `construct_trusted`
    pub trusted: bool,
    pub uniqueness: Option<Arc<UniquenessIndex>>,
}

impl DeserializeOptions {
    pub fn collect_all(mut self) -> Self {
        self.mode = ValidationMode::CollectAll;
        self
    }

    pub fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    pub fn with_uniqueness(mut self, index: Arc<UniquenessIndex>) -> Self {
        self.uniqueness = Some(index);
        self
    }
}

/// Rebuild an instance of `ty` from plain data
///
/// # Errors
///
/// `TypeMismatch` when `raw` is not an object; version errors
/// (`ConstraintViolation` on `version`, `MigrationFailed`);
/// `InvalidInput` when a mapper transform fails;
/// `UnsupportedForDeserialization` for custom fields without a plain
/// decoder; `UnknownDiscriminator`; `TrustedNotEnabled`; and everything
/// construction reports.
pub fn deserialize(
    ty: &Arc<StructureType>,
    raw: &JsonValue,
    options: &DeserializeOptions,
) -> Result<Instance> {
    let start = Instant::now();
    log_op_start!("deserialize", structure = ty.name(), trusted = options.trusted);

    let result = decode(ty, raw, options);

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => {
            log_op_end!("deserialize", duration_ms = duration_ms, structure = ty.name());
        }
        Err(e) => {
            log_op_error!("deserialize", e, duration_ms = duration_ms, structure = ty.name());
        }
    }
    result
}

fn decode(ty: &Arc<StructureType>, raw: &JsonValue, options: &DeserializeOptions) -> Result<Instance> {
    let JsonValue::Object(record) = raw else {
        return Err(SchemaError::TypeMismatch {
            path: FieldPath::root(),
            expected: ty.name().to_string(),
            found: raw.to_string(),
        });
    };
    let values = prepare(ty, record.clone(), &FieldPath::root(), options.mode)?;
    let construct_options = ConstructOptions {
        mode: options.mode,
        uniqueness: options.uniqueness.clone(),
    };
    if options.trusted {
        construct::construct_trusted(ty, values, &construct_options)
    } else {
        construct::construct(ty, values, &construct_options)
    }
}

/// Migrate, restyle, map and convert one record
fn prepare(
    ty: &StructureType,
    record: JsonMap,
    path: &FieldPath,
    mode: ValidationMode,
) -> Result<BTreeMap<String, Value>> {
    let migrated = versioning::migrate_map(ty, record).map_err(|e| match e {
        SchemaError::ConstraintViolation {
            path: at,
            constraint,
            found,
        } => SchemaError::ConstraintViolation {
            path: at.nested_under(path),
            constraint,
            found,
        },
        other => other,
    })?;
    let styled = accept_key_style(ty, migrated);
    let mapped = match ty.deserialization_mapper() {
        Some(mapper) => mapper
            .apply_inbound(styled)
            .map_err(|reason| SchemaError::InvalidInput {
                path: path.clone(),
                reason,
            })?,
        None => styled,
    };

    let mut c = Collector::new(mode);
    let mut values = BTreeMap::new();
    for (key, raw) in &mapped {
        let value = match ty.field(key) {
            Some(field) => c.take(from_plain(field, raw, &path.join_field(key), &mapped, mode))?,
            None => Some(Value::from_json(raw)),
        };
        if let Some(value) = value {
            values.insert(key.clone(), value);
        }
    }
    c.finish(values)
}

/// Rename styled keys (e.g. `firstName`) back to their field names
fn accept_key_style(ty: &StructureType, mut record: JsonMap) -> JsonMap {
    let style = ty.key_style();
    if style == KeyStyle::AsIs {
        return record;
    }
    for name in ty.field_names() {
        let styled = style.apply(name);
        if styled != name && !record.contains_key(name) {
            if let Some(value) = record.remove(&styled) {
                record.insert(name.to_string(), value);
            }
        }
    }
    record
}

fn nested(ty: &StructureType, record: &JsonMap, path: &FieldPath, mode: ValidationMode) -> Result<Value> {
    let values = prepare(ty, record.clone(), path, mode)?;
    Ok(Value::Map(
        values
            .into_iter()
            .map(|(k, v)| (Value::Str(k), v))
            .collect(),
    ))
}

/// Map key from its serialized string, per the key descriptor
fn parse_key(keys: Option<&Field>, key: &str) -> Value {
    let text = || Value::Str(key.to_string());
    match keys.map(Field::kind) {
        Some(FieldKind::Integer(_)) => key.parse::<i64>().map(Value::Int).unwrap_or_else(|_| text()),
        Some(FieldKind::Float(_)) => key.parse::<f64>().map(Value::Float).unwrap_or_else(|_| text()),
        Some(FieldKind::Number(_)) => key
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| key.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| text()),
        Some(FieldKind::Boolean) => match key {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => text(),
        },
        _ => text(),
    }
}

fn from_plain(
    field: &Field,
    raw: &JsonValue,
    path: &FieldPath,
    siblings: &JsonMap,
    mode: ValidationMode,
) -> Result<Value> {
    match (field.kind(), raw) {
        (FieldKind::Custom(custom), raw) => custom.0.from_plain(raw, path).unwrap_or_else(|| {
            Err(SchemaError::UnsupportedForDeserialization {
                path: path.clone(),
                kind: custom.0.name().to_string(),
            })
        }),
        (FieldKind::Structure(ty), JsonValue::Object(record)) => nested(ty, record, path, mode),
        (FieldKind::Polymorphic(poly), JsonValue::Object(record)) => {
            let chosen = siblings
                .get(&poly.discriminator.sibling)
                .map(Value::from_json)
                .and_then(|v| poly.discriminator.choose(&v))
                .and_then(|name| poly.option(&name).cloned());
            match chosen {
                Some(ty) => nested(&ty, record, path, mode),
                // construction reports the unknown discriminator
                None => Ok(Value::from_json(raw)),
            }
        }
        (FieldKind::Combinator(combinator), raw) => {
            Ok(from_plain_candidates(field, combinator, raw, path, siblings, mode))
        }
        (FieldKind::Array(seq) | FieldKind::Deque { seq, .. }, JsonValue::Array(list)) => {
            plain_items(|i| seq.items.at(i), list, path, siblings, mode)
        }
        (FieldKind::Tuple { items: positions, .. }, JsonValue::Array(list)) => {
            plain_items(|i| positions.get(i), list, path, siblings, mode)
        }
        (FieldKind::Set { items: item, .. }, JsonValue::Array(list)) => {
            plain_items(|_| item.as_deref(), list, path, siblings, mode)
        }
        (FieldKind::Map { keys, values, .. }, JsonValue::Object(entries)) => entries
            .iter()
            .map(|(k, v)| {
                let entry_path = path.join_key(k.as_str());
                let value = match values {
                    Some(descriptor) => from_plain(descriptor, v, &entry_path, siblings, mode)?,
                    None => Value::from_json(v),
                };
                Ok((parse_key(keys.as_deref(), k), value))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Value::Map),
        (_, raw) => Ok(Value::from_json(raw)),
    }
}

/// Convert `raw` as each candidate would, in declaration order, keeping the
/// first conversion the whole combinator accepts
///
/// Falls back to the untyped value so construction reports the mismatch.
fn from_plain_candidates(
    field: &Field,
    combinator: &Combinator,
    raw: &JsonValue,
    path: &FieldPath,
    siblings: &JsonMap,
    mode: ValidationMode,
) -> Value {
    if matches!(combinator, Combinator::NotOf(_)) {
        return Value::from_json(raw);
    }
    let stored: BTreeMap<String, Value> = siblings
        .iter()
        .map(|(k, v)| (k.clone(), Value::from_json(v)))
        .collect();
    let cx = ValidationContext::new(ValidationMode::FailFast).with_siblings(&stored);

    combinator
        .candidates()
        .iter()
        .filter_map(|candidate| from_plain(candidate, raw, path, siblings, mode).ok())
        .find(|converted| validation::validate_field(field, converted.clone(), path, &cx).is_ok())
        .unwrap_or_else(|| Value::from_json(raw))
}

fn plain_items<'f>(
    descriptor: impl Fn(usize) -> Option<&'f Field>,
    items: &[JsonValue],
    path: &FieldPath,
    siblings: &JsonMap,
    mode: ValidationMode,
) -> Result<Value> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match descriptor(i) {
            Some(d) => from_plain(d, item, &path.join_index(i), siblings, mode),
            None => Ok(Value::from_json(item)),
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mapper::Mapper;
    use crate::codec::serialize::{serialize, SerializeOptions};
    use crate::errors::ExErrorKind;
    use serde_json::json;

    fn inventory() -> Arc<StructureType> {
        StructureType::builder("Inventory")
            .field("tags", Field::set_of(Field::string()))
            .field("counts", Field::map_of(Field::integer(), Field::non_negative_int()))
            .field("point", Field::tuple(vec![Field::float(), Field::float()]))
            .field("recent", Field::deque_of(Field::string()).maxlen(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_arrays_become_typed_containers() {
        let raw = json!({
            "tags": ["b", "a", "b"],
            "counts": {"1": 10, "2": 0},
            "point": [1, 2.5],
            "recent": ["x", "y", "z"]
        });
        let inv = deserialize(&inventory(), &raw, &DeserializeOptions::default()).unwrap();
        assert_eq!(inv.get("tags").and_then(Value::len), Some(2));
        let counts = match inv.get("counts") {
            Some(Value::Map(m)) => m.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(counts.get(&Value::Int(1)), Some(&Value::Int(10)));
        assert_eq!(
            inv.get("point"),
            Some(&Value::Tuple(vec![Value::Float(1.0), Value::Float(2.5)]))
        );
        assert_eq!(inv.get("recent").and_then(Value::len), Some(2));
    }

    #[test]
    fn test_round_trip() {
        let raw = json!({
            "tags": ["a", "b"],
            "counts": {"3": 1},
            "point": [0.5, 1.5],
            "recent": ["x"]
        });
        let inv = deserialize(&inventory(), &raw, &DeserializeOptions::default()).unwrap();
        let back = serialize(&inv, &SerializeOptions::default()).unwrap();
        assert_eq!(back, raw);
        assert_eq!(
            deserialize(&inventory(), &back, &DeserializeOptions::default()).unwrap(),
            inv
        );
    }

    #[test]
    fn test_key_style_and_mapper_inbound() {
        let ty = StructureType::builder("User")
            .field("first_name", Field::string())
            .field("city", Field::string())
            .key_style(KeyStyle::CamelCase)
            .deserialization_mapper(Mapper::new().rename("city", "address.city"))
            .build()
            .unwrap();
        let user = deserialize(
            &ty,
            &json!({"firstName": "Ann", "address": {"city": "Oslo"}}),
            &DeserializeOptions::default(),
        )
        .unwrap();
        assert_eq!(user.get("first_name"), Some(&Value::from("Ann")));
        assert_eq!(user.get("city"), Some(&Value::from("Oslo")));
    }

    #[test]
    fn test_combinator_candidates_convert_like_their_kind() {
        let inner = StructureType::builder("Inner")
            .field("first_name", Field::string())
            .key_style(KeyStyle::CamelCase)
            .build()
            .unwrap();
        let ty = StructureType::builder("Outer")
            .field("x", Field::any_of(vec![Field::structure(&inner), Field::integer()]))
            .field(
                "m",
                Field::any_of(vec![
                    Field::map_of(Field::integer(), Field::integer()),
                    Field::null(),
                ]),
            )
            .build()
            .unwrap();
        let raw = json!({"x": {"firstName": "Ann"}, "m": {"1": 2}});

        let outer = deserialize(&ty, &raw, &DeserializeOptions::default()).unwrap();

        let nested = outer.get("x").and_then(Value::as_instance).unwrap();
        assert_eq!(nested.get("first_name"), Some(&Value::from("Ann")));
        let mut expected = BTreeMap::new();
        expected.insert(Value::Int(1), Value::Int(2));
        assert_eq!(outer.get("m"), Some(&Value::Map(expected)));
        assert_eq!(serialize(&outer, &SerializeOptions::default()).unwrap(), raw);
    }

    #[test]
    fn test_combinator_without_match_reports_no_option() {
        let ty = StructureType::builder("Outer")
            .field("x", Field::one_of(vec![Field::integer(), Field::boolean()]))
            .build()
            .unwrap();
        let err = deserialize(&ty, &json!({"x": "text"}), &DeserializeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NoOptionMatched);
        assert_eq!(err.path_string(), "x");
    }

    #[test]
    fn test_non_object_input() {
        let err = deserialize(&inventory(), &json!([1, 2]), &DeserializeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::TypeMismatch);
    }

    #[test]
    fn test_nested_errors_carry_absolute_paths() {
        let address = StructureType::builder("Address")
            .field("zip", Field::string().pattern(r"^\d{4}$"))
            .build()
            .unwrap();
        let ty = StructureType::builder("Customer")
            .field("addresses", Field::array_of(Field::structure(&address)))
            .build()
            .unwrap();
        let err = deserialize(
            &ty,
            &json!({"addresses": [{"zip": "0150"}, {"zip": "abc"}]}),
            &DeserializeOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
        assert_eq!(err.path_string(), "addresses[1].zip");
    }
}
