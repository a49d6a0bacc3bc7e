//! Instance construction
//!
//! Validated construction resolves defaults and constants, checks required
//! fields, validates every supplied value, keeps or rejects undeclared keys,
//! runs invariants and finally registers uniqueness claims. Trusted
//! construction fills the slots directly for structures that opted in.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use typeshape_core_types::FieldPath;

use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::field::{Field, FieldKind};
use crate::model::instance::Origin;
use crate::model::structure::StructureType;
use crate::model::Instance;
use crate::ops::uniqueness::{self, UniquenessIndex};
use crate::rules::invariants;
use crate::rules::validation::{self, Collector, ValidationContext};
use crate::value::Value;

/// Construction settings
#[derive(Debug, Clone, Default)]
pub struct ConstructOptions {
    pub mode: ValidationMode,
    /// Registry for unique fields; uniqueness is not checked without one
    pub uniqueness: Option<Arc<UniquenessIndex>>,
}

impl ConstructOptions {
    pub fn collect_all(mut self) -> Self {
        self.mode = ValidationMode::CollectAll;
        self
    }

    pub fn with_uniqueness(mut self, index: Arc<UniquenessIndex>) -> Self {
        self.uniqueness = Some(index);
        self
    }
}

fn named<I, K, V>(values: I) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Build a validated instance from named values
///
/// # Errors
///
/// The first violation found, or an `Aggregate` of all of them in
/// collect-all mode: `UnknownField`, `MissingRequired`, field validation
/// errors, `StructureInvariantViolation`, `UniquenessViolation`.
pub fn construct<I, K, V>(
    ty: &Arc<StructureType>,
    values: I,
    options: &ConstructOptions,
) -> Result<Instance>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut instance = construct_at(ty, named(values), &FieldPath::root(), options.mode)?;
    register(&mut instance, options.uniqueness.as_ref())?;
    tracing::debug!(
        structure = %ty.name(),
        field_count = instance.values().len(),
        "instance constructed"
    );
    Ok(instance)
}

/// Build an instance of a single-field wrapper from its one value
///
/// # Errors
///
/// `InvalidInput` unless the structure has exactly one non-constant field;
/// otherwise as `construct`.
pub fn construct_single(
    ty: &Arc<StructureType>,
    value: impl Into<Value>,
    options: &ConstructOptions,
) -> Result<Instance> {
    let name = ty
        .single_field()
        .ok_or_else(|| SchemaError::InvalidInput {
            path: FieldPath::root(),
            reason: format!("{} does not have exactly one field", ty.name()),
        })?
        .to_string();
    construct(ty, [(name, value.into())], options)
}

/// Build an instance without field, combinator or invariant validation
///
/// Defaults, constants and the version stamp are still applied, and values
/// get the same shape conversions validated construction performs (integers
/// widened for float fields, date strings parsed, lists turned into sets,
/// tuples and deques) so both paths produce equal instances. Map values for
/// structure fields go through validated construction. Uniqueness is not
/// registered.
///
/// # Errors
///
/// `TrustedNotEnabled` unless the structure was declared `trusted()`,
/// `UnknownField` for undeclared keys the structure does not accept, and
/// validation errors from nested structure construction.
pub fn construct_trusted<I, K, V>(
    ty: &Arc<StructureType>,
    values: I,
    options: &ConstructOptions,
) -> Result<Instance>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    if !ty.is_trusted() {
        return Err(SchemaError::TrustedNotEnabled {
            structure: ty.name().to_string(),
        });
    }

    let mut c = Collector::new(ValidationMode::FailFast);
    let (declared, extras) = split_declared(ty, named(values), &FieldPath::root(), &mut c)?;
    let cx = ValidationContext::new(options.mode).with_siblings(&declared);

    let mut stored = BTreeMap::new();
    for (name, field) in ty.fields() {
        let path = FieldPath::field(name);
        let value = match (field.constant_value(), declared.get(name)) {
            (Some(constant), _) => Some(constant.clone()),
            (None, Some(value)) => Some(trusted_value(field, value.clone(), &path, &cx)?),
            (None, None) => field.default_value().map(|d| d.produce()),
        };
        if let Some(value) = value {
            stored.insert(name.clone(), value);
        }
    }

    tracing::debug!(structure = %ty.name(), "trusted instance constructed");
    Ok(Instance::from_parts(ty.clone(), stored, extras, Origin::Trusted))
}

fn trusted_value(
    field: &Field,
    value: Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    let converted = match (&field.kind, value) {
        (FieldKind::Structure(_) | FieldKind::Polymorphic(_), map @ Value::Map(_)) => {
            return validation::validate_field(field, map, path, cx);
        }
        (FieldKind::Float(_), Value::Int(i)) => Value::Float(i as f64),
        (FieldKind::Date { .. } | FieldKind::DateTime { .. }, text @ Value::Str(_)) => {
            validation::validate_field(field, text.clone(), path, cx).unwrap_or(text)
        }
        (FieldKind::Array(seq), Value::List(items)) => {
            Value::List(trusted_items(|i| seq.items.at(i), items, path, cx)?)
        }
        (FieldKind::Deque { seq, maxlen }, Value::List(items)) => Value::Deque(bounded(
            trusted_items(|i| seq.items.at(i), items, path, cx)?,
            *maxlen,
        )),
        (FieldKind::Deque { seq, maxlen }, Value::Deque(items)) => Value::Deque(bounded(
            trusted_items(|i| seq.items.at(i), items.into(), path, cx)?,
            *maxlen,
        )),
        (FieldKind::Tuple { items: positions, .. }, Value::List(items) | Value::Tuple(items)) => {
            Value::Tuple(trusted_items(|i| positions.get(i), items, path, cx)?)
        }
        (FieldKind::Set { items: item, .. }, Value::List(items)) => Value::Set(
            trusted_items(|_| item.as_deref(), items, path, cx)?
                .into_iter()
                .collect(),
        ),
        (FieldKind::Map { keys, values, .. }, Value::Map(entries)) => {
            let mut out = BTreeMap::new();
            for (k, v) in entries {
                let entry_path = path.join_key(k.key_string());
                let k = match keys {
                    Some(key_field) => trusted_value(key_field, k, &entry_path, cx)?,
                    None => k,
                };
                let v = match values {
                    Some(value_field) => trusted_value(value_field, v, &entry_path, cx)?,
                    None => v,
                };
                out.insert(k, v);
            }
            Value::Map(out)
        }
        // shape conversion only; a value no candidate accepts is kept as given
        (FieldKind::Combinator(_), value) => {
            validation::validate_field(field, value.clone(), path, cx).unwrap_or(value)
        }
        (_, other) => other,
    };
    Ok(converted)
}

/// Newest `maxlen` items, as a bounded deque keeps them
fn bounded(items: Vec<Value>, maxlen: Option<usize>) -> VecDeque<Value> {
    let mut items: VecDeque<Value> = items.into();
    if let Some(max) = maxlen {
        while items.len() > max {
            items.pop_front();
        }
    }
    items
}

fn trusted_items<'f>(
    descriptor: impl Fn(usize) -> Option<&'f Field>,
    items: Vec<Value>,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Vec<Value>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match descriptor(i) {
            Some(field) => trusted_value(field, item, &path.join_index(i), cx),
            None => Ok(item),
        })
        .collect()
}

/// Separate declared fields from undeclared keys
fn split_declared(
    ty: &StructureType,
    values: BTreeMap<String, Value>,
    base: &FieldPath,
    c: &mut Collector,
) -> Result<(BTreeMap<String, Value>, BTreeMap<String, Value>)> {
    let mut declared = BTreeMap::new();
    let mut extras = BTreeMap::new();
    for (key, value) in values {
        if ty.field(&key).is_some() {
            declared.insert(key, value);
        } else if ty.additional_properties() {
            extras.insert(key, value);
        } else {
            c.record(SchemaError::UnknownField {
                path: base.join_field(&key),
                structure: ty.name().to_string(),
            })?;
        }
    }
    Ok((declared, extras))
}

/// Validated construction at `base`, without uniqueness registration
///
/// Nested structure fields are built through here with their absolute path.
pub(crate) fn construct_at(
    ty: &Arc<StructureType>,
    values: BTreeMap<String, Value>,
    base: &FieldPath,
    mode: ValidationMode,
) -> Result<Instance> {
    let mut c = Collector::new(mode);
    let (declared, extras) = split_declared(ty, values, base, &mut c)?;
    let cx = ValidationContext::new(mode).with_siblings(&declared);

    let mut stored = BTreeMap::new();
    for (name, field) in ty.fields() {
        let path = base.join_field(name);
        let validated = match declared.get(name) {
            Some(Value::Undefined) if ty.allow_undefined() => Some(Value::Undefined),
            Some(value) => c.take(validation::validate_field(field, value.clone(), &path, &cx))?,
            None => match (field.constant_value(), field.default_value()) {
                (Some(constant), _) => Some(constant.clone()),
                (None, Some(default)) => {
                    c.take(validation::validate_field(field, default.produce(), &path, &cx))?
                }
                (None, None) => {
                    if ty.is_required(name) {
                        c.record(SchemaError::MissingRequired { path })?;
                    }
                    None
                }
            },
        };
        if let Some(value) = validated {
            stored.insert(name.clone(), value);
        }
    }
    c.finish(())?;

    let instance = Instance::from_parts(ty.clone(), stored, extras, Origin::Validated);
    invariants::check_invariants(&instance, base)?;
    Ok(instance)
}

/// Register a new top-level instance with the index, if there is one
pub(crate) fn register(instance: &mut Instance, index: Option<&Arc<UniquenessIndex>>) -> Result<()> {
    if let Some(index) = index {
        index.claim_all(&uniqueness::claims_for(instance))?;
        instance.attach_index(index.clone());
    }
    Ok(())
}
