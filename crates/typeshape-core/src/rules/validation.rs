//! Per-kind validation
//!
//! `validate_field` checks a value against a descriptor and returns its
//! coerced form. Coercions run before bound checks and report failures as
//! `TypeMismatch`. Container items, map entries and nested structures are
//! validated recursively with absolute paths.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use typeshape_core_types::{FieldPath, Sensitive};

use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::field::{
    Field, FieldKind, NumericBounds, Polymorphic, SeqSpec, SizeBounds, StringBounds,
};
use crate::model::structure::StructureType;
use crate::model::Instance;
use crate::ops::construct;
use crate::rules::invariants;
use crate::value::Value;

const DATETIME_FALLBACK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Settings threaded through one validation pass
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValidationContext<'a> {
    pub(crate) mode: ValidationMode,
    /// Redact offending values in error messages
    pub(crate) redact: bool,
    /// Re-validate nested instances instead of trusting them
    pub(crate) deep: bool,
    /// Raw or stored values of the owning record, for discriminators
    pub(crate) siblings: Option<&'a BTreeMap<String, Value>>,
}

impl ValidationContext<'static> {
    pub(crate) fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            redact: false,
            deep: false,
            siblings: None,
        }
    }
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn redacting(mut self, redact: bool) -> Self {
        self.redact = self.redact || redact;
        self
    }

    pub(crate) fn with_mode(&self, mode: ValidationMode) -> Self {
        Self { mode, ..*self }
    }

    pub(crate) fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub(crate) fn with_siblings<'b>(
        &self,
        siblings: &'b BTreeMap<String, Value>,
    ) -> ValidationContext<'b> {
        ValidationContext {
            mode: self.mode,
            redact: self.redact,
            deep: self.deep,
            siblings: Some(siblings),
        }
    }

    /// Offending value as shown in error messages
    pub(crate) fn show(&self, value: &Value) -> String {
        Sensitive::render(value, self.redact)
    }

    pub(crate) fn collector(&self) -> Collector {
        Collector::new(self.mode)
    }
}

/// Error sink honoring the validation mode
///
/// Fail-fast hands the first error straight back; collect-all keeps going
/// and reports everything as one aggregate at `finish`.
pub(crate) struct Collector {
    mode: ValidationMode,
    errors: Vec<SchemaError>,
}

impl Collector {
    pub(crate) fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            errors: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, err: SchemaError) -> Result<()> {
        match self.mode {
            ValidationMode::FailFast => Err(err),
            ValidationMode::CollectAll => {
                self.errors.push(err);
                Ok(())
            }
        }
    }

    /// Unwrap a result, recording its error; `None` means it failed
    pub(crate) fn take<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => self.record(err).map(|()| None),
        }
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn finish<T>(self, value: T) -> Result<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(SchemaError::aggregate(self.errors))
        }
    }
}

fn mismatch(expected: impl Into<String>, value: &Value, path: &FieldPath, cx: &ValidationContext<'_>) -> SchemaError {
    SchemaError::TypeMismatch {
        path: path.clone(),
        expected: expected.into(),
        found: format!("{} {}", value.type_name(), cx.show(value)),
    }
}

fn violation(constraint: impl Into<String>, value: &Value, path: &FieldPath, cx: &ValidationContext<'_>) -> SchemaError {
    SchemaError::ConstraintViolation {
        path: path.clone(),
        constraint: constraint.into(),
        found: cx.show(value),
    }
}

/// Validate `value` against `field`, returning the coerced value
pub(crate) fn validate_field(
    field: &Field,
    value: Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    let cx = cx.redacting(field.sensitive);
    if value.is_undefined() {
        return Err(mismatch(field.type_name(), &value, path, &cx));
    }

    match &field.kind {
        FieldKind::Anything => Ok(value),
        FieldKind::Null => match value {
            Value::Null => Ok(value),
            other => Err(mismatch(field.type_name(), &other, path, &cx)),
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(value),
            other => Err(mismatch(field.type_name(), &other, path, &cx)),
        },
        FieldKind::Integer(bounds) => match value {
            Value::Int(i) => {
                check_numeric(bounds, i as f64, &value, path, &cx)?;
                Ok(value)
            }
            other => Err(mismatch(field.type_name(), &other, path, &cx)),
        },
        FieldKind::Float(bounds) => {
            let widened = match value {
                Value::Int(i) => Value::Float(i as f64),
                Value::Float(_) => value,
                other => return Err(mismatch(field.type_name(), &other, path, &cx)),
            };
            let x = widened.as_f64().unwrap_or(f64::NAN);
            check_numeric(bounds, x, &widened, path, &cx)?;
            Ok(widened)
        }
        FieldKind::Number(bounds) => match value.as_f64() {
            Some(x) => {
                check_numeric(bounds, x, &value, path, &cx)?;
                Ok(value)
            }
            None => Err(mismatch(field.type_name(), &value, path, &cx)),
        },
        FieldKind::String(bounds) => match value {
            Value::Str(ref s) => {
                check_string(bounds, s, &value, path, &cx)?;
                Ok(value)
            }
            other => Err(mismatch(field.type_name(), &other, path, &cx)),
        },
        FieldKind::Enum(allowed) => {
            if allowed.contains(&value) {
                Ok(value)
            } else {
                let listed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                Err(violation(
                    format!("must be one of [{}]", listed.join(", ")),
                    &value,
                    path,
                    &cx,
                ))
            }
        }
        FieldKind::Constant(expected) => {
            if &value == expected {
                Ok(value)
            } else {
                Err(SchemaError::ConstantViolation {
                    path: path.clone(),
                    expected: expected.to_string(),
                    found: cx.show(&value),
                })
            }
        }
        FieldKind::Date { format } => coerce_date(format.as_deref(), value, path, &cx),
        FieldKind::DateTime { format } => coerce_datetime(format.as_deref(), value, path, &cx),
        FieldKind::Array(seq) => match value {
            Value::List(items) => validate_seq(seq, items, path, &cx).map(Value::List),
            other => Err(mismatch(field.type_name(), &other, path, &cx)),
        },
        FieldKind::Tuple {
            items: positions,
            unique_items,
        } => {
            let items = match value {
                Value::Tuple(items) | Value::List(items) => items,
                other => return Err(mismatch(field.type_name(), &other, path, &cx)),
            };
            validate_tuple(positions, *unique_items, items, path, &cx).map(Value::Tuple)
        }
        FieldKind::Set { items, size } => {
            let members: Vec<Value> = match value {
                Value::Set(set) => set.into_iter().collect(),
                Value::List(list) => list,
                other => return Err(mismatch(field.type_name(), &other, path, &cx)),
            };
            validate_set(items.as_deref(), size, members, path, &cx).map(Value::Set)
        }
        FieldKind::Map { keys, values, size } => match value {
            Value::Map(entries) => {
                validate_map(keys.as_deref(), values.as_deref(), size, entries, path, &cx)
                    .map(Value::Map)
            }
            other => Err(mismatch(field.type_name(), &other, path, &cx)),
        },
        FieldKind::Deque { seq, maxlen } => {
            let mut items: VecDeque<Value> = match value {
                Value::Deque(items) => items,
                Value::List(items) => items.into(),
                other => return Err(mismatch(field.type_name(), &other, path, &cx)),
            };
            if let Some(max) = maxlen {
                while items.len() > *max {
                    items.pop_front();
                }
            }
            validate_seq(seq, items.into(), path, &cx).map(|v| Value::Deque(v.into()))
        }
        FieldKind::Structure(ty) => validate_structure(ty, value, path, &cx),
        FieldKind::Polymorphic(poly) => validate_polymorphic(poly, value, path, &cx),
        FieldKind::Combinator(combinator) => combinator.validate(value, path, &cx),
        FieldKind::Custom(custom) => custom.0.validate(value, path),
    }
}

fn check_numeric(
    bounds: &NumericBounds,
    x: f64,
    value: &Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<()> {
    if let Some(min) = bounds.minimum {
        if x < min {
            return Err(violation(format!("must be >= {}", min), value, path, cx));
        }
    }
    if let Some(max) = bounds.maximum {
        if x > max {
            return Err(violation(format!("must be <= {}", max), value, path, cx));
        }
    }
    if let Some(min) = bounds.exclusive_minimum {
        if x <= min {
            return Err(violation(format!("must be > {}", min), value, path, cx));
        }
    }
    if let Some(max) = bounds.exclusive_maximum {
        if x >= max {
            return Err(violation(format!("must be < {}", max), value, path, cx));
        }
    }
    if let Some(step) = bounds.multiple_of {
        let quotient = x / step;
        if (quotient - quotient.round()).abs() > 1e-9 {
            return Err(violation(
                format!("must be a multiple of {}", step),
                value,
                path,
                cx,
            ));
        }
    }
    Ok(())
}

fn check_string(
    bounds: &StringBounds,
    s: &str,
    value: &Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<()> {
    let length = s.chars().count();
    if let Some(min) = bounds.min_length {
        if length < min {
            return Err(violation(format!("length must be >= {}", min), value, path, cx));
        }
    }
    if let Some(max) = bounds.max_length {
        if length > max {
            return Err(violation(format!("length must be <= {}", max), value, path, cx));
        }
    }
    if let Some(pattern) = &bounds.pattern {
        if !pattern.is_match(s) {
            return Err(violation(
                format!("must match pattern {}", pattern.as_str()),
                value,
                path,
                cx,
            ));
        }
    }
    Ok(())
}

fn coerce_date(
    format: Option<&str>,
    value: Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    let fmt = format.unwrap_or(DATE_FORMAT);
    match value {
        Value::Date(_) => Ok(value),
        Value::Str(ref s) => NaiveDate::parse_from_str(s, fmt)
            .map(Value::Date)
            .map_err(|_| mismatch(format!("date ({})", fmt), &value, path, cx)),
        other => Err(mismatch(format!("date ({})", fmt), &other, path, cx)),
    }
}

fn coerce_datetime(
    format: Option<&str>,
    value: Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    let expected = || match format {
        Some(fmt) => format!("datetime ({})", fmt),
        None => "datetime (RFC 3339)".to_string(),
    };
    match value {
        Value::DateTime(_) => Ok(value),
        Value::Str(ref s) => {
            let parsed = match format {
                Some(fmt) => NaiveDateTime::parse_from_str(s, fmt).ok(),
                None => DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.naive_utc())
                    .or_else(|_| NaiveDateTime::parse_from_str(s, DATETIME_FALLBACK_FORMAT))
                    .ok(),
            };
            parsed
                .map(Value::DateTime)
                .ok_or_else(|| mismatch(expected(), &value, path, cx))
        }
        other => Err(mismatch(expected(), &other, path, cx)),
    }
}

fn check_size(
    size: &SizeBounds,
    len: usize,
    found: &Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<()> {
    if let Some(min) = size.min_items {
        if len < min {
            return Err(violation(format!("must have at least {} items", min), found, path, cx));
        }
    }
    if let Some(max) = size.max_items {
        if len > max {
            return Err(violation(format!("must have at most {} items", max), found, path, cx));
        }
    }
    Ok(())
}

fn has_duplicates(items: &[Value]) -> bool {
    let mut seen = BTreeSet::new();
    !items.iter().all(|item| seen.insert(item))
}

fn validate_seq(
    seq: &SeqSpec,
    items: Vec<Value>,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Vec<Value>> {
    let mut c = cx.collector();
    let snapshot = Value::List(items.clone());
    c.take(check_size(&seq.size, items.len(), &snapshot, path, cx))?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match seq.items.at(i) {
            Some(descriptor) => {
                let fallback = item.clone();
                let validated = c.take(validate_field(descriptor, item, &path.join_index(i), cx))?;
                out.push(validated.unwrap_or(fallback));
            }
            None => out.push(item),
        }
    }

    if seq.unique_items && has_duplicates(&out) {
        c.record(violation("items must be unique", &snapshot, path, cx))?;
    }
    c.finish(out)
}

fn validate_tuple(
    positions: &[Field],
    unique_items: bool,
    items: Vec<Value>,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Vec<Value>> {
    let snapshot = Value::Tuple(items.clone());
    if !positions.is_empty() && items.len() != positions.len() {
        return Err(violation(
            format!("must have exactly {} items", positions.len()),
            &snapshot,
            path,
            cx,
        ));
    }

    let mut c = cx.collector();
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match positions.get(i) {
            Some(descriptor) => {
                let fallback = item.clone();
                let validated = c.take(validate_field(descriptor, item, &path.join_index(i), cx))?;
                out.push(validated.unwrap_or(fallback));
            }
            None => out.push(item),
        }
    }
    if unique_items && has_duplicates(&out) {
        c.record(violation("items must be unique", &snapshot, path, cx))?;
    }
    c.finish(out)
}

fn validate_set(
    item_field: Option<&Field>,
    size: &SizeBounds,
    members: Vec<Value>,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<BTreeSet<Value>> {
    let mut c = cx.collector();
    let mut out = BTreeSet::new();
    for (i, member) in members.into_iter().enumerate() {
        match item_field {
            Some(descriptor) => {
                if let Some(v) = c.take(validate_field(descriptor, member, &path.join_index(i), cx))? {
                    out.insert(v);
                }
            }
            None => {
                out.insert(member);
            }
        }
    }
    let snapshot = Value::Set(out.clone());
    c.take(check_size(size, out.len(), &snapshot, path, cx))?;
    c.finish(out)
}

fn validate_map(
    key_field: Option<&Field>,
    value_field: Option<&Field>,
    size: &SizeBounds,
    entries: BTreeMap<Value, Value>,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<BTreeMap<Value, Value>> {
    let mut c = cx.collector();
    let snapshot = Value::Map(entries.clone());
    c.take(check_size(size, entries.len(), &snapshot, path, cx))?;

    let mut out = BTreeMap::new();
    for (key, value) in entries {
        let entry_path = path.join_key(key.key_string());
        let key = match key_field {
            Some(descriptor) => c.take(validate_field(descriptor, key, &entry_path, cx))?,
            None => Some(key),
        };
        let value = match value_field {
            Some(descriptor) => c.take(validate_field(descriptor, value, &entry_path, cx))?,
            None => Some(value),
        };
        if let (Some(k), Some(v)) = (key, value) {
            out.insert(k, v);
        }
    }
    c.finish(out)
}

/// Convert a map with string keys into field-name form
pub(crate) fn string_keyed(
    entries: BTreeMap<Value, Value>,
    path: &FieldPath,
) -> Result<BTreeMap<String, Value>> {
    entries
        .into_iter()
        .map(|(key, value)| match key {
            Value::Str(name) => Ok((name, value)),
            other => Err(SchemaError::TypeMismatch {
                path: path.clone(),
                expected: "field name".to_string(),
                found: format!("{} {}", other.type_name(), other),
            }),
        })
        .collect()
}

fn validate_structure(
    ty: &Arc<StructureType>,
    value: Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    match value {
        Value::Instance(instance) if instance.structure().is_a(ty.name()) => {
            if cx.deep {
                revalidate_instance(&instance, path, cx).map(Value::from)
            } else {
                Ok(Value::Instance(instance))
            }
        }
        Value::Map(entries) => {
            let values = string_keyed(entries, path)?;
            construct::construct_at(ty, values, path, cx.mode).map(Value::from)
        }
        other => Err(mismatch(ty.name(), &other, path, cx)),
    }
}

/// Re-run field validation and invariants over an existing instance
///
/// Used when a mutation reaches into a nested instance: its stored values
/// may have changed underneath it.
pub(crate) fn revalidate_instance(
    instance: &Instance,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Instance> {
    let ty = instance.structure();
    let stored = instance.values();
    let nested = cx.with_siblings(stored);
    let mut c = cx.collector();
    let mut values = BTreeMap::new();

    for (name, field) in ty.fields() {
        let field_path = path.join_field(name);
        match stored.get(name) {
            Some(Value::Undefined) if ty.allow_undefined() => {
                values.insert(name.clone(), Value::Undefined);
            }
            Some(value) => {
                let field_cx = nested.redacting(field.sensitive);
                if let Some(v) = c.take(validate_field(field, value.clone(), &field_path, &field_cx))? {
                    values.insert(name.clone(), v);
                }
            }
            None if ty.is_required(name) => {
                c.record(SchemaError::MissingRequired { path: field_path })?;
            }
            None => {}
        }
    }
    c.finish(())?;

    let rebuilt = instance.with_values(values);
    invariants::check_invariants(&rebuilt, path)?;
    Ok(rebuilt)
}

fn validate_polymorphic(
    poly: &Polymorphic,
    value: Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    let sibling = &poly.discriminator.sibling;
    let selected = match cx.siblings.and_then(|s| s.get(sibling)) {
        Some(sibling_value) => {
            let name = poly.discriminator.choose(sibling_value).ok_or_else(|| {
                SchemaError::UnknownDiscriminator {
                    path: path.clone(),
                    found: sibling_value.to_string(),
                }
            })?;
            let option = poly
                .option(&name)
                .ok_or_else(|| SchemaError::UnknownDiscriminator {
                    path: path.clone(),
                    found: name.clone(),
                })?;
            Some(option)
        }
        None => None,
    };

    let expected = || {
        let names: Vec<&str> = poly.options.iter().map(|o| o.name()).collect();
        format!("one of [{}]", names.join(", "))
    };

    match (value, selected) {
        (value @ (Value::Instance(_) | Value::Map(_)), Some(ty)) => {
            validate_structure(ty, value, path, cx)
        }
        (Value::Instance(instance), None) => {
            match poly
                .options
                .iter()
                .find(|o| instance.structure().is_a(o.name()))
            {
                Some(ty) => validate_structure(ty, Value::Instance(instance), path, cx),
                None => Err(mismatch(expected(), &Value::Instance(instance), path, cx)),
            }
        }
        (Value::Map(_), None) => Err(SchemaError::UnknownDiscriminator {
            path: path.clone(),
            found: format!("missing {}", sibling),
        }),
        (other, _) => Err(mismatch(expected(), &other, path, cx)),
    }
}
