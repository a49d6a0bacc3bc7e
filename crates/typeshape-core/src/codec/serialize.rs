//! Instances to plain data
//!
//! Sets, tuples and deques become arrays, dates become strings (in the
//! field's declared format, if any) and map keys are rendered as strings.
//! Fields declared `no_serialize` are dropped and `Undefined` values are
//! omitted unless `keep_undefined` is set. Undeclared extras are emitted
//! verbatim after mapping.
//!
//! `serialize` re-validates instances built through the trusted path before
//! emitting them; `serialize_trusted` skips that pass.

use serde_json::{Map, Number, Value as JsonValue};
use std::fmt::{self, Write};
use std::time::Instant;
use typeshape_core_types::FieldPath;

use crate::codec::mapper::KeyStyle;
use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::field::{Field, FieldKind, Items};
use crate::model::Instance;
use crate::rules::validation::{self, ValidationContext};
use crate::value::Value;
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Emit `Undefined` fields as null instead of omitting them
    pub keep_undefined: bool,
}

impl SerializeOptions {
    pub fn keep_undefined(mut self) -> Self {
        self.keep_undefined = true;
        self
    }
}

/// Serialize an instance, verifying trusted-built instances first
///
/// # Errors
///
/// Any validation error of a trusted-built instance, `Serialization` for
/// non-finite floats or a failing mapper transform.
pub fn serialize(instance: &Instance, options: &SerializeOptions) -> Result<JsonValue> {
    run("serialize", instance, options, true)
}

/// Serialize without re-validating trusted-built instances
///
/// # Errors
///
/// `Serialization` for non-finite floats or a failing mapper transform.
pub fn serialize_trusted(instance: &Instance, options: &SerializeOptions) -> Result<JsonValue> {
    run("serialize_trusted", instance, options, false)
}

/// Generic plain form of a value, without descriptor guidance
///
/// # Errors
///
/// `Serialization` for non-finite floats.
pub fn value_to_plain(value: &Value) -> Result<JsonValue> {
    Walker {
        options: &SerializeOptions::default(),
        verify: false,
    }
    .plain(value)
}

fn run(op: &str, instance: &Instance, options: &SerializeOptions, verify: bool) -> Result<JsonValue> {
    let start = Instant::now();
    log_op_start!(op, structure = instance.name());

    let result = Walker { options, verify }.instance(instance);

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => {
            log_op_end!(op, duration_ms = duration_ms, structure = instance.name());
        }
        Err(e) => {
            log_op_error!(op, e, duration_ms = duration_ms, structure = instance.name());
        }
    }
    result
}

/// Render a chrono format, reporting bad format strings instead of panicking
fn formatted(rendered: impl fmt::Display, fmt: &str) -> Result<JsonValue> {
    let mut out = String::new();
    write!(out, "{}", rendered).map_err(|_| SchemaError::Serialization {
        reason: format!("invalid date format {:?}", fmt),
    })?;
    Ok(JsonValue::String(out))
}

struct Walker<'o> {
    options: &'o SerializeOptions,
    verify: bool,
}

impl Walker<'_> {
    fn instance(&self, instance: &Instance) -> Result<JsonValue> {
        let ty = instance.structure();
        if self.verify && instance.is_trusted() {
            let cx = ValidationContext::new(ValidationMode::FailFast).deep();
            validation::revalidate_instance(instance, &FieldPath::root(), &cx)?;
        }

        let mut fields = Map::new();
        for (name, field) in ty.fields() {
            if !field.is_serialized() {
                continue;
            }
            let Some(value) = instance.get(name) else {
                continue;
            };
            if value.is_undefined() {
                if self.options.keep_undefined {
                    fields.insert(name.clone(), JsonValue::Null);
                }
                continue;
            }
            fields.insert(name.clone(), self.field(field, value)?);
        }

        let mapper = ty.serialization_mapper();
        let mut out = match mapper {
            Some(m) => m.apply_outbound(fields).map_err(|reason| SchemaError::Serialization {
                reason: format!("{}: {}", ty.name(), reason),
            })?,
            None => fields,
        };

        let style = ty.key_style();
        if style != KeyStyle::AsIs {
            out = out
                .into_iter()
                .map(|(key, value)| {
                    let renamed = mapper.is_some_and(|m| m.renames(&key));
                    if ty.field(&key).is_some() && !renamed {
                        (style.apply(&key), value)
                    } else {
                        (key, value)
                    }
                })
                .collect();
        }

        for (name, value) in instance.extras() {
            if !out.contains_key(name) {
                out.insert(name.clone(), self.plain(value)?);
            }
        }
        Ok(JsonValue::Object(out))
    }

    /// Descriptor-guided conversion, for custom fields and declared formats
    fn field(&self, field: &Field, value: &Value) -> Result<JsonValue> {
        match (field.kind(), value) {
            (FieldKind::Custom(custom), v) => match custom.0.to_plain(v) {
                Some(plain) => Ok(plain),
                None => self.plain(v),
            },
            (FieldKind::Date { format: Some(fmt) }, Value::Date(d)) => {
                formatted(d.format(fmt), fmt)
            }
            (FieldKind::DateTime { format: Some(fmt) }, Value::DateTime(dt)) => {
                formatted(dt.format(fmt), fmt)
            }
            (FieldKind::Array(seq), Value::List(items)) => self.items(&seq.items, items.iter()),
            (FieldKind::Deque { seq, .. }, Value::Deque(items)) => self.items(&seq.items, items.iter()),
            (FieldKind::Tuple { items: positions, .. }, Value::Tuple(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match positions.get(i) {
                    Some(descriptor) => self.field(descriptor, item),
                    None => self.plain(item),
                })
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            (FieldKind::Set { items: Some(item), .. }, Value::Set(members)) => members
                .iter()
                .map(|m| self.field(item, m))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            (FieldKind::Map { values: Some(value_field), .. }, Value::Map(entries)) => entries
                .iter()
                .map(|(k, v)| Ok((k.key_string(), self.field(value_field, v)?)))
                .collect::<Result<Map<_, _>>>()
                .map(JsonValue::Object),
            (_, v) => self.plain(v),
        }
    }

    fn items<'v>(&self, spec: &Items, items: impl Iterator<Item = &'v Value>) -> Result<JsonValue> {
        items
            .enumerate()
            .map(|(i, item)| match spec.at(i) {
                Some(descriptor) => self.field(descriptor, item),
                None => self.plain(item),
            })
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array)
    }

    fn array<'v>(&self, items: impl Iterator<Item = &'v Value>) -> Result<JsonValue> {
        items
            .map(|item| self.plain(item))
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array)
    }

    fn plain(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Undefined | Value::Null => Ok(JsonValue::Null),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::Int(i) => Ok(JsonValue::from(*i)),
            Value::Float(x) => Number::from_f64(*x)
                .map(JsonValue::Number)
                .ok_or_else(|| SchemaError::Serialization {
                    reason: format!("{} has no plain representation", x),
                }),
            Value::Str(s) => Ok(JsonValue::String(s.clone())),
            Value::Date(_) | Value::DateTime(_) => Ok(JsonValue::String(value.to_string())),
            Value::List(items) | Value::Tuple(items) => self.array(items.iter()),
            Value::Set(items) => self.array(items.iter()),
            Value::Deque(items) => self.array(items.iter()),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.key_string(), self.plain(v)?)))
                .collect::<Result<Map<_, _>>>()
                .map(JsonValue::Object),
            Value::Instance(instance) => self.instance(instance),
        }
    }
}
