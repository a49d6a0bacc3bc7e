//! Validated container proxies
//!
//! A `Proxy` is a borrow-scoped guard over one field of an instance,
//! optionally narrowed to a position inside it (`at`, `key`, `field`). Typed
//! views (`SeqProxy`, `SetProxy`, `MapProxy`, `DequeProxy`, `StructProxy`)
//! expose the mutating operations of their container.
//!
//! Every mutation is applied to a copy of the top-level field, which is then
//! re-validated in full (nested instances included) and committed through
//! the owner, running its invariants and uniqueness claims. A rejected
//! mutation leaves the instance untouched and moves the proxy to
//! `ProxyState::Invalid`, after which it refuses further mutations; obtain
//! a fresh proxy to continue.
//!
//! ```text
//! Live --(mutation rejected by validation, invariant or uniqueness)--> Invalid
//! ```
//!
//! Caller mistakes such as an out-of-range index are reported as
//! `InvalidInput` and leave the proxy live.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use typeshape_core_types::FieldPath;

use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::field::{Field, FieldKind};
use crate::model::Instance;
use crate::rules::validation::{self, ValidationContext};
use crate::value::Value;

/// One navigation step below the top-level field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Index(usize),
    Key(Value),
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Live,
    /// A mutation was rejected; every further mutation fails
    Invalid,
}

fn resolve<'v>(value: &'v Value, step: &Step) -> Option<&'v Value> {
    match (value, step) {
        (Value::List(items) | Value::Tuple(items), Step::Index(i)) => items.get(*i),
        (Value::Deque(items), Step::Index(i)) => items.get(*i),
        (Value::Map(entries), Step::Key(k)) => entries.get(k),
        (Value::Instance(instance), Step::Field(name)) => instance.get(name),
        _ => None,
    }
}

fn resolve_mut<'v>(value: &'v mut Value, step: &Step) -> Option<&'v mut Value> {
    match (value, step) {
        (Value::List(items) | Value::Tuple(items), Step::Index(i)) => items.get_mut(*i),
        (Value::Deque(items), Step::Index(i)) => items.get_mut(*i),
        (Value::Map(entries), Step::Key(k)) => entries.get_mut(k),
        (value @ Value::Instance(_), Step::Field(name)) => value
            .as_instance_mut()
            .and_then(|instance| instance.values.get_mut(name)),
        _ => None,
    }
}

fn immutable(path: &FieldPath, reason: impl Into<String>) -> SchemaError {
    SchemaError::ImmutableViolation {
        path: path.clone(),
        reason: reason.into(),
    }
}

fn invalid_input(path: &FieldPath, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidInput {
        path: path.clone(),
        reason: reason.into(),
    }
}

/// Mutation guard over one field of an instance
#[derive(Debug)]
pub struct Proxy<'a> {
    owner: &'a mut Instance,
    field: String,
    steps: Vec<Step>,
    state: ProxyState,
}

impl<'a> Proxy<'a> {
    pub(crate) fn new(owner: &'a mut Instance, field: &str) -> Result<Self> {
        if owner.structure().field(field).is_none() {
            return Err(SchemaError::UnknownField {
                path: FieldPath::field(field),
                structure: owner.name().to_string(),
            });
        }
        Ok(Self {
            owner,
            field: field.to_string(),
            steps: Vec::new(),
            state: ProxyState::Live,
        })
    }

    /// Narrow to a sequence or deque position
    pub fn at(mut self, index: usize) -> Self {
        self.steps.push(Step::Index(index));
        self
    }

    /// Narrow to a map entry
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.steps.push(Step::Key(key.into()));
        self
    }

    /// Narrow to a field of a nested instance
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Field(name.into()));
        self
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    /// Absolute path of the guarded value
    pub fn path(&self) -> FieldPath {
        self.steps
            .iter()
            .fold(FieldPath::field(&self.field), |path, step| match step {
                Step::Index(i) => path.join_index(*i),
                Step::Key(k) => path.join_key(k.key_string()),
                Step::Field(name) => path.join_field(name),
            })
    }

    /// The guarded value, if present
    pub fn get(&self) -> Option<&Value> {
        self.steps
            .iter()
            .try_fold(self.owner.get(&self.field)?, |value, step| resolve(value, step))
    }

    /// Check the proxy may mutate and find the descriptor of its target
    fn guard(&self) -> Result<Option<Field>> {
        let path = self.path();
        if self.state == ProxyState::Invalid {
            return Err(SchemaError::InvalidProxy { path });
        }
        let ty = self.owner.structure();
        if ty.is_immutable() {
            return Err(immutable(&path, format!("{} is immutable", ty.name())));
        }
        let top = ty
            .field(&self.field)
            .ok_or_else(|| invalid_input(&path, "not a declared field"))?;
        if top.is_immutable() {
            return Err(immutable(&path, format!("field {} is immutable", self.field)));
        }

        let mut descriptor = Some(top.clone());
        let mut value = self.owner.get(&self.field);
        for step in &self.steps {
            let current = value.ok_or_else(|| invalid_input(&path, "no value at this path"))?;
            descriptor = match step {
                Step::Index(i) => descriptor.and_then(|d| match d.kind {
                    FieldKind::Array(seq) | FieldKind::Deque { seq, .. } => seq.items.at(*i).cloned(),
                    FieldKind::Tuple { items, .. } => items.get(*i).cloned(),
                    _ => None,
                }),
                Step::Key(_) => descriptor.and_then(|d| match d.kind {
                    FieldKind::Map { values, .. } => values.map(|v| *v),
                    _ => None,
                }),
                Step::Field(name) => {
                    let nested = current
                        .as_instance()
                        .ok_or_else(|| invalid_input(&path, "not a structure instance"))?;
                    if nested.structure().is_immutable() {
                        return Err(immutable(
                            &path,
                            format!("{} is immutable", nested.name()),
                        ));
                    }
                    let field = nested.structure().field(name).ok_or_else(|| {
                        SchemaError::UnknownField {
                            path: path.clone(),
                            structure: nested.name().to_string(),
                        }
                    })?;
                    if field.is_immutable() {
                        return Err(immutable(&path, format!("field {} is immutable", name)));
                    }
                    Some(field.clone())
                }
            };
            value = resolve(current, step);
        }
        value.ok_or_else(|| invalid_input(&path, "no value at this path"))?;
        Ok(descriptor)
    }

    /// Apply `op` to a copy of the target, re-validate the whole top-level
    /// field and commit it through the owner
    fn mutate<R>(&mut self, op: impl FnOnce(&mut Value, Option<&Field>) -> Result<R>) -> Result<R> {
        let descriptor = self.guard()?;
        let path = self.path();

        let mut top = self
            .owner
            .get(&self.field)
            .cloned()
            .ok_or_else(|| invalid_input(&path, "field is not set"))?;
        let target = self
            .steps
            .iter()
            .try_fold(&mut top, |value, step| resolve_mut(value, step))
            .ok_or_else(|| invalid_input(&path, "no value at this path"))?;
        let result = op(target, descriptor.as_ref())?;

        let ty = self.owner.structure().clone();
        let field = ty
            .field(&self.field)
            .ok_or_else(|| invalid_input(&path, "not a declared field"))?;
        let validated = {
            let cx = ValidationContext::new(ValidationMode::FailFast)
                .deep()
                .with_siblings(&self.owner.values);
            validation::validate_field(field, top, &FieldPath::field(&self.field), &cx)
        };
        match validated.and_then(|value| self.owner.commit(&self.field, Some(value))) {
            Ok(()) => {
                tracing::trace!(structure = %ty.name(), path = %path, "proxy mutation committed");
                Ok(result)
            }
            Err(e) => {
                self.state = ProxyState::Invalid;
                tracing::debug!(
                    structure = %ty.name(),
                    path = %path,
                    err.code = SchemaError::kind(&e).code(),
                    "proxy mutation rejected"
                );
                Err(e)
            }
        }
    }

    fn expect(self, expected: &str, accepts: fn(&Value) -> bool) -> Result<Self> {
        let path = self.path();
        let problem = match self.get() {
            Some(Value::Tuple(_)) => Some(immutable(&path, "tuples cannot be modified in place")),
            Some(value) if accepts(value) => None,
            Some(value) => Some(SchemaError::TypeMismatch {
                path,
                expected: expected.to_string(),
                found: value.type_name().to_string(),
            }),
            None => Some(invalid_input(&path, "no value at this path")),
        };
        match problem {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    pub fn into_seq(self) -> Result<SeqProxy<'a>> {
        self.expect("list", |v| matches!(v, Value::List(_)))
            .map(|inner| SeqProxy { inner })
    }

    pub fn into_set(self) -> Result<SetProxy<'a>> {
        self.expect("set", |v| matches!(v, Value::Set(_)))
            .map(|inner| SetProxy { inner })
    }

    pub fn into_map(self) -> Result<MapProxy<'a>> {
        self.expect("map", |v| matches!(v, Value::Map(_)))
            .map(|inner| MapProxy { inner })
    }

    pub fn into_deque(self) -> Result<DequeProxy<'a>> {
        self.expect("deque", |v| matches!(v, Value::Deque(_)))
            .map(|inner| DequeProxy { inner })
    }

    pub fn into_struct(self) -> Result<StructProxy<'a>> {
        self.expect("structure instance", |v| matches!(v, Value::Instance(_)))
            .map(|inner| StructProxy { inner })
    }
}

fn list_of<'v>(target: &'v mut Value, path: &FieldPath) -> Result<&'v mut Vec<Value>> {
    match target {
        Value::List(items) => Ok(items),
        other => Err(invalid_input(path, format!("expected list, found {}", other.type_name()))),
    }
}

fn set_of<'v>(target: &'v mut Value, path: &FieldPath) -> Result<&'v mut BTreeSet<Value>> {
    match target {
        Value::Set(items) => Ok(items),
        other => Err(invalid_input(path, format!("expected set, found {}", other.type_name()))),
    }
}

fn map_of<'v>(target: &'v mut Value, path: &FieldPath) -> Result<&'v mut BTreeMap<Value, Value>> {
    match target {
        Value::Map(entries) => Ok(entries),
        other => Err(invalid_input(path, format!("expected map, found {}", other.type_name()))),
    }
}

fn deque_of<'v>(target: &'v mut Value, path: &FieldPath) -> Result<&'v mut VecDeque<Value>> {
    match target {
        Value::Deque(items) => Ok(items),
        other => Err(invalid_input(path, format!("expected deque, found {}", other.type_name()))),
    }
}

/// Mutating view over a list
#[derive(Debug)]
pub struct SeqProxy<'a> {
    inner: Proxy<'a>,
}

impl<'a> SeqProxy<'a> {
    pub fn state(&self) -> ProxyState {
        self.inner.state()
    }

    pub fn items(&self) -> &[Value] {
        match self.inner.get() {
            Some(Value::List(items)) => items.as_slice(),
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        let path = self.inner.path();
        let value = value.into();
        self.inner.mutate(|target, _| {
            list_of(target, &path)?.push(value);
            Ok(())
        })
    }

    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let path = self.inner.path();
        let value = value.into();
        self.inner.mutate(|target, _| {
            let items = list_of(target, &path)?;
            if index > items.len() {
                return Err(invalid_input(&path, format!("index {} out of range", index)));
            }
            items.insert(index, value);
            Ok(())
        })
    }

    pub fn extend<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        let path = self.inner.path();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.inner.mutate(|target, _| {
            list_of(target, &path)?.extend(values);
            Ok(())
        })
    }

    /// Replace the item at `index`
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let path = self.inner.path();
        let value = value.into();
        self.inner.mutate(|target, _| {
            let slot = list_of(target, &path)?
                .get_mut(index)
                .ok_or_else(|| invalid_input(&path, format!("index {} out of range", index)))?;
            *slot = value;
            Ok(())
        })
    }

    pub fn remove(&mut self, index: usize) -> Result<Value> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            let items = list_of(target, &path)?;
            if index >= items.len() {
                return Err(invalid_input(&path, format!("index {} out of range", index)));
            }
            Ok(items.remove(index))
        })
    }

    /// Remove the first item equal to `value`; false when there is none
    pub fn remove_item(&mut self, value: &Value) -> Result<bool> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            let items = list_of(target, &path)?;
            match items.iter().position(|item| item == value) {
                Some(i) => {
                    items.remove(i);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    pub fn pop(&mut self) -> Result<Option<Value>> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| Ok(list_of(target, &path)?.pop()))
    }

    pub fn retain(&mut self, keep: impl FnMut(&Value) -> bool) -> Result<()> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            list_of(target, &path)?.retain(keep);
            Ok(())
        })
    }

    pub fn clear(&mut self) -> Result<()> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            list_of(target, &path)?.clear();
            Ok(())
        })
    }
}

/// Mutating view over a set
pub struct SetProxy<'a> {
    inner: Proxy<'a>,
}

impl<'a> SetProxy<'a> {
    pub fn state(&self) -> ProxyState {
        self.inner.state()
    }

    pub fn contains(&self, value: &Value) -> bool {
        matches!(self.inner.get(), Some(Value::Set(items)) if items.contains(value))
    }

    pub fn len(&self) -> usize {
        self.inner.get().and_then(Value::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a member; false when it was already present
    pub fn insert(&mut self, value: impl Into<Value>) -> Result<bool> {
        let path = self.inner.path();
        let value = value.into();
        self.inner
            .mutate(|target, _| Ok(set_of(target, &path)?.insert(value)))
    }

    pub fn remove(&mut self, value: &Value) -> Result<bool> {
        let path = self.inner.path();
        self.inner
            .mutate(|target, _| Ok(set_of(target, &path)?.remove(value)))
    }

    pub fn extend<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        let path = self.inner.path();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.inner.mutate(|target, _| {
            set_of(target, &path)?.extend(values);
            Ok(())
        })
    }

    pub fn clear(&mut self) -> Result<()> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            set_of(target, &path)?.clear();
            Ok(())
        })
    }
}

/// Mutating view over a map
pub struct MapProxy<'a> {
    inner: Proxy<'a>,
}

impl<'a> MapProxy<'a> {
    pub fn state(&self) -> ProxyState {
        self.inner.state()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self.inner.get() {
            Some(Value::Map(entries)) => entries.get(key),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.get().and_then(Value::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace an entry, returning the previous value
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        let path = self.inner.path();
        let (key, value) = (key.into(), value.into());
        self.inner
            .mutate(|target, _| Ok(map_of(target, &path)?.insert(key, value)))
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>> {
        let path = self.inner.path();
        self.inner
            .mutate(|target, _| Ok(map_of(target, &path)?.remove(key)))
    }

    pub fn clear(&mut self) -> Result<()> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            map_of(target, &path)?.clear();
            Ok(())
        })
    }
}

/// Mutating view over a deque
///
/// With a `maxlen`, pushing onto a full deque discards from the opposite
/// end.
pub struct DequeProxy<'a> {
    inner: Proxy<'a>,
}

fn maxlen_of(descriptor: Option<&Field>) -> Option<usize> {
    match descriptor.map(Field::kind) {
        Some(FieldKind::Deque { maxlen, .. }) => *maxlen,
        _ => None,
    }
}

impl<'a> DequeProxy<'a> {
    pub fn state(&self) -> ProxyState {
        self.inner.state()
    }

    pub fn items(&self) -> Vec<&Value> {
        match self.inner.get() {
            Some(Value::Deque(items)) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.get().and_then(Value::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_back(&mut self, value: impl Into<Value>) -> Result<()> {
        let path = self.inner.path();
        let value = value.into();
        self.inner.mutate(|target, descriptor| {
            let items = deque_of(target, &path)?;
            items.push_back(value);
            if let Some(max) = maxlen_of(descriptor) {
                while items.len() > max {
                    items.pop_front();
                }
            }
            Ok(())
        })
    }

    pub fn push_front(&mut self, value: impl Into<Value>) -> Result<()> {
        let path = self.inner.path();
        let value = value.into();
        self.inner.mutate(|target, descriptor| {
            let items = deque_of(target, &path)?;
            items.push_front(value);
            if let Some(max) = maxlen_of(descriptor) {
                while items.len() > max {
                    items.pop_back();
                }
            }
            Ok(())
        })
    }

    pub fn pop_back(&mut self) -> Result<Option<Value>> {
        let path = self.inner.path();
        self.inner
            .mutate(|target, _| Ok(deque_of(target, &path)?.pop_back()))
    }

    pub fn pop_front(&mut self) -> Result<Option<Value>> {
        let path = self.inner.path();
        self.inner
            .mutate(|target, _| Ok(deque_of(target, &path)?.pop_front()))
    }

    pub fn clear(&mut self) -> Result<()> {
        let path = self.inner.path();
        self.inner.mutate(|target, _| {
            deque_of(target, &path)?.clear();
            Ok(())
        })
    }
}

/// Mutating view over a nested structure instance
pub struct StructProxy<'a> {
    inner: Proxy<'a>,
}

impl<'a> StructProxy<'a> {
    pub fn state(&self) -> ProxyState {
        self.inner.state()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get().and_then(Value::as_instance)?.get(name)
    }

    /// Assign a field of the nested instance
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let path = self.inner.path().join_field(name);
        let value = value.into();
        self.inner.mutate(|target, _| {
            let nested = target
                .as_instance_mut()
                .ok_or_else(|| invalid_input(&path, "not a structure instance"))?;
            let ty = nested.structure().clone();
            if ty.is_immutable() {
                return Err(immutable(&path, format!("{} is immutable", ty.name())));
            }
            match ty.field(name) {
                Some(field) if field.is_immutable() => {
                    Err(immutable(&path, format!("field {} is immutable", name)))
                }
                Some(_) => {
                    nested.values.insert(name.to_string(), value);
                    Ok(())
                }
                None if ty.additional_properties() => {
                    nested.extras.insert(name.to_string(), value);
                    Ok(())
                }
                None => Err(SchemaError::UnknownField {
                    path: path.clone(),
                    structure: ty.name().to_string(),
                }),
            }
        })
    }

    /// Remove a non-required field of the nested instance
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let path = self.inner.path().join_field(name);
        self.inner.mutate(|target, _| {
            let nested = target
                .as_instance_mut()
                .ok_or_else(|| invalid_input(&path, "not a structure instance"))?;
            let ty = nested.structure().clone();
            if ty.is_immutable() {
                return Err(immutable(&path, format!("{} is immutable", ty.name())));
            }
            if ty.is_required(name) {
                return Err(SchemaError::MissingRequired { path: path.clone() });
            }
            if ty.field(name).is_some_and(|f| f.is_immutable() || f.constant_value().is_some()) {
                return Err(immutable(&path, format!("field {} cannot be removed", name)));
            }
            nested.values.remove(name);
            nested.extras.remove(name);
            Ok(())
        })
    }
}

impl Instance {
    /// Mutation guard over one declared field
    ///
    /// # Errors
    ///
    /// `UnknownField` if the structure does not declare `field`.
    pub fn proxy(&mut self, field: &str) -> Result<Proxy<'_>> {
        Proxy::new(self, field)
    }

    /// # Errors
    ///
    /// `UnknownField`, or `TypeMismatch` when the field does not hold a list.
    pub fn seq_mut(&mut self, field: &str) -> Result<SeqProxy<'_>> {
        self.proxy(field)?.into_seq()
    }

    /// # Errors
    ///
    /// `UnknownField`, or `TypeMismatch` when the field does not hold a set.
    pub fn set_mut(&mut self, field: &str) -> Result<SetProxy<'_>> {
        self.proxy(field)?.into_set()
    }

    /// # Errors
    ///
    /// `UnknownField`, or `TypeMismatch` when the field does not hold a map.
    pub fn map_mut(&mut self, field: &str) -> Result<MapProxy<'_>> {
        self.proxy(field)?.into_map()
    }

    /// # Errors
    ///
    /// `UnknownField`, or `TypeMismatch` when the field does not hold a deque.
    pub fn deque_mut(&mut self, field: &str) -> Result<DequeProxy<'_>> {
        self.proxy(field)?.into_deque()
    }

    /// # Errors
    ///
    /// `UnknownField`, or `TypeMismatch` when the field does not hold an
    /// instance.
    pub fn struct_mut(&mut self, field: &str) -> Result<StructProxy<'_>> {
        self.proxy(field)?.into_struct()
    }
}
