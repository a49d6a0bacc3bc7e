//! Structure instances
//!
//! An `Instance` holds one value slot per present field plus a side table of
//! undeclared keys. Every stored value satisfies its descriptor (or is the
//! `Undefined` sentinel when the structure allows it), and every committed
//! mutation re-runs the structure's invariants and uniqueness claims,
//! rolling back on failure.
//!
//! `Clone` is shallow: nested instances are shared `Arc`s and are copied on
//! write. `deep_copy` shares nothing. Copies of either kind are detached
//! from the uniqueness index: the claims stay with the registered record.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use typeshape_core_types::schema::VERSION_KEY;
use typeshape_core_types::{FieldPath, Sensitive};

use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::field::{Field, FieldKind};
use crate::model::structure::StructureType;
use crate::ops::uniqueness::{self, Claim, UniquenessIndex};
use crate::rules::invariants;
use crate::rules::validation::{self, ValidationContext};
use crate::value::Value;

/// How an instance came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Validated,
    /// Built by `construct_trusted`; values were not checked
    Trusted,
}

pub struct Instance {
    pub(crate) ty: Arc<StructureType>,
    pub(crate) values: BTreeMap<String, Value>,
    pub(crate) extras: BTreeMap<String, Value>,
    pub(crate) origin: Origin,
    pub(crate) uniqueness: Option<Arc<UniquenessIndex>>,
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            values: self.values.clone(),
            extras: self.extras.clone(),
            origin: self.origin,
            uniqueness: None,
        }
    }
}

impl Instance {
    pub(crate) fn from_parts(
        ty: Arc<StructureType>,
        values: BTreeMap<String, Value>,
        extras: BTreeMap<String, Value>,
        origin: Origin,
    ) -> Self {
        Self {
            ty,
            values,
            extras,
            origin,
            uniqueness: None,
        }
    }

    pub(crate) fn attach_index(&mut self, index: Arc<UniquenessIndex>) {
        self.uniqueness = Some(index);
    }

    /// Same structure and extras with replaced (already validated) values
    pub(crate) fn with_values(&self, values: BTreeMap<String, Value>) -> Instance {
        Instance {
            ty: self.ty.clone(),
            values,
            extras: self.extras.clone(),
            origin: Origin::Validated,
            uniqueness: self.uniqueness.clone(),
        }
    }

    pub fn structure(&self) -> &Arc<StructureType> {
        &self.ty
    }

    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// Stored value of a declared field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Undeclared keys kept because the structure allows them
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_trusted(&self) -> bool {
        self.origin == Origin::Trusted
    }

    /// Stamped version of a versioned structure
    pub fn version(&self) -> Option<u32> {
        self.values
            .get(VERSION_KEY)
            .and_then(Value::as_i64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// SHA-256 over the field-wise content (hex)
    pub fn fingerprint(&self) -> String {
        uniqueness::fingerprint(self)
    }

    /// Copy sharing nested instances until either side writes to them
    pub fn shallow_copy(&self) -> Instance {
        self.clone()
    }

    /// Copy sharing no storage with `self`
    pub fn deep_copy(&self) -> Instance {
        Instance {
            ty: self.ty.clone(),
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect(),
            extras: self
                .extras
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect(),
            origin: self.origin,
            uniqueness: None,
        }
    }

    fn ensure_mutable(&self, path: &FieldPath) -> Result<()> {
        if self.ty.is_immutable() {
            return Err(SchemaError::ImmutableViolation {
                path: path.clone(),
                reason: format!("{} is immutable", self.ty.name()),
            });
        }
        Ok(())
    }

    /// Assign a field, validating the value first
    ///
    /// Undeclared names go to the side table when the structure allows
    /// additional properties.
    ///
    /// # Errors
    ///
    /// `ImmutableViolation` for immutable structures or fields,
    /// `ConstantViolation` for a differing constant, `UnknownField`, any
    /// validation error of the field, `StructureInvariantViolation` or
    /// `UniquenessViolation`. The instance is unchanged on error.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let path = FieldPath::field(name);
        self.ensure_mutable(&path)?;

        let ty = self.ty.clone();
        let Some(field) = ty.field(name) else {
            if !ty.additional_properties() {
                return Err(SchemaError::UnknownField {
                    path,
                    structure: ty.name().to_string(),
                });
            }
            let old = self.extras.insert(name.to_string(), value);
            if let Err(e) = invariants::check_invariants(self, &FieldPath::root()) {
                match old {
                    Some(v) => self.extras.insert(name.to_string(), v),
                    None => self.extras.remove(name),
                };
                return Err(e);
            }
            return Ok(());
        };

        if let Some(constant) = field.constant_value() {
            if &value == constant {
                return Ok(());
            }
            return Err(SchemaError::ConstantViolation {
                path,
                expected: constant.to_string(),
                found: Sensitive::render(&value, field.is_sensitive()),
            });
        }
        if field.is_immutable() {
            return Err(SchemaError::ImmutableViolation {
                path,
                reason: format!("field {} is immutable", name),
            });
        }

        let validated = if value.is_undefined() && ty.allow_undefined() {
            Value::Undefined
        } else {
            let cx = ValidationContext::new(ValidationMode::FailFast).with_siblings(&self.values);
            validation::validate_field(field, value, &path, &cx)?
        };
        self.check_dependents(name, &validated)?;
        tracing::trace!(structure = %ty.name(), field = name, "field assigned");
        self.commit(name, Some(validated))
    }

    /// Re-validate polymorphic fields whose discriminator reads `name`
    /// against the sibling value about to be stored
    fn check_dependents(&self, name: &str, incoming: &Value) -> Result<()> {
        let dependents: Vec<&(String, Field)> = self
            .ty
            .fields()
            .iter()
            .filter(|(field_name, field)| {
                field_name != name
                    && matches!(&field.kind, FieldKind::Polymorphic(poly) if poly.discriminator.sibling == name)
            })
            .collect();
        if dependents.is_empty() {
            return Ok(());
        }

        let mut siblings = self.values.clone();
        siblings.insert(name.to_string(), incoming.clone());
        let cx = ValidationContext::new(ValidationMode::FailFast).with_siblings(&siblings);
        for (field_name, field) in dependents {
            match self.values.get(field_name) {
                None | Some(Value::Undefined) => {}
                Some(stored) => {
                    validation::validate_field(
                        field,
                        stored.clone(),
                        &FieldPath::field(field_name),
                        &cx.redacting(field.is_sensitive()),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Remove a non-required field (or an extra key)
    ///
    /// # Errors
    ///
    /// `MissingRequired` for required fields, `ImmutableViolation` for
    /// immutable structures, fields and constants, `UnknownField` for names
    /// that are neither declared nor present as extras.
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let path = FieldPath::field(name);
        self.ensure_mutable(&path)?;

        let ty = self.ty.clone();
        let Some(field) = ty.field(name) else {
            return match self.extras.remove(name) {
                Some(old) => {
                    if let Err(e) = invariants::check_invariants(self, &FieldPath::root()) {
                        self.extras.insert(name.to_string(), old);
                        return Err(e);
                    }
                    Ok(())
                }
                None => Err(SchemaError::UnknownField {
                    path,
                    structure: ty.name().to_string(),
                }),
            };
        };

        if ty.is_required(name) {
            return Err(SchemaError::MissingRequired { path });
        }
        if field.is_immutable() || field.constant_value().is_some() {
            return Err(SchemaError::ImmutableViolation {
                path,
                reason: format!("field {} cannot be removed", name),
            });
        }
        self.commit(name, None)
    }

    /// Store (or remove) an already validated value, then run invariants
    /// and uniqueness claims; restores the previous value on failure
    pub(crate) fn commit(&mut self, name: &str, new: Option<Value>) -> Result<()> {
        let tracks_instances = self.uniqueness.is_some() && self.ty.unique_instances();
        let before = tracks_instances.then(|| Claim::instance(self));

        let old = match new {
            Some(value) => self.values.insert(name.to_string(), value),
            None => self.values.remove(name),
        };

        if let Err(e) = self.after_change(name, old.as_ref(), before) {
            match old {
                Some(value) => self.values.insert(name.to_string(), value),
                None => self.values.remove(name),
            };
            return Err(e);
        }
        Ok(())
    }

    fn after_change(&self, name: &str, old: Option<&Value>, before: Option<Claim>) -> Result<()> {
        invariants::check_invariants(self, &FieldPath::root())?;

        let Some(index) = &self.uniqueness else {
            return Ok(());
        };
        let mut claims = Vec::new();
        let mut releases = Vec::new();

        if let Some(field) = self.ty.field(name).filter(|f| f.is_unique()) {
            let new = self.values.get(name);
            if new != old {
                if let Some(value) = new.filter(|v| !v.is_undefined()) {
                    claims.push(Claim::field(self.ty.name(), name, value, field.is_sensitive()));
                }
                if let Some(value) = old.filter(|v| !v.is_undefined()) {
                    releases.push(Claim::field(self.ty.name(), name, value, field.is_sensitive()));
                }
            }
        }
        if let Some(before) = before {
            let after = Claim::instance(self);
            if after != before {
                claims.push(after);
                releases.push(before);
            }
        }

        index.claim_all(&claims)?;
        for released in &releases {
            index.release(released);
        }
        Ok(())
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Instance {}

impl PartialOrd for Instance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ty
            .name()
            .cmp(other.ty.name())
            .then_with(|| self.values.cmp(&other.values))
            .then_with(|| self.extras.cmp(&other.extras))
    }
}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.name().hash(state);
        self.values.hash(state);
        self.extras.hash(state);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ty.name())?;
        let mut first = true;
        for (name, field) in self.ty.fields() {
            let Some(value) = self.values.get(name) else {
                continue;
            };
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", name, Sensitive::render(value, field.is_sensitive()))?;
        }
        for (name, value) in &self.extras {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", name, value)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("structure", &self.ty.name())
            .field("values", &self.values)
            .field("extras", &self.extras)
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;
    use crate::model::field::Field;
    use crate::ops::construct::{construct, ConstructOptions};
    use crate::rules::invariants::Invariant;

    fn account() -> Arc<StructureType> {
        StructureType::builder("Account")
            .field("owner", Field::string())
            .field("balance", Field::integer())
            .field("limit", Field::non_negative_int().default(100))
            .field("opened", Field::date().immutable())
            .field("kind", Field::constant("checking"))
            .invariant(Invariant::new("within limit", |acct: &Instance| {
                let balance = acct.get("balance").and_then(Value::as_i64).unwrap_or(0);
                let limit = acct.get("limit").and_then(Value::as_i64).unwrap_or(0);
                if balance >= -limit {
                    Ok(())
                } else {
                    Err(format!("balance {} exceeds limit {}", balance, limit))
                }
            }))
            .required(["owner", "balance"])
            .build()
            .unwrap()
    }

    fn sample() -> Instance {
        construct(
            &account(),
            [
                ("owner", Value::from("ann")),
                ("balance", Value::Int(10)),
                ("opened", Value::from("2020-01-01")),
            ],
            &ConstructOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_set_validates_and_commits() {
        let mut acct = sample();
        acct.set("balance", 50).unwrap();
        assert_eq!(acct.get("balance"), Some(&Value::Int(50)));

        let err = acct.set("balance", "lots").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::TypeMismatch);
        assert_eq!(acct.get("balance"), Some(&Value::Int(50)));
    }

    #[test]
    fn test_invariant_failure_rolls_back() {
        let mut acct = sample();
        let err = acct.set("balance", -500).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::StructureInvariantViolation);
        assert_eq!(acct.get("balance"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_constant_and_immutable_fields() {
        let mut acct = sample();
        assert!(acct.set("kind", "checking").is_ok());
        assert_eq!(
            acct.set("kind", "savings").unwrap_err().kind(),
            ExErrorKind::ConstantViolation
        );
        assert_eq!(
            acct.set("opened", "2021-01-01").unwrap_err().kind(),
            ExErrorKind::ImmutableViolation
        );
    }

    #[test]
    fn test_unset_rules() {
        let mut acct = sample();
        assert_eq!(
            acct.unset("owner").unwrap_err().kind(),
            ExErrorKind::MissingRequired
        );
        acct.set("balance", -50).unwrap();
        let err = acct.unset("limit").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::StructureInvariantViolation);
        assert_eq!(acct.get("limit"), Some(&Value::Int(100)));
    }

    #[test]
    fn test_extras_via_set() {
        let mut acct = sample();
        acct.set("note", "vip").unwrap();
        assert_eq!(acct.extras().get("note"), Some(&Value::from("vip")));
        acct.unset("note").unwrap();
        assert!(acct.extras().is_empty());
    }

    #[test]
    fn test_display_and_equality() {
        let a = sample();
        let b = sample();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            a.to_string(),
            "Account(owner=\"ann\", balance=10, limit=100, opened=2020-01-01, kind=\"checking\")"
        );
    }
}
