//! Structure types
//!
//! A `StructureType` is a named, ordered list of field descriptors plus the
//! record-level rules: required fields, additional properties, undefined
//! semantics, immutability, invariants, mappers, key style and the version
//! table. Types are declared once through `StructureBuilder` and shared as
//! `Arc<StructureType>`.
//!
//! ## Inheritance
//!
//! `StructureBuilder::extends` merges the parent's fields into the new type
//! at declaration time. A structure may extend several parents: they are
//! merged in the order given, later parents overriding earlier ones, and the
//! structure's own fields last. A redeclared name replaces the inherited
//! descriptor in place; immutability, invariants, mappers and key style are
//! inherited.
//!
//! ## Versioning
//!
//! A structure with a version table of N mappers is at version N + 1 and
//! carries an implicit constant `version` field holding that number.

use std::collections::BTreeSet;
use std::sync::Arc;
use typeshape_core_types::schema::VERSION_KEY;

use crate::codec::mapper::{KeyStyle, Mapper};
use crate::errors::{Result, SchemaError};
use crate::model::field::{Field, FieldKind};
use crate::model::shape::DescribeField;
use crate::rules::declaration;
use crate::rules::invariants::Invariant;
use crate::value::Value;

/// Declared record type
#[derive(Debug, Clone)]
pub struct StructureType {
    pub(crate) name: String,
    pub(crate) fields: Vec<(String, Field)>,
    pub(crate) required: BTreeSet<String>,
    pub(crate) required_explicit: bool,
    pub(crate) additional_properties: bool,
    pub(crate) allow_undefined: bool,
    pub(crate) immutable: bool,
    pub(crate) trusted: bool,
    pub(crate) unique_instances: bool,
    pub(crate) invariants: Vec<Invariant>,
    pub(crate) serialization_mapper: Option<Mapper>,
    pub(crate) deserialization_mapper: Option<Mapper>,
    pub(crate) key_style: KeyStyle,
    pub(crate) versions: Option<Vec<Mapper>>,
    pub(crate) ancestry: Vec<String>,
}

impl StructureType {
    /// Start declaring a structure
    pub fn builder(name: impl Into<String>) -> StructureBuilder {
        StructureBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> &[(String, Field)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, field)| field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn additional_properties(&self) -> bool {
        self.additional_properties
    }

    pub fn allow_undefined(&self) -> bool {
        self.allow_undefined
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn unique_instances(&self) -> bool {
        self.unique_instances
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    pub fn serialization_mapper(&self) -> Option<&Mapper> {
        self.serialization_mapper.as_ref()
    }

    pub fn deserialization_mapper(&self) -> Option<&Mapper> {
        self.deserialization_mapper.as_ref()
    }

    pub fn key_style(&self) -> KeyStyle {
        self.key_style
    }

    /// Migration steps; entry i migrates version i + 1 to i + 2
    pub fn versions(&self) -> Option<&[Mapper]> {
        self.versions.as_deref()
    }

    pub fn current_version(&self) -> Option<u32> {
        self.versions
            .as_ref()
            .map(|table| u32::try_from(table.len()).unwrap_or(u32::MAX - 1) + 1)
    }

    /// Names of every structure this one extends, nearest last
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Whether this structure is `name` or extends it
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.ancestry.iter().any(|a| a == name)
    }

    /// The only field that is not a constant, if there is exactly one
    pub fn single_field(&self) -> Option<&str> {
        let mut candidates = self
            .fields
            .iter()
            .filter(|(_, field)| !matches!(field.kind, FieldKind::Constant(_)));
        match (candidates.next(), candidates.next()) {
            (Some((name, _)), None) => Some(name.as_str()),
            _ => None,
        }
    }

    // ===== Transforms =====

    /// Same fields, none required
    pub fn partial(&self, name: impl Into<String>) -> Arc<StructureType> {
        let mut ty = self.derived(name);
        ty.required.clear();
        ty.required_explicit = true;
        Arc::new(ty)
    }

    /// Every field except `omitted`
    ///
    /// # Errors
    ///
    /// `InvalidDeclaration` if a name is not a field of this structure.
    pub fn omit(&self, name: impl Into<String>, omitted: &[&str]) -> Result<Arc<StructureType>> {
        self.ensure_declared(omitted)?;
        let keep: Vec<&str> = self
            .field_names()
            .filter(|n| !omitted.contains(n))
            .collect();
        Ok(Arc::new(self.restricted(name, &keep)))
    }

    /// Only the `picked` fields
    ///
    /// # Errors
    ///
    /// `InvalidDeclaration` if a name is not a field of this structure.
    pub fn pick(&self, name: impl Into<String>, picked: &[&str]) -> Result<Arc<StructureType>> {
        self.ensure_declared(picked)?;
        Ok(Arc::new(self.restricted(name, picked)))
    }

    /// Union with `other`; its descriptors win on name clashes
    ///
    /// # Errors
    ///
    /// `Unhashable` or `InvalidDeclaration` if the merged type fails the
    /// declaration checks.
    pub fn extend_with(
        &self,
        name: impl Into<String>,
        other: &StructureType,
    ) -> Result<Arc<StructureType>> {
        let mut ty = self.derived(name);
        for (field_name, field) in &other.fields {
            upsert(&mut ty.fields, field_name, field.clone());
        }
        ty.required.extend(other.required.iter().cloned());
        ty.required_explicit = self.required_explicit || other.required_explicit;
        ty.additional_properties = self.additional_properties && other.additional_properties;
        ty.allow_undefined = self.allow_undefined || other.allow_undefined;
        ty.immutable = self.immutable || other.immutable;
        ty.invariants.extend(other.invariants.iter().cloned());
        push_lineage(&mut ty.ancestry, other);
        push_lineage(&mut ty.ancestry, self);
        declaration::check_structure(&ty)?;
        Ok(Arc::new(ty))
    }

    fn derived(&self, name: impl Into<String>) -> StructureType {
        let mut ty = self.clone();
        ty.name = name.into();
        ty.ancestry = Vec::new();
        ty
    }

    fn restricted(&self, name: impl Into<String>, keep: &[&str]) -> StructureType {
        let mut ty = self.derived(name);
        ty.fields.retain(|(n, _)| keep.contains(&n.as_str()));
        ty.required.retain(|n| keep.contains(&n.as_str()));
        // invariants may read fields that are gone
        ty.invariants.clear();
        if !keep.contains(&VERSION_KEY) {
            ty.versions = None;
        }
        ty
    }

    fn ensure_declared(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| self.field(n).is_none()) {
            Some(missing) => Err(SchemaError::InvalidDeclaration {
                structure: self.name.clone(),
                reason: format!("{} is not a field", missing),
            }),
            None => Ok(()),
        }
    }
}

fn upsert(fields: &mut Vec<(String, Field)>, name: &str, field: Field) {
    match fields.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = field,
        None => fields.push((name.to_string(), field)),
    }
}

/// Append `ty` and its ancestors to `ancestry`, skipping names already there
fn push_lineage(ancestry: &mut Vec<String>, ty: &StructureType) {
    for name in ty.ancestry.iter().chain(std::iter::once(&ty.name)) {
        if !ancestry.contains(name) {
            ancestry.push(name.clone());
        }
    }
}

fn inferred_required(field: &Field) -> bool {
    field.default.is_none() && !field.optional && !matches!(field.kind, FieldKind::Constant(_))
}

/// Declaration-time builder for `StructureType`
pub struct StructureBuilder {
    name: String,
    fields: Vec<(String, Field)>,
    required: Option<BTreeSet<String>>,
    additional_properties: Option<bool>,
    allow_undefined: Option<bool>,
    immutable: bool,
    trusted: Option<bool>,
    unique_instances: Option<bool>,
    invariants: Vec<Invariant>,
    serialization_mapper: Option<Mapper>,
    deserialization_mapper: Option<Mapper>,
    key_style: Option<KeyStyle>,
    versions: Option<Vec<Mapper>>,
    parents: Vec<Arc<StructureType>>,
}

impl StructureBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            required: None,
            additional_properties: None,
            allow_undefined: None,
            immutable: false,
            trusted: None,
            unique_instances: None,
            invariants: Vec::new(),
            serialization_mapper: None,
            deserialization_mapper: None,
            key_style: None,
            versions: None,
            parents: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        upsert(&mut self.fields, &name, field);
        self
    }

    /// Field whose descriptor is derived from a Rust type
    pub fn typed_field<T: DescribeField>(self, name: impl Into<String>) -> Self {
        self.field(name, T::field())
    }

    pub fn constant(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field(name, Field::constant(value))
    }

    /// Explicit required set; replaces inference
    pub fn required<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.required = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Accept (and keep) undeclared keys; enabled unless turned off
    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = Some(allowed);
        self
    }

    /// Allow fields to hold the `Undefined` sentinel
    pub fn allow_undefined(mut self) -> Self {
        self.allow_undefined = Some(true);
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Opt in to `construct_trusted`
    pub fn trusted(mut self) -> Self {
        self.trusted = Some(true);
        self
    }

    /// Register whole instances with the uniqueness index
    pub fn unique_instances(mut self) -> Self {
        self.unique_instances = Some(true);
        self
    }

    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.invariants.push(invariant);
        self
    }

    pub fn serialization_mapper(mut self, mapper: Mapper) -> Self {
        self.serialization_mapper = Some(mapper);
        self
    }

    pub fn deserialization_mapper(mut self, mapper: Mapper) -> Self {
        self.deserialization_mapper = Some(mapper);
        self
    }

    pub fn key_style(mut self, style: KeyStyle) -> Self {
        self.key_style = Some(style);
        self
    }

    /// Version table; entry i migrates version i + 1 to i + 2
    pub fn versions(mut self, steps: Vec<Mapper>) -> Self {
        self.versions = Some(steps);
        self
    }

    /// Inherit from `parent`; may be called once per parent
    pub fn extends(mut self, parent: &Arc<StructureType>) -> Self {
        self.parents.push(parent.clone());
        self
    }

    /// Finish the declaration
    ///
    /// # Errors
    ///
    /// `Unhashable` for set items or map keys that cannot hash, and
    /// `InvalidDeclaration` for misapplied modifiers, invalid patterns,
    /// invalid literal defaults, unknown required names or a field that
    /// shadows the implicit `version` field. With several problems the
    /// error is an `Aggregate`.
    pub fn build(self) -> Result<Arc<StructureType>> {
        let parents = &self.parents;
        // later parents override earlier ones
        let nearest = parents.last().map(Arc::as_ref);

        let mut fields = Vec::new();
        for parent in parents {
            for (name, field) in &parent.fields {
                upsert(&mut fields, name, field.clone());
            }
        }
        for (name, field) in &self.fields {
            upsert(&mut fields, name, field.clone());
        }

        if let Some(table) = &self.versions {
            if self.fields.iter().any(|(n, _)| n == VERSION_KEY) {
                return Err(SchemaError::InvalidDeclaration {
                    structure: self.name,
                    reason: format!("{} is reserved for versioned structures", VERSION_KEY),
                });
            }
            let current = i64::try_from(table.len()).unwrap_or(i64::MAX - 1) + 1;
            upsert(&mut fields, VERSION_KEY, Field::constant(current));
        }

        let inherits_explicit = parents.iter().any(|p| p.required_explicit);
        let (required, required_explicit) = match self.required {
            Some(explicit) => (explicit, true),
            None if inherits_explicit => {
                let mut required: BTreeSet<String> = parents
                    .iter()
                    .flat_map(|p| p.required.iter().cloned())
                    .collect();
                required.extend(
                    self.fields
                        .iter()
                        .filter(|(_, f)| inferred_required(f))
                        .map(|(n, _)| n.clone()),
                );
                (required, true)
            }
            None => (
                fields
                    .iter()
                    .filter(|(_, f)| inferred_required(f))
                    .map(|(n, _)| n.clone())
                    .collect(),
                false,
            ),
        };

        let mut invariants: Vec<Invariant> = parents
            .iter()
            .flat_map(|p| p.invariants.iter().cloned())
            .collect();
        invariants.extend(self.invariants);

        let mut ancestry = Vec::new();
        for parent in parents {
            push_lineage(&mut ancestry, parent);
        }

        let ty = StructureType {
            name: self.name,
            fields,
            required,
            required_explicit,
            additional_properties: self
                .additional_properties
                .or(nearest.map(|p| p.additional_properties))
                .unwrap_or(true),
            allow_undefined: self
                .allow_undefined
                .or(nearest.map(|p| p.allow_undefined))
                .unwrap_or(false),
            immutable: self.immutable || parents.iter().any(|p| p.immutable),
            trusted: self.trusted.or(nearest.map(|p| p.trusted)).unwrap_or(false),
            unique_instances: self
                .unique_instances
                .or(nearest.map(|p| p.unique_instances))
                .unwrap_or(false),
            invariants,
            serialization_mapper: self
                .serialization_mapper
                .or_else(|| parents.iter().rev().find_map(|p| p.serialization_mapper.clone())),
            deserialization_mapper: self
                .deserialization_mapper
                .or_else(|| parents.iter().rev().find_map(|p| p.deserialization_mapper.clone())),
            key_style: self
                .key_style
                .or(nearest.map(|p| p.key_style))
                .unwrap_or_default(),
            versions: self.versions,
            ancestry,
        };

        declaration::check_structure(&ty)?;
        tracing::debug!(
            structure = %ty.name,
            field_count = ty.fields.len(),
            "structure declared"
        );
        Ok(Arc::new(ty))
    }
}
