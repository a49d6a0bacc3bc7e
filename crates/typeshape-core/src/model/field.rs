//! Field descriptors
//!
//! A `Field` is the atomic constraint unit: the expected kind plus bounds,
//! default, and the per-field flags (`immutable`, `unique`, `sensitive`,
//! `serialize`). Descriptors are built with chained modifiers and are shared
//! read-only by every instance of the declaring structure.
//!
//! A modifier applied to a kind it does not fit (say `max_length` on an
//! integer) is not a panic: it is recorded and reported as
//! `InvalidDeclaration` when the owning structure is built.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use typeshape_core_types::FieldPath;

use crate::config::ValidationMode;
use crate::errors::Result;
use crate::model::combinator::Combinator;
use crate::model::structure::StructureType;
use crate::rules::validation::{self, ValidationContext};
use crate::value::Value;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const IPV4_PATTERN: &str =
    r"^((25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])$";
const HOSTNAME_PATTERN: &str =
    r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";

/// Zero-argument default producer
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default for an absent field
#[derive(Clone)]
pub enum DefaultValue {
    /// Cloned into every instance
    Literal(Value),
    /// Called once per instance
    Factory(DefaultFactory),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => write!(f, "Literal({})", value),
            DefaultValue::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// Range constraints shared by the numeric kinds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericBounds {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StringBounds {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

/// Item-count constraints shared by the container kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeBounds {
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// Item rule for sequences
#[derive(Debug, Clone)]
pub enum Items {
    /// Items pass unchecked
    Any,
    /// Every position uses the same descriptor
    Single(Box<Field>),
    /// Positions validated by index; positions past the list use
    /// `additional` if given, otherwise pass unchecked
    Positional {
        items: Vec<Field>,
        additional: Option<Box<Field>>,
    },
}

impl Items {
    /// Descriptor governing position `index`, if any
    pub fn at(&self, index: usize) -> Option<&Field> {
        match self {
            Items::Any => None,
            Items::Single(item) => Some(item),
            Items::Positional { items, additional } => {
                items.get(index).or(additional.as_deref())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeqSpec {
    pub items: Items,
    pub size: SizeBounds,
    pub unique_items: bool,
}

impl SeqSpec {
    fn new(items: Items) -> Self {
        Self {
            items,
            size: SizeBounds::default(),
            unique_items: false,
        }
    }
}

/// Selects the concrete structure of a polymorphic field from a sibling
/// value of the owning record
#[derive(Clone)]
pub struct Discriminator {
    pub sibling: String,
    choose: Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>,
}

impl Discriminator {
    /// Discriminator computed by an arbitrary function of the sibling value;
    /// the function returns the chosen structure name
    pub fn new<F>(sibling: impl Into<String>, choose: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            sibling: sibling.into(),
            choose: Arc::new(choose),
        }
    }

    /// Discriminator backed by a fixed sibling-value to structure-name table
    pub fn by_value<V, S>(sibling: impl Into<String>, table: impl IntoIterator<Item = (V, S)>) -> Self
    where
        V: Into<Value>,
        S: Into<String>,
    {
        let table: Vec<(Value, String)> = table
            .into_iter()
            .map(|(v, s)| (v.into(), s.into()))
            .collect();
        Self::new(sibling, move |value| {
            table
                .iter()
                .find(|(candidate, _)| candidate == value)
                .map(|(_, name)| name.clone())
        })
    }

    pub fn choose(&self, sibling_value: &Value) -> Option<String> {
        (self.choose)(sibling_value)
    }
}

impl fmt::Debug for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discriminator")
            .field("sibling", &self.sibling)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Polymorphic {
    pub discriminator: Discriminator,
    pub options: Vec<Arc<StructureType>>,
}

impl Polymorphic {
    pub fn option(&self, name: &str) -> Option<&Arc<StructureType>> {
        self.options.iter().find(|ty| ty.name() == name)
    }
}

/// Caller-supplied validation logic
pub trait CustomValidator: Send + Sync {
    /// Type name used in error messages and candidate listings
    fn name(&self) -> &str;

    /// Validate (and optionally coerce) a value
    ///
    /// # Errors
    ///
    /// Returns the violation found, reported at `path`.
    fn validate(&self, value: Value, path: &FieldPath) -> Result<Value>;

    /// Rebuild a value from plain data; `None` means the field cannot be
    /// deserialized
    fn from_plain(&self, _raw: &JsonValue, _path: &FieldPath) -> Option<Result<Value>> {
        None
    }

    /// Plain form of a value; `None` falls back to the generic conversion
    fn to_plain(&self, _value: &Value) -> Option<JsonValue> {
        None
    }

    fn hashable(&self) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct Custom(pub Arc<dyn CustomValidator>);

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Custom({})", self.0.name())
    }
}

/// Expected kind of a field together with its kind-specific constraints
#[derive(Debug, Clone)]
pub enum FieldKind {
    Anything,
    Null,
    Boolean,
    Integer(NumericBounds),
    /// Accepts integers, widened to floats
    Float(NumericBounds),
    /// Accepts integers and floats unchanged
    Number(NumericBounds),
    String(StringBounds),
    Enum(Vec<Value>),
    Constant(Value),
    Date { format: Option<String> },
    DateTime { format: Option<String> },
    Array(SeqSpec),
    Tuple { items: Vec<Field>, unique_items: bool },
    Set { items: Option<Box<Field>>, size: SizeBounds },
    Map {
        keys: Option<Box<Field>>,
        values: Option<Box<Field>>,
        size: SizeBounds,
    },
    Deque { seq: SeqSpec, maxlen: Option<usize> },
    Structure(Arc<StructureType>),
    Polymorphic(Polymorphic),
    Combinator(Combinator),
    Custom(Custom),
}

impl FieldKind {
    fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::Anything => "Anything",
            FieldKind::Null => "Null",
            FieldKind::Boolean => "Boolean",
            FieldKind::Integer(_) => "Integer",
            FieldKind::Float(_) => "Float",
            FieldKind::Number(_) => "Number",
            FieldKind::String(_) => "String",
            FieldKind::Enum(_) => "Enum",
            FieldKind::Constant(_) => "Constant",
            FieldKind::Date { .. } => "Date",
            FieldKind::DateTime { .. } => "DateTime",
            FieldKind::Array(_) => "Array",
            FieldKind::Tuple { .. } => "Tuple",
            FieldKind::Set { .. } => "Set",
            FieldKind::Map { .. } => "Map",
            FieldKind::Deque { .. } => "Deque",
            FieldKind::Structure(_) => "Structure",
            FieldKind::Polymorphic(_) => "Polymorphic",
            FieldKind::Combinator(c) => c.name(),
            FieldKind::Custom(_) => "Custom",
        }
    }
}

/// Constraint descriptor for one value
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) kind: FieldKind,
    pub(crate) label: Option<String>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) immutable: bool,
    pub(crate) unique: bool,
    pub(crate) sensitive: bool,
    pub(crate) serialize: bool,
    pub(crate) optional: bool,
    pub(crate) declaration_errors: Vec<String>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            label: None,
            default: None,
            immutable: false,
            unique: false,
            sensitive: false,
            serialize: true,
            optional: false,
            declaration_errors: Vec::new(),
        }
    }

    // ===== Kinds =====

    pub fn anything() -> Self {
        Self::new(FieldKind::Anything)
    }

    pub fn null() -> Self {
        Self::new(FieldKind::Null)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer(NumericBounds::default()))
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float(NumericBounds::default()))
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number(NumericBounds::default()))
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String(StringBounds::default()))
    }

    pub fn enumeration<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::new(FieldKind::Enum(values.into_iter().map(Into::into).collect()))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(FieldKind::Constant(value.into()))
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date { format: None })
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime { format: None })
    }

    /// Sequence with unchecked items
    pub fn array() -> Self {
        Self::new(FieldKind::Array(SeqSpec::new(Items::Any)))
    }

    pub fn array_of(item: Field) -> Self {
        Self::new(FieldKind::Array(SeqSpec::new(Items::Single(Box::new(item)))))
    }

    /// Sequence validated position by position
    pub fn array_positional(items: Vec<Field>) -> Self {
        Self::new(FieldKind::Array(SeqSpec::new(Items::Positional {
            items,
            additional: None,
        })))
    }

    /// Fixed-arity sequence; an empty item list accepts any arity
    pub fn tuple(items: Vec<Field>) -> Self {
        Self::new(FieldKind::Tuple {
            items,
            unique_items: false,
        })
    }

    pub fn set() -> Self {
        Self::new(FieldKind::Set {
            items: None,
            size: SizeBounds::default(),
        })
    }

    pub fn set_of(item: Field) -> Self {
        Self::new(FieldKind::Set {
            items: Some(Box::new(item)),
            size: SizeBounds::default(),
        })
    }

    pub fn map() -> Self {
        Self::new(FieldKind::Map {
            keys: None,
            values: None,
            size: SizeBounds::default(),
        })
    }

    pub fn map_of(keys: Field, values: Field) -> Self {
        Self::new(FieldKind::Map {
            keys: Some(Box::new(keys)),
            values: Some(Box::new(values)),
            size: SizeBounds::default(),
        })
    }

    pub fn deque() -> Self {
        Self::new(FieldKind::Deque {
            seq: SeqSpec::new(Items::Any),
            maxlen: None,
        })
    }

    pub fn deque_of(item: Field) -> Self {
        Self::new(FieldKind::Deque {
            seq: SeqSpec::new(Items::Single(Box::new(item))),
            maxlen: None,
        })
    }

    /// Nested structure; map input is built through the structure's
    /// constructor
    pub fn structure(ty: &Arc<StructureType>) -> Self {
        Self::new(FieldKind::Structure(ty.clone()))
    }

    pub fn polymorphic(discriminator: Discriminator, options: Vec<Arc<StructureType>>) -> Self {
        Self::new(FieldKind::Polymorphic(Polymorphic {
            discriminator,
            options,
        }))
    }

    pub fn any_of(candidates: Vec<Field>) -> Self {
        Self::new(FieldKind::Combinator(Combinator::AnyOf(candidates)))
    }

    pub fn all_of(candidates: Vec<Field>) -> Self {
        Self::new(FieldKind::Combinator(Combinator::AllOf(candidates)))
    }

    pub fn one_of(candidates: Vec<Field>) -> Self {
        Self::new(FieldKind::Combinator(Combinator::OneOf(candidates)))
    }

    pub fn not_of(candidates: Vec<Field>) -> Self {
        Self::new(FieldKind::Combinator(Combinator::NotOf(candidates)))
    }

    pub fn custom(validator: impl CustomValidator + 'static) -> Self {
        Self::new(FieldKind::Custom(Custom(Arc::new(validator))))
    }

    // ===== Helpers =====

    pub fn positive_int() -> Self {
        Self::integer().exclusive_minimum(0).labeled("PositiveInt")
    }

    pub fn negative_int() -> Self {
        Self::integer().exclusive_maximum(0).labeled("NegativeInt")
    }

    pub fn non_negative_int() -> Self {
        Self::integer().minimum(0).labeled("NonNegativeInt")
    }

    pub fn non_positive_int() -> Self {
        Self::integer().maximum(0).labeled("NonPositiveInt")
    }

    pub fn positive_float() -> Self {
        Self::float().exclusive_minimum(0).labeled("PositiveFloat")
    }

    pub fn negative_float() -> Self {
        Self::float().exclusive_maximum(0).labeled("NegativeFloat")
    }

    pub fn non_negative_float() -> Self {
        Self::float().minimum(0).labeled("NonNegativeFloat")
    }

    pub fn non_positive_float() -> Self {
        Self::float().maximum(0).labeled("NonPositiveFloat")
    }

    /// String of at most `max` characters
    pub fn sized_string(max: usize) -> Self {
        Self::string().max_length(max).labeled("SizedString")
    }

    pub fn email() -> Self {
        Self::string().pattern(EMAIL_PATTERN).labeled("EmailAddress")
    }

    pub fn ipv4() -> Self {
        Self::string().pattern(IPV4_PATTERN).labeled("IPV4")
    }

    pub fn hostname() -> Self {
        Self::string()
            .max_length(253)
            .pattern(HOSTNAME_PATTERN)
            .labeled("HostName")
    }

    // ===== Modifiers =====

    /// Type name reported in errors instead of the kind name
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn minimum(mut self, value: impl Into<f64>) -> Self {
        let value = value.into();
        if let Some(bounds) = self.numeric_mut("minimum") {
            bounds.minimum = Some(value);
        }
        self
    }

    pub fn maximum(mut self, value: impl Into<f64>) -> Self {
        let value = value.into();
        if let Some(bounds) = self.numeric_mut("maximum") {
            bounds.maximum = Some(value);
        }
        self
    }

    pub fn exclusive_minimum(mut self, value: impl Into<f64>) -> Self {
        let value = value.into();
        if let Some(bounds) = self.numeric_mut("exclusive_minimum") {
            bounds.exclusive_minimum = Some(value);
        }
        self
    }

    pub fn exclusive_maximum(mut self, value: impl Into<f64>) -> Self {
        let value = value.into();
        if let Some(bounds) = self.numeric_mut("exclusive_maximum") {
            bounds.exclusive_maximum = Some(value);
        }
        self
    }

    pub fn multiple_of(mut self, value: impl Into<f64>) -> Self {
        let value = value.into();
        if value <= 0.0 {
            self.reject("multiple_of must be positive");
        } else if let Some(bounds) = self.numeric_mut("multiple_of") {
            bounds.multiple_of = Some(value);
        }
        self
    }

    pub fn min_length(mut self, value: usize) -> Self {
        if let Some(bounds) = self.string_mut("min_length") {
            bounds.min_length = Some(value);
        }
        self
    }

    pub fn max_length(mut self, value: usize) -> Self {
        if let Some(bounds) = self.string_mut("max_length") {
            bounds.max_length = Some(value);
        }
        self
    }

    /// Regular expression the value must contain a match for
    pub fn pattern(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => {
                if let Some(bounds) = self.string_mut("pattern") {
                    bounds.pattern = Some(regex);
                }
            }
            Err(e) => self.reject(format!("invalid pattern {:?}: {}", pattern, e)),
        }
        self
    }

    pub fn min_items(mut self, value: usize) -> Self {
        if let Some(size) = self.size_mut("min_items") {
            size.min_items = Some(value);
        }
        self
    }

    pub fn max_items(mut self, value: usize) -> Self {
        if let Some(size) = self.size_mut("max_items") {
            size.max_items = Some(value);
        }
        self
    }

    pub fn unique_items(mut self) -> Self {
        match &mut self.kind {
            FieldKind::Array(seq) | FieldKind::Deque { seq, .. } => seq.unique_items = true,
            FieldKind::Tuple { unique_items, .. } => *unique_items = true,
            // set items are unique already
            FieldKind::Set { .. } => {}
            _ => self.misapplied("unique_items"),
        }
        self
    }

    /// Descriptor for positions past a positional item list
    pub fn additional_items(mut self, item: Field) -> Self {
        match &mut self.kind {
            FieldKind::Array(SeqSpec {
                items: Items::Positional { additional, .. },
                ..
            }) => *additional = Some(Box::new(item)),
            _ => self.misapplied("additional_items"),
        }
        self
    }

    /// Bound a deque; pushes past the bound discard from the opposite end
    pub fn maxlen(mut self, value: usize) -> Self {
        match &mut self.kind {
            FieldKind::Deque { maxlen, .. } => *maxlen = Some(value),
            _ => self.misapplied("maxlen"),
        }
        self
    }

    /// chrono format string for date and datetime fields
    pub fn format(mut self, fmt: impl Into<String>) -> Self {
        match &mut self.kind {
            FieldKind::Date { format } | FieldKind::DateTime { format } => {
                *format = Some(fmt.into())
            }
            _ => self.misapplied("format"),
        }
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Redact offending values of this field in error messages
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Never emit this field when serializing
    pub fn no_serialize(mut self) -> Self {
        self.serialize = false;
        self
    }

    /// Exclude from inferred required fields
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn reject(&mut self, reason: impl Into<String>) {
        self.declaration_errors.push(reason.into());
    }

    fn misapplied(&mut self, modifier: &str) {
        let reason = format!("{} does not apply to {}", modifier, self.kind.kind_name());
        self.reject(reason);
    }

    fn numeric_mut(&mut self, modifier: &str) -> Option<&mut NumericBounds> {
        if !matches!(
            self.kind,
            FieldKind::Integer(_) | FieldKind::Float(_) | FieldKind::Number(_)
        ) {
            self.misapplied(modifier);
            return None;
        }
        match &mut self.kind {
            FieldKind::Integer(b) | FieldKind::Float(b) | FieldKind::Number(b) => Some(b),
            _ => None,
        }
    }

    fn string_mut(&mut self, modifier: &str) -> Option<&mut StringBounds> {
        if !matches!(self.kind, FieldKind::String(_)) {
            self.misapplied(modifier);
            return None;
        }
        match &mut self.kind {
            FieldKind::String(b) => Some(b),
            _ => None,
        }
    }

    fn size_mut(&mut self, modifier: &str) -> Option<&mut SizeBounds> {
        if !matches!(
            self.kind,
            FieldKind::Array(_)
                | FieldKind::Set { .. }
                | FieldKind::Map { .. }
                | FieldKind::Deque { .. }
        ) {
            self.misapplied(modifier);
            return None;
        }
        match &mut self.kind {
            FieldKind::Array(seq) | FieldKind::Deque { seq, .. } => Some(&mut seq.size),
            FieldKind::Set { size, .. } | FieldKind::Map { size, .. } => Some(size),
            _ => None,
        }
    }

    // ===== Accessors =====

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    pub fn is_serialized(&self) -> bool {
        self.serialize
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The constant value, for constant fields
    pub fn constant_value(&self) -> Option<&Value> {
        match &self.kind {
            FieldKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Name used in error messages and combinator candidate listings
    pub fn type_name(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match &self.kind {
            FieldKind::Structure(ty) => ty.name().to_string(),
            FieldKind::Custom(custom) => custom.0.name().to_string(),
            other => other.kind_name().to_string(),
        }
    }

    /// Whether values of this field may be set items or map keys
    pub fn is_hashable(&self) -> bool {
        match &self.kind {
            FieldKind::Anything
            | FieldKind::Array(_)
            | FieldKind::Set { .. }
            | FieldKind::Map { .. }
            | FieldKind::Deque { .. } => false,
            FieldKind::Tuple { items, .. } => items.iter().all(Field::is_hashable),
            FieldKind::Combinator(c) => c.candidates().iter().all(Field::is_hashable),
            FieldKind::Custom(custom) => custom.0.hashable(),
            _ => true,
        }
    }

    /// Validate a value, returning its coerced form
    ///
    /// Pure: the input is consumed and nothing else is touched. Nested
    /// structure input is constructed without uniqueness checks.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the shape is wrong, `ConstraintViolation` when a
    /// bound fails, or the combinator/structure error found at `path`.
    pub fn validate(&self, value: impl Into<Value>, path: &FieldPath) -> Result<Value> {
        let cx = ValidationContext::new(ValidationMode::FailFast).redacting(self.sensitive);
        validation::validate_field(self, value.into(), path, &cx)
    }

    /// Like `validate`, reporting every violation at once
    ///
    /// # Errors
    ///
    /// An `Aggregate` of every violation found.
    pub fn validate_all(&self, value: impl Into<Value>, path: &FieldPath) -> Result<Value> {
        let cx = ValidationContext::new(ValidationMode::CollectAll).redacting(self.sensitive);
        validation::validate_field(self, value.into(), path, &cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_labels() {
        assert_eq!(Field::positive_int().type_name(), "PositiveInt");
        assert_eq!(Field::integer().type_name(), "Integer");
        assert_eq!(Field::email().type_name(), "EmailAddress");
    }

    #[test]
    fn test_misapplied_modifier_is_recorded() {
        let field = Field::integer().max_length(3);
        assert_eq!(field.declaration_errors.len(), 1);
        assert!(field.declaration_errors[0].contains("max_length"));
    }

    #[test]
    fn test_invalid_pattern_is_recorded() {
        let field = Field::string().pattern("(unclosed");
        assert_eq!(field.declaration_errors.len(), 1);
    }

    #[test]
    fn test_hashability() {
        assert!(Field::integer().is_hashable());
        assert!(Field::tuple(vec![Field::string(), Field::integer()]).is_hashable());
        assert!(!Field::array().is_hashable());
        assert!(!Field::anything().is_hashable());
        assert!(!Field::any_of(vec![Field::integer(), Field::map()]).is_hashable());
    }

    #[test]
    fn test_positional_items_lookup() {
        let items = Items::Positional {
            items: vec![Field::integer()],
            additional: Some(Box::new(Field::string())),
        };
        assert_eq!(items.at(0).map(Field::type_name).as_deref(), Some("Integer"));
        assert_eq!(items.at(5).map(Field::type_name).as_deref(), Some("String"));
        assert!(Items::Any.at(0).is_none());
    }

    #[test]
    fn test_factory_default_produces_fresh_values() {
        let field = Field::array().default_with(|| Value::List(Vec::new()));
        let a = field.default_value().map(DefaultValue::produce);
        let b = field.default_value().map(DefaultValue::produce);
        assert_eq!(a, b);
    }

    #[test]
    fn test_discriminator_by_value() {
        let d = Discriminator::by_value("kind", [("circle", "Circle"), ("square", "Square")]);
        assert_eq!(d.choose(&Value::from("circle")).as_deref(), Some("Circle"));
        assert_eq!(d.choose(&Value::from("hexagon")), None);
    }
}
