use thiserror::Error;
use typeshape_core_types::FieldPath;

/// Result type alias using SchemaError
pub type Result<T> = std::result::Result<T, SchemaError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// test assertions and external reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Field validation
    TypeMismatch,
    ConstraintViolation,
    MissingRequired,
    UnknownField,

    // Combinators
    NoOptionMatched,
    AmbiguousMatch,
    UnexpectedMatch,

    // Structure rules
    ConstantViolation,
    StructureInvariantViolation,
    ImmutableViolation,
    UniquenessViolation,

    // Declaration
    Unhashable,
    InvalidDeclaration,

    // Mutation
    InvalidProxy,

    // Trusted path
    TrustedNotEnabled,

    // Serialization
    UnknownDiscriminator,
    UnsupportedForDeserialization,
    MigrationFailed,
    Serialization,

    // Caller errors
    InvalidInput,

    /// Collect-all mode: several violations reported together
    Aggregate,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::MissingRequired => "ERR_MISSING_REQUIRED",
            ExErrorKind::UnknownField => "ERR_UNKNOWN_FIELD",
            ExErrorKind::NoOptionMatched => "ERR_NO_OPTION_MATCHED",
            ExErrorKind::AmbiguousMatch => "ERR_AMBIGUOUS_MATCH",
            ExErrorKind::UnexpectedMatch => "ERR_UNEXPECTED_MATCH",
            ExErrorKind::ConstantViolation => "ERR_CONSTANT_VIOLATION",
            ExErrorKind::StructureInvariantViolation => "ERR_STRUCTURE_INVARIANT_VIOLATION",
            ExErrorKind::ImmutableViolation => "ERR_IMMUTABLE_VIOLATION",
            ExErrorKind::UniquenessViolation => "ERR_UNIQUENESS_VIOLATION",
            ExErrorKind::Unhashable => "ERR_UNHASHABLE",
            ExErrorKind::InvalidDeclaration => "ERR_INVALID_DECLARATION",
            ExErrorKind::InvalidProxy => "ERR_INVALID_PROXY",
            ExErrorKind::TrustedNotEnabled => "ERR_TRUSTED_NOT_ENABLED",
            ExErrorKind::UnknownDiscriminator => "ERR_UNKNOWN_DISCRIMINATOR",
            ExErrorKind::UnsupportedForDeserialization => "ERR_UNSUPPORTED_FOR_DESERIALIZATION",
            ExErrorKind::MigrationFailed => "ERR_MIGRATION_FAILED",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Aggregate => "ERR_AGGREGATE",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus context for
/// debugging. Obtained from any `SchemaError` via `From`.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    structure: Option<String>,
    path: Option<FieldPath>,
    message: String,
    source: Option<Box<ExError>>,
    candidates: Option<Vec<String>>,
    related: Vec<ExError>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            structure: None,
            path: None,
            message: String::new(),
            source: None,
            candidates: None,
            related: Vec::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add structure name context
    pub fn with_structure(mut self, structure: impl Into<String>) -> Self {
        self.structure = Some(structure.into());
        self
    }

    /// Add field path context
    pub fn with_path(mut self, path: FieldPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Add candidate option names (combinator failures)
    pub fn with_candidates(mut self, names: Vec<String>) -> Self {
        self.candidates = Some(names);
        self
    }

    /// Add the individual errors of an aggregate
    pub fn with_related(mut self, related: Vec<ExError>) -> Self {
        self.related = related;
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the structure name, if any
    pub fn structure(&self) -> Option<&str> {
        self.structure.as_deref()
    }

    /// Get the field path, if any
    pub fn path(&self) -> Option<&FieldPath> {
        self.path.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get candidate option names, if any
    pub fn candidates(&self) -> Option<&[String]> {
        self.candidates.as_deref()
    }

    /// Get the individual errors of an aggregate
    pub fn related(&self) -> &[ExError] {
        &self.related
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if let Some(path) = &self.path {
            write!(f, " at {}", path)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(structure) = &self.structure {
            write!(f, " (structure: {})", structure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

fn join(names: &[String]) -> String {
    names.join(", ")
}

fn join_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validation and schema errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    // ===== Field validation =====
    /// Value shape does not match the descriptor's representation
    #[error("{path}: expected {expected}, got {found}")]
    TypeMismatch {
        path: FieldPath,
        expected: String,
        found: String,
    },

    /// Shape matches but a bound fails
    #[error("{path}: {constraint}, got {found}")]
    ConstraintViolation {
        path: FieldPath,
        constraint: String,
        found: String,
    },

    /// Required field absent at construction
    #[error("{path}: missing required field")]
    MissingRequired { path: FieldPath },

    /// Undeclared key on a structure without additional properties
    #[error("{path}: not a field of {structure}")]
    UnknownField { path: FieldPath, structure: String },

    // ===== Combinators =====
    /// No candidate accepted the value
    #[error("{path}: {found} did not match any of [{}]", join(.candidates))]
    NoOptionMatched {
        path: FieldPath,
        candidates: Vec<String>,
        found: String,
    },

    /// More than one candidate accepted an exactly-one value
    #[error("{path}: {found} matched more than one of [{}]", join(.matched))]
    AmbiguousMatch {
        path: FieldPath,
        matched: Vec<String>,
        found: String,
    },

    /// An excluded candidate accepted the value
    #[error("{path}: {found} must not match [{}]", join(.matched))]
    UnexpectedMatch {
        path: FieldPath,
        matched: Vec<String>,
        found: String,
    },

    /// An all-of candidate rejected the value
    #[error("{path}: candidate #{index} ({candidate}) rejected the value: {reason}")]
    CandidateRejected {
        path: FieldPath,
        index: usize,
        candidate: String,
        reason: Box<SchemaError>,
    },

    // ===== Structure rules =====
    /// Constant field supplied or assigned a different value
    #[error("{path}: constant field must equal {expected}, got {found}")]
    ConstantViolation {
        path: FieldPath,
        expected: String,
        found: String,
    },

    /// Caller-defined cross-field check failed
    #[error("{path}: invariant '{invariant}' of {structure} violated: {reason}")]
    StructureInvariantViolation {
        path: FieldPath,
        structure: String,
        invariant: String,
        reason: String,
    },

    /// Mutation of an immutable structure, field or container
    #[error("{path}: {reason}")]
    ImmutableViolation { path: FieldPath, reason: String },

    /// Duplicate value for a unique field or unique structure
    #[error("{path}: {found} is already in use")]
    UniquenessViolation { path: FieldPath, found: String },

    // ===== Declaration =====
    /// Non-hashable descriptor used as a set item or map key
    #[error("{path}: {kind} values cannot be set items or map keys")]
    Unhashable { path: FieldPath, kind: String },

    /// Structure or field declared inconsistently
    #[error("invalid declaration of {structure}: {reason}")]
    InvalidDeclaration { structure: String, reason: String },

    // ===== Mutation =====
    /// Proxy refused further use after a rejected mutation
    #[error("{path}: proxy was invalidated by a rejected mutation")]
    InvalidProxy { path: FieldPath },

    // ===== Trusted path =====
    #[error("{structure} does not accept trusted construction")]
    TrustedNotEnabled { structure: String },

    // ===== Serialization =====
    /// Polymorphic discriminator value not recognized
    #[error("{path}: unknown discriminator value {found}")]
    UnknownDiscriminator { path: FieldPath, found: String },

    /// Field carries no information to rebuild a value from plain data
    #[error("{path}: {kind} fields cannot be deserialized")]
    UnsupportedForDeserialization { path: FieldPath, kind: String },

    /// A version migration step failed
    #[error("{structure}: migration from version {from} failed: {reason}")]
    MigrationFailed {
        structure: String,
        from: u32,
        reason: String,
    },

    /// Plain-data encoding or configuration parsing failed
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    // ===== Caller errors =====
    #[error("{path}: {reason}")]
    InvalidInput { path: FieldPath, reason: String },

    /// Every violation found in collect-all mode
    #[error("{} validation errors: {}", .errors.len(), join_errors(.errors))]
    Aggregate { errors: Vec<SchemaError> },
}

impl SchemaError {
    /// Canonical kind; a rejected all-of candidate reports its inner kind
    pub fn kind(&self) -> ExErrorKind {
        match self {
            SchemaError::TypeMismatch { .. } => ExErrorKind::TypeMismatch,
            SchemaError::ConstraintViolation { .. } => ExErrorKind::ConstraintViolation,
            SchemaError::MissingRequired { .. } => ExErrorKind::MissingRequired,
            SchemaError::UnknownField { .. } => ExErrorKind::UnknownField,
            SchemaError::NoOptionMatched { .. } => ExErrorKind::NoOptionMatched,
            SchemaError::AmbiguousMatch { .. } => ExErrorKind::AmbiguousMatch,
            SchemaError::UnexpectedMatch { .. } => ExErrorKind::UnexpectedMatch,
            SchemaError::CandidateRejected { reason, .. } => reason.kind(),
            SchemaError::ConstantViolation { .. } => ExErrorKind::ConstantViolation,
            SchemaError::StructureInvariantViolation { .. } => {
                ExErrorKind::StructureInvariantViolation
            }
            SchemaError::ImmutableViolation { .. } => ExErrorKind::ImmutableViolation,
            SchemaError::UniquenessViolation { .. } => ExErrorKind::UniquenessViolation,
            SchemaError::Unhashable { .. } => ExErrorKind::Unhashable,
            SchemaError::InvalidDeclaration { .. } => ExErrorKind::InvalidDeclaration,
            SchemaError::InvalidProxy { .. } => ExErrorKind::InvalidProxy,
            SchemaError::TrustedNotEnabled { .. } => ExErrorKind::TrustedNotEnabled,
            SchemaError::UnknownDiscriminator { .. } => ExErrorKind::UnknownDiscriminator,
            SchemaError::UnsupportedForDeserialization { .. } => {
                ExErrorKind::UnsupportedForDeserialization
            }
            SchemaError::MigrationFailed { .. } => ExErrorKind::MigrationFailed,
            SchemaError::Serialization { .. } => ExErrorKind::Serialization,
            SchemaError::InvalidInput { .. } => ExErrorKind::InvalidInput,
            SchemaError::Aggregate { .. } => ExErrorKind::Aggregate,
        }
    }

    /// Field path the error is reported at, if it has one
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            SchemaError::TypeMismatch { path, .. }
            | SchemaError::ConstraintViolation { path, .. }
            | SchemaError::MissingRequired { path }
            | SchemaError::UnknownField { path, .. }
            | SchemaError::NoOptionMatched { path, .. }
            | SchemaError::AmbiguousMatch { path, .. }
            | SchemaError::UnexpectedMatch { path, .. }
            | SchemaError::CandidateRejected { path, .. }
            | SchemaError::ConstantViolation { path, .. }
            | SchemaError::StructureInvariantViolation { path, .. }
            | SchemaError::ImmutableViolation { path, .. }
            | SchemaError::UniquenessViolation { path, .. }
            | SchemaError::Unhashable { path, .. }
            | SchemaError::InvalidProxy { path }
            | SchemaError::UnknownDiscriminator { path, .. }
            | SchemaError::UnsupportedForDeserialization { path, .. }
            | SchemaError::InvalidInput { path, .. } => Some(path),
            SchemaError::InvalidDeclaration { .. }
            | SchemaError::TrustedNotEnabled { .. }
            | SchemaError::MigrationFailed { .. }
            | SchemaError::Serialization { .. }
            | SchemaError::Aggregate { .. } => None,
        }
    }

    /// Path rendered as text (`<root>` when the error has none)
    pub fn path_string(&self) -> String {
        self.path()
            .map(|p| p.to_string())
            .unwrap_or_else(|| FieldPath::root().to_string())
    }

    /// Leaf errors: the members of an aggregate, or the error itself
    pub fn violations(&self) -> Vec<&SchemaError> {
        match self {
            SchemaError::Aggregate { errors } => {
                errors.iter().flat_map(SchemaError::violations).collect()
            }
            other => vec![other],
        }
    }

    /// Build an aggregate, flattening nested aggregates
    pub fn aggregate(errors: Vec<SchemaError>) -> Self {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                SchemaError::Aggregate { errors } => flat.extend(errors),
                other => flat.push(other),
            }
        }
        SchemaError::Aggregate { errors: flat }
    }
}

/// Conversion from SchemaError to ExError
impl From<SchemaError> for ExError {
    fn from(err: SchemaError) -> Self {
        let message = err.to_string();
        let base = ExError::new(err.kind()).with_message(message);
        let base = match err.path() {
            Some(path) => base.with_path(path.clone()),
            None => base,
        };
        match err {
            SchemaError::NoOptionMatched { candidates, .. } => base.with_candidates(candidates),
            SchemaError::AmbiguousMatch { matched, .. }
            | SchemaError::UnexpectedMatch { matched, .. } => base.with_candidates(matched),
            SchemaError::CandidateRejected {
                candidate, reason, ..
            } => base
                .with_candidates(vec![candidate])
                .with_source(ExError::from(*reason)),
            SchemaError::UnknownField { structure, .. }
            | SchemaError::StructureInvariantViolation { structure, .. }
            | SchemaError::InvalidDeclaration { structure, .. }
            | SchemaError::TrustedNotEnabled { structure }
            | SchemaError::MigrationFailed { structure, .. } => base.with_structure(structure),
            SchemaError::Aggregate { errors } => {
                base.with_related(errors.into_iter().map(ExError::from).collect())
            }
            _ => base,
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SchemaError {
    fn from(err: toml::de::Error) -> Self {
        SchemaError::Serialization {
            reason: err.to_string(),
        }
    }
}
