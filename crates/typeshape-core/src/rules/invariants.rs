//! Cross-field structure invariants

use std::fmt;
use std::sync::Arc;
use typeshape_core_types::FieldPath;

use crate::errors::{Result, SchemaError};
use crate::model::Instance;

type Check = Arc<dyn Fn(&Instance) -> std::result::Result<(), String> + Send + Sync>;

/// A named check over a whole instance
///
/// Runs after per-field validation at construction and after every
/// committed mutation. The check returns a human-readable reason on failure.
#[derive(Clone)]
pub struct Invariant {
    name: String,
    check: Check,
}

impl Invariant {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Instance) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, instance: &Instance) -> std::result::Result<(), String> {
        (self.check)(instance)
    }
}

impl fmt::Debug for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invariant({})", self.name)
    }
}

/// Run every invariant of the instance's structure, stopping at the first
/// failure
pub(crate) fn check_invariants(instance: &Instance, path: &FieldPath) -> Result<()> {
    let ty = instance.structure();
    for invariant in ty.invariants() {
        invariant
            .check(instance)
            .map_err(|reason| SchemaError::StructureInvariantViolation {
                path: path.clone(),
                structure: ty.name().to_string(),
                invariant: invariant.name().to_string(),
                reason,
            })?;
    }
    Ok(())
}
