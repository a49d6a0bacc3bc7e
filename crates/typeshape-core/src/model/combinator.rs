//! Combinator fields
//!
//! Each combinator tries its candidates in declaration order. Candidates
//! always run fail-fast on a copy of the value, so a rejecting candidate
//! never leaves a partial coercion behind.

use std::collections::BTreeSet;
use typeshape_core_types::FieldPath;

use crate::config::ValidationMode;
use crate::errors::{Result, SchemaError};
use crate::model::field::Field;
use crate::rules::validation::{self, ValidationContext};
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Combinator {
    /// First accepting candidate wins
    AnyOf(Vec<Field>),
    /// Value threaded through every candidate in order; a value that no
    /// candidate accepts on its own is reported as matching none of them
    AllOf(Vec<Field>),
    /// Exactly one candidate may accept
    OneOf(Vec<Field>),
    /// No candidate may accept
    NotOf(Vec<Field>),
}

impl Combinator {
    pub fn name(&self) -> &'static str {
        match self {
            Combinator::AnyOf(_) => "AnyOf",
            Combinator::AllOf(_) => "AllOf",
            Combinator::OneOf(_) => "OneOf",
            Combinator::NotOf(_) => "NotOf",
        }
    }

    pub fn candidates(&self) -> &[Field] {
        match self {
            Combinator::AnyOf(c)
            | Combinator::AllOf(c)
            | Combinator::OneOf(c)
            | Combinator::NotOf(c) => c,
        }
    }

    pub(crate) fn validate(
        &self,
        value: Value,
        path: &FieldPath,
        cx: &ValidationContext<'_>,
    ) -> Result<Value> {
        let trial = cx.with_mode(ValidationMode::FailFast);
        match self {
            Combinator::AnyOf(candidates) => {
                for candidate in candidates {
                    if let Ok(accepted) = try_candidate(candidate, &value, path, &trial) {
                        return Ok(accepted);
                    }
                }
                Err(SchemaError::NoOptionMatched {
                    path: path.clone(),
                    candidates: distinct_names(candidates.iter()),
                    found: cx.show(&value),
                })
            }
            Combinator::AllOf(candidates) => {
                let mut current = value.clone();
                for (index, candidate) in candidates.iter().enumerate() {
                    match validation::validate_field(candidate, current, path, &trial) {
                        Ok(next) => current = next,
                        Err(_) if rejected_by_all(candidates, &value, path, &trial) => {
                            return Err(SchemaError::NoOptionMatched {
                                path: path.clone(),
                                candidates: distinct_names(candidates.iter()),
                                found: cx.show(&value),
                            });
                        }
                        Err(reason) => {
                            return Err(SchemaError::CandidateRejected {
                                path: path.clone(),
                                index,
                                candidate: candidate.type_name(),
                                reason: Box::new(reason),
                            });
                        }
                    }
                }
                Ok(current)
            }
            Combinator::OneOf(candidates) => {
                let mut accepted = Vec::new();
                for candidate in candidates {
                    if let Ok(v) = try_candidate(candidate, &value, path, &trial) {
                        accepted.push((candidate, v));
                    }
                }
                match accepted.len() {
                    0 => Err(SchemaError::NoOptionMatched {
                        path: path.clone(),
                        candidates: distinct_names(candidates.iter()),
                        found: cx.show(&value),
                    }),
                    1 => Ok(accepted.remove(0).1),
                    _ => Err(SchemaError::AmbiguousMatch {
                        path: path.clone(),
                        matched: distinct_names(accepted.iter().map(|(c, _)| *c)),
                        found: cx.show(&value),
                    }),
                }
            }
            Combinator::NotOf(candidates) => {
                let matched: Vec<&Field> = candidates
                    .iter()
                    .filter(|c| try_candidate(c, &value, path, &trial).is_ok())
                    .collect();
                if matched.is_empty() {
                    Ok(value)
                } else {
                    Err(SchemaError::UnexpectedMatch {
                        path: path.clone(),
                        matched: distinct_names(matched.into_iter()),
                        found: cx.show(&value),
                    })
                }
            }
        }
    }
}

fn try_candidate(
    candidate: &Field,
    value: &Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> Result<Value> {
    validation::validate_field(candidate, value.clone(), path, cx)
}

fn rejected_by_all(
    candidates: &[Field],
    value: &Value,
    path: &FieldPath,
    cx: &ValidationContext<'_>,
) -> bool {
    candidates
        .iter()
        .all(|candidate| try_candidate(candidate, value, path, cx).is_err())
}

fn distinct_names<'a>(fields: impl Iterator<Item = &'a Field>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    fields
        .map(Field::type_name)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
