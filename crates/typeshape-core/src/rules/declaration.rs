//! Declaration-time checks run by `StructureBuilder::build`

use typeshape_core_types::FieldPath;

use crate::errors::{Result, SchemaError};
use crate::model::field::{DefaultValue, Field, FieldKind, Items};
use crate::model::structure::StructureType;

pub(crate) fn check_structure(ty: &StructureType) -> Result<()> {
    let mut errors = Vec::new();

    for (name, field) in ty.fields() {
        let path = FieldPath::field(name);
        check_field(ty, field, &path, &mut errors);

        if let Some(DefaultValue::Literal(value)) = field.default_value() {
            if let Err(e) = field.validate(value.clone(), &path) {
                errors.push(invalid(ty, format!("default of {} is invalid: {}", path, e)));
            }
        }

        if let FieldKind::Polymorphic(poly) = field.kind() {
            if ty.field(&poly.discriminator.sibling).is_none() {
                errors.push(invalid(
                    ty,
                    format!(
                        "{}: discriminator reads undeclared field {}",
                        path, poly.discriminator.sibling
                    ),
                ));
            }
        }
    }

    for name in ty.required() {
        if ty.field(name).is_none() {
            errors.push(invalid(ty, format!("required field {} is not declared", name)));
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(SchemaError::aggregate(errors)),
    }
}

fn invalid(ty: &StructureType, reason: String) -> SchemaError {
    SchemaError::InvalidDeclaration {
        structure: ty.name().to_string(),
        reason,
    }
}

fn check_field(ty: &StructureType, field: &Field, path: &FieldPath, errors: &mut Vec<SchemaError>) {
    for reason in &field.declaration_errors {
        errors.push(invalid(ty, format!("{}: {}", path, reason)));
    }

    match field.kind() {
        FieldKind::Array(seq) | FieldKind::Deque { seq, .. } => match &seq.items {
            Items::Any => {}
            Items::Single(item) => check_field(ty, item, &path.join_index(0), errors),
            Items::Positional { items, additional } => {
                for (i, item) in items.iter().enumerate() {
                    check_field(ty, item, &path.join_index(i), errors);
                }
                if let Some(extra) = additional {
                    check_field(ty, extra, &path.join_index(items.len()), errors);
                }
            }
        },
        FieldKind::Tuple { items, .. } => {
            for (i, item) in items.iter().enumerate() {
                check_field(ty, item, &path.join_index(i), errors);
            }
        }
        FieldKind::Set { items, .. } => {
            if let Some(item) = items {
                if !item.is_hashable() {
                    errors.push(SchemaError::Unhashable {
                        path: path.clone(),
                        kind: item.type_name(),
                    });
                }
                check_field(ty, item, &path.join_index(0), errors);
            }
        }
        FieldKind::Map { keys, values, .. } => {
            if let Some(key) = keys {
                if !key.is_hashable() {
                    errors.push(SchemaError::Unhashable {
                        path: path.clone(),
                        kind: key.type_name(),
                    });
                }
                check_field(ty, key, path, errors);
            }
            if let Some(value) = values {
                check_field(ty, value, &path.join_key("*"), errors);
            }
        }
        FieldKind::Combinator(combinator) => {
            for candidate in combinator.candidates() {
                check_field(ty, candidate, path, errors);
            }
        }
        FieldKind::Polymorphic(poly) if poly.options.is_empty() => {
            errors.push(invalid(ty, format!("{}: polymorphic field has no options", path)));
        }
        _ => {}
    }
}
