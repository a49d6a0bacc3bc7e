//! Plain-data constraint dumps
//!
//! `describe()` renders a descriptor's constraint attributes as JSON for
//! collaborators that generate documents or code from declared structures.

use serde_json::{json, Map, Value as JsonValue};

use crate::codec::serialize::value_to_plain;
use crate::model::field::{Field, FieldKind, Items, NumericBounds, SizeBounds};
use crate::model::structure::StructureType;

fn insert_some<T: Into<JsonValue>>(out: &mut Map<String, JsonValue>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        out.insert(key.to_string(), v.into());
    }
}

fn numeric(out: &mut Map<String, JsonValue>, bounds: &NumericBounds) {
    insert_some(out, "minimum", bounds.minimum);
    insert_some(out, "maximum", bounds.maximum);
    insert_some(out, "exclusive_minimum", bounds.exclusive_minimum);
    insert_some(out, "exclusive_maximum", bounds.exclusive_maximum);
    insert_some(out, "multiple_of", bounds.multiple_of);
}

fn size(out: &mut Map<String, JsonValue>, bounds: &SizeBounds) {
    insert_some(out, "min_items", bounds.min_items);
    insert_some(out, "max_items", bounds.max_items);
}

fn plain(value: &crate::value::Value) -> JsonValue {
    value_to_plain(value).unwrap_or(JsonValue::Null)
}

impl Field {
    /// Constraint attributes as plain data
    pub fn describe(&self) -> JsonValue {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.type_name()));

        match &self.kind {
            FieldKind::Integer(b) | FieldKind::Float(b) | FieldKind::Number(b) => numeric(&mut out, b),
            FieldKind::String(b) => {
                insert_some(&mut out, "min_length", b.min_length);
                insert_some(&mut out, "max_length", b.max_length);
                insert_some(&mut out, "pattern", b.pattern.as_ref().map(|p| p.as_str().to_string()));
            }
            FieldKind::Enum(values) => {
                out.insert("values".to_string(), values.iter().map(plain).collect());
            }
            FieldKind::Constant(value) => {
                out.insert("value".to_string(), plain(value));
            }
            FieldKind::Date { format } | FieldKind::DateTime { format } => {
                insert_some(&mut out, "format", format.clone());
            }
            FieldKind::Array(seq) | FieldKind::Deque { seq, .. } => {
                size(&mut out, &seq.size);
                if seq.unique_items {
                    out.insert("unique_items".to_string(), json!(true));
                }
                match &seq.items {
                    Items::Any => {}
                    Items::Single(item) => {
                        out.insert("items".to_string(), item.describe());
                    }
                    Items::Positional { items, additional } => {
                        out.insert(
                            "items".to_string(),
                            items.iter().map(Field::describe).collect(),
                        );
                        if let Some(extra) = additional {
                            out.insert("additional_items".to_string(), extra.describe());
                        }
                    }
                }
                if let FieldKind::Deque { maxlen, .. } = &self.kind {
                    insert_some(&mut out, "maxlen", *maxlen);
                }
            }
            FieldKind::Tuple { items, unique_items } => {
                out.insert("items".to_string(), items.iter().map(Field::describe).collect());
                if *unique_items {
                    out.insert("unique_items".to_string(), json!(true));
                }
            }
            FieldKind::Set { items, size: bounds } => {
                size(&mut out, bounds);
                if let Some(item) = items {
                    out.insert("items".to_string(), item.describe());
                }
            }
            FieldKind::Map {
                keys,
                values,
                size: bounds,
            } => {
                size(&mut out, bounds);
                if let Some(k) = keys {
                    out.insert("keys".to_string(), k.describe());
                }
                if let Some(v) = values {
                    out.insert("values".to_string(), v.describe());
                }
            }
            FieldKind::Structure(ty) => {
                out.insert("structure".to_string(), json!(ty.name()));
            }
            FieldKind::Polymorphic(poly) => {
                out.insert("discriminator".to_string(), json!(poly.discriminator.sibling));
                out.insert(
                    "options".to_string(),
                    poly.options.iter().map(|o| json!(o.name())).collect(),
                );
            }
            FieldKind::Combinator(c) => {
                out.insert("combinator".to_string(), json!(c.name()));
                out.insert(
                    "candidates".to_string(),
                    c.candidates().iter().map(Field::describe).collect(),
                );
            }
            FieldKind::Anything | FieldKind::Null | FieldKind::Boolean | FieldKind::Custom(_) => {}
        }

        if let Some(crate::model::field::DefaultValue::Literal(value)) = &self.default {
            out.insert("default".to_string(), plain(value));
        }
        for (flag, set) in [
            ("immutable", self.immutable),
            ("unique", self.unique),
            ("sensitive", self.sensitive),
        ] {
            if set {
                out.insert(flag.to_string(), json!(true));
            }
        }
        if !self.serialize {
            out.insert("serialize".to_string(), json!(false));
        }
        JsonValue::Object(out)
    }
}

impl StructureType {
    /// Field list, required set and record-level flags as plain data
    pub fn describe(&self) -> JsonValue {
        let fields: Map<String, JsonValue> = self
            .fields()
            .iter()
            .map(|(name, field)| (name.clone(), field.describe()))
            .collect();
        json!({
            "name": self.name(),
            "fields": fields,
            "required": self.required().iter().collect::<Vec<_>>(),
            "additional_properties": self.additional_properties(),
            "immutable": self.is_immutable(),
            "version": self.current_version(),
        })
    }
}
