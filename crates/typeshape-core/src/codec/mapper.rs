//! Key mapping between plain data and declared fields
//!
//! A `Mapper` is an ordered list of `(field, Directive)` entries. Inbound
//! (deserialization and version steps) a directive says where the field's
//! value comes from in the raw input; outbound (serialization) it says
//! where the field's value goes or how it is rewritten. Keys the mapper
//! does not mention pass through unchanged.
//!
//! | Directive | Inbound | Outbound |
//! |---|---|---|
//! | `Key(path)` | read the key or dotted path | write to the key or dotted path |
//! | `Call` | function of the values at the source paths | function of the field (or named fields) |
//! | `Constant` | inject the value | emit the value |
//! | `Delete` | drop the key | drop the field |
//! | `Nested` | apply a sub-mapper to the object (or each array item) | same, outbound |
//!
//! Source lookups always read the input as it was before the mapper ran,
//! so entry order does not change what a directive sees.

use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Transform over the plain values of the source paths
pub type TransformFn =
    Arc<dyn Fn(&[JsonValue]) -> std::result::Result<JsonValue, String> + Send + Sync>;

type JsonMap = Map<String, JsonValue>;

#[derive(Clone)]
pub enum Directive {
    Key(String),
    /// `args` are dotted source paths; with no args the function receives
    /// the field's own value
    Call {
        function: TransformFn,
        args: Vec<String>,
    },
    Constant(JsonValue),
    Delete,
    Nested(Mapper),
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Key(path) => f.debug_tuple("Key").field(path).finish(),
            Directive::Call { args, .. } => f
                .debug_struct("Call")
                .field("args", args)
                .finish_non_exhaustive(),
            Directive::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Directive::Delete => write!(f, "Delete"),
            Directive::Nested(mapper) => f.debug_tuple("Nested").field(mapper).finish(),
        }
    }
}

/// Global naming convention for serialized keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    #[default]
    AsIs,
    /// `first_name` becomes `firstName`
    CamelCase,
    LowerCase,
}

impl KeyStyle {
    pub fn apply(&self, name: &str) -> String {
        match self {
            KeyStyle::AsIs => name.to_string(),
            KeyStyle::LowerCase => name.to_lowercase(),
            KeyStyle::CamelCase => {
                let mut out = String::with_capacity(name.len());
                let mut upper_next = false;
                for ch in name.chars() {
                    if ch == '_' && !out.is_empty() {
                        upper_next = true;
                    } else if upper_next {
                        out.extend(ch.to_uppercase());
                        upper_next = false;
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mapper {
    entries: Vec<(String, Directive)>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, field: impl Into<String>, directive: Directive) -> Self {
        self.entries.push((field.into(), directive));
        self
    }

    /// Map `field` to a raw key or dotted path
    pub fn rename(self, field: impl Into<String>, key: impl Into<String>) -> Self {
        self.entry(field, Directive::Key(key.into()))
    }

    /// Compute `field` from the values at `args`
    pub fn call<F>(self, field: impl Into<String>, args: &[&str], function: F) -> Self
    where
        F: Fn(&[JsonValue]) -> std::result::Result<JsonValue, String> + Send + Sync + 'static,
    {
        self.entry(
            field,
            Directive::Call {
                function: Arc::new(function),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        )
    }

    /// Rewrite the field's own value
    pub fn transform<F>(self, field: impl Into<String>, function: F) -> Self
    where
        F: Fn(&JsonValue) -> std::result::Result<JsonValue, String> + Send + Sync + 'static,
    {
        self.call(field, &[], move |values: &[JsonValue]| {
            function(values.first().unwrap_or(&JsonValue::Null))
        })
    }

    pub fn constant(self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.entry(field, Directive::Constant(value.into()))
    }

    pub fn delete(self, field: impl Into<String>) -> Self {
        self.entry(field, Directive::Delete)
    }

    pub fn nested(self, field: impl Into<String>, mapper: Mapper) -> Self {
        self.entry(field, Directive::Nested(mapper))
    }

    pub fn entries(&self) -> &[(String, Directive)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a `Key` directive chose the serialized name of `field`
    pub fn renames(&self, field: &str) -> bool {
        self.entries
            .iter()
            .any(|(name, d)| name == field && matches!(d, Directive::Key(_)))
    }

    fn call_inputs(source: &JsonValue, own: Option<&JsonValue>, args: &[String]) -> Vec<JsonValue> {
        if args.is_empty() {
            vec![own.cloned().unwrap_or(JsonValue::Null)]
        } else {
            args.iter()
                .map(|arg| lookup_path(source, arg).cloned().unwrap_or(JsonValue::Null))
                .collect()
        }
    }

    /// Raw input to field-keyed form
    ///
    /// Plain (undotted) keys consumed by a `Key` directive are removed
    /// unless another entry targets them.
    ///
    /// # Errors
    ///
    /// The reason a transform function failed, prefixed with its field.
    pub fn apply_inbound(&self, input: JsonMap) -> std::result::Result<JsonMap, String> {
        let source = JsonValue::Object(input.clone());
        let targets: HashSet<&str> = self.entries.iter().map(|(t, _)| t.as_str()).collect();
        let mut out = input;

        for (target, directive) in &self.entries {
            match directive {
                Directive::Key(path) => {
                    if let Some(value) = lookup_path(&source, path) {
                        out.insert(target.clone(), value.clone());
                    }
                    if !path.contains('.') && path != target && !targets.contains(path.as_str()) {
                        out.remove(path);
                    }
                }
                Directive::Call { function, args } => {
                    if args.is_empty() && !out.contains_key(target) {
                        continue;
                    }
                    let inputs = Self::call_inputs(&source, source.get(target), args);
                    let value = function(&inputs).map_err(|e| format!("{}: {}", target, e))?;
                    out.insert(target.clone(), value);
                }
                Directive::Constant(value) => {
                    out.insert(target.clone(), value.clone());
                }
                Directive::Delete => {
                    out.remove(target);
                }
                Directive::Nested(mapper) => {
                    if let Some(value) = out.remove(target) {
                        let mapped = mapper
                            .inbound_value(value)
                            .map_err(|e| format!("{}.{}", target, e))?;
                        out.insert(target.clone(), mapped);
                    }
                }
            }
        }
        Ok(out)
    }

    fn inbound_value(&self, value: JsonValue) -> std::result::Result<JsonValue, String> {
        match value {
            JsonValue::Object(map) => self.apply_inbound(map).map(JsonValue::Object),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.inbound_value(item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Ok(other),
        }
    }

    /// Field-keyed form to serialized form
    ///
    /// # Errors
    ///
    /// The reason a transform function failed, or a dotted destination
    /// that collides with a non-object value.
    pub fn apply_outbound(&self, input: JsonMap) -> std::result::Result<JsonMap, String> {
        let source = JsonValue::Object(input.clone());
        let mut out = input;

        for (field, directive) in &self.entries {
            match directive {
                Directive::Key(path) => {
                    if let Some(value) = out.remove(field) {
                        insert_path(&mut out, path, value)?;
                    }
                }
                Directive::Call { function, args } => {
                    if args.is_empty() && !out.contains_key(field) {
                        continue;
                    }
                    let inputs = Self::call_inputs(&source, source.get(field), args);
                    let value = function(&inputs).map_err(|e| format!("{}: {}", field, e))?;
                    out.insert(field.clone(), value);
                }
                Directive::Constant(value) => {
                    out.insert(field.clone(), value.clone());
                }
                Directive::Delete => {
                    out.remove(field);
                }
                Directive::Nested(mapper) => {
                    if let Some(value) = out.remove(field) {
                        let mapped = mapper
                            .outbound_value(value)
                            .map_err(|e| format!("{}.{}", field, e))?;
                        out.insert(field.clone(), mapped);
                    }
                }
            }
        }
        Ok(out)
    }

    fn outbound_value(&self, value: JsonValue) -> std::result::Result<JsonValue, String> {
        match value {
            JsonValue::Object(map) => self.apply_outbound(map).map(JsonValue::Object),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.outbound_value(item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Ok(other),
        }
    }
}

/// Value at a dotted path; numeric segments index into arrays
pub fn lookup_path<'v>(value: &'v JsonValue, path: &str) -> Option<&'v JsonValue> {
    path.split('.').try_fold(value, |current, segment| match current {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at a dotted path, creating intermediate objects
///
/// # Errors
///
/// When an intermediate segment already holds a non-object value.
pub fn insert_path(map: &mut JsonMap, path: &str, value: JsonValue) -> std::result::Result<(), String> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);
    let mut current = map;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        current = match slot {
            JsonValue::Object(inner) => inner,
            _ => return Err(format!("cannot write {}: {} is not an object", path, segment)),
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_key_style() {
        assert_eq!(KeyStyle::CamelCase.apply("first_name"), "firstName");
        assert_eq!(KeyStyle::CamelCase.apply("age"), "age");
        assert_eq!(KeyStyle::CamelCase.apply("_hidden_id"), "_hiddenId");
        assert_eq!(KeyStyle::LowerCase.apply("FirstName"), "firstname");
        assert_eq!(KeyStyle::AsIs.apply("First_Name"), "First_Name");
    }

    #[test]
    fn test_inbound_rename_and_dotted_lookup() {
        let mapper = Mapper::new()
            .rename("name", "full_name")
            .rename("city", "address.city");
        let out = mapper
            .apply_inbound(object(json!({
                "full_name": "Ann",
                "address": {"city": "Oslo"},
                "age": 3
            })))
            .unwrap();
        assert_eq!(out.get("name"), Some(&json!("Ann")));
        assert_eq!(out.get("city"), Some(&json!("Oslo")));
        assert!(!out.contains_key("full_name"));
        assert_eq!(out.get("age"), Some(&json!(3)));
    }

    #[test]
    fn test_inbound_call_constant_delete() {
        let mapper = Mapper::new()
            .call("full", &["first", "last"], |v: &[JsonValue]| {
                Ok(json!(format!(
                    "{} {}",
                    v[0].as_str().unwrap_or(""),
                    v[1].as_str().unwrap_or("")
                )))
            })
            .constant("source", "import")
            .delete("legacy");
        let out = mapper
            .apply_inbound(object(json!({"first": "A", "last": "B", "legacy": 1})))
            .unwrap();
        assert_eq!(out.get("full"), Some(&json!("A B")));
        assert_eq!(out.get("source"), Some(&json!("import")));
        assert!(!out.contains_key("legacy"));
    }

    #[test]
    fn test_transform_error_names_field() {
        let mapper = Mapper::new().transform("age", |_| Err("not a number".to_string()));
        let err = mapper.apply_inbound(object(json!({"age": "x"}))).unwrap_err();
        assert_eq!(err, "age: not a number");
    }

    #[test]
    fn test_nested_mapper_applies_to_array_items() {
        let mapper = Mapper::new().nested("pets", Mapper::new().rename("name", "pet_name"));
        let out = mapper
            .apply_inbound(object(json!({"pets": [{"pet_name": "Rex"}, {"pet_name": "Tom"}]})))
            .unwrap();
        assert_eq!(out["pets"], json!([{"name": "Rex"}, {"name": "Tom"}]));
    }

    #[test]
    fn test_outbound_dotted_destination() {
        let mapper = Mapper::new()
            .rename("city", "address.city")
            .transform("age", |v| Ok(json!(v.as_i64().unwrap_or(0) * 12)));
        let out = mapper
            .apply_outbound(object(json!({"city": "Oslo", "age": 2})))
            .unwrap();
        assert_eq!(JsonValue::Object(out), json!({"address": {"city": "Oslo"}, "age": 24}));
    }

    #[test]
    fn test_insert_path_collision() {
        let mut map = object(json!({"address": 5}));
        assert!(insert_path(&mut map, "address.city", json!("Oslo")).is_err());
    }
}
