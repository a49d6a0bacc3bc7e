//! Field path addressing
//!
//! A `FieldPath` names the location of a value inside a structure graph:
//! structure fields are joined with dots, sequence positions and map keys
//! use bracket notation (`order.lines[2].sku`, `scores[alice]`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// A named structure field
    Field(String),
    /// A position in a sequence, tuple or deque
    Index(usize),
    /// A map key (rendered with its display form)
    Key(String),
}

/// Fully qualified location of a value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The empty path, addressing the structure itself
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A single-segment path for a top-level field
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![PathSegment::Field(name.into())])
    }

    /// Extend with a field name
    pub fn join_field(&self, name: impl Into<String>) -> Self {
        self.join(PathSegment::Field(name.into()))
    }

    /// Extend with a sequence index
    pub fn join_index(&self, index: usize) -> Self {
        self.join(PathSegment::Index(index))
    }

    /// Extend with a map key
    pub fn join_key(&self, key: impl Into<String>) -> Self {
        self.join(PathSegment::Key(key.into()))
    }

    fn join(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Prefix every segment of `self` with `parent`
    pub fn nested_under(&self, parent: &FieldPath) -> Self {
        let mut segments = parent.0.clone();
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The first field name on the path, if any
    pub fn top_field(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Key(key) => write!(f, "[{}]", key)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_display() {
        assert_eq!(FieldPath::root().to_string(), "<root>");
        assert!(FieldPath::root().is_root());
    }

    #[test]
    fn test_nested_display() {
        let path = FieldPath::field("order")
            .join_field("lines")
            .join_index(2)
            .join_field("sku");
        assert_eq!(path.to_string(), "order.lines[2].sku");
    }

    #[test]
    fn test_map_key_display() {
        let path = FieldPath::field("scores").join_key("alice");
        assert_eq!(path.to_string(), "scores[alice]");
    }

    #[test]
    fn test_nested_under() {
        let inner = FieldPath::field("city");
        let outer = FieldPath::field("address");
        assert_eq!(inner.nested_under(&outer).to_string(), "address.city");
        assert_eq!(inner.nested_under(&outer).top_field(), Some("address"));
    }

    #[test]
    fn test_serialization() {
        let path = FieldPath::field("a").join_index(1);
        let json = serde_json::to_string(&path).unwrap();
        let back: FieldPath = serde_json::from_str(&json).unwrap();
        assert_eq!(path, back);
    }
}
