//! Field descriptors derived from Rust types
//!
//! `DescribeField` maps a Rust type to a `TypeShape`, which is translated
//! into a `Field` once, when the structure is declared:
//!
//! | Rust type | Field |
//! |---|---|
//! | `bool` | Boolean |
//! | `i64`, `i32`, `u32` | Integer |
//! | `f64` | Float |
//! | `String` | String |
//! | `NaiveDate` / `NaiveDateTime` | Date / DateTime |
//! | `Vec<T>` | Array of T |
//! | `BTreeSet<T>`, `HashSet<T>` | Set of T |
//! | `VecDeque<T>` | Deque of T |
//! | `BTreeMap<K, V>`, `HashMap<K, V>` | Map of K to V |
//! | `(A, B)`, `(A, B, C)` | Tuple |
//! | `Option<T>` | AnyOf [T, Null], not required |
//! | `serde_json::Value` | Anything |

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::model::field::Field;

/// Structural description of a Rust type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Bool,
    Int,
    Float,
    Str,
    Date,
    DateTime,
    Json,
    List(Box<TypeShape>),
    Set(Box<TypeShape>),
    Deque(Box<TypeShape>),
    Map(Box<TypeShape>, Box<TypeShape>),
    Tuple(Vec<TypeShape>),
    Optional(Box<TypeShape>),
}

impl TypeShape {
    pub fn to_field(&self) -> Field {
        match self {
            TypeShape::Bool => Field::boolean(),
            TypeShape::Int => Field::integer(),
            TypeShape::Float => Field::float(),
            TypeShape::Str => Field::string(),
            TypeShape::Date => Field::date(),
            TypeShape::DateTime => Field::datetime(),
            TypeShape::Json => Field::anything(),
            TypeShape::List(item) => Field::array_of(item.to_field()),
            TypeShape::Set(item) => Field::set_of(item.to_field()),
            TypeShape::Deque(item) => Field::deque_of(item.to_field()),
            TypeShape::Map(key, value) => Field::map_of(key.to_field(), value.to_field()),
            TypeShape::Tuple(items) => Field::tuple(items.iter().map(TypeShape::to_field).collect()),
            TypeShape::Optional(inner) => {
                Field::any_of(vec![inner.to_field(), Field::null()]).optional()
            }
        }
    }
}

/// Rust types with a field descriptor
pub trait DescribeField {
    fn shape() -> TypeShape;

    fn field() -> Field {
        Self::shape().to_field()
    }
}

macro_rules! describe_scalar {
    ($($ty:ty => $shape:expr),* $(,)?) => {
        $(
            impl DescribeField for $ty {
                fn shape() -> TypeShape {
                    $shape
                }
            }
        )*
    };
}

describe_scalar! {
    bool => TypeShape::Bool,
    i64 => TypeShape::Int,
    i32 => TypeShape::Int,
    u32 => TypeShape::Int,
    f64 => TypeShape::Float,
    String => TypeShape::Str,
    NaiveDate => TypeShape::Date,
    NaiveDateTime => TypeShape::DateTime,
    serde_json::Value => TypeShape::Json,
}

impl<T: DescribeField> DescribeField for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::List(Box::new(T::shape()))
    }
}

impl<T: DescribeField> DescribeField for BTreeSet<T> {
    fn shape() -> TypeShape {
        TypeShape::Set(Box::new(T::shape()))
    }
}

impl<T: DescribeField> DescribeField for HashSet<T> {
    fn shape() -> TypeShape {
        TypeShape::Set(Box::new(T::shape()))
    }
}

impl<T: DescribeField> DescribeField for VecDeque<T> {
    fn shape() -> TypeShape {
        TypeShape::Deque(Box::new(T::shape()))
    }
}

impl<K: DescribeField, V: DescribeField> DescribeField for BTreeMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::Map(Box::new(K::shape()), Box::new(V::shape()))
    }
}

impl<K: DescribeField, V: DescribeField> DescribeField for HashMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::Map(Box::new(K::shape()), Box::new(V::shape()))
    }
}

impl<T: DescribeField> DescribeField for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::Optional(Box::new(T::shape()))
    }
}

impl<A: DescribeField, B: DescribeField> DescribeField for (A, B) {
    fn shape() -> TypeShape {
        TypeShape::Tuple(vec![A::shape(), B::shape()])
    }
}

impl<A: DescribeField, B: DescribeField, C: DescribeField> DescribeField for (A, B, C) {
    fn shape() -> TypeShape {
        TypeShape::Tuple(vec![A::shape(), B::shape(), C::shape()])
    }
}
