//! Typeshape Core - declarative schema validation and serialization
//!
//! This crate provides:
//! - Field descriptors and combinator fields (AnyOf/AllOf/OneOf/NotOf)
//! - Structure types with inheritance, invariants and version tables
//! - Validated instances whose every mutation is re-checked, including
//!   in-place edits through container proxies
//! - An injectable uniqueness index
//! - Plain-data serialization and deserialization with key mapping and
//!   multi-step version migration, plus a trusted fast path
//!
//! # Example
//!
//! ```rust
//! use typeshape_core::{construct, serialize, ConstructOptions, Field, SerializeOptions, StructureType};
//!
//! let person = StructureType::builder("Person")
//!     .field("age", Field::positive_int())
//!     .field("name", Field::sized_string(8))
//!     .required(["age"])
//!     .build()
//!     .unwrap();
//!
//! let p = construct(&person, [("age", 5)], &ConstructOptions::default()).unwrap();
//! assert_eq!(
//!     serialize(&p, &SerializeOptions::default()).unwrap(),
//!     serde_json::json!({"age": 5})
//! );
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod ops;
pub mod rules;
pub mod value;

// Re-export commonly used types
pub use codec::{
    deserialize, migrate, serialize, serialize_trusted, DeserializeOptions, Directive, KeyStyle,
    Mapper, SerializeOptions,
};
pub use config::{EngineConfig, ValidationMode};
pub use errors::{ExError, ExErrorKind, Result, SchemaError};
pub use model::{Discriminator, Field, Instance, StructureType};
pub use ops::{construct, construct_single, construct_trusted, ConstructOptions, UniquenessIndex};
pub use rules::Invariant;
pub use typeshape_core_types::FieldPath;
pub use value::Value;
