//! Core types shared across typeshape facilities
//!
//! This crate provides foundational types used by both error reporting
//! and the logging facility:
//!
//! - **Schema constants**: Canonical field keys and event names
//! - **Sensitive data**: Sensitive<T> marker for redacting field values
//! - **Path segments**: the addressing vocabulary for field paths

pub mod path;
pub mod schema;
pub mod sensitive;

pub use path::{FieldPath, PathSegment};
pub use sensitive::Sensitive;
