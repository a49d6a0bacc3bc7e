//! Structured logging for the validation engine
//!
//! - Single initialization point via `init(profile)`
//! - Operation macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//!   emitting canonical `component`/`op`/`event` fields
//! - Test capture mode for asserting on emitted events
//!
//! # Usage
//!
//! ```rust
//! use typeshape_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Pipeline operations (`serialize`, `deserialize`, `migrate`) bracket their
//! work with start/end events; construction and proxy commits log at
//! `debug`/`trace` only.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
