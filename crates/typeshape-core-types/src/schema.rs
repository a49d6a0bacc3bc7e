//! Canonical schema constants for structured logging and events
//!
//! These constants keep log output and error reporting consistent.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Schema identifiers
pub const FIELD_STRUCTURE: &str = "structure";
pub const FIELD_PATH: &str = "path";
pub const FIELD_VERSION: &str = "version";

// Collection sizes
pub const FIELD_FIELD_COUNT: &str = "field_count";
pub const FIELD_STEP_COUNT: &str = "step_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

/// Reserved key carrying the stamped version of a versioned record
pub const VERSION_KEY: &str = "version";
