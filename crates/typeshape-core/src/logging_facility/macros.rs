//! Operation logging macros
//!
//! Each macro tags the event with the calling module as `component`, the
//! operation name as `op` and one of the canonical event names from
//! `typeshape_core_types::schema`.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use typeshape_core::log_op_start;
/// log_op_start!("deserialize");
/// log_op_start!("deserialize", structure = "Person");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = typeshape_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = typeshape_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use typeshape_core::log_op_end;
/// log_op_end!("serialize", duration_ms = 3);
/// log_op_end!("serialize", duration_ms = 3, structure = "Person");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = typeshape_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = typeshape_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed operation with the canonical error kind and code
///
/// The error expression is cloned into an `ExError`, so the caller keeps
/// ownership of the original.
///
/// # Example
///
/// ```
/// # use typeshape_core::log_op_error;
/// # use typeshape_core::errors::SchemaError;
/// # use typeshape_core_types::FieldPath;
/// let err = SchemaError::MissingRequired { path: FieldPath::field("age") };
/// log_op_error!("deserialize", &err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = ::std::clone::Clone::clone($err).into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = typeshape_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = ::std::clone::Clone::clone($err).into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = typeshape_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            $($field)*
        );
    }};
}
