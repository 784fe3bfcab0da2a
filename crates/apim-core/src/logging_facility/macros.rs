//! Operation boundary macros
//!
//! Every repository operation that performs more than one statement logs a
//! start and an end (or end_error) event with the same `op` name.

/// Log the start of an operation
///
/// ```
/// # use apim_core::log_op_start;
/// log_op_start!("api.create");
/// log_op_start!("api.create", entity_id = "a1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use apim_core::log_op_end;
/// log_op_end!("api.create", duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation failure
///
/// Accepts anything convertible into `RepoError`.
///
/// ```
/// # use apim_core::{log_op_error, errors::ApimError};
/// log_op_error!("api.update", ApimError::UpdateWithoutId { entity: "api" }, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let repo_err: $crate::errors::RepoError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?repo_err.kind(),
            err.code = repo_err.code(),
            message = repo_err.message(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let repo_err: $crate::errors::RepoError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?repo_err.kind(),
            err.code = repo_err.code(),
            message = repo_err.message(),
            $($field)*
        );
    }};
}
