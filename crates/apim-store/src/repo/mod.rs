//! Repositories for the management entities
//!
//! Each repository builds its table mapping once and takes the connection
//! per call. Database failures surface as technical errors; a record that is
//! not there is `None` or an empty collection, never an error.

pub mod api_repo;
pub mod application_repo;
pub mod event_repo;
pub mod subscription_repo;

pub use api_repo::ApiRepository;
pub use application_repo::ApplicationRepository;
pub use event_repo::EventRepository;
pub use subscription_repo::SubscriptionRepository;

use crate::errors::{technical, Result};
use apim_core::errors::RepoError;
use apim_core::model::StoredEnum;
use apim_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::cell::Cell;
use std::time::Instant;

thread_local! {
    /// Number of `logged` operations running on this thread
    static LOGGED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// `map_err` adapter: wrap the database failure as technical
///
/// Outside a `logged` operation the failure is logged here; inside one, the
/// operation's `end_error` event reports it.
pub(crate) fn fail(op: &'static str, message: &'static str) -> impl FnOnce(rusqlite::Error) -> RepoError {
    move |cause| {
        if LOGGED_DEPTH.with(Cell::get) == 0 {
            tracing::error!(op, error = %cause, "{}", message);
        }
        technical(op, message, cause)
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        LOGGED_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        LOGGED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run a multi-statement operation between start and end events
pub(crate) fn logged<T>(
    op: &'static str,
    entity_id: &str,
    body: impl FnOnce() -> Result<T>,
) -> Result<T> {
    log_op_start!(op, entity_id = entity_id);
    let start = Instant::now();

    let result = {
        let _depth = DepthGuard::enter();
        body()
    }
    .map_err(|e| {
        log_op_error!(
            op,
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            entity_id = entity_id
        );
        e
    })?;

    log_op_end!(op, duration_ms = start.elapsed().as_millis() as u64);
    Ok(result)
}

/// Optional text that is present and not empty
pub(crate) fn has_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

pub(crate) fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn enum_text<E: StoredEnum>(value: E) -> Value {
    Value::Text(value.as_str().to_string())
}

pub(crate) fn millis(value: chrono::DateTime<chrono::Utc>) -> Value {
    Value::Integer(value.timestamp_millis())
}

/// Rows of a single text column
pub(crate) fn query_strings(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| row.get(0))?;
    rows.collect()
}
