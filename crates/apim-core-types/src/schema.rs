//! Canonical schema constants for structured logging and events
//!
//! The operation macros write `op` and `event` on every boundary event; the
//! capture layer reads them back by the same keys.

pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
