#![allow(clippy::unwrap_used, clippy::expect_used)]

use apim_core::errors::ApimError;
use apim_core::logging_facility::test_capture::init_test_capture;
use apim_core::{log_op_end, log_op_error, log_op_start};
use apim_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let start_events = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    assert_eq!(start_events, 1, "Should have captured one start event");
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = ApimError::NotFoundForUpdate {
        entity: "api",
        id: "a1".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    let error_event = capture
        .events_for_op(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(error_event.field("err.code"), Some("ERR_ILLEGAL_STATE"));
    assert_eq!(error_event.field("message"), Some("No api found with id [a1]"));
    assert_eq!(error_event.level, tracing::Level::ERROR);
}

#[test]
fn test_boundary_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_unique_4";

    log_op_start!(op_name, entity_id = "a1");
    log_op_end!(op_name, duration_ms = 7);

    let events = capture.events_for_op(op_name);
    let names: Vec<_> = events.iter().filter_map(|e| e.event.as_deref()).collect();
    assert_eq!(names, vec![EVENT_START, EVENT_END]);
    assert_eq!(events[0].field("entity_id"), Some("a1"));
}

#[test]
fn test_invalid_input_errors_are_tagged() {
    let capture = init_test_capture();
    let op_name = "test_invalid_input_unique_5";

    log_op_error!(op_name, ApimError::EmptyInClause, duration_ms = 1, entity_id = "x");

    let event = capture
        .events_for_op(op_name)
        .pop()
        .expect("Should have error event");
    assert_eq!(event.field("err.code"), Some("ERR_INVALID_INPUT"));
    assert_eq!(event.field("entity_id"), Some("x"));
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_capture_count_events() {
    let capture = init_test_capture();
    let op1_name = "test_count_events_op1_unique_6";
    let op2_name = "test_count_events_op2_unique_6";

    log_op_start!(op1_name);
    log_op_start!(op2_name);
    log_op_end!(op1_name, duration_ms = 10);

    let start_count = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_START)
            && (e.op.as_deref() == Some(op1_name) || e.op.as_deref() == Some(op2_name))
    });
    let end_count = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_END)
            && (e.op.as_deref() == Some(op1_name) || e.op.as_deref() == Some(op2_name))
    });

    assert_eq!(start_count, 2);
    assert_eq!(end_count, 1);
}
