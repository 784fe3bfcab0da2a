// Integration tests for the event repository

use apim_core::errors::RepoErrorKind;
use apim_core::model::{Event, EventProperty, EventType};
use apim_core::search::{EventCriteria, Pageable};
use apim_store::repo::EventRepository;
use apim_store::{db, migrations, Dialect};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;

fn setup_test_db() -> Connection {
    let mut conn = db::open_in_memory().expect("Failed to create in-memory database");
    migrations::apply_migrations(&mut conn).expect("Failed to apply migrations");
    conn
}

fn repo() -> EventRepository {
    EventRepository::new(Dialect::Sqlite).unwrap()
}

fn at(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

fn event(id: &str, event_type: EventType, api_id: &str, updated: i64) -> Event {
    let mut event = Event::new(id, event_type)
        .with_property(EventProperty::ApiId, api_id)
        .with_property(EventProperty::User, "admin")
        .with_environment("DEFAULT")
        .with_environment("PROD");
    event.created_at = at(updated);
    event.updated_at = at(updated);
    event.payload = Some(format!("{{\"id\":\"{}\"}}", id));
    event
}

fn ids(events: &[Event]) -> Vec<&str> {
    events.iter().map(|e| e.id.as_str()).collect()
}

fn by_api(api_ids: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut properties = BTreeMap::new();
    properties.insert(
        EventProperty::ApiId.key().to_string(),
        api_ids.iter().map(|s| s.to_string()).collect(),
    );
    properties
}

#[test]
fn test_create_then_find_by_id_folds_both_joins() {
    // Given: An event with two properties and two environments
    let conn = setup_test_db();
    let repo = repo();
    let publish = event("e1", EventType::PublishApi, "api-1", 1_000);

    // When: It is created
    let created = repo.create(&conn, &publish).unwrap();

    // Then: The 2x2 row product folds back without duplicates
    assert_eq!(created, publish);
    assert_eq!(created.properties.len(), 2);
    assert_eq!(created.environments.len(), 2);
}

#[test]
fn test_update_replaces_children_and_rejects_missing() {
    let conn = setup_test_db();
    let repo = repo();
    let mut publish = event("e1", EventType::PublishApi, "api-1", 1_000);
    repo.create(&conn, &publish).unwrap();

    publish.properties.remove("user");
    publish.environments.remove("PROD");
    publish.event_type = Some(EventType::StopApi);
    let updated = repo.update(&conn, &publish).unwrap();
    assert_eq!(updated, publish);

    let err = repo
        .update(&conn, &event("ghost", EventType::StartApi, "api-1", 1))
        .unwrap_err();
    assert_eq!(err.kind(), RepoErrorKind::IllegalState);
}

#[test]
fn test_search_matches_any_property_pair() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1_000))
        .unwrap();
    repo.create(&conn, &event("e2", EventType::PublishApi, "api-2", 2_000))
        .unwrap();
    repo.create(&conn, &event("e3", EventType::PublishApi, "api-3", 3_000))
        .unwrap();

    let criteria = EventCriteria {
        properties: by_api(&["api-1", "api-3"]),
        ..Default::default()
    };
    let found = repo.search(&conn, &criteria).unwrap();

    // Most recently updated first, each with all of its properties
    assert_eq!(ids(&found), vec!["e3", "e1"]);
    assert!(found.iter().all(|e| e.properties.len() == 2));
}

#[test]
fn test_search_window_types_and_environments() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1_000))
        .unwrap();
    repo.create(&conn, &event("e2", EventType::StopApi, "api-1", 2_000))
        .unwrap();
    let mut other_env = event("e3", EventType::PublishApi, "api-1", 3_000);
    other_env.environments = ["STAGING".to_string()].into_iter().collect();
    repo.create(&conn, &other_env).unwrap();

    // The upper bound is exclusive
    let window = EventCriteria {
        from: at(1_000),
        to: at(3_000),
        ..Default::default()
    };
    assert_eq!(ids(&repo.search(&conn, &window).unwrap()), vec!["e2", "e1"]);

    let published = EventCriteria {
        types: vec![EventType::PublishApi],
        ..Default::default()
    };
    assert_eq!(ids(&repo.search(&conn, &published).unwrap()), vec!["e3", "e1"]);

    let prod = EventCriteria {
        environments: vec!["PROD".into()],
        ..Default::default()
    };
    let found = repo.search(&conn, &prod).unwrap();
    assert_eq!(ids(&found), vec!["e2", "e1"]);
    // The environment filter does not trim the environments returned
    assert_eq!(found[0].environments.len(), 2);
}

#[test]
fn test_search_page_slices_results() {
    let conn = setup_test_db();
    let repo = repo();
    for (i, id) in ["e1", "e2", "e3"].iter().enumerate() {
        repo.create(&conn, &event(id, EventType::PublishApi, "api", i as i64))
            .unwrap();
    }

    let page = repo
        .search_page(&conn, &EventCriteria::default(), Some(&Pageable::new(1, 2)))
        .unwrap();
    assert_eq!(page.total_elements, 3);
    assert_eq!(ids(&page.content), vec!["e1"]);
}

#[test]
fn test_search_latest_keeps_one_event_per_api() {
    // Given: Two events for api-1 and one for api-2
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1_000))
        .unwrap();
    repo.create(&conn, &event("e2", EventType::StopApi, "api-1", 3_000))
        .unwrap();
    repo.create(&conn, &event("e3", EventType::PublishApi, "api-2", 2_000))
        .unwrap();

    // When: Asking for the latest event per api
    let latest = repo
        .search_latest(&conn, &EventCriteria::default(), EventProperty::ApiId, None, None)
        .unwrap();

    // Then: One event per api, newest first
    assert_eq!(ids(&latest), vec!["e2", "e3"]);

    // And: Paging applies to the groups
    let second = repo
        .search_latest(
            &conn,
            &EventCriteria::default(),
            EventProperty::ApiId,
            Some(1),
            Some(1),
        )
        .unwrap();
    assert_eq!(ids(&second), vec!["e3"]);
}

#[test]
fn test_search_latest_far_page_is_empty() {
    // Given: One group of events
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1_000))
        .unwrap();

    // When: Asking for a page whose offset overflows usize
    let found = repo
        .search_latest(
            &conn,
            &EventCriteria::default(),
            EventProperty::ApiId,
            Some(usize::MAX / 2 + 1),
            Some(2),
        )
        .unwrap();

    // Then: The offset saturates and the page is simply empty
    assert!(found.is_empty());
}

#[test]
fn test_search_latest_strict_mode_filters_after_picking() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1_000))
        .unwrap();
    repo.create(&conn, &event("e2", EventType::StopApi, "api-1", 3_000))
        .unwrap();

    // Non-strict: the latest publish event of api-1
    let lenient = EventCriteria {
        types: vec![EventType::PublishApi],
        ..Default::default()
    };
    let found = repo
        .search_latest(&conn, &lenient, EventProperty::ApiId, None, None)
        .unwrap();
    assert_eq!(ids(&found), vec!["e1"]);

    // Strict: the latest event of api-1 is a stop, so nothing matches
    let strict = EventCriteria {
        strict_mode: true,
        ..lenient
    };
    let found = repo
        .search_latest(&conn, &strict, EventProperty::ApiId, None, None)
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_create_or_patch_requires_id_and_type() {
    let conn = setup_test_db();
    let repo = repo();

    let mut untyped = event("e1", EventType::PublishApi, "api", 1);
    untyped.event_type = None;
    let err = repo.create_or_patch(&conn, &untyped).unwrap_err();
    assert!(err.is_illegal_state());
    assert_eq!(err.op(), Some("event.create_or_patch"));

    let anonymous = event("", EventType::PublishApi, "api", 1);
    assert!(repo.create_or_patch(&conn, &anonymous).unwrap_err().is_illegal_state());
}

#[test]
fn test_create_or_patch_creates_then_patches() {
    // Given: No stored event
    let conn = setup_test_db();
    let repo = repo();
    let first = event("e1", EventType::PublishApi, "api-1", 1_000);

    // When: Patching it creates it
    let created = repo.create_or_patch(&conn, &first).unwrap();
    assert_eq!(created, first);

    // When: Patching with only a type, an unknown property and one environment
    let mut patch = Event {
        id: "e1".into(),
        event_type: Some(EventType::StopApi),
        ..Default::default()
    };
    patch
        .properties
        .insert(EventProperty::DeploymentNumber.key().into(), "2".into());
    patch.properties.insert("user".into(), "ops".into());
    patch.environments.insert("DEFAULT".into());
    let patched = repo.create_or_patch(&conn, &patch).unwrap();

    // Then: Null fields are left alone, known properties are overwritten,
    // unknown ones are not added, environments are replaced
    assert_eq!(patched.event_type, Some(EventType::StopApi));
    assert_eq!(patched.payload, first.payload);
    assert_eq!(patched.updated_at, first.updated_at);
    assert_eq!(patched.properties.get("api_id").map(String::as_str), Some("api-1"));
    assert_eq!(patched.properties.get("user").map(String::as_str), Some("ops"));
    assert_eq!(patched.properties.get("deployment_number"), None);
    assert_eq!(patched.properties.len(), 2);
    assert_eq!(patched.environments.len(), 1);
}

#[test]
fn test_delete_api_events_removes_only_that_api() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1))
        .unwrap();
    repo.create(&conn, &event("e2", EventType::StopApi, "api-1", 2))
        .unwrap();
    repo.create(&conn, &event("e3", EventType::PublishApi, "api-2", 3))
        .unwrap();

    assert_eq!(repo.delete_api_events(&conn, "api-1").unwrap(), 2);
    assert_eq!(repo.delete_api_events(&conn, "api-1").unwrap(), 0);

    let left = repo.search(&conn, &EventCriteria::default()).unwrap();
    assert_eq!(ids(&left), vec!["e3"]);
    let orphans: i64 = conn
        .query_row(
            "select count(*) from event_properties where event_id in ('e1', 'e2')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}

#[test]
fn test_delete_event() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &event("e1", EventType::PublishApi, "api-1", 1))
        .unwrap();

    repo.delete(&conn, "e1").unwrap();

    assert!(repo.find_by_id(&conn, "e1").unwrap().is_none());
}
