// Integration tests for the application repository

use apim_core::model::{ApiKeyMode, Application, ApplicationStatus, ApplicationType};
use apim_core::search::{ApplicationCriteria, Pageable, Sortable};
use apim_store::repo::ApplicationRepository;
use apim_store::{db, migrations, Dialect};
use chrono::DateTime;
use rusqlite::Connection;

fn setup_test_db() -> Connection {
    let mut conn = db::open_in_memory().expect("Failed to create in-memory database");
    migrations::apply_migrations(&mut conn).expect("Failed to apply migrations");
    conn
}

fn repo() -> ApplicationRepository {
    ApplicationRepository::new(Dialect::Sqlite).unwrap()
}

fn application(id: &str, environment_id: &str, name: &str) -> Application {
    let mut application = Application::new(id, environment_id, name);
    application.created_at = DateTime::from_timestamp_millis(1_600_000_000_000);
    application.updated_at = DateTime::from_timestamp_millis(1_600_000_000_000);
    application.app_type = Some(ApplicationType::Simple);
    application.api_key_mode = Some(ApiKeyMode::Unspecified);
    application.picture = Some("pic".to_string());
    application
}

fn ids(applications: &[Application]) -> Vec<&str> {
    applications.iter().map(|a| a.id.as_str()).collect()
}

#[test]
fn test_create_then_find_by_id_keeps_metadata_and_groups() {
    // Given: An application with metadata and groups
    let conn = setup_test_db();
    let repo = repo();
    let mut app = application("app-1", "DEFAULT", "Mobile");
    app.metadata.insert("client".into(), "ios".into());
    app.metadata.insert("tier".into(), "gold".into());
    app.groups = ["g1".to_string(), "g2".to_string()].into_iter().collect();

    // When: It is created and read back
    let created = repo.create(&conn, &app).unwrap();

    // Then: Everything round-trips, the picture included
    assert_eq!(created, app);
}

#[test]
fn test_listings_leave_out_pictures() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &application("app-1", "DEFAULT", "Mobile"))
        .unwrap();

    let all = repo.find_all(&conn, &[]).unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].picture.is_none());
    assert!(repo
        .find_by_id(&conn, "app-1")
        .unwrap()
        .unwrap()
        .picture
        .is_some());
}

#[test]
fn test_find_all_filters_statuses() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &application("a", "DEFAULT", "A")).unwrap();
    let mut archived = application("b", "DEFAULT", "B");
    archived.status = Some(ApplicationStatus::Archived);
    repo.create(&conn, &archived).unwrap();

    assert_eq!(ids(&repo.find_all(&conn, &[]).unwrap()), vec!["a", "b"]);
    assert_eq!(
        ids(&repo.find_all(&conn, &[ApplicationStatus::Archived]).unwrap()),
        vec!["b"]
    );
}

#[test]
fn test_find_by_groups_returns_every_group() {
    let conn = setup_test_db();
    let repo = repo();
    let mut app = application("a", "DEFAULT", "A");
    app.groups = ["g1".to_string(), "g2".to_string()].into_iter().collect();
    repo.create(&conn, &app).unwrap();
    repo.create(&conn, &application("b", "DEFAULT", "B")).unwrap();

    let found = repo
        .find_by_groups(&conn, &["g1".to_string()], &[ApplicationStatus::Active])
        .unwrap();

    assert_eq!(ids(&found), vec!["a"]);
    assert_eq!(found[0].groups.len(), 2);
    assert!(repo.find_by_groups(&conn, &[], &[]).unwrap().is_empty());
}

#[test]
fn test_find_by_name_is_case_insensitive_substring() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &application("a", "DEFAULT", "Mobile Banking"))
        .unwrap();
    repo.create(&conn, &application("b", "DEFAULT", "Web Portal"))
        .unwrap();

    let found = repo.find_by_name_and_statuses(&conn, "BANK", &[]).unwrap();
    assert_eq!(ids(&found), vec!["a"]);
}

#[test]
fn test_find_by_ids_with_sort() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &application("a", "DEFAULT", "Zulu")).unwrap();
    repo.create(&conn, &application("b", "DEFAULT", "alpha")).unwrap();
    repo.create(&conn, &application("c", "DEFAULT", "Mike")).unwrap();

    let found = repo
        .find_by_ids(
            &conn,
            &["a".to_string(), "b".to_string()],
            Some(&Sortable::asc("name")),
        )
        .unwrap();
    assert_eq!(ids(&found), vec!["b", "a"]);
    assert!(repo.find_by_ids(&conn, &[], None).unwrap().is_empty());
}

#[test]
fn test_search_by_criteria() {
    // Given: Applications spread over environments and groups
    let conn = setup_test_db();
    let repo = repo();
    let mut first = application("a", "DEFAULT", "Orders app");
    first.groups = ["g1".to_string()].into_iter().collect();
    repo.create(&conn, &first).unwrap();
    repo.create(&conn, &application("b", "OTHER", "orders backend"))
        .unwrap();
    repo.create(&conn, &application("c", "DEFAULT", "Billing"))
        .unwrap();

    // When: Searching by name only
    let by_name = ApplicationCriteria {
        name: Some("ORDERS".into()),
        ..Default::default()
    };
    let page = repo.search(&conn, &by_name, None, None).unwrap();

    // Then: Both matches come back, sorted by name
    assert_eq!(ids(&page.content), vec!["a", "b"]);

    let narrowed = ApplicationCriteria {
        name: Some("orders".into()),
        environment_ids: vec!["DEFAULT".into()],
        groups: vec!["g1".into()],
        status: Some(ApplicationStatus::Active),
        ..Default::default()
    };
    let page = repo.search(&conn, &narrowed, None, None).unwrap();
    assert_eq!(ids(&page.content), vec!["a"]);

    let paged = repo
        .search(
            &conn,
            &ApplicationCriteria::default(),
            Some(&Pageable::new(0, 2)),
            Some(&Sortable::desc("name")),
        )
        .unwrap();
    assert_eq!(paged.total_elements, 3);
    assert_eq!(ids(&paged.content), vec!["b", "a"]);

    let all_ids = repo
        .search_ids(&conn, &ApplicationCriteria::default(), None)
        .unwrap();
    assert_eq!(all_ids, vec!["c", "a", "b"]);
}

#[test]
fn test_update_replaces_metadata() {
    let conn = setup_test_db();
    let repo = repo();
    let mut app = application("a", "DEFAULT", "A");
    app.metadata.insert("k1".into(), "v1".into());
    repo.create(&conn, &app).unwrap();

    app.metadata.clear();
    app.metadata.insert("k2".into(), "v2".into());
    app.description = Some("updated".into());
    let updated = repo.update(&conn, &app).unwrap();

    assert_eq!(updated.metadata.len(), 1);
    assert_eq!(updated.metadata.get("k2").map(String::as_str), Some("v2"));
    assert_eq!(updated.description.as_deref(), Some("updated"));
}

#[test]
fn test_update_of_missing_application_is_illegal_state() {
    let conn = setup_test_db();
    let err = repo()
        .update(&conn, &application("ghost", "DEFAULT", "Ghost"))
        .unwrap_err();
    assert!(err.is_illegal_state());
    assert_eq!(err.message(), "No application found with id [ghost]");
}

#[test]
fn test_delete_by_environment_id() {
    let conn = setup_test_db();
    let repo = repo();
    let mut app = application("a", "DEFAULT", "A");
    app.metadata.insert("k".into(), "v".into());
    app.groups = ["g".to_string()].into_iter().collect();
    repo.create(&conn, &app).unwrap();
    repo.create(&conn, &application("b", "OTHER", "B")).unwrap();

    let deleted = repo.delete_by_environment_id(&conn, "DEFAULT").unwrap();

    assert_eq!(deleted, vec!["a"]);
    let leftovers: i64 = conn
        .query_row(
            "select (select count(*) from application_metadata) + (select count(*) from application_groups)",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leftovers, 0);
    assert_eq!(ids(&repo.find_all(&conn, &[]).unwrap()), vec!["b"]);
}

#[test]
fn test_delete_removes_application() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &application("a", "DEFAULT", "A")).unwrap();

    repo.delete(&conn, "a").unwrap();

    assert!(repo.find_by_id(&conn, "a").unwrap().is_none());
}
