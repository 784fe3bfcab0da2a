// Integration tests for the API repository against a migrated in-memory database

use apim_core::errors::RepoErrorKind;
use apim_core::model::{Api, ApiLifecycleState, DefinitionVersion, LifecycleState, Visibility};
use apim_core::search::{ApiCriteria, ApiFieldFilter, Pageable, Sortable};
use apim_store::repo::ApiRepository;
use apim_store::{db, migrations, Dialect};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

fn setup_test_db() -> Connection {
    let mut conn = db::open_in_memory().expect("Failed to create in-memory database");
    migrations::apply_migrations(&mut conn).expect("Failed to apply migrations");
    conn
}

fn repo() -> ApiRepository {
    ApiRepository::new(Dialect::Sqlite).unwrap()
}

fn at(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

fn api(id: &str, environment_id: &str, name: &str) -> Api {
    let mut api = Api::new(id, environment_id, name);
    api.created_at = at(1_700_000_000_000);
    api.updated_at = at(1_700_000_000_000);
    api.version = Some("1.0".to_string());
    api.visibility = Some(Visibility::Public);
    api.lifecycle_state = Some(LifecycleState::Started);
    api.definition_version = Some(DefinitionVersion::V4);
    api.definition = Some("{\"id\":\"x\"}".to_string());
    api.picture = Some("data:image/png;base64,AAAA".to_string());
    api
}

fn count(conn: &Connection, table: &str, api_id: &str) -> i64 {
    conn.query_row(
        &format!("select count(*) from {} where api_id = ?", table),
        [api_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_create_then_find_by_id_returns_children() {
    // Given: An API with labels, groups and categories
    let conn = setup_test_db();
    let repo = repo();
    let mut orders = api("api-1", "DEFAULT", "Orders");
    orders.labels = vec!["public".into(), "internal".into()];
    orders.groups = ["g1".to_string(), "g2".to_string()].into_iter().collect();
    orders.categories = ["sales".to_string(), "shop".to_string()].into_iter().collect();
    orders.origin = Some("KUBERNETES".into());
    orders.mode = Some("FULLY_MANAGED".into());
    orders.sync_from = Some("KUBERNETES".into());

    // When: It is created
    let created = repo.create(&conn, &orders).unwrap();

    // Then: The stored API matches what was given, children included
    assert_eq!(created, orders);
    let found = repo.find_by_id(&conn, "api-1").unwrap().unwrap();
    assert_eq!(found.labels, vec!["public", "internal"]);
    assert_eq!(found.groups.len(), 2);
    assert_eq!(found.categories.len(), 2);
    assert_eq!(found.created_at, at(1_700_000_000_000));
    assert_eq!(found.mode.as_deref(), Some("FULLY_MANAGED"));
    assert_eq!(found.sync_from.as_deref(), Some("KUBERNETES"));
}

#[test]
fn test_find_unknown_id_is_none() {
    let conn = setup_test_db();
    assert!(repo().find_by_id(&conn, "nope").unwrap().is_none());
    assert!(!repo().exist_by_id(&conn, "nope").unwrap());
}

#[test]
fn test_update_replaces_children() {
    // Given: A stored API
    let conn = setup_test_db();
    let repo = repo();
    let mut orders = api("api-1", "DEFAULT", "Orders");
    orders.labels = vec!["old".into()];
    orders.categories = ["sales".to_string()].into_iter().collect();
    repo.create(&conn, &orders).unwrap();

    // When: It is updated with different children
    orders.name = "Orders v2".to_string();
    orders.labels = vec!["new".into()];
    orders.categories.clear();
    let updated = repo.update(&conn, &orders).unwrap();

    // Then: Old children are gone
    assert_eq!(updated.name, "Orders v2");
    assert_eq!(updated.labels, vec!["new"]);
    assert!(updated.categories.is_empty());
    assert_eq!(count(&conn, "api_categories", "api-1"), 0);
}

#[test]
fn test_update_of_missing_api_is_illegal_state() {
    let conn = setup_test_db();
    let repo = repo();

    let err = repo.update(&conn, &api("ghost", "DEFAULT", "Ghost")).unwrap_err();
    assert_eq!(err.kind(), RepoErrorKind::IllegalState);
    assert_eq!(err.entity_id(), Some("ghost"));
    assert_eq!(err.op(), Some("api.update"));

    let err = repo.update(&conn, &api("", "DEFAULT", "Nameless")).unwrap_err();
    assert!(err.is_illegal_state());
    assert_eq!(err.message(), "Failed to update api without id");
}

#[test]
fn test_delete_removes_children() {
    let conn = setup_test_db();
    let repo = repo();
    let mut orders = api("api-1", "DEFAULT", "Orders");
    orders.labels = vec!["l".into()];
    orders.groups = ["g".to_string()].into_iter().collect();
    repo.create(&conn, &orders).unwrap();

    repo.delete(&conn, "api-1").unwrap();

    assert!(repo.find_by_id(&conn, "api-1").unwrap().is_none());
    assert_eq!(count(&conn, "api_labels", "api-1"), 0);
    assert_eq!(count(&conn, "api_groups", "api-1"), 0);
}

#[test]
fn test_search_sorts_by_name_ignoring_case_and_pages() {
    // Given: Three APIs whose names differ in case
    let conn = setup_test_db();
    let repo = repo();
    for (id, name) in [("a", "zeta"), ("b", "Alpha"), ("c", "beta")] {
        repo.create(&conn, &api(id, "DEFAULT", name)).unwrap();
    }

    // When: Searching without criteria, second page of size two
    let page = repo
        .search(
            &conn,
            &ApiCriteria::default(),
            None,
            Some(&Pageable::new(1, 2)),
            None,
        )
        .unwrap();

    // Then: The default order is by lower-cased name
    assert_eq!(page.total_elements, 3);
    assert_eq!(page.page_elements, 1);
    assert_eq!(page.content[0].name, "zeta");

    let all = repo
        .search(&conn, &ApiCriteria::default(), Some(&Sortable::desc("name")), None, None)
        .unwrap();
    let names: Vec<&str> = all.content.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "beta", "Alpha"]);
}

#[test]
fn test_search_by_group_label_and_category() {
    let conn = setup_test_db();
    let repo = repo();
    let mut first = api("a1", "DEFAULT", "First");
    first.groups = ["g1".to_string()].into_iter().collect();
    first.labels = vec!["red".into()];
    first.categories = ["c1".to_string(), "c2".to_string()].into_iter().collect();
    let mut second = api("a2", "DEFAULT", "Second");
    second.groups = ["g2".to_string()].into_iter().collect();
    second.labels = vec!["blue".into()];
    repo.create(&conn, &first).unwrap();
    repo.create(&conn, &second).unwrap();

    let by_group = ApiCriteria {
        groups: vec!["g1".into()],
        ..Default::default()
    };
    let found = repo.search(&conn, &by_group, None, None, None).unwrap();
    assert_eq!(found.content.len(), 1);
    assert_eq!(found.content[0].id, "a1");
    // The group join must not hide the other categories
    assert_eq!(found.content[0].categories.len(), 2);

    let by_label = ApiCriteria {
        label: Some("blue".into()),
        ..Default::default()
    };
    let found = repo.search(&conn, &by_label, None, None, None).unwrap();
    assert_eq!(found.content.len(), 1);
    assert_eq!(found.content[0].id, "a2");

    let by_category = ApiCriteria {
        category: Some("c2".into()),
        ..Default::default()
    };
    let ids = repo.search_ids(&conn, &[by_category], None, None).unwrap();
    assert_eq!(ids.content, vec!["a1"]);
}

#[test]
fn test_search_field_filter_leaves_out_heavy_columns() {
    let conn = setup_test_db();
    let repo = repo();
    repo.create(&conn, &api("a1", "DEFAULT", "First")).unwrap();

    let filter = ApiFieldFilter {
        exclude_definition: true,
        exclude_picture: true,
    };
    let page = repo
        .search(&conn, &ApiCriteria::default(), None, None, Some(&filter))
        .unwrap();

    let found = &page.content[0];
    assert!(found.definition.is_none());
    assert!(found.picture.is_none());
    assert_eq!(found.version.as_deref(), Some("1.0"));
}

#[test]
fn test_v2_lookup_includes_apis_without_definition_version() {
    let conn = setup_test_db();
    let repo = repo();
    let mut legacy = api("legacy", "DEFAULT", "Legacy");
    legacy.definition_version = None;
    let mut v2 = api("v2", "DEFAULT", "V2");
    v2.definition_version = Some(DefinitionVersion::V2);
    repo.create(&conn, &legacy).unwrap();
    repo.create(&conn, &v2).unwrap();
    repo.create(&conn, &api("v4", "DEFAULT", "V4")).unwrap();

    let criteria = ApiCriteria {
        definition_versions: vec![Some(DefinitionVersion::V2)],
        ..Default::default()
    };
    let ids = repo.search_ids(&conn, &[criteria], None, None).unwrap();
    assert_eq!(ids.content, vec!["legacy", "v2"]);
}

#[test]
fn test_search_ids_ors_criteria_and_sorts() {
    let conn = setup_test_db();
    let repo = repo();
    let mut published = api("p", "DEFAULT", "Beta");
    published.api_lifecycle_state = Some(ApiLifecycleState::Published);
    repo.create(&conn, &published).unwrap();
    repo.create(&conn, &api("q", "OTHER", "Alpha")).unwrap();
    repo.create(&conn, &api("r", "THIRD", "Gamma")).unwrap();

    let criteria = [
        ApiCriteria {
            lifecycle_states: vec![ApiLifecycleState::Published],
            ..Default::default()
        },
        ApiCriteria {
            environment_id: Some("OTHER".into()),
            ..Default::default()
        },
    ];
    let ids = repo
        .search_ids(&conn, &criteria, None, Some(&Sortable::asc("name")))
        .unwrap();
    assert_eq!(ids.content, vec!["q", "p"]);
    assert_eq!(ids.total_elements, 2);
}

#[test]
fn test_unknown_sort_field_is_rejected() {
    let conn = setup_test_db();
    let err = repo()
        .search(&conn, &ApiCriteria::default(), Some(&Sortable::asc("nope")), None, None)
        .unwrap_err();
    assert_eq!(err.kind(), RepoErrorKind::InvalidInput);
}

#[test]
fn test_list_categories_is_distinct() {
    let conn = setup_test_db();
    let repo = repo();
    let mut first = api("a1", "DEFAULT", "First");
    first.categories = ["b".to_string(), "a".to_string()].into_iter().collect();
    let mut second = api("a2", "DEFAULT", "Second");
    second.categories = ["b".to_string()].into_iter().collect();
    repo.create(&conn, &first).unwrap();
    repo.create(&conn, &second).unwrap();

    let all = repo.list_categories(&conn, &ApiCriteria::default()).unwrap();
    assert_eq!(all.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

    let only_second = ApiCriteria {
        ids: vec!["a2".into()],
        ..Default::default()
    };
    let some = repo.list_categories(&conn, &only_second).unwrap();
    assert_eq!(some.len(), 1);
}

#[test]
fn test_cross_id_lookup_rejects_duplicates() {
    // Given: Two APIs sharing a cross id in one environment
    let conn = setup_test_db();
    let repo = repo();
    let mut first = api("a1", "DEFAULT", "First");
    first.cross_id = Some("x".into());
    let mut second = api("a2", "DEFAULT", "Second");
    second.cross_id = Some("x".into());
    let mut elsewhere = api("a3", "OTHER", "Third");
    elsewhere.cross_id = Some("y".into());
    repo.create(&conn, &first).unwrap();
    repo.create(&conn, &second).unwrap();
    repo.create(&conn, &elsewhere).unwrap();

    // Then: Looking the cross id up is a technical error
    let err = repo
        .find_by_environment_id_and_cross_id(&conn, "DEFAULT", "x")
        .unwrap_err();
    assert!(err.is_technical());
    assert!(err.message().contains("crossId x"));
    assert!(repo
        .find_id_by_environment_id_and_cross_id(&conn, "DEFAULT", "x")
        .is_err());

    // And: A unique cross id resolves
    let found = repo
        .find_by_environment_id_and_cross_id(&conn, "OTHER", "y")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "a3");
    assert_eq!(
        repo.find_id_by_environment_id_and_cross_id(&conn, "OTHER", "y")
            .unwrap()
            .as_deref(),
        Some("a3")
    );
    assert!(repo
        .find_id_by_environment_id_and_cross_id(&conn, "OTHER", "z")
        .unwrap()
        .is_none());
}

#[test]
fn test_delete_by_environment_id_returns_deleted_ids() {
    let conn = setup_test_db();
    let repo = repo();
    let mut first = api("a1", "DEFAULT", "First");
    first.labels = vec!["l".into()];
    repo.create(&conn, &first).unwrap();
    repo.create(&conn, &api("a2", "DEFAULT", "Second")).unwrap();
    repo.create(&conn, &api("a3", "OTHER", "Third")).unwrap();

    let mut deleted = repo.delete_by_environment_id(&conn, "DEFAULT").unwrap();
    deleted.sort();

    assert_eq!(deleted, vec!["a1", "a2"]);
    assert_eq!(count(&conn, "api_labels", "a1"), 0);
    assert!(repo.exist_by_id(&conn, "a3").unwrap());
    assert!(repo.delete_by_environment_id(&conn, "NONE").unwrap().is_empty());
}
