//! Applications with their metadata (map, collated) and groups (set)

use super::{enum_text, fail, has_text, logged, query_strings, text};
use crate::column;
use crate::errors::Result;
use crate::orm::collate::put_non_null;
use crate::orm::{ChildTable, Dialect, Ident, QueryBuilder, TableMapper};
use apim_core::errors::{ApimError, RepoError};
use apim_core::model::{Application, ApplicationStatus};
use apim_core::search::{ApplicationCriteria, Order, Page, Pageable, Sortable};
use rusqlite::{Connection, Row};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const TABLE: &str = "applications";

/// Listing queries leave the images out
const LIST_NULLED: &[&str] = &["picture", "background"];

fn application_mapper(dialect: Dialect) -> std::result::Result<TableMapper<Application>, ApimError> {
    TableMapper::builder(TABLE, "id")
        .dialect(dialect)
        .column(column!(Application, "id", text, id))
        .column(column!(Application, "environment_id", text, environment_id))
        .column(column!(Application, "name", text, name))
        .column(column!(Application, "description", opt_text, description))
        .column(column!(Application, "domain", opt_text, domain))
        .column(column!(Application, "type", stored_enum, app_type))
        .column(column!(Application, "created_at", timestamp, created_at))
        .column(column!(Application, "updated_at", timestamp, updated_at))
        .column(column!(Application, "picture", opt_text, picture))
        .column(column!(Application, "status", stored_enum, status))
        .column(column!(
            Application,
            "disable_membership_notifications",
            bool,
            disable_membership_notifications
        ))
        .column(column!(Application, "background", opt_text, background))
        .column(column!(Application, "api_key_mode", stored_enum, api_key_mode))
        .column(column!(Application, "origin", stored_enum, origin))
        .build()
}

fn add_metadata(application: &mut Application, row: &Row<'_>) -> rusqlite::Result<()> {
    put_non_null(&mut application.metadata, row, "am_k", "am_v")
}

pub struct ApplicationRepository {
    mapper: TableMapper<Application>,
    alias: Ident,
    groups: ChildTable,
    metadata: ChildTable,
}

impl ApplicationRepository {
    pub fn new(dialect: Dialect) -> Result<Self> {
        Ok(Self {
            mapper: application_mapper(dialect)?,
            alias: Ident::new("a")?,
            groups: ChildTable::values(dialect, "application_groups", "application_id", "group_id")?,
            metadata: ChildTable::entries(dialect, "application_metadata", "application_id", "k", "v")?,
        })
    }

    pub fn mapper(&self) -> &TableMapper<Application> {
        &self.mapper
    }

    /// Projection plus the left-joined metadata columns
    fn select(&self, nulled: &[&str], join_groups: bool) -> String {
        let mut sql = format!(
            "select {}, am.k as am_k, am.v as am_v from {} a left join {} am on a.id = am.application_id",
            self.mapper.projection(Some(&self.alias), nulled),
            TABLE,
            self.metadata.table()
        );
        if join_groups {
            sql.push_str(&format!(
                " join {} ag on ag.application_id = a.id",
                self.groups.table()
            ));
        }
        sql
    }

    /// Run a collated listing and fill in groups with one IN query
    fn list(
        &self,
        conn: &Connection,
        query: QueryBuilder,
        op: &'static str,
        message: &'static str,
    ) -> Result<Vec<Application>> {
        let (sql, params) = query.build()?;
        let mut applications = self
            .mapper
            .query_collated(conn, &sql, &params, add_metadata)
            .map_err(fail(op, message))?;
        self.attach_groups(conn, &mut applications)
            .map_err(fail(op, message))?;
        debug!(op, count = applications.len(), "applications found");
        Ok(applications)
    }

    fn attach_groups(&self, conn: &Connection, applications: &mut [Application]) -> rusqlite::Result<()> {
        let ids: Vec<String> = applications.iter().map(|a| a.id.clone()).collect();
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (application_id, group) in self.groups.load_values_for_all(conn, &ids)? {
            groups.entry(application_id).or_default().insert(group);
        }
        for application in applications.iter_mut() {
            if let Some(g) = groups.remove(&application.id) {
                application.groups = g;
            }
        }
        Ok(())
    }

    pub fn find_by_id(&self, conn: &Connection, id: &str) -> Result<Option<Application>> {
        debug!(id, "find application by id");
        let query = QueryBuilder::new(self.select(&[], false)).and_eq("a.id", text(id));
        Ok(self
            .list(conn, query, "application.find_by_id", "Failed to find application by id")?
            .into_iter()
            .next())
    }

    pub fn find_by_ids(
        &self,
        conn: &Connection,
        ids: &[String],
        sortable: Option<&Sortable>,
    ) -> Result<Vec<Application>> {
        debug!(?ids, "find applications by ids");
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::new(self.select(LIST_NULLED, false))
            .and_in("a.id", ids.iter().cloned());
        if let Some(sortable) = sortable {
            query = query.order_by(
                self.mapper.sort_expression(Some(&self.alias), &sortable.field)?,
                sortable.order,
            );
        }
        self.list(
            conn,
            query.order_by("a.id", Order::Asc),
            "application.find_by_ids",
            "Failed to find applications by ids",
        )
    }

    /// Every application, restricted to the given statuses when any are given
    pub fn find_all(&self, conn: &Connection, statuses: &[ApplicationStatus]) -> Result<Vec<Application>> {
        debug!(?statuses, "find all applications");
        let query = QueryBuilder::new(self.select(LIST_NULLED, false))
            .and_in("a.status", statuses.iter().map(|s| enum_text(*s)))
            .order_by("a.id", Order::Asc);
        self.list(conn, query, "application.find_all", "Failed to find applications")
    }

    pub fn find_by_groups(
        &self,
        conn: &Connection,
        groups: &[String],
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<Application>> {
        debug!(?groups, ?statuses, "find applications by groups");
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let query = QueryBuilder::new(self.select(LIST_NULLED, true))
            .and_in("ag.group_id", groups.iter().cloned())
            .and_in("a.status", statuses.iter().map(|s| enum_text(*s)))
            .order_by("a.id", Order::Asc);
        self.list(
            conn,
            query,
            "application.find_by_groups",
            "Failed to find applications by groups",
        )
    }

    /// Case-insensitive substring match on the name
    pub fn find_by_name_and_statuses(
        &self,
        conn: &Connection,
        partial_name: &str,
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<Application>> {
        debug!(partial_name, ?statuses, "find applications by name");
        let query = QueryBuilder::new(self.select(LIST_NULLED, false))
            .and_contains_ci("a.name", partial_name)
            .and_in("a.status", statuses.iter().map(|s| enum_text(*s)))
            .order_by("a.id", Order::Asc);
        self.list(
            conn,
            query,
            "application.find_by_name_and_statuses",
            "Failed to find applications by name",
        )
    }

    pub fn find_all_by_environment(
        &self,
        conn: &Connection,
        environment_id: &str,
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<Application>> {
        debug!(environment_id, ?statuses, "find applications by environment");
        let query = QueryBuilder::new(self.select(LIST_NULLED, false))
            .and_eq("a.environment_id", text(environment_id))
            .and_in("a.status", statuses.iter().map(|s| enum_text(*s)))
            .order_by("a.id", Order::Asc);
        self.list(
            conn,
            query,
            "application.find_all_by_environment",
            "Failed to find applications by environment",
        )
    }

    fn criteria_query(
        &self,
        criteria: &ApplicationCriteria,
        sortable: Option<&Sortable>,
    ) -> std::result::Result<QueryBuilder, ApimError> {
        let mut query = QueryBuilder::new(self.select(LIST_NULLED, !criteria.groups.is_empty()))
            .and_in("a.id", criteria.ids.iter().cloned());
        if let Some(name) = has_text(&criteria.name) {
            query = query.and_contains_ci("a.name", name);
        }
        let sortable = sortable.cloned().unwrap_or_else(|| Sortable::asc("name"));
        Ok(query
            .and_eq_opt("a.status", criteria.status.map(enum_text))
            .and_in("a.environment_id", criteria.environment_ids.iter().cloned())
            .and_in("ag.group_id", criteria.groups.iter().cloned())
            .order_by(
                self.mapper.sort_expression(Some(&self.alias), &sortable.field)?,
                sortable.order,
            )
            .order_by("a.id", Order::Asc))
    }

    /// Criteria search paged in memory
    pub fn search(
        &self,
        conn: &Connection,
        criteria: &ApplicationCriteria,
        pageable: Option<&Pageable>,
        sortable: Option<&Sortable>,
    ) -> Result<Page<Application>> {
        debug!(?criteria, ?pageable, "search applications");
        let query = self.criteria_query(criteria, sortable)?;
        let applications = self.list(
            conn,
            query,
            "application.search",
            "Failed to search applications",
        )?;
        Ok(Page::from_items(applications, pageable))
    }

    /// Ids of the matching applications, in sort order
    pub fn search_ids(
        &self,
        conn: &Connection,
        criteria: &ApplicationCriteria,
        sortable: Option<&Sortable>,
    ) -> Result<Vec<String>> {
        Ok(self
            .search(conn, criteria, None, sortable)?
            .content
            .into_iter()
            .map(|a| a.id)
            .collect())
    }

    pub fn create(&self, conn: &Connection, application: &Application) -> Result<Application> {
        const OP: &str = "application.create";
        logged(OP, &application.id, || {
            self.mapper
                .insert(conn, application)
                .and_then(|_| self.store_children(conn, application, false))
                .map_err(fail(OP, "Failed to create application"))?;
            self.find_by_id(conn, &application.id)?.ok_or_else(|| {
                RepoError::technical("Created application could not be read back")
                    .with_op(OP)
                    .with_entity_id(&application.id)
            })
        })
    }

    pub fn update(&self, conn: &Connection, application: &Application) -> Result<Application> {
        const OP: &str = "application.update";
        logged(OP, &application.id, || {
            if application.id.is_empty() {
                return Err(RepoError::from(ApimError::UpdateWithoutId {
                    entity: "application",
                })
                .with_op(OP));
            }
            let not_found = || {
                RepoError::from(ApimError::NotFoundForUpdate {
                    entity: "application",
                    id: application.id.clone(),
                })
                .with_op(OP)
            };

            let changed = self
                .mapper
                .update(conn, application, &application.id)
                .map_err(fail(OP, "Failed to update application"))?;
            if changed == 0 {
                return Err(not_found());
            }
            self.store_children(conn, application, true)
                .map_err(fail(OP, "Failed to update application"))?;
            self.find_by_id(conn, &application.id)?.ok_or_else(not_found)
        })
    }

    pub fn delete(&self, conn: &Connection, id: &str) -> Result<()> {
        const OP: &str = "application.delete";
        logged(OP, id, || {
            self.groups
                .delete_for(conn, id)
                .and_then(|_| self.metadata.delete_for(conn, id))
                .and_then(|_| self.mapper.delete(conn, id))
                .map_err(fail(OP, "Failed to delete application"))?;
            Ok(())
        })
    }

    fn store_children(
        &self,
        conn: &Connection,
        application: &Application,
        replace: bool,
    ) -> rusqlite::Result<()> {
        if replace {
            self.groups
                .replace_values(conn, &application.id, &application.groups)?;
            self.metadata
                .replace_entries(conn, &application.id, &application.metadata)
        } else {
            self.groups
                .insert_values(conn, &application.id, &application.groups)?;
            self.metadata
                .insert_entries(conn, &application.id, &application.metadata)
        }
    }

    pub fn delete_by_environment_id(&self, conn: &Connection, environment_id: &str) -> Result<Vec<String>> {
        const OP: &str = "application.delete_by_environment_id";
        logged(OP, environment_id, || {
            let ids = query_strings(
                conn,
                &format!("select id from {} where environment_id = ?", TABLE),
                &[text(environment_id)],
            )
            .map_err(fail(OP, "Failed to delete application by environment"))?;

            if !ids.is_empty() {
                self.metadata
                    .delete_for_all(conn, &ids)
                    .and_then(|_| self.groups.delete_for_all(conn, &ids))
                    .and_then(|_| {
                        conn.execute(
                            &format!("delete from {} where environment_id = ?", TABLE),
                            [environment_id],
                        )
                    })
                    .map_err(fail(OP, "Failed to delete application by environment"))?;
            }
            Ok(ids)
        })
    }
}
