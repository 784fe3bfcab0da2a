//! APIs with their labels (list), groups (set) and categories (set)
//!
//! Categories come back through the main query's left join and are folded
//! in by row collation; labels and groups are loaded per API afterwards.

use super::{enum_text, fail, has_text, logged, query_strings, text};
use crate::column;
use crate::errors::Result;
use crate::orm::collate::insert_non_null;
use crate::orm::{ChildTable, Dialect, Ident, Predicate, QueryBuilder, TableMapper};
use apim_core::errors::{ApimError, RepoError};
use apim_core::model::{Api, DefinitionVersion};
use apim_core::search::{ApiCriteria, ApiFieldFilter, Order, Page, Pageable, Sortable};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use tracing::debug;

const TABLE: &str = "apis";

fn api_mapper(dialect: Dialect) -> std::result::Result<TableMapper<Api>, ApimError> {
    TableMapper::builder(TABLE, "id")
        .dialect(dialect)
        .column(column!(Api, "id", text, id))
        .column(column!(Api, "cross_id", opt_text, cross_id))
        .column(column!(Api, "origin", opt_text, origin))
        .column(column!(Api, "mode", opt_text, mode))
        .column(column!(Api, "sync_from", opt_text, sync_from))
        .column(column!(Api, "environment_id", text, environment_id))
        .column(column!(Api, "integration_id", opt_text, integration_id))
        .column(column!(Api, "name", text, name))
        .column(column!(Api, "description", opt_text, description))
        .column(column!(Api, "version", opt_text, version))
        .column(column!(Api, "definition_version", stored_enum, definition_version))
        .column(column!(Api, "definition", opt_text, definition))
        .column(column!(Api, "type", stored_enum, api_type))
        .column(column!(Api, "deployed_at", timestamp, deployed_at))
        .column(column!(Api, "created_at", timestamp, created_at))
        .column(column!(Api, "updated_at", timestamp, updated_at))
        .column(column!(Api, "visibility", stored_enum, visibility))
        .column(column!(Api, "lifecycle_state", stored_enum, lifecycle_state))
        .column(column!(Api, "picture", opt_text, picture))
        .column(column!(Api, "api_lifecycle_state", stored_enum, api_lifecycle_state))
        .column(column!(
            Api,
            "disable_membership_notifications",
            bool,
            disable_membership_notifications
        ))
        .column(column!(Api, "background", opt_text, background))
        .build()
}

fn add_category(api: &mut Api, row: &Row<'_>) -> rusqlite::Result<()> {
    insert_non_null(&mut api.categories, row, "category")
}

pub struct ApiRepository {
    mapper: TableMapper<Api>,
    alias: Ident,
    labels: ChildTable,
    groups: ChildTable,
    categories: ChildTable,
}

impl ApiRepository {
    pub fn new(dialect: Dialect) -> Result<Self> {
        Ok(Self {
            mapper: api_mapper(dialect)?,
            alias: Ident::new("a")?,
            labels: ChildTable::values(dialect, "api_labels", "api_id", "label")?,
            groups: ChildTable::values(dialect, "api_groups", "api_id", "group_id")?,
            categories: ChildTable::values(dialect, "api_categories", "api_id", "category")?,
        })
    }

    pub fn mapper(&self) -> &TableMapper<Api> {
        &self.mapper
    }

    fn select_with_categories(&self) -> String {
        format!(
            "select a.*, ac.category from {} a left join {} ac on a.id = ac.api_id",
            TABLE,
            self.categories.table()
        )
    }

    fn attach_children(&self, conn: &Connection, api: &mut Api) -> rusqlite::Result<()> {
        api.labels = self.labels.load_values(conn, &api.id)?;
        api.groups = self.groups.load_values(conn, &api.id)?.into_iter().collect();
        Ok(())
    }

    pub fn find_by_id(&self, conn: &Connection, id: &str) -> Result<Option<Api>> {
        const OP: &str = "api.find_by_id";
        debug!(id, "find api by id");

        let sql = format!("{} where a.id = ?", self.select_with_categories());
        let mut found = self
            .mapper
            .query_collated(conn, &sql, &[text(id)], add_category)
            .map_err(fail(OP, "Failed to find api by id"))?
            .into_iter()
            .next();
        if let Some(api) = found.as_mut() {
            self.attach_children(conn, api)
                .map_err(fail(OP, "Failed to find api by id"))?;
        }
        Ok(found)
    }

    pub fn exist_by_id(&self, conn: &Connection, id: &str) -> Result<bool> {
        debug!(id, "check api existence");
        let found: Option<String> = conn
            .query_row(
                &format!("select a.id from {} a where a.id = ?", TABLE),
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(fail("api.exist_by_id", "Failed to check api existence"))?;
        Ok(found.is_some())
    }

    /// Insert the API and its children, then return it as stored
    pub fn create(&self, conn: &Connection, api: &Api) -> Result<Api> {
        const OP: &str = "api.create";
        logged(OP, &api.id, || {
            self.mapper
                .insert(conn, api)
                .and_then(|_| self.store_children(conn, api, false))
                .map_err(fail(OP, "Failed to create api"))?;
            self.find_by_id(conn, &api.id)?.ok_or_else(|| {
                RepoError::technical("Created api could not be read back")
                    .with_op(OP)
                    .with_entity_id(&api.id)
            })
        })
    }

    /// Overwrite the row and replace every child collection
    pub fn update(&self, conn: &Connection, api: &Api) -> Result<Api> {
        const OP: &str = "api.update";
        logged(OP, &api.id, || {
            if api.id.is_empty() {
                return Err(RepoError::from(ApimError::UpdateWithoutId { entity: "api" }).with_op(OP));
            }
            let not_found = || {
                RepoError::from(ApimError::NotFoundForUpdate {
                    entity: "api",
                    id: api.id.clone(),
                })
                .with_op(OP)
            };

            let changed = self
                .mapper
                .update(conn, api, &api.id)
                .map_err(fail(OP, "Failed to update api"))?;
            if changed == 0 {
                return Err(not_found());
            }
            self.store_children(conn, api, true)
                .map_err(fail(OP, "Failed to update api"))?;
            self.find_by_id(conn, &api.id)?.ok_or_else(not_found)
        })
    }

    pub fn delete(&self, conn: &Connection, id: &str) -> Result<()> {
        const OP: &str = "api.delete";
        logged(OP, id, || {
            self.labels
                .delete_for(conn, id)
                .and_then(|_| self.groups.delete_for(conn, id))
                .and_then(|_| self.categories.delete_for(conn, id))
                .and_then(|_| self.mapper.delete(conn, id))
                .map_err(fail(OP, "Failed to delete api"))?;
            Ok(())
        })
    }

    fn store_children(&self, conn: &Connection, api: &Api, replace: bool) -> rusqlite::Result<()> {
        if replace {
            self.labels.replace_values(conn, &api.id, &api.labels)?;
            self.groups.replace_values(conn, &api.id, &api.groups)?;
            self.categories.replace_values(conn, &api.id, &api.categories)
        } else {
            self.labels.insert_values(conn, &api.id, &api.labels)?;
            self.groups.insert_values(conn, &api.id, &api.groups)?;
            self.categories.insert_values(conn, &api.id, &api.categories)
        }
    }

    /// Criteria search, sorted by name unless told otherwise, paged in memory
    pub fn search(
        &self,
        conn: &Connection,
        criteria: &ApiCriteria,
        sortable: Option<&Sortable>,
        pageable: Option<&Pageable>,
        field_filter: Option<&ApiFieldFilter>,
    ) -> Result<Page<Api>> {
        const OP: &str = "api.search";
        debug!(?criteria, ?sortable, ?pageable, "search apis");

        let mut nulled = Vec::new();
        if let Some(filter) = field_filter {
            if filter.exclude_definition {
                nulled.push("definition");
            }
            if filter.exclude_picture {
                nulled.extend(["picture", "background"]);
            }
        }

        let mut base = format!(
            "select {}, ac.category from {} a left join {} ac on a.id = ac.api_id",
            self.mapper.projection(Some(&self.alias), &nulled),
            TABLE,
            self.categories.table()
        );
        if !criteria.groups.is_empty() {
            base.push_str(&format!(" join {} ag on a.id = ag.api_id", self.groups.table()));
        }
        if has_text(&criteria.label).is_some() {
            base.push_str(&format!(" join {} al on a.id = al.api_id", self.labels.table()));
        }

        let sortable = sortable.cloned().unwrap_or_else(|| Sortable::asc("name"));
        let sort = self
            .mapper
            .sort_expression(Some(&self.alias), &sortable.field)?;

        let (sql, params) = criteria_predicates(criteria)?
            .into_iter()
            .fold(QueryBuilder::new(base), QueryBuilder::and)
            .order_by(sort, sortable.order)
            .order_by("a.id", Order::Asc)
            .build()?;

        let mut apis = self
            .mapper
            .query_collated(conn, &sql, &params, add_category)
            .map_err(fail(OP, "Failed to search apis"))?;
        for api in &mut apis {
            self.attach_children(conn, api)
                .map_err(fail(OP, "Failed to search apis"))?;
        }
        Ok(Page::from_items(apis, pageable))
    }

    /// Ids of APIs matching any of the criteria
    pub fn search_ids(
        &self,
        conn: &Connection,
        criteria: &[ApiCriteria],
        pageable: Option<&Pageable>,
        sortable: Option<&Sortable>,
    ) -> Result<Page<String>> {
        const OP: &str = "api.search_ids";
        debug!(?criteria, "search api ids");

        let sort = sortable
            .map(|s| {
                self.mapper
                    .sort_expression(Some(&self.alias), &s.field)
                    .map(|expr| (expr, s.order))
            })
            .transpose()?;

        let mut base = String::from("select distinct a.id");
        if let Some((expr, _)) = &sort {
            base.push_str(&format!(", {} as sort_key", expr));
        }
        base.push_str(&format!(" from {} a", TABLE));
        if criteria.iter().any(|c| has_text(&c.category).is_some()) {
            base.push_str(&format!(" left join {} ac on a.id = ac.api_id", self.categories.table()));
        }
        if criteria.iter().any(|c| !c.groups.is_empty()) {
            base.push_str(&format!(" left join {} ag on a.id = ag.api_id", self.groups.table()));
        }
        if criteria.iter().any(|c| has_text(&c.label).is_some()) {
            base.push_str(&format!(" left join {} al on a.id = al.api_id", self.labels.table()));
        }

        let mut alternatives = Vec::new();
        for c in criteria {
            let predicates = criteria_predicates(c)?;
            if !predicates.is_empty() {
                alternatives.push(Predicate::all(predicates));
            }
        }

        let mut query = QueryBuilder::new(base);
        if !alternatives.is_empty() {
            query = query.and(Predicate::any(alternatives));
        }
        if let Some((_, order)) = sort {
            query = query.order_by("sort_key", order);
        }
        let (sql, params) = query.order_by("a.id", Order::Asc).build()?;

        let ids = query_strings(conn, &sql, &params).map_err(fail(OP, "Failed to search api ids"))?;
        Ok(Page::from_items(ids, pageable))
    }

    /// Distinct categories, optionally restricted to the criteria's ids
    pub fn list_categories(&self, conn: &Connection, criteria: &ApiCriteria) -> Result<BTreeSet<String>> {
        debug!(?criteria, "list api categories");
        let (sql, params) = QueryBuilder::new(format!(
            "select category from {}",
            self.categories.table()
        ))
        .and_in("api_id", criteria.ids.iter().cloned())
        .group_by("category")
        .order_by("category", Order::Asc)
        .build()?;

        let categories = query_strings(conn, &sql, &params)
            .map_err(fail("api.list_categories", "Failed to list categories"))?;
        Ok(categories.into_iter().collect())
    }

    /// At most one API may carry a cross id within an environment
    pub fn find_by_environment_id_and_cross_id(
        &self,
        conn: &Connection,
        environment_id: &str,
        cross_id: &str,
    ) -> Result<Option<Api>> {
        const OP: &str = "api.find_by_environment_id_and_cross_id";
        debug!(environment_id, cross_id, "find api by cross id");

        let sql = format!(
            "{} where a.environment_id = ? and a.cross_id = ? order by a.id",
            self.select_with_categories()
        );
        let mut apis = self
            .mapper
            .query_collated(conn, &sql, &[text(environment_id), text(cross_id)], add_category)
            .map_err(fail(OP, "Failed to find api by cross id"))?;
        if apis.len() > 1 {
            return Err(ambiguous(environment_id, cross_id).with_op(OP));
        }
        let mut found = apis.pop();
        if let Some(api) = found.as_mut() {
            self.attach_children(conn, api)
                .map_err(fail(OP, "Failed to find api by cross id"))?;
        }
        Ok(found)
    }

    pub fn find_id_by_environment_id_and_cross_id(
        &self,
        conn: &Connection,
        environment_id: &str,
        cross_id: &str,
    ) -> Result<Option<String>> {
        const OP: &str = "api.find_id_by_environment_id_and_cross_id";
        debug!(environment_id, cross_id, "find api id by cross id");

        let mut ids = query_strings(
            conn,
            &format!("select a.id from {} a where a.environment_id = ? and a.cross_id = ?", TABLE),
            &[text(environment_id), text(cross_id)],
        )
        .map_err(fail(OP, "Failed to find api id by cross id"))?;
        if ids.len() > 1 {
            return Err(ambiguous(environment_id, cross_id).with_op(OP));
        }
        Ok(ids.pop())
    }

    /// Delete every API of an environment with its children; returns the deleted ids
    pub fn delete_by_environment_id(&self, conn: &Connection, environment_id: &str) -> Result<Vec<String>> {
        const OP: &str = "api.delete_by_environment_id";
        logged(OP, environment_id, || {
            let ids = query_strings(
                conn,
                &format!("select id from {} where environment_id = ?", TABLE),
                &[text(environment_id)],
            )
            .map_err(fail(OP, "Failed to delete api by environment"))?;

            if !ids.is_empty() {
                self.labels
                    .delete_for_all(conn, &ids)
                    .and_then(|_| self.groups.delete_for_all(conn, &ids))
                    .and_then(|_| self.categories.delete_for_all(conn, &ids))
                    .and_then(|_| {
                        conn.execute(
                            &format!("delete from {} where environment_id = ?", TABLE),
                            [environment_id],
                        )
                    })
                    .map_err(fail(OP, "Failed to delete api by environment"))?;
            }
            debug!(environment_id, count = ids.len(), "apis deleted");
            Ok(ids)
        })
    }
}

fn ambiguous(environment_id: &str, cross_id: &str) -> RepoError {
    ApimError::AmbiguousResult {
        entity: "API",
        detail: format!("environmentId {} and crossId {}", environment_id, cross_id),
    }
    .into()
}

/// Predicates of one criteria object, in bind order
fn criteria_predicates(criteria: &ApiCriteria) -> std::result::Result<Vec<Predicate>, ApimError> {
    let eq_text = |column: &str, value: &Option<String>| {
        has_text(value).map(|v| Predicate::eq(column, text(v)))
    };

    let predicates = vec![
        Predicate::in_list("ag.group_id", criteria.groups.iter().cloned())?,
        Predicate::in_list("a.id", criteria.ids.iter().cloned())?,
        eq_text("al.label", &criteria.label),
        eq_text("a.name", &criteria.name),
        criteria
            .state
            .map(|s| Predicate::eq("a.lifecycle_state", enum_text(s))),
        eq_text("a.version", &criteria.version),
        eq_text("ac.category", &criteria.category),
        criteria
            .visibility
            .map(|v| Predicate::eq("a.visibility", enum_text(v))),
        eq_text("a.cross_id", &criteria.cross_id),
        Predicate::in_list(
            "a.api_lifecycle_state",
            criteria.lifecycle_states.iter().map(|s| enum_text(*s)),
        )?,
        eq_text("a.environment_id", &criteria.environment_id),
        Predicate::in_list("a.environment_id", criteria.environments.iter().cloned())?,
        eq_text("a.integration_id", &criteria.integration_id),
        definition_version_predicate(&criteria.definition_versions)?,
    ];
    Ok(predicates.into_iter().flatten().collect())
}

/// APIs stored without a definition version predate V4 and count as V2
fn definition_version_predicate(
    versions: &[Option<DefinitionVersion>],
) -> std::result::Result<Option<Predicate>, ApimError> {
    if versions.is_empty() {
        return Ok(None);
    }
    let include_null =
        versions.contains(&None) || versions.contains(&Some(DefinitionVersion::V2));
    let named = Predicate::in_list(
        "a.definition_version",
        versions.iter().flatten().map(|v| enum_text(*v)),
    )?;
    let is_null = || Predicate::new("a.definition_version is null", Vec::new());

    Ok(match (include_null, named) {
        (true, None) => Some(is_null()),
        (true, Some(named)) => Some(Predicate::any(vec![is_null(), named])),
        (false, named) => named,
    })
}
