//! Events with their properties (map) and environments (set)
//!
//! Both children are left-joined into one collated query; the row product
//! of the two joins folds back into the map and the set without duplicates.

use super::{enum_text, fail, logged, millis, query_strings, text};
use crate::column;
use crate::errors::Result;
use crate::orm::collate::{insert_non_null, put_non_null};
use crate::orm::{ChildTable, CmpOp, Dialect, Predicate, QueryBuilder, TableMapper};
use apim_core::errors::{ApimError, RepoError};
use apim_core::model::{Event, EventProperty};
use apim_core::search::{EventCriteria, Order, Page, Pageable};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use tracing::debug;

const TABLE: &str = "events";

fn event_mapper(dialect: Dialect) -> std::result::Result<TableMapper<Event>, ApimError> {
    TableMapper::builder(TABLE, "id")
        .dialect(dialect)
        .column(column!(Event, "id", text, id))
        .column(column!(Event, "type", stored_enum, event_type))
        .column(column!(Event, "payload", opt_text, payload))
        .column(column!(Event, "parent_id", opt_text, parent_id))
        .column(column!(Event, "created_at", timestamp, created_at))
        .column(column!(Event, "updated_at", timestamp, updated_at))
        .build()
}

fn add_children(event: &mut Event, row: &Row<'_>) -> rusqlite::Result<()> {
    put_non_null(&mut event.properties, row, "property_key", "property_value")?;
    insert_non_null(&mut event.environments, row, "environment_id")
}

/// Conditions on events aliased `alias`, children matched through sub-selects
///
/// Sub-selects keep the outer joins free, so a matching event still comes back
/// with all of its properties and environments.
fn criteria_predicates(criteria: &EventCriteria, alias: &str) -> std::result::Result<Vec<Predicate>, ApimError> {
    let mut predicates = Vec::new();

    let pairs: Vec<Predicate> = criteria
        .properties
        .iter()
        .flat_map(|(key, values)| {
            values.iter().map(move |value| {
                Predicate::new(
                    "(property_key = ? and property_value = ?)",
                    vec![text(key), text(value)],
                )
            })
        })
        .collect();
    if !pairs.is_empty() {
        let any = Predicate::any(pairs);
        predicates.push(Predicate::new(
            format!(
                "{}.id in (select event_id from event_properties where {})",
                alias, any.sql
            ),
            any.params,
        ));
    }

    if let Some(from) = criteria.from {
        predicates.push(Predicate::new(
            format!("{}.updated_at {} ?", alias, CmpOp::Ge.as_sql()),
            vec![millis(from)],
        ));
    }
    if let Some(to) = criteria.to {
        predicates.push(Predicate::new(
            format!("{}.updated_at {} ?", alias, CmpOp::Lt.as_sql()),
            vec![millis(to)],
        ));
    }
    if let Some(environments) = Predicate::in_list("environment_id", criteria.environments.iter().map(|e| text(e)))? {
        predicates.push(Predicate::new(
            format!(
                "{}.id in (select event_id from event_environments where {})",
                alias, environments.sql
            ),
            environments.params,
        ));
    }
    if let Some(types) = Predicate::in_list(
        &format!("{}.type", alias),
        criteria.types.iter().map(|t| enum_text(*t)),
    )? {
        predicates.push(types);
    }
    Ok(predicates)
}

pub struct EventRepository {
    mapper: TableMapper<Event>,
    properties: ChildTable,
    environments: ChildTable,
}

impl EventRepository {
    pub fn new(dialect: Dialect) -> Result<Self> {
        Ok(Self {
            mapper: event_mapper(dialect)?,
            properties: ChildTable::entries(
                dialect,
                "event_properties",
                "event_id",
                "property_key",
                "property_value",
            )?,
            environments: ChildTable::values(dialect, "event_environments", "event_id", "environment_id")?,
        })
    }

    pub fn mapper(&self) -> &TableMapper<Event> {
        &self.mapper
    }

    fn select(&self) -> String {
        format!(
            "select e.*, ep.property_key, ep.property_value, ev.environment_id from {} e \
             left join {} ep on e.id = ep.event_id \
             left join {} ev on e.id = ev.event_id",
            TABLE,
            self.properties.table(),
            self.environments.table()
        )
    }

    fn list(
        &self,
        conn: &Connection,
        query: QueryBuilder,
        op: &'static str,
        message: &'static str,
    ) -> Result<Vec<Event>> {
        let (sql, params) = query.build()?;
        let events = self
            .mapper
            .query_collated(conn, &sql, &params, add_children)
            .map_err(fail(op, message))?;
        debug!(op, count = events.len(), "events found");
        Ok(events)
    }

    pub fn find_by_id(&self, conn: &Connection, id: &str) -> Result<Option<Event>> {
        debug!(id, "find event by id");
        let query = QueryBuilder::new(self.select()).and_eq("e.id", text(id));
        Ok(self
            .list(conn, query, "event.find_by_id", "Failed to find event by id")?
            .into_iter()
            .next())
    }

    fn read_back(&self, conn: &Connection, id: &str, op: &'static str) -> Result<Event> {
        self.find_by_id(conn, id)?.ok_or_else(|| {
            RepoError::technical("Stored event could not be read back")
                .with_op(op)
                .with_entity_id(id)
        })
    }

    pub fn create(&self, conn: &Connection, event: &Event) -> Result<Event> {
        const OP: &str = "event.create";
        logged(OP, &event.id, || {
            self.mapper
                .insert(conn, event)
                .and_then(|_| self.properties.insert_entries(conn, &event.id, &event.properties))
                .and_then(|_| self.environments.insert_values(conn, &event.id, &event.environments))
                .map_err(fail(OP, "Failed to create event"))?;
            self.read_back(conn, &event.id, OP)
        })
    }

    pub fn update(&self, conn: &Connection, event: &Event) -> Result<Event> {
        const OP: &str = "event.update";
        logged(OP, &event.id, || {
            if event.id.is_empty() {
                return Err(RepoError::from(ApimError::UpdateWithoutId { entity: "event" }).with_op(OP));
            }
            let changed = self
                .mapper
                .update(conn, event, &event.id)
                .map_err(fail(OP, "Failed to update event"))?;
            if changed == 0 {
                return Err(RepoError::from(ApimError::NotFoundForUpdate {
                    entity: "event",
                    id: event.id.clone(),
                })
                .with_op(OP));
            }
            self.properties
                .replace_entries(conn, &event.id, &event.properties)
                .and_then(|_| self.environments.replace_values(conn, &event.id, &event.environments))
                .map_err(fail(OP, "Failed to update event"))?;
            self.read_back(conn, &event.id, OP)
        })
    }

    pub fn delete(&self, conn: &Connection, id: &str) -> Result<()> {
        const OP: &str = "event.delete";
        logged(OP, id, || {
            self.properties
                .delete_for(conn, id)
                .and_then(|_| self.environments.delete_for(conn, id))
                .and_then(|_| self.mapper.delete(conn, id))
                .map_err(fail(OP, "Failed to delete event"))?;
            Ok(())
        })
    }

    fn criteria_query(&self, criteria: &EventCriteria) -> std::result::Result<QueryBuilder, ApimError> {
        let query = criteria_predicates(criteria, "e")?
            .into_iter()
            .fold(QueryBuilder::new(self.select()), QueryBuilder::and);
        Ok(query
            .order_by("e.updated_at", Order::Desc)
            .order_by("e.id", Order::Desc))
    }

    /// Matching events, most recently updated first
    pub fn search(&self, conn: &Connection, criteria: &EventCriteria) -> Result<Vec<Event>> {
        debug!(?criteria, "search events");
        let query = self.criteria_query(criteria)?;
        self.list(conn, query, "event.search", "Failed to search events")
    }

    pub fn search_page(
        &self,
        conn: &Connection,
        criteria: &EventCriteria,
        pageable: Option<&Pageable>,
    ) -> Result<Page<Event>> {
        debug!(?criteria, ?pageable, "search events page");
        let query = self.criteria_query(criteria)?;
        let events = self.list(conn, query, "event.search_page", "Failed to search events")?;
        Ok(Page::from_items(events, pageable))
    }

    /// Latest event for each distinct value of `group`
    ///
    /// Without strict mode the latest is taken among the matching events;
    /// in strict mode the latest is taken first and then has to match.
    /// Paging applies to the groups and is done in SQL.
    pub fn search_latest(
        &self,
        conn: &Connection,
        criteria: &EventCriteria,
        group: EventProperty,
        page: Option<usize>,
        size: Option<usize>,
    ) -> Result<Vec<Event>> {
        debug!(?criteria, ?group, ?page, ?size, "search latest events");
        let dialect = self.mapper.dialect();

        // Non-strict: the latest is chosen among matching events only
        let restrict = if criteria.strict_mode {
            Vec::new()
        } else {
            criteria_predicates(criteria, "e2")?
        };
        let mut max_sql = format!(
            "e1.updated_at = (select max(e2.updated_at) from {} e2 \
             join event_properties g2 on g2.event_id = e2.id and g2.property_key = ? \
             where g2.property_value = g1.property_value",
            TABLE
        );
        let mut max_params = vec![text(group.key())];
        for predicate in restrict {
            max_sql.push_str(" and ");
            max_sql.push_str(&predicate.sql);
            max_params.extend(predicate.params);
        }
        max_sql.push(')');

        let mut inner = QueryBuilder::with_base_params(
            format!(
                "select e1.id from {} e1 join event_properties g1 on g1.event_id = e1.id and g1.property_key = ?",
                TABLE
            ),
            vec![text(group.key())],
        )
        .and(Predicate::new(max_sql, max_params));
        inner = criteria_predicates(criteria, "e1")?
            .into_iter()
            .fold(inner, QueryBuilder::and);
        inner = inner
            .order_by("e1.updated_at", Order::Desc)
            .order_by("e1.id", Order::Desc);
        inner = match (page, size) {
            (Some(page), Some(size)) if size > 0 => {
                inner.paging(dialect, size, Pageable::new(page, size).from())
            }
            _ => inner.offset(dialect, 0),
        };
        let (inner_sql, inner_params) = inner.build()?;

        let query = QueryBuilder::with_base_params(
            format!("{} join ({}) latest on latest.id = e.id", self.select(), inner_sql),
            inner_params,
        )
        .order_by("e.updated_at", Order::Desc)
        .order_by("e.id", Order::Desc);
        self.list(conn, query, "event.search_latest", "Failed to search latest events")
    }

    /// Patch the non-null fields of an existing event, or create it
    ///
    /// Given properties overwrite stored ones with the same key; keys the
    /// stored event lacks are not added, and other stored properties stay.
    /// Environments are replaced.
    pub fn create_or_patch(&self, conn: &Connection, event: &Event) -> Result<Event> {
        const OP: &str = "event.create_or_patch";
        let Some(event_type) = event.event_type.filter(|_| !event.id.is_empty()) else {
            return Err(RepoError::from(ApimError::IncompleteEntity {
                entity: "event",
                missing: "an id and a type",
            })
            .with_op(OP));
        };

        let patched = logged(OP, &event.id, || {
            let mut sets = vec![format!("{} = ?", self.mapper.escaped("type"))];
            let mut params = vec![enum_text(event_type)];
            if let Some(payload) = &event.payload {
                sets.push("payload = ?".to_string());
                params.push(text(payload));
            }
            if let Some(parent_id) = &event.parent_id {
                sets.push("parent_id = ?".to_string());
                params.push(text(parent_id));
            }
            if let Some(updated_at) = event.updated_at {
                sets.push("updated_at = ?".to_string());
                params.push(millis(updated_at));
            }
            params.push(text(&event.id));

            let sql = format!("update {} set {} where id = ?", TABLE, sets.join(", "));
            let changed = conn
                .execute(&sql, params_from_iter(params))
                .map_err(fail(OP, "Failed to patch event"))?;
            if changed == 0 {
                return Ok(false);
            }
            self.properties
                .update_entries(conn, &event.id, &event.properties)
                .and_then(|_| self.environments.replace_values(conn, &event.id, &event.environments))
                .map_err(fail(OP, "Failed to patch event"))?;
            Ok(true)
        })?;

        if patched {
            self.read_back(conn, &event.id, OP)
        } else {
            debug!(id = %event.id, "no event to patch, creating it");
            self.create(conn, event)
        }
    }

    /// Remove every event whose `api_id` property names the API
    pub fn delete_api_events(&self, conn: &Connection, api_id: &str) -> Result<usize> {
        const OP: &str = "event.delete_api_events";
        logged(OP, api_id, || {
            let ids = query_strings(
                conn,
                "select event_id from event_properties where property_key = ? and property_value = ?",
                &[text(EventProperty::ApiId.key()), text(api_id)],
            )
            .map_err(fail(OP, "Failed to delete events of api"))?;
            if ids.is_empty() {
                return Ok(0);
            }

            let delete = self.mapper.delete_in_sql("id", ids.len())?;
            let values: Vec<Value> = ids.iter().map(|id| text(id)).collect();
            let deleted = self
                .properties
                .delete_for_all(conn, &ids)
                .and_then(|_| self.environments.delete_for_all(conn, &ids))
                .and_then(|_| conn.execute(&delete, params_from_iter(values)))
                .map_err(fail(OP, "Failed to delete events of api"))?;
            debug!(api_id, deleted, "api events deleted");
            Ok(deleted)
        })
    }
}
