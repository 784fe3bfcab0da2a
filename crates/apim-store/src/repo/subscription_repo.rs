//! Subscriptions with their metadata (map, collated)

use super::{enum_text, fail, has_text, logged, millis, query_strings, text};
use crate::column;
use crate::errors::Result;
use crate::orm::collate::put_non_null;
use crate::orm::{ChildTable, CmpOp, Dialect, Predicate, QueryBuilder, TableMapper};
use apim_core::errors::{ApimError, RepoError};
use apim_core::model::Subscription;
use apim_core::search::{Order, Page, Pageable, Sortable, SubscriptionCriteria};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::debug;

const TABLE: &str = "subscriptions";

fn subscription_mapper(dialect: Dialect) -> std::result::Result<TableMapper<Subscription>, ApimError> {
    TableMapper::builder(TABLE, "id")
        .dialect(dialect)
        .column(column!(Subscription, "id", text, id))
        .column(column!(Subscription, "plan", text, plan))
        .column(column!(Subscription, "application", text, application))
        .column(column!(Subscription, "api", text, api))
        .column(column!(Subscription, "environment_id", opt_text, environment_id))
        .column(column!(Subscription, "starting_at", timestamp, starting_at))
        .column(column!(Subscription, "ending_at", timestamp, ending_at))
        .column(column!(Subscription, "created_at", timestamp, created_at))
        .column(column!(Subscription, "updated_at", timestamp, updated_at))
        .column(column!(Subscription, "processed_at", timestamp, processed_at))
        .column(column!(Subscription, "processed_by", opt_text, processed_by))
        .column(column!(Subscription, "subscribed_by", opt_text, subscribed_by))
        .column(column!(Subscription, "client_id", opt_text, client_id))
        .column(column!(Subscription, "request", opt_text, request))
        .column(column!(Subscription, "reason", opt_text, reason))
        .column(column!(Subscription, "status", stored_enum, status))
        .column(column!(Subscription, "consumer_status", stored_enum, consumer_status))
        .column(column!(Subscription, "consumer_paused_at", timestamp, consumer_paused_at))
        .column(column!(Subscription, "failure_cause", opt_text, failure_cause))
        .column(column!(Subscription, "paused_at", timestamp, paused_at))
        .column(column!(
            Subscription,
            "general_conditions_accepted",
            opt_bool,
            general_conditions_accepted
        ))
        .column(column!(
            Subscription,
            "general_conditions_content_revision",
            opt_int,
            general_conditions_content_revision
        ))
        .column(column!(
            Subscription,
            "days_to_expiration_on_last_notification",
            opt_int,
            days_to_expiration_on_last_notification
        ))
        .column(column!(Subscription, "configuration", opt_text, configuration))
        .column(column!(Subscription, "type", stored_enum, subscription_type))
        .build()
}

fn add_metadata(subscription: &mut Subscription, row: &Row<'_>) -> rusqlite::Result<()> {
    put_non_null(&mut subscription.metadata, row, "sm_k", "sm_v")
}

pub struct SubscriptionRepository {
    mapper: TableMapper<Subscription>,
    metadata: ChildTable,
    plan_column: String,
}

impl SubscriptionRepository {
    pub fn new(dialect: Dialect) -> Result<Self> {
        Ok(Self {
            mapper: subscription_mapper(dialect)?,
            metadata: ChildTable::entries(dialect, "subscriptions_metadata", "subscription_id", "k", "v")?,
            plan_column: format!("s.{}", dialect.escape_reserved_word("plan")),
        })
    }

    pub fn mapper(&self) -> &TableMapper<Subscription> {
        &self.mapper
    }

    fn select(&self) -> String {
        format!(
            "select s.*, sm.k as sm_k, sm.v as sm_v from {} s left join {} sm on s.id = sm.subscription_id",
            TABLE,
            self.metadata.table()
        )
    }

    fn list(
        &self,
        conn: &Connection,
        query: QueryBuilder,
        op: &'static str,
        message: &'static str,
    ) -> Result<Vec<Subscription>> {
        let (sql, params) = query.build()?;
        self.mapper
            .query_collated(conn, &sql, &params, add_metadata)
            .map_err(fail(op, message))
    }

    pub fn find_by_id(&self, conn: &Connection, id: &str) -> Result<Option<Subscription>> {
        debug!(id, "find subscription by id");
        let query = QueryBuilder::new(self.select()).and_eq("s.id", text(id));
        Ok(self
            .list(conn, query, "subscription.find_by_id", "Failed to find subscription by id")?
            .into_iter()
            .next())
    }

    pub fn find_by_id_in(&self, conn: &Connection, ids: &[String]) -> Result<Vec<Subscription>> {
        debug!(?ids, "find subscriptions by ids");
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = QueryBuilder::new(self.select())
            .and_in("s.id", ids.iter().cloned())
            .order_by("s.id", Order::Asc);
        self.list(
            conn,
            query,
            "subscription.find_by_id_in",
            "Failed to find subscriptions by ids",
        )
    }

    pub fn find_all(&self, conn: &Connection) -> Result<Vec<Subscription>> {
        debug!("find all subscriptions");
        let query = QueryBuilder::new(self.select()).order_by("s.id", Order::Asc);
        self.list(conn, query, "subscription.find_all", "Failed to find subscriptions")
    }

    /// Criteria search, newest first unless told otherwise, paged in memory
    pub fn search(
        &self,
        conn: &Connection,
        criteria: &SubscriptionCriteria,
        sortable: Option<&Sortable>,
        pageable: Option<&Pageable>,
    ) -> Result<Page<Subscription>> {
        debug!(?criteria, ?sortable, ?pageable, "search subscriptions");

        let mut base = self.select();
        if !criteria.plan_security_types.is_empty() {
            base.push_str(&format!(" inner join plans p on {} = p.id", self.plan_column));
        }

        let ending_at = |op: CmpOp, bound: DateTime<Utc>| {
            let cmp = Predicate::new(format!("s.ending_at {} ?", op.as_sql()), vec![millis(bound)]);
            if criteria.include_without_end {
                Predicate::any(vec![Predicate::new("s.ending_at is null", Vec::new()), cmp])
            } else {
                cmp
            }
        };

        let mut query = QueryBuilder::new(base)
            .and_in("p.security", criteria.plan_security_types.iter().cloned())
            .and_in("s.environment_id", criteria.environments.iter().cloned());
        if let Some(from) = criteria.from {
            query = query.and_cmp("s.updated_at", CmpOp::Ge, millis(from));
        }
        if let Some(to) = criteria.to {
            query = query.and_cmp("s.updated_at", CmpOp::Le, millis(to));
        }
        if let Some(client_id) = has_text(&criteria.client_id) {
            query = query.and_eq("s.client_id", text(client_id));
        }
        let mut query = query
            .and_opt(criteria.ending_at_after.map(|t| ending_at(CmpOp::Ge, t)))
            .and_opt(criteria.ending_at_before.map(|t| ending_at(CmpOp::Le, t)))
            .and_in(&self.plan_column, criteria.plans.iter().cloned())
            .and_in("s.application", criteria.applications.iter().cloned())
            .and_in("s.api", criteria.apis.iter().cloned())
            .and_in("s.id", criteria.ids.iter().cloned())
            .and_in("s.status", criteria.statuses.iter().map(|s| enum_text(*s)));

        query = match sortable {
            Some(sortable) => query.order_by(
                format!("s.{}", self.mapper.sort_column(&sortable.field)?),
                sortable.order,
            ),
            None => query.order_by("s.created_at", Order::Desc),
        };

        let subscriptions = self.list(
            conn,
            query.order_by("s.id", Order::Asc),
            "subscription.search",
            "Failed to find subscription records",
        )?;
        Ok(Page::from_items(subscriptions, pageable))
    }

    /// Applications (when the criteria name any) or APIs ranked by subscription count
    ///
    /// Ties are broken by the most recent update, then by id.
    pub fn find_reference_ids_order_by_number_of_subscriptions(
        &self,
        conn: &Connection,
        criteria: &SubscriptionCriteria,
        order: Order,
    ) -> Result<Vec<String>> {
        debug!(?criteria, ?order, "rank subscription references");

        let (group, references) = if !criteria.applications.is_empty() {
            ("application", &criteria.applications)
        } else {
            ("api", &criteria.apis)
        };

        let (sql, params) = QueryBuilder::new(format!(
            "select {group}, count(*) as number_of_subscriptions, max(updated_at) as last_updated_at from {TABLE}"
        ))
        .and(Predicate::new(format!("{} is not null", group), Vec::new()))
        .and_in(group, references.iter().cloned())
        .and_in("status", criteria.statuses.iter().map(|s| enum_text(*s)))
        .group_by(group)
        .order_by("number_of_subscriptions", order)
        .order_by("last_updated_at", order)
        .order_by(group, Order::Asc)
        .build()?;

        query_strings(conn, &sql, &params).map_err(fail(
            "subscription.find_reference_ids_order_by_number_of_subscriptions",
            "Failed to rank subscriptions",
        ))
    }

    pub fn create(&self, conn: &Connection, subscription: &Subscription) -> Result<Subscription> {
        const OP: &str = "subscription.create";
        logged(OP, &subscription.id, || {
            self.mapper
                .insert(conn, subscription)
                .and_then(|_| {
                    self.metadata
                        .insert_entries(conn, &subscription.id, &subscription.metadata)
                })
                .map_err(fail(OP, "Failed to create subscription"))?;
            self.find_by_id(conn, &subscription.id)?.ok_or_else(|| {
                RepoError::technical("Created subscription could not be read back")
                    .with_op(OP)
                    .with_entity_id(&subscription.id)
            })
        })
    }

    pub fn update(&self, conn: &Connection, subscription: &Subscription) -> Result<Subscription> {
        const OP: &str = "subscription.update";
        logged(OP, &subscription.id, || {
            if subscription.id.is_empty() {
                return Err(RepoError::from(ApimError::UpdateWithoutId {
                    entity: "subscription",
                })
                .with_op(OP));
            }
            let not_found = || {
                RepoError::from(ApimError::NotFoundForUpdate {
                    entity: "subscription",
                    id: subscription.id.clone(),
                })
                .with_op(OP)
            };

            let changed = self
                .mapper
                .update(conn, subscription, &subscription.id)
                .map_err(fail(OP, "Failed to update subscription"))?;
            if changed == 0 {
                return Err(not_found());
            }
            self.metadata
                .replace_entries(conn, &subscription.id, &subscription.metadata)
                .map_err(fail(OP, "Failed to update subscription"))?;
            self.find_by_id(conn, &subscription.id)?.ok_or_else(not_found)
        })
    }

    pub fn delete(&self, conn: &Connection, id: &str) -> Result<()> {
        const OP: &str = "subscription.delete";
        logged(OP, id, || {
            self.metadata
                .delete_for(conn, id)
                .and_then(|_| self.mapper.delete(conn, id))
                .map_err(fail(OP, "Failed to delete subscription"))?;
            Ok(())
        })
    }

    pub fn delete_by_environment_id(&self, conn: &Connection, environment_id: &str) -> Result<Vec<String>> {
        const OP: &str = "subscription.delete_by_environment_id";
        logged(OP, environment_id, || {
            let ids = query_strings(
                conn,
                &format!("select id from {} where environment_id = ?", TABLE),
                &[text(environment_id)],
            )
            .map_err(fail(OP, "Failed to delete subscription by environment"))?;

            if !ids.is_empty() {
                self.metadata
                    .delete_for_all(conn, &ids)
                    .and_then(|_| {
                        conn.execute(
                            &format!("delete from {} where environment_id = ?", TABLE),
                            [environment_id],
                        )
                    })
                    .map_err(fail(OP, "Failed to delete subscription by environment"))?;
            }
            Ok(ids)
        })
    }
}
