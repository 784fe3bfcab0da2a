//! Criteria objects
//!
//! Every field is independently optional: an empty string, empty collection
//! or `None` contributes no predicate.

use crate::model::{
    ApiLifecycleState, ApplicationStatus, DefinitionVersion, EventType, LifecycleState,
    SubscriptionStatus, Visibility,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiCriteria {
    pub ids: Vec<String>,
    pub groups: Vec<String>,
    pub label: Option<String>,
    pub name: Option<String>,
    pub state: Option<LifecycleState>,
    pub version: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<Visibility>,
    pub cross_id: Option<String>,
    pub lifecycle_states: Vec<ApiLifecycleState>,
    pub environment_id: Option<String>,
    pub environments: Vec<String>,
    /// `None` entries match APIs without a stored definition version
    pub definition_versions: Vec<Option<DefinitionVersion>>,
    pub integration_id: Option<String>,
}

impl ApiCriteria {
    /// True when no field would produce a predicate
    pub fn is_empty(&self) -> bool {
        self == &ApiCriteria::default()
    }
}

/// Columns an API search may leave out of the projection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiFieldFilter {
    pub exclude_definition: bool,
    pub exclude_picture: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationCriteria {
    pub ids: Vec<String>,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub environment_ids: Vec<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionCriteria {
    pub ids: Vec<String>,
    pub apis: Vec<String>,
    pub plans: Vec<String>,
    pub applications: Vec<String>,
    pub environments: Vec<String>,
    pub statuses: Vec<SubscriptionStatus>,
    pub plan_security_types: Vec<String>,
    pub client_id: Option<String>,
    /// Lower bound on `updated_at`
    pub from: Option<DateTime<Utc>>,
    /// Upper bound on `updated_at`
    pub to: Option<DateTime<Utc>>,
    pub ending_at_after: Option<DateTime<Utc>>,
    pub ending_at_before: Option<DateTime<Utc>>,
    /// Let subscriptions without `ending_at` pass the ending-at bounds
    pub include_without_end: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCriteria {
    /// Property key to accepted values; an event matches if any pair matches
    pub properties: BTreeMap<String, Vec<String>>,
    /// Inclusive lower bound on `updated_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `updated_at`
    pub to: Option<DateTime<Utc>>,
    pub environments: Vec<String>,
    pub types: Vec<EventType>,
    /// In a latest-per-group search, pick the latest event first and filter after
    pub strict_mode: bool,
}
