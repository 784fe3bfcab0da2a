use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

stored_enum! {
    /// Version of the gateway definition format the API is written in
    DefinitionVersion {
        V1 => "V1",
        V2 => "V2",
        V4 => "V4",
        Federated => "FEDERATED",
    }
}

stored_enum! {
    ApiType {
        Proxy => "PROXY",
        Message => "MESSAGE",
        Native => "NATIVE",
    }
}

stored_enum! {
    Visibility {
        Public => "PUBLIC",
        Private => "PRIVATE",
    }
}

stored_enum! {
    /// Runtime state on the gateway
    LifecycleState {
        Initialized => "INITIALIZED",
        Started => "STARTED",
        Stopped => "STOPPED",
        Closed => "CLOSED",
    }
}

stored_enum! {
    /// Publication state in the portal
    ApiLifecycleState {
        Created => "CREATED",
        Published => "PUBLISHED",
        Unpublished => "UNPUBLISHED",
        Deprecated => "DEPRECATED",
        Archived => "ARCHIVED",
    }
}

/// An API published through the gateway
///
/// `labels` keeps insertion order and duplicates; `groups` and `categories`
/// are sets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Api {
    pub id: String,
    pub cross_id: Option<String>,
    pub origin: Option<String>,
    /// How an API coming from an integration is managed
    pub mode: Option<String>,
    /// Where an externally managed API is synchronised from
    pub sync_from: Option<String>,
    pub environment_id: String,
    pub integration_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub definition_version: Option<DefinitionVersion>,
    pub definition: Option<String>,
    pub api_type: Option<ApiType>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub visibility: Option<Visibility>,
    pub lifecycle_state: Option<LifecycleState>,
    pub picture: Option<String>,
    pub api_lifecycle_state: Option<ApiLifecycleState>,
    pub disable_membership_notifications: bool,
    pub background: Option<String>,
    pub labels: Vec<String>,
    pub groups: BTreeSet<String>,
    pub categories: BTreeSet<String>,
}

impl Api {
    pub fn new(id: impl Into<String>, environment_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            environment_id: environment_id.into(),
            name: name.into(),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }
}
