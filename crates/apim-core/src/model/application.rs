use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

stored_enum! {
    ApplicationType {
        Simple => "SIMPLE",
        Browser => "BROWSER",
        Web => "WEB",
        Native => "NATIVE",
        BackendToBackend => "BACKEND_TO_BACKEND",
    }
}

stored_enum! {
    ApplicationStatus {
        Active => "ACTIVE",
        Archived => "ARCHIVED",
    }
}

stored_enum! {
    ApiKeyMode {
        Shared => "SHARED",
        Exclusive => "EXCLUSIVE",
        Unspecified => "UNSPECIFIED",
    }
}

stored_enum! {
    /// Where the record is managed from
    Origin {
        Management => "MANAGEMENT",
        Kubernetes => "KUBERNETES",
    }
}

/// A consumer application subscribing to APIs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub environment_id: String,
    pub name: String,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub app_type: Option<ApplicationType>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub picture: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub disable_membership_notifications: bool,
    pub background: Option<String>,
    pub api_key_mode: Option<ApiKeyMode>,
    pub origin: Option<Origin>,
    pub groups: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Application {
    pub fn new(id: impl Into<String>, environment_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            environment_id: environment_id.into(),
            name: name.into(),
            status: Some(ApplicationStatus::Active),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }
}
