use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

stored_enum! {
    EventType {
        PublishApi => "PUBLISH_API",
        UnpublishApi => "UNPUBLISH_API",
        StartApi => "START_API",
        StopApi => "STOP_API",
        PublishDictionary => "PUBLISH_DICTIONARY",
        UnpublishDictionary => "UNPUBLISH_DICTIONARY",
        GatewayStarted => "GATEWAY_STARTED",
        GatewayStopped => "GATEWAY_STOPPED",
    }
}

/// Well-known keys of the `event_properties` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventProperty {
    ApiId,
    DictionaryId,
    Id,
    DeploymentNumber,
    User,
}

impl EventProperty {
    pub fn key(&self) -> &'static str {
        match self {
            EventProperty::ApiId => "api_id",
            EventProperty::DictionaryId => "dictionary_id",
            EventProperty::Id => "id",
            EventProperty::DeploymentNumber => "deployment_number",
            EventProperty::User => "user",
        }
    }
}

/// A deployment or lifecycle event consumed by gateways
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_type: Option<EventType>,
    pub payload: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub properties: BTreeMap<String, String>,
    pub environments: BTreeSet<String>,
}

impl Event {
    pub fn new(id: impl Into<String>, event_type: EventType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            event_type: Some(event_type),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, property: EventProperty, value: impl Into<String>) -> Self {
        self.properties
            .insert(property.key().to_string(), value.into());
        self
    }

    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environments.insert(environment_id.into());
        self
    }
}
