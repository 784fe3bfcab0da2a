use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

stored_enum! {
    SubscriptionStatus {
        Pending => "PENDING",
        Rejected => "REJECTED",
        Accepted => "ACCEPTED",
        Closed => "CLOSED",
        Paused => "PAUSED",
    }
}

stored_enum! {
    /// Whether the consumer side of a push subscription is running
    ConsumerStatus {
        Started => "STARTED",
        Stopped => "STOPPED",
        Failure => "FAILURE",
    }
}

stored_enum! {
    SubscriptionType {
        Standard => "STANDARD",
        Push => "PUSH",
    }
}

/// Link between an application and a plan of an API
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub plan: String,
    pub application: String,
    pub api: String,
    pub environment_id: Option<String>,
    pub starting_at: Option<DateTime<Utc>>,
    pub ending_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub subscribed_by: Option<String>,
    pub client_id: Option<String>,
    pub request: Option<String>,
    pub reason: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub consumer_status: Option<ConsumerStatus>,
    pub consumer_paused_at: Option<DateTime<Utc>>,
    pub failure_cause: Option<String>,
    pub paused_at: Option<DateTime<Utc>>,
    pub general_conditions_accepted: Option<bool>,
    pub general_conditions_content_revision: Option<i32>,
    pub days_to_expiration_on_last_notification: Option<i32>,
    pub configuration: Option<String>,
    pub subscription_type: Option<SubscriptionType>,
    pub metadata: BTreeMap<String, String>,
}

impl Subscription {
    pub fn new(
        id: impl Into<String>,
        api: impl Into<String>,
        plan: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            api: api.into(),
            plan: plan.into(),
            application: application.into(),
            status: Some(SubscriptionStatus::Pending),
            subscription_type: Some(SubscriptionType::Standard),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }
}
