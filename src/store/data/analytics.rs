use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalyticsEventType {
    FlowStarted,
    NodeExecuted,
    MessageSent,
    MessageFailed,
    FlowCompleted,
}

/// Append-only fact record.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AnalyticsEvent {
    pub id: String,
    pub workspace_id: String,
    pub flow_id: Option<String>,
    pub contact_id: Option<String>,
    pub event_type: AnalyticsEventType,
    pub metadata: Option<serde_json::Value>,
    pub create_time: i64,
}

impl DbCollectionIden for AnalyticsEvent {
    fn iden() -> StoreIden {
        StoreIden::Analytics
    }
}
