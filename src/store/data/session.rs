use serde::{Deserialize, Serialize};

use crate::{
    common::Vars,
    store::{DbCollectionIden, StoreIden},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Expired,
    Cancelled,
}

/// Caller flow to return to once a called flow completes.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub flow_id: String,
    /// the go-to-flow node traversal continues after
    pub node_id: String,
}

/// Durable position of one contact in one flow.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Session {
    pub id: String,
    pub workspace_id: String,
    pub contact_id: String,
    pub flow_id: String,
    pub channel_id: String,
    pub conversation_id: Option<String>,
    pub status: SessionStatus,
    pub current_node_id: Option<String>,
    pub variables: Vars,
    pub call_stack: Vec<CallFrame>,
    /// wake time of a pending delay, in milliseconds
    pub waiting_until: Option<i64>,
    pub waiting_for_input: bool,
    pub human_takeover_at: Option<i64>,
    pub start_time: i64,
    pub end_time: i64,
    pub update_time: i64,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

impl DbCollectionIden for Session {
    fn iden() -> StoreIden {
        StoreIden::Sessions
    }
}
