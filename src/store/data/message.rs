use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageDirection {
    #[default]
    Inbound,
    Outbound,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Received,
    Sent,
    Failed,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Message {
    pub id: String,
    pub workspace_id: String,
    pub conversation_id: Option<String>,
    pub contact_id: String,
    pub direction: MessageDirection,
    pub text: Option<String>,
    pub status: MessageStatus,
    /// message id returned by the gateway
    pub external_id: Option<String>,
    pub err: Option<String>,
    pub create_time: i64,
}

impl DbCollectionIden for Message {
    fn iden() -> StoreIden {
        StoreIden::Messages
    }
}
