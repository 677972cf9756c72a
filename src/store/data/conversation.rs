use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Conversation {
    pub id: String,
    pub workspace_id: String,
    pub contact_id: String,
    pub channel_id: String,
    /// conversation id at the messaging gateway
    pub external_conversation_id: Option<String>,
    /// set by human takeover; automation does not run while set
    pub automation_paused: bool,
    pub update_time: i64,
}

impl DbCollectionIden for Conversation {
    fn iden() -> StoreIden {
        StoreIden::Conversations
    }
}
