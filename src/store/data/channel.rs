use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Channel {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    /// platform tag, e.g. `telegram`
    pub platform: String,
    /// account id of the channel at the messaging gateway
    pub external_account_id: Option<String>,
}

impl DbCollectionIden for Channel {
    fn iden() -> StoreIden {
        StoreIden::Channels
    }
}
