use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Contact {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub is_subscribed: bool,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Contact {
    fn iden() -> StoreIden {
        StoreIden::Contacts
    }
}
