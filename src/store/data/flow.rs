use serde::{Deserialize, Serialize};

use crate::{
    model::FlowStatus,
    store::{DbCollectionIden, StoreIden},
};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Flow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub version: i64,
    pub status: FlowStatus,
    /// serialized `FlowModel`
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Flow {
    fn iden() -> StoreIden {
        StoreIden::Flows
    }
}
