use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Tag, unique by (workspace_id, name).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Tag {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub create_time: i64,
}

impl DbCollectionIden for Tag {
    fn iden() -> StoreIden {
        StoreIden::Tags
    }
}

/// Association of a tag to a contact, keyed by `contact_id:tag_id`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ContactTag {
    pub id: String,
    pub contact_id: String,
    pub tag_id: String,
    pub create_time: i64,
}

impl ContactTag {
    pub fn key(
        contact_id: &str,
        tag_id: &str,
    ) -> String {
        format!("{}:{}", contact_id, tag_id)
    }
}

impl DbCollectionIden for ContactTag {
    fn iden() -> StoreIden {
        StoreIden::ContactTags
    }
}
