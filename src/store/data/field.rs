use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Custom field definition, unique by (workspace_id, slug).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct FieldDefinition {
    pub id: String,
    pub workspace_id: String,
    pub slug: String,
    pub name: String,
    pub field_type: String,
}

impl DbCollectionIden for FieldDefinition {
    fn iden() -> StoreIden {
        StoreIden::FieldDefinitions
    }
}

/// Value of a custom field for one contact, keyed by `contact_id:field_id`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct FieldValue {
    pub id: String,
    pub contact_id: String,
    pub field_id: String,
    pub value: String,
    pub update_time: i64,
}

impl FieldValue {
    pub fn key(
        contact_id: &str,
        field_id: &str,
    ) -> String {
        format!("{}:{}", contact_id, field_id)
    }
}

impl DbCollectionIden for FieldValue {
    fn iden() -> StoreIden {
        StoreIden::FieldValues
    }
}
