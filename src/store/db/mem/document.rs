use crate::store::{data::*, db::mem::DbDocument};

macro_rules! impl_document {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl DbDocument for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}

impl_document!(Flow, Channel, Contact, Conversation, Message, ContactTag, FieldValue, Job, AnalyticsEvent);

impl DbDocument for Tag {
    fn id(&self) -> &str {
        &self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("{}/{}", self.workspace_id, self.name))
    }
}

impl DbDocument for FieldDefinition {
    fn id(&self) -> &str {
        &self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("{}/{}", self.workspace_id, self.slug))
    }
}

impl DbDocument for Session {
    fn id(&self) -> &str {
        &self.id
    }

    // mirrors the partial unique index of the postgres backend
    fn unique_key(&self) -> Option<String> {
        (self.status == SessionStatus::Active && self.waiting_for_input).then(|| format!("{}/{}", self.contact_id, self.channel_id))
    }
}
