mod collect;
mod document;

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value as JsonValue};

use crate::{
    ChatflowError, Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;

#[derive(Debug, Clone)]
pub struct MemStore {
    flows: Arc<Collect<Flow>>,
    channels: Arc<Collect<Channel>>,
    contacts: Arc<Collect<Contact>>,
    conversations: Arc<Collect<Conversation>>,
    messages: Arc<Collect<Message>>,
    tags: Arc<Collect<Tag>>,
    contact_tags: Arc<Collect<ContactTag>>,
    field_definitions: Arc<Collect<FieldDefinition>>,
    field_values: Arc<Collect<FieldValue>>,
    sessions: Arc<Collect<Session>>,
    jobs: Arc<Collect<Job>>,
    analytics: Arc<Collect<AnalyticsEvent>>,
}

trait DbDocument: Serialize + DeserializeOwned {
    fn id(&self) -> &str;

    /// Secondary key that must be unique across the collection, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }

    fn doc(&self) -> Result<Map<String, JsonValue>> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map),
            _ => Err(ChatflowError::Convert(format!("document {} is not an object", self.id()))),
        }
    }
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.flows());
        s.register(self.channels());
        s.register(self.contacts());
        s.register(self.conversations());
        s.register(self.messages());
        s.register(self.tags());
        s.register(self.contact_tags());
        s.register(self.field_definitions());
        s.register(self.field_values());
        s.register(self.sessions());
        s.register(self.jobs());
        s.register(self.analytics());
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            flows: Arc::new(Collect::new("flows")),
            channels: Arc::new(Collect::new("channels")),
            contacts: Arc::new(Collect::new("contacts")),
            conversations: Arc::new(Collect::new("conversations")),
            messages: Arc::new(Collect::new("messages")),
            tags: Arc::new(Collect::new("tags")),
            contact_tags: Arc::new(Collect::new("contact_tags")),
            field_definitions: Arc::new(Collect::new("field_definitions")),
            field_values: Arc::new(Collect::new("field_values")),
            sessions: Arc::new(Collect::new("sessions")),
            jobs: Arc::new(Collect::new("jobs")),
            analytics: Arc::new(Collect::new("analytics")),
        }
    }

    pub fn flows(&self) -> Arc<dyn DbCollection<Item = Flow> + Send + Sync> {
        self.flows.clone()
    }

    pub fn channels(&self) -> Arc<dyn DbCollection<Item = Channel> + Send + Sync> {
        self.channels.clone()
    }

    pub fn contacts(&self) -> Arc<dyn DbCollection<Item = Contact> + Send + Sync> {
        self.contacts.clone()
    }

    pub fn conversations(&self) -> Arc<dyn DbCollection<Item = Conversation> + Send + Sync> {
        self.conversations.clone()
    }

    pub fn messages(&self) -> Arc<dyn DbCollection<Item = Message> + Send + Sync> {
        self.messages.clone()
    }

    pub fn tags(&self) -> Arc<dyn DbCollection<Item = Tag> + Send + Sync> {
        self.tags.clone()
    }

    pub fn contact_tags(&self) -> Arc<dyn DbCollection<Item = ContactTag> + Send + Sync> {
        self.contact_tags.clone()
    }

    pub fn field_definitions(&self) -> Arc<dyn DbCollection<Item = FieldDefinition> + Send + Sync> {
        self.field_definitions.clone()
    }

    pub fn field_values(&self) -> Arc<dyn DbCollection<Item = FieldValue> + Send + Sync> {
        self.field_values.clone()
    }

    pub fn sessions(&self) -> Arc<dyn DbCollection<Item = Session> + Send + Sync> {
        self.sessions.clone()
    }

    pub fn jobs(&self) -> Arc<dyn DbCollection<Item = Job> + Send + Sync> {
        self.jobs.clone()
    }

    pub fn analytics(&self) -> Arc<dyn DbCollection<Item = AnalyticsEvent> + Send + Sync> {
        self.analytics.clone()
    }
}
