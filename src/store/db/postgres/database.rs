use std::sync::Arc;

use tokio::runtime::Handle;

use crate::{
    Result,
    store::{DbCollection, DbCollectionIden, DbStore, Store, data::*, map_db_err},
};

use super::{
    DbInit,
    collection::{PgCollection, PgTable},
    synclient::SynClient,
};

pub struct PostgresStore {
    flows: Arc<PgCollection<Flow>>,
    channels: Arc<PgCollection<Channel>>,
    contacts: Arc<PgCollection<Contact>>,
    conversations: Arc<PgCollection<Conversation>>,
    messages: Arc<PgCollection<Message>>,
    tags: Arc<PgCollection<Tag>>,
    contact_tags: Arc<PgCollection<ContactTag>>,
    field_definitions: Arc<PgCollection<FieldDefinition>>,
    field_values: Arc<PgCollection<FieldValue>>,
    sessions: Arc<PgCollection<Session>>,
    jobs: Arc<PgCollection<Job>>,
    analytics: Arc<PgCollection<AnalyticsEvent>>,
}

fn register<T>(
    s: &Store,
    collection: &Arc<PgCollection<T>>,
) -> Result<()>
where
    T: PgTable + DbCollectionIden,
{
    collection.init()?;
    s.register(collection.clone() as Arc<dyn DbCollection<Item = T> + Send + Sync>);
    Ok(())
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        register(s, &self.flows)?;
        register(s, &self.channels)?;
        register(s, &self.contacts)?;
        register(s, &self.conversations)?;
        register(s, &self.messages)?;
        register(s, &self.tags)?;
        register(s, &self.contact_tags)?;
        register(s, &self.field_definitions)?;
        register(s, &self.field_values)?;
        register(s, &self.sessions)?;
        register(s, &self.jobs)?;
        register(s, &self.analytics)?;
        Ok(())
    }
}

impl PostgresStore {
    pub fn new(
        db_url: &str,
        handle: Handle,
    ) -> Result<Self> {
        let conn = Arc::new(SynClient::connect(db_url, handle).map_err(map_db_err)?);

        Ok(Self {
            flows: Arc::new(PgCollection::new(&conn)),
            channels: Arc::new(PgCollection::new(&conn)),
            contacts: Arc::new(PgCollection::new(&conn)),
            conversations: Arc::new(PgCollection::new(&conn)),
            messages: Arc::new(PgCollection::new(&conn)),
            tags: Arc::new(PgCollection::new(&conn)),
            contact_tags: Arc::new(PgCollection::new(&conn)),
            field_definitions: Arc::new(PgCollection::new(&conn)),
            field_values: Arc::new(PgCollection::new(&conn)),
            sessions: Arc::new(PgCollection::new(&conn)),
            jobs: Arc::new(PgCollection::new(&conn)),
            analytics: Arc::new(PgCollection::new(&conn)),
        })
    }
}
