use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{
    ChatflowError, Result, ShareLock,
    model::{FlowModel, FlowStatus},
    utils,
};

use super::{
    DbCollection, DbCollectionIden, Query, StoreIden,
    data::*,
};

/// Upper bound used when a helper needs every matching row.
const SCAN_LIMIT: usize = 10_000;

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

/// Registry of typed collections plus the lookups the engine needs.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DbCollection<Item = DATA>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn flows(&self) -> Arc<dyn DbCollection<Item = Flow>> {
        self.collection()
    }

    pub fn channels(&self) -> Arc<dyn DbCollection<Item = Channel>> {
        self.collection()
    }

    pub fn contacts(&self) -> Arc<dyn DbCollection<Item = Contact>> {
        self.collection()
    }

    pub fn conversations(&self) -> Arc<dyn DbCollection<Item = Conversation>> {
        self.collection()
    }

    pub fn messages(&self) -> Arc<dyn DbCollection<Item = Message>> {
        self.collection()
    }

    pub fn tags(&self) -> Arc<dyn DbCollection<Item = Tag>> {
        self.collection()
    }

    pub fn contact_tags(&self) -> Arc<dyn DbCollection<Item = ContactTag>> {
        self.collection()
    }

    pub fn field_definitions(&self) -> Arc<dyn DbCollection<Item = FieldDefinition>> {
        self.collection()
    }

    pub fn field_values(&self) -> Arc<dyn DbCollection<Item = FieldValue>> {
        self.collection()
    }

    pub fn sessions(&self) -> Arc<dyn DbCollection<Item = Session>> {
        self.collection()
    }

    pub fn jobs(&self) -> Arc<dyn DbCollection<Item = Job>> {
        self.collection()
    }

    pub fn analytics(&self) -> Arc<dyn DbCollection<Item = AnalyticsEvent>> {
        self.collection()
    }

    /// Store a flow definition. A new flow starts as a draft; redeploying an
    /// existing one replaces its graph and bumps its version.
    pub fn deploy(
        &self,
        model: &FlowModel,
    ) -> Result<Flow> {
        trace!("store::deploy({})", model.id);
        if model.id.is_empty() {
            return Err(ChatflowError::Flow("missing id in flow".into()));
        }
        let text = serde_json::to_string(model)?;
        let flows = self.flows();
        let now = utils::time::time_millis();
        match flows.find(&model.id)? {
            Some(prev) => {
                let flow = Flow {
                    workspace_id: model.workspace_id.clone(),
                    name: model.name.clone(),
                    version: prev.version + 1,
                    data: text,
                    update_time: now,
                    ..prev
                };
                flows.update(&flow)?;
                Ok(flow)
            }
            None => {
                let flow = Flow {
                    id: model.id.clone(),
                    workspace_id: model.workspace_id.clone(),
                    name: model.name.clone(),
                    version: 1,
                    status: FlowStatus::Draft,
                    data: text,
                    create_time: now,
                    update_time: now,
                };
                flows.create(&flow)?;
                Ok(flow)
            }
        }
    }

    /// Move a flow to `status`. Archived flows cannot be published again.
    pub fn set_flow_status(
        &self,
        flow_id: &str,
        status: FlowStatus,
    ) -> Result<bool> {
        trace!("store::set_flow_status({}, {})", flow_id, status.as_ref());
        let flows = self.flows();
        let Some(mut flow) = flows.find(flow_id)? else {
            return Ok(false);
        };
        if flow.status == FlowStatus::Archived && status != FlowStatus::Archived {
            return Err(ChatflowError::Flow(format!("flow {} is archived", flow_id)));
        }
        flow.status = status;
        flow.update_time = utils::time::time_millis();
        flows.update(&flow)
    }

    /// The session of `contact_id` on `channel_id` parked waiting for input.
    pub fn find_waiting_session(
        &self,
        contact_id: &str,
        channel_id: &str,
    ) -> Result<Option<Session>> {
        let q = Query::new()
            .eq("contact_id", contact_id)
            .eq("channel_id", channel_id)
            .eq("status", SessionStatus::Active.as_ref())
            .eq("waiting_for_input", true)
            .sort("update_time", true)
            .with_limit(1);
        Ok(self.sessions().query(&q)?.rows.into_iter().next())
    }

    /// Fetch the tag `name` of a workspace, creating it when absent.
    pub fn ensure_tag(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<Tag> {
        let tags = self.tags();
        let q = Query::new().eq("workspace_id", workspace_id).eq("name", name).with_limit(1);
        if let Some(tag) = tags.query(&q)?.rows.into_iter().next() {
            return Ok(tag);
        }

        let tag = Tag {
            id: utils::longid(),
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            create_time: utils::time::time_millis(),
        };
        if tags.create(&tag)? {
            return Ok(tag);
        }

        // lost a race against a concurrent create
        tags.query(&q)?.rows.into_iter().next().ok_or_else(|| ChatflowError::Store(format!("tag {} vanished after create", name)))
    }

    /// Names of every tag held by a contact.
    pub fn contact_tag_names(
        &self,
        contact_id: &str,
    ) -> Result<Vec<String>> {
        let links = self.contact_tags().query(&Query::new().eq("contact_id", contact_id).with_limit(SCAN_LIMIT))?.rows;
        let tags = self.tags();
        let mut names = Vec::with_capacity(links.len());
        for link in links {
            if let Some(tag) = tags.find(&link.tag_id)? {
                names.push(tag.name);
            }
        }
        Ok(names)
    }

    pub fn find_field_definition(
        &self,
        workspace_id: &str,
        slug: &str,
    ) -> Result<Option<FieldDefinition>> {
        let q = Query::new().eq("workspace_id", workspace_id).eq("slug", slug).with_limit(1);
        Ok(self.field_definitions().query(&q)?.rows.into_iter().next())
    }

    /// Custom field values of a contact keyed by field slug.
    pub fn contact_fields(
        &self,
        workspace_id: &str,
        contact_id: &str,
    ) -> Result<HashMap<String, String>> {
        let defs = self.field_definitions().query(&Query::new().eq("workspace_id", workspace_id).with_limit(SCAN_LIMIT))?.rows;
        let values = self.field_values();
        let mut fields = HashMap::new();
        for def in defs {
            if let Some(v) = values.find(&FieldValue::key(contact_id, &def.id))? {
                fields.insert(def.slug, v.value);
            }
        }
        Ok(fields)
    }

    /// Last `n` messages of a conversation, oldest first.
    pub fn recent_messages(
        &self,
        conversation_id: &str,
        n: usize,
    ) -> Result<Vec<Message>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let q = Query::new().eq("conversation_id", conversation_id).sort("create_time", true).with_limit(n);
        let mut rows = self.messages().query(&q)?.rows;
        rows.reverse();
        Ok(rows)
    }

    /// Pending jobs due at or before `now`, earliest first.
    pub fn due_jobs(
        &self,
        now: i64,
        limit: usize,
    ) -> Result<Vec<Job>> {
        let q = Query::new().eq("status", JobStatus::Pending.as_ref()).le("run_at", now).sort("run_at", false).with_limit(limit);
        Ok(self.jobs().query(&q)?.rows)
    }

    /// Jobs left `running` since before `before`, oldest claim first.
    pub fn expired_claims(
        &self,
        before: i64,
        limit: usize,
    ) -> Result<Vec<Job>> {
        let q = Query::new().eq("status", JobStatus::Running.as_ref()).lt("update_time", before).sort("update_time", false).with_limit(limit);
        Ok(self.jobs().query(&q)?.rows)
    }

    /// Pending jobs of a session.
    pub fn pending_jobs(
        &self,
        session_id: &str,
    ) -> Result<Vec<Job>> {
        let q = Query::new().eq("session_id", session_id).eq("status", JobStatus::Pending.as_ref()).with_limit(SCAN_LIMIT);
        Ok(self.jobs().query(&q)?.rows)
    }

    /// Mark every pending job of a session cancelled, returning how many were.
    pub fn cancel_pending_jobs(
        &self,
        session_id: &str,
    ) -> Result<usize> {
        let jobs = self.jobs();
        let mut n = 0;
        for mut job in self.pending_jobs(session_id)? {
            job.status = JobStatus::Cancelled;
            job.update_time = utils::time::time_millis();
            if jobs.update(&job)? {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Active sessions waiting for input untouched since `before`.
    pub fn idle_waiting_sessions(
        &self,
        before: i64,
        limit: usize,
    ) -> Result<Vec<Session>> {
        let q = Query::new()
            .eq("status", SessionStatus::Active.as_ref())
            .eq("waiting_for_input", true)
            .lt("update_time", before)
            .with_limit(limit);
        Ok(self.sessions().query(&q)?.rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{FlowModel, FlowStatus},
        store::{DbStore, MemStore, Store, data::*},
        utils,
    };

    fn store() -> Store {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        store
    }

    #[test]
    fn test_deploy_bumps_version() {
        let store = store();
        let model = FlowModel {
            id: "f1".into(),
            workspace_id: "w1".into(),
            name: "welcome".into(),
            ..Default::default()
        };
        let first = store.deploy(&model).unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.status, FlowStatus::Draft);

        store.set_flow_status("f1", FlowStatus::Published).unwrap();
        let second = store.deploy(&model).unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.status, FlowStatus::Published);
    }

    #[test]
    fn test_archived_flow_stays_archived() {
        let store = store();
        store
            .deploy(&FlowModel {
                id: "f1".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(store.set_flow_status("f1", FlowStatus::Archived).unwrap());
        assert!(store.set_flow_status("f1", FlowStatus::Published).is_err());
        assert!(!store.set_flow_status("missing", FlowStatus::Published).unwrap());
    }

    #[test]
    fn test_ensure_tag_is_idempotent() {
        let store = store();
        let a = store.ensure_tag("w1", "vip").unwrap();
        let b = store.ensure_tag("w1", "vip").unwrap();
        let c = store.ensure_tag("w2", "vip").unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_find_waiting_session() {
        let store = store();
        let now = utils::time::time_millis();
        let session = Session {
            id: "s1".into(),
            contact_id: "c1".into(),
            channel_id: "ch1".into(),
            waiting_for_input: true,
            update_time: now,
            ..Default::default()
        };
        store.sessions().create(&session).unwrap();
        store
            .sessions()
            .create(&Session {
                id: "s2".into(),
                contact_id: "c1".into(),
                channel_id: "ch1".into(),
                status: SessionStatus::Completed,
                waiting_for_input: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.find_waiting_session("c1", "ch1").unwrap().map(|s| s.id), Some("s1".to_string()));
        assert!(store.find_waiting_session("c1", "ch2").unwrap().is_none());
        assert_eq!(store.idle_waiting_sessions(now + 1, 10).unwrap().len(), 1);
        assert!(store.idle_waiting_sessions(now, 10).unwrap().is_empty());
    }

    #[test]
    fn test_recent_messages_oldest_first() {
        let store = store();
        for i in 0..5 {
            store
                .messages()
                .create(&Message {
                    id: format!("m{}", i),
                    conversation_id: Some("cv1".into()),
                    text: Some(format!("t{}", i)),
                    create_time: i,
                    ..Default::default()
                })
                .unwrap();
        }
        let ids: Vec<String> = store.recent_messages("cv1", 3).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_due_jobs_and_cancel() {
        let store = store();
        for (id, run_at) in [("j1", 10), ("j2", 20), ("j3", 30)] {
            store
                .jobs()
                .create(&Job {
                    id: id.into(),
                    job_type: RESUME_FLOW_JOB.into(),
                    session_id: "s1".into(),
                    run_at,
                    ..Default::default()
                })
                .unwrap();
        }
        let due: Vec<String> = store.due_jobs(20, 10).unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(due, vec!["j1", "j2"]);
        assert_eq!(store.cancel_pending_jobs("s1").unwrap(), 3);
        assert!(store.due_jobs(100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_contact_tags_and_fields() {
        let store = store();
        let tag = store.ensure_tag("w1", "vip").unwrap();
        store
            .contact_tags()
            .upsert(&ContactTag {
                id: ContactTag::key("c1", &tag.id),
                contact_id: "c1".into(),
                tag_id: tag.id.clone(),
                create_time: 0,
            })
            .unwrap();
        assert_eq!(store.contact_tag_names("c1").unwrap(), vec!["vip"]);

        store
            .field_definitions()
            .create(&FieldDefinition {
                id: "fd1".into(),
                workspace_id: "w1".into(),
                slug: "city".into(),
                name: "City".into(),
                field_type: "text".into(),
            })
            .unwrap();
        store
            .field_values()
            .upsert(&FieldValue {
                id: FieldValue::key("c1", "fd1"),
                contact_id: "c1".into(),
                field_id: "fd1".into(),
                value: "Oslo".into(),
                update_time: 0,
            })
            .unwrap();
        assert_eq!(store.contact_fields("w1", "c1").unwrap().get("city").map(String::as_str), Some("Oslo"));
        assert!(store.find_field_definition("w1", "zip").unwrap().is_none());
    }
}
