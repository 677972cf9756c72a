//! Flow traversal.
//!
//! The dispatcher is responsible for:
//! - Starting sessions and resuming parked ones
//! - Walking the flow graph one node at a time
//! - Committing session progress after every node
//! - Serialising work per contact and channel

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    Result,
    common::{MemCache, Vars},
    events::{FlowEvent, PauseReason},
    flow::{
        FlowGraph, NodeAction, NodeId,
        actions::{Signal, Suspend},
        consts::{LAST_INPUT_VAR, LAST_PAYLOAD_VAR, QUICK_REPLIES_VAR, TIMEOUT_HANDLE},
        platform::{self, QuickReply},
    },
    model::{FlowModel, FlowStatus},
    runtime::{Context, Inbound, Services, Trigger},
    store::data::{CallFrame, Job, JobStatus, ResumePayload, Session, SessionStatus, WakeReason},
    utils,
};

/// Maximum number of flow graphs kept in memory.
const GRAPH_CACHE_SIZE: usize = 256;

/// What woke a parked session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// an inbound message from the contact
    Input,
    /// a delay elapsed
    Timer,
    /// a smart-delay gave up waiting
    Timeout,
    /// an operator resumed the session
    Explicit,
}

impl From<WakeReason> for Wake {
    fn from(reason: WakeReason) -> Self {
        match reason {
            WakeReason::Timer => Wake::Timer,
            WakeReason::Timeout => Wake::Timeout,
        }
    }
}

/// Result of one traversal pass.
enum Pass {
    /// nothing ran
    Idle,
    /// the session paused or ended
    Done(String),
    /// the session ended by jumping to another flow
    Jump { flow_id: String, variables: Vars },
}

pub struct Dispatcher {
    services: Arc<Services>,
    /// per contact/channel locks
    locks: MemCache<String, Arc<Mutex<()>>>,
    /// graphs keyed by `flow_id@version`
    graphs: MemCache<String, Arc<FlowGraph>>,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        let lock_capacity = services.config.engine.lock_capacity;
        Self {
            services,
            locks: MemCache::new(lock_capacity),
            graphs: MemCache::new(GRAPH_CACHE_SIZE),
        }
    }

    fn lock(
        &self,
        contact_id: &str,
        channel_id: &str,
    ) -> Arc<Mutex<()>> {
        self.locks.get_with(format!("{}:{}", contact_id, channel_id), || Arc::new(Mutex::new(())))
    }

    /// Graph of a stored flow. Missing, unpublished (when `published` is
    /// required) or invalid flows yield `None`.
    fn load_graph(
        &self,
        flow_id: &str,
        published: bool,
    ) -> Result<Option<Arc<FlowGraph>>> {
        let Some(flow) = self.services.store.flows().find(flow_id)? else {
            tracing::debug!(flow_id = %flow_id, "flow not found");
            return Ok(None);
        };
        if published && flow.status != FlowStatus::Published {
            tracing::debug!(flow_id = %flow_id, "flow is {}, not started", flow.status.as_ref());
            return Ok(None);
        }

        let key = format!("{}@{}", flow.id, flow.version);
        if let Some(graph) = self.graphs.get(&key) {
            return Ok(Some(graph));
        }

        let graph = FlowModel::from_json(&flow.data).and_then(|model| FlowGraph::build(&model, flow.version));
        match graph {
            Ok(graph) => {
                let graph = Arc::new(graph);
                self.graphs.set(key, graph.clone());
                Ok(Some(graph))
            }
            Err(err) => {
                tracing::warn!(flow_id = %flow_id, "invalid flow graph: {}", err);
                Ok(None)
            }
        }
    }

    /// Resolve the channel platform and the gateway ids. `false` when the
    /// channel does not exist.
    fn prepare(
        &self,
        ctx: &mut Context,
    ) -> Result<bool> {
        let store = &self.services.store;
        let Some(channel) = store.channels().find(&ctx.channel_id)? else {
            tracing::debug!(channel_id = %ctx.channel_id, "channel not found");
            return Ok(false);
        };
        ctx.platform = channel.platform;
        if ctx.external_account_id.is_none() {
            ctx.external_account_id = channel.external_account_id;
        }
        if ctx.external_conversation_id.is_none() {
            if let Some(id) = ctx.conversation_id.as_deref() {
                ctx.external_conversation_id = store.conversations().find(id)?.and_then(|c| c.external_conversation_id);
            }
        }
        Ok(true)
    }

    /// Entry point for triggers and inbound messages.
    ///
    /// Resumes the session of the contact waiting for input on the channel,
    /// or starts the trigger's flow. Returns the session that ran.
    pub async fn start_or_resume(
        &self,
        trigger: &Trigger,
    ) -> Result<Option<String>> {
        let lock = self.lock(&trigger.contact_id, &trigger.channel_id);
        let _guard = lock.lock().await;

        if let Some(id) = trigger.conversation_id.as_deref() {
            if self.services.store.conversations().find(id)?.is_some_and(|c| c.automation_paused) {
                tracing::debug!(conversation_id = %id, "conversation under human takeover, ignored");
                return Ok(None);
            }
        }

        match self.services.store.find_waiting_session(&trigger.contact_id, &trigger.channel_id)? {
            Some(session) => {
                let pass = self.resume(session, Wake::Input, trigger.incoming.clone(), None).await?;
                self.follow(pass, trigger).await
            }
            None => self.start(trigger).await,
        }
    }

    async fn start(
        &self,
        trigger: &Trigger,
    ) -> Result<Option<String>> {
        let pass = self.start_once(trigger).await?;
        self.follow(pass, trigger).await
    }

    /// Run the one-way jumps a pass ended with.
    async fn follow(
        &self,
        mut pass: Pass,
        trigger: &Trigger,
    ) -> Result<Option<String>> {
        let mut jumps = 0;
        loop {
            match pass {
                Pass::Idle => return Ok(None),
                Pass::Done(session_id) => return Ok(Some(session_id)),
                Pass::Jump {
                    flow_id,
                    variables,
                } => {
                    jumps += 1;
                    if jumps > self.services.config.engine.max_steps_per_pass {
                        tracing::error!(flow_id = %flow_id, "too many flow jumps, stopped");
                        return Ok(None);
                    }
                    let next = Trigger {
                        flow_id,
                        variables,
                        ..trigger.clone()
                    };
                    pass = self.start_once(&next).await?;
                }
            }
        }
    }

    async fn start_once(
        &self,
        trigger: &Trigger,
    ) -> Result<Pass> {
        let Some(graph) = self.load_graph(&trigger.flow_id, true)? else {
            return Ok(Pass::Idle);
        };
        let Some(entry) = graph.entry() else {
            tracing::debug!(flow_id = %trigger.flow_id, "flow has no entry node");
            return Ok(Pass::Idle);
        };
        let entry = entry.id.clone();

        let mut ctx = Context::new(self.services.clone(), trigger);
        if !self.prepare(&mut ctx)? {
            return Ok(Pass::Idle);
        }

        let now = utils::time::time_millis();
        let session = Session {
            id: utils::longid(),
            workspace_id: trigger.workspace_id.clone(),
            contact_id: trigger.contact_id.clone(),
            flow_id: trigger.flow_id.clone(),
            channel_id: trigger.channel_id.clone(),
            conversation_id: trigger.conversation_id.clone(),
            status: SessionStatus::Active,
            variables: trigger.variables.clone(),
            start_time: now,
            update_time: now,
            ..Default::default()
        };
        self.services.store.sessions().create(&session)?;
        ctx.session_id = session.id.clone();

        tracing::info!(session_id = %session.id, flow_id = %session.flow_id, "session started");
        ctx.emit(&String::new(), FlowEvent::Started);
        self.traverse(session, graph, Some(entry), ctx).await
    }

    /// Continue a parked session along the plain edge of the node it is
    /// parked at, or along `timeout` for an expired smart-delay.
    async fn resume(
        &self,
        mut session: Session,
        wake: Wake,
        inbound: Option<Inbound>,
        payload: Option<&ResumePayload>,
    ) -> Result<Pass> {
        if !session.is_active() {
            tracing::debug!(session_id = %session.id, "session is {}, not resumed", session.status.as_ref());
            return Ok(Pass::Idle);
        }
        // a resumed session finishes its flow whatever the publish state
        let Some(graph) = self.load_graph(&session.flow_id, false)? else {
            return Ok(Pass::Idle);
        };

        let trigger = Trigger {
            flow_id: session.flow_id.clone(),
            channel_id: session.channel_id.clone(),
            contact_id: session.contact_id.clone(),
            conversation_id: session.conversation_id.clone(),
            workspace_id: session.workspace_id.clone(),
            incoming: inbound.clone(),
            variables: session.variables.clone(),
            ..Default::default()
        };
        let mut ctx = Context::new(self.services.clone(), &trigger);
        ctx.session_id = session.id.clone();
        if let Some(payload) = payload {
            ctx.external_account_id = payload.external_account_id.clone();
            ctx.external_conversation_id = payload.external_conversation_id.clone();
        }
        if !self.prepare(&mut ctx)? {
            return Ok(Pass::Idle);
        }

        let was_waiting = session.waiting_for_input;
        session.waiting_for_input = false;
        session.waiting_until = None;

        let parked = session.current_node_id.clone().unwrap_or_default();
        if wake != Wake::Timer && wake != Wake::Timeout {
            self.services.store.cancel_pending_jobs(&session.id)?;
        }
        if wake == Wake::Input || (wake == Wake::Explicit && was_waiting) {
            self.apply_input(&mut ctx, &graph, &parked, inbound.as_ref());
        }
        session.variables = ctx.variables.clone();

        let handle = match wake {
            Wake::Timeout if graph.select_edge(&parked, Some(TIMEOUT_HANDLE)).is_some() => Some(TIMEOUT_HANDLE),
            _ => None,
        };
        let next = graph.next(&parked, handle).map(|n| n.id.clone());

        tracing::info!(session_id = %session.id, node_id = %parked, "session resumed ({:?})", wake);
        self.traverse(session, graph, next, ctx).await
    }

    /// Expose the reply that resumed a session to the next nodes.
    fn apply_input(
        &self,
        ctx: &mut Context,
        graph: &FlowGraph,
        parked: &str,
        inbound: Option<&Inbound>,
    ) {
        let text = inbound.and_then(|i| i.text.clone()).unwrap_or_default();
        let offered = ctx.variables.remove(QUICK_REPLIES_VAR);
        let payload = inbound.and_then(|i| i.payload.clone()).or_else(|| {
            let offered = serde_json::from_str::<Vec<QuickReply>>(offered.as_deref()?).ok()?;
            platform::parse_numeric_reply(&text, &offered)
        });

        if let Some(payload) = payload {
            ctx.variables.set(LAST_PAYLOAD_VAR, payload);
        }
        if let Some(NodeAction::SmartDelay(action)) = graph.node(parked).map(|n| &n.action) {
            if let Some(name) = action.variable() {
                ctx.variables.set(name, text.clone());
            }
        }
        ctx.variables.set(LAST_INPUT_VAR, text);
    }

    /// The step loop. `next` is the node to execute; `None` means the
    /// current flow has finished.
    async fn traverse(
        &self,
        mut session: Session,
        mut graph: Arc<FlowGraph>,
        mut next: Option<NodeId>,
        mut ctx: Context,
    ) -> Result<Pass> {
        let store = self.services.store.clone();
        let max_steps = self.services.config.engine.max_steps_per_pass;
        let mut steps = 0;

        loop {
            let node = next.take().and_then(|id| graph.node(&id));
            let Some(node) = node else {
                ctx.emit(&String::new(), FlowEvent::Completed);
                match session.call_stack.pop() {
                    Some(frame) => {
                        if let Some(caller) = self.load_graph(&frame.flow_id, false)? {
                            next = caller.next(&frame.node_id, None).map(|n| n.id.clone());
                            graph = caller;
                        }
                        tracing::debug!(session_id = %session.id, "returned to flow {}", frame.flow_id);
                        session.flow_id = frame.flow_id.clone();
                        ctx.flow_id = frame.flow_id;
                        continue;
                    }
                    None => {
                        self.finish(&mut session, SessionStatus::Completed)?;
                        tracing::info!(session_id = %session.id, "session completed");
                        return Ok(Pass::Done(session.id));
                    }
                }
            };

            steps += 1;
            if steps > max_steps {
                tracing::error!(session_id = %session.id, "more than {} nodes in one pass, session cancelled", max_steps);
                self.finish(&mut session, SessionStatus::Cancelled)?;
                store.cancel_pending_jobs(&session.id)?;
                ctx.emit(
                    &String::new(),
                    FlowEvent::Cancelled {
                        reason: "step limit exceeded".to_string(),
                    },
                );
                return Ok(Pass::Done(session.id));
            }

            let nid = node.id.clone();
            session.current_node_id = Some(nid.clone());
            session.update_time = utils::time::time_millis();
            store.sessions().update(&session)?;
            ctx.emit(
                &nid,
                FlowEvent::NodeExecuted {
                    kind: node.kind.as_ref().to_string(),
                },
            );

            tracing::debug!(session_id = %session.id, node_id = %nid, "run {}", node.kind.as_ref());
            let output = node.action.run(&ctx, &nid).await?;
            ctx = ctx.apply(&output);
            session.variables = ctx.variables.clone();
            session.update_time = utils::time::time_millis();
            store.sessions().update(&session)?;

            match output.signal {
                Signal::Continue => next = graph.next(&nid, None).map(|n| n.id.clone()),
                Signal::Branch(handle) => next = graph.next(&nid, Some(&handle)).map(|n| n.id.clone()),
                Signal::Pause(suspend) => {
                    self.suspend(&mut session, &ctx, &nid, suspend)?;
                    return Ok(Pass::Done(session.id));
                }
                Signal::Call {
                    flow_id,
                    return_after,
                } => {
                    let Some(target) = self.load_graph(&flow_id, true)? else {
                        tracing::warn!(session_id = %session.id, node_id = %nid, "go-to-flow target {} unavailable", flow_id);
                        next = graph.next(&nid, None).map(|n| n.id.clone());
                        continue;
                    };

                    if !return_after {
                        ctx.emit(&nid, FlowEvent::Completed);
                        self.finish(&mut session, SessionStatus::Completed)?;
                        tracing::info!(session_id = %session.id, "session completed, jumping to flow {}", flow_id);
                        return Ok(Pass::Jump {
                            flow_id,
                            variables: ctx.variables.clone(),
                        });
                    }

                    session.call_stack.push(CallFrame {
                        flow_id: graph.id().to_string(),
                        node_id: nid,
                    });
                    next = target.entry().map(|n| n.id.clone());
                    graph = target;
                    session.flow_id = flow_id.clone();
                    ctx.flow_id = flow_id;
                    ctx.emit(&String::new(), FlowEvent::Started);
                }
            }
        }
    }

    fn suspend(
        &self,
        session: &mut Session,
        ctx: &Context,
        nid: &NodeId,
        suspend: Suspend,
    ) -> Result<()> {
        let now = utils::time::time_millis();
        let reason = match suspend {
            Suspend::Timer {
                until,
            } => {
                session.waiting_until = Some(until);
                PauseReason::Timer {
                    until,
                }
            }
            Suspend::Input => {
                self.supersede_waiting(session)?;
                session.waiting_for_input = true;
                PauseReason::Input
            }
            Suspend::HumanTakeover => {
                session.status = SessionStatus::Completed;
                session.human_takeover_at = Some(now);
                session.end_time = now;
                PauseReason::HumanTakeover
            }
        };
        session.update_time = now;
        self.services.store.sessions().update(session)?;

        tracing::info!(session_id = %session.id, node_id = %nid, "session paused ({:?})", reason);
        ctx.emit(nid, FlowEvent::Paused(reason));
        Ok(())
    }

    /// Keep a single session waiting for input per contact and channel: an
    /// older one is cancelled.
    fn supersede_waiting(
        &self,
        session: &Session,
    ) -> Result<()> {
        let store = &self.services.store;
        let Some(mut other) = store.find_waiting_session(&session.contact_id, &session.channel_id)? else {
            return Ok(());
        };
        if other.id == session.id {
            return Ok(());
        }

        tracing::info!(session_id = %other.id, "superseded by session {}", session.id);
        self.finish(&mut other, SessionStatus::Cancelled)?;
        store.cancel_pending_jobs(&other.id)?;
        self.notify(
            &other,
            FlowEvent::Cancelled {
                reason: format!("superseded by session {}", session.id),
            },
        );
        Ok(())
    }

    fn finish(
        &self,
        session: &mut Session,
        status: SessionStatus,
    ) -> Result<()> {
        let now = utils::time::time_millis();
        session.status = status;
        session.waiting_for_input = false;
        session.waiting_until = None;
        session.end_time = now;
        session.update_time = now;
        self.services.store.sessions().update(session)?;
        Ok(())
    }

    /// Emit a session level event outside of a traversal.
    fn notify(
        &self,
        session: &Session,
        event: FlowEvent,
    ) {
        let trigger = Trigger {
            flow_id: session.flow_id.clone(),
            channel_id: session.channel_id.clone(),
            contact_id: session.contact_id.clone(),
            conversation_id: session.conversation_id.clone(),
            workspace_id: session.workspace_id.clone(),
            ..Default::default()
        };
        let mut ctx = Context::new(self.services.clone(), &trigger);
        ctx.session_id = session.id.clone();
        ctx.emit(&String::new(), event);
    }

    /// Resume the session a due job points at. Jobs that lost a race
    /// against another wake-up are skipped.
    pub async fn run_job(
        &self,
        job: &Job,
    ) -> Result<JobStatus> {
        let payload = &job.payload;
        let lock = self.lock(&payload.contact_id, &payload.channel_id);
        let _guard = lock.lock().await;

        let Some(session) = self.services.store.sessions().find(&payload.session_id)? else {
            return Ok(JobStatus::Skipped);
        };
        let parked = session.current_node_id.as_deref() == Some(payload.node_id.as_str());
        let waiting = match payload.reason {
            WakeReason::Timer => session.waiting_until.is_some(),
            WakeReason::Timeout => session.waiting_for_input,
        };
        if !session.is_active() || !parked || !waiting {
            tracing::debug!(session_id = %session.id, job_id = %job.id, "stale resume job skipped");
            return Ok(JobStatus::Skipped);
        }

        match self.resume(session, payload.reason.into(), None, Some(payload)).await? {
            Pass::Idle => Ok(JobStatus::Skipped),
            Pass::Done(_) => Ok(JobStatus::Done),
            pass @ Pass::Jump { .. } => {
                let trigger = Trigger {
                    flow_id: payload.flow_id.clone(),
                    channel_id: payload.channel_id.clone(),
                    contact_id: payload.contact_id.clone(),
                    conversation_id: payload.conversation_id.clone(),
                    workspace_id: payload.workspace_id.clone(),
                    ..Default::default()
                };
                self.follow(pass, &trigger).await?;
                Ok(JobStatus::Done)
            }
        }
    }

    /// Explicitly continue a parked session.
    pub async fn resume_session(
        &self,
        session_id: &str,
        inbound: Option<Inbound>,
    ) -> Result<Option<String>> {
        let Some(session) = self.services.store.sessions().find(session_id)? else {
            return Ok(None);
        };
        let lock = self.lock(&session.contact_id, &session.channel_id);
        let _guard = lock.lock().await;

        // reload under the lock
        let Some(session) = self.services.store.sessions().find(session_id)? else {
            return Ok(None);
        };
        let trigger = Trigger {
            flow_id: session.flow_id.clone(),
            channel_id: session.channel_id.clone(),
            contact_id: session.contact_id.clone(),
            conversation_id: session.conversation_id.clone(),
            workspace_id: session.workspace_id.clone(),
            incoming: inbound.clone(),
            ..Default::default()
        };
        let pass = self.resume(session, Wake::Explicit, inbound, None).await?;
        self.follow(pass, &trigger).await
    }

    /// Cancel an active session and its pending jobs.
    pub async fn cancel_session(
        &self,
        session_id: &str,
        reason: &str,
    ) -> Result<bool> {
        let Some(session) = self.services.store.sessions().find(session_id)? else {
            return Ok(false);
        };
        let lock = self.lock(&session.contact_id, &session.channel_id);
        let _guard = lock.lock().await;

        let Some(mut session) = self.services.store.sessions().find(session_id)? else {
            return Ok(false);
        };
        if !session.is_active() {
            return Ok(false);
        }
        self.finish(&mut session, SessionStatus::Cancelled)?;
        self.services.store.cancel_pending_jobs(&session.id)?;
        tracing::info!(session_id = %session.id, "session cancelled: {}", reason);
        self.notify(
            &session,
            FlowEvent::Cancelled {
                reason: reason.to_string(),
            },
        );
        Ok(true)
    }

    /// Expire sessions left waiting for input since before `before`.
    pub async fn expire_idle(
        &self,
        before: i64,
        limit: usize,
    ) -> Result<usize> {
        let mut n = 0;
        for idle in self.services.store.idle_waiting_sessions(before, limit)? {
            let lock = self.lock(&idle.contact_id, &idle.channel_id);
            let _guard = lock.lock().await;

            let Some(mut session) = self.services.store.sessions().find(&idle.id)? else {
                continue;
            };
            if !session.is_active() || !session.waiting_for_input || session.update_time >= before {
                continue;
            }
            self.finish(&mut session, SessionStatus::Expired)?;
            self.services.store.cancel_pending_jobs(&session.id)?;
            tracing::info!(session_id = %session.id, "session expired");
            self.notify(&session, FlowEvent::Expired);
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::Dispatcher;
    use crate::{
        flow::consts::{LAST_PAYLOAD_VAR, QUICK_REPLIES_VAR},
        model::{FlowModel, FlowStatus},
        runtime::Inbound,
        store::{
            Query,
            data::{Job, JobStatus, Session, SessionStatus, WakeReason},
        },
        testing::Harness,
        utils,
    };

    fn deploy(
        h: &Harness,
        id: &str,
        nodes: Value,
        edges: Value,
    ) {
        let model: FlowModel = serde_json::from_value(json!({
            "id": id,
            "workspaceId": "w1",
            "name": id,
            "nodes": nodes,
            "edges": edges,
        }))
        .unwrap();
        h.store.deploy(&model).unwrap();
        h.store.set_flow_status(id, FlowStatus::Published).unwrap();
    }

    /// Edges linking `ids` one after the other.
    fn chain(ids: &[&str]) -> Value {
        let edges: Vec<Value> = ids
            .windows(2)
            .enumerate()
            .map(|(i, w)| json!({"id": format!("{}-{}", ids[0], i), "source": w[0], "target": w[1]}))
            .collect();
        Value::Array(edges)
    }

    fn send(
        id: &str,
        text: &str,
    ) -> Value {
        json!({"id": id, "type": "send-message", "data": {"messages": [{"text": text}]}})
    }

    fn session(
        h: &Harness,
        id: &str,
    ) -> Session {
        h.store.sessions().find(id).unwrap().unwrap()
    }

    fn only_job(
        h: &Harness,
        session_id: &str,
    ) -> Job {
        let mut jobs = h.store.pending_jobs(session_id).unwrap();
        assert_eq!(jobs.len(), 1);
        jobs.remove(0)
    }

    #[tokio::test]
    async fn test_start_runs_to_completion() {
        let h = Harness::new();
        deploy(&h, "f1", json!([{"id": "t", "type": "trigger"}, send("m", "hello")]), chain(&["t", "m"]));
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(h.gateway.texts(), vec!["hello".to_string()]);

        let s = session(&h, &id);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.current_node_id.as_deref(), Some("m"));
        assert!(s.end_time > 0);
    }

    #[tokio::test]
    async fn test_unpublished_flow_is_not_started() {
        let h = Harness::new();
        let model: FlowModel = serde_json::from_value(json!({
            "id": "f1",
            "workspaceId": "w1",
            "name": "draft",
            "nodes": [{"id": "t", "type": "trigger"}, send("m", "hello")],
            "edges": chain(&["t", "m"]),
        }))
        .unwrap();
        h.store.deploy(&model).unwrap();
        let d = Dispatcher::new(h.services.clone());

        assert!(d.start_or_resume(&h.trigger()).await.unwrap().is_none());
        assert_eq!(h.store.sessions().query(&Query::new()).unwrap().count, 0);
        assert!(h.gateway.texts().is_empty());
    }

    #[tokio::test]
    async fn test_delay_resumes_from_job_once() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "d", "type": "delay", "data": {"duration": 0, "unit": "seconds"}},
                send("m", "later"),
            ]),
            chain(&["t", "d", "m"]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        let parked = session(&h, &id);
        assert!(parked.is_active());
        assert!(parked.waiting_until.is_some());
        assert!(h.gateway.texts().is_empty());

        let job = only_job(&h, &id);
        assert_eq!(d.run_job(&job).await.unwrap(), JobStatus::Done);
        assert_eq!(h.gateway.texts(), vec!["later".to_string()]);
        assert_eq!(session(&h, &id).status, SessionStatus::Completed);

        // a duplicate delivery of the same job finds the session gone
        assert_eq!(d.run_job(&job).await.unwrap(), JobStatus::Skipped);
        assert_eq!(h.gateway.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_condition_takes_false_branch() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "c", "type": "condition", "data": {"rules": [{"field": "variable:plan", "operator": "equals", "value": "pro"}]}},
                send("yes", "pro"),
                send("no", "free"),
            ]),
            json!([
                {"id": "e1", "source": "t", "target": "c"},
                {"id": "e2", "source": "c", "target": "yes", "sourceHandle": "true"},
                {"id": "e3", "source": "c", "target": "no", "sourceHandle": "false"},
            ]),
        );
        let d = Dispatcher::new(h.services.clone());
        let mut trigger = h.trigger();
        trigger.variables.set("plan", "free");

        d.start_or_resume(&trigger).await.unwrap().unwrap();
        assert_eq!(h.gateway.texts(), vec!["free".to_string()]);
    }

    #[tokio::test]
    async fn test_numeric_reply_maps_to_payload() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "m", "type": "send-message", "data": {"messages": [{
                    "text": "Pick",
                    "quickReplies": [{"title": "Yes", "payload": "YES"}, {"title": "No", "payload": "NO"}]
                }]}},
                {"id": "w", "type": "smart-delay", "data": {"variable": "answer"}},
                {"id": "c", "type": "condition", "data": {"rules": [{"field": "variable:last_payload", "operator": "equals", "value": "NO"}]}},
                send("bye", "bye {{answer}}"),
            ]),
            json!([
                {"id": "e1", "source": "t", "target": "m"},
                {"id": "e2", "source": "m", "target": "w"},
                {"id": "e3", "source": "w", "target": "c"},
                {"id": "e4", "source": "c", "target": "bye", "sourceHandle": "true"},
            ]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert!(session(&h, &id).waiting_for_input);
        assert!(session(&h, &id).variables.contains(QUICK_REPLIES_VAR));

        let mut reply = h.trigger();
        reply.incoming = Some(Inbound::text("2"));
        assert_eq!(d.start_or_resume(&reply).await.unwrap(), Some(id.clone()));

        assert_eq!(h.gateway.texts(), vec!["Pick\n\n1. Yes\n2. No".to_string(), "bye 2".to_string()]);
        let s = session(&h, &id);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.variables.get(LAST_PAYLOAD_VAR), Some("NO"));
        assert!(!s.variables.contains(QUICK_REPLIES_VAR));
    }

    fn smart_delay_flow(h: &Harness) {
        deploy(
            h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "w", "type": "smart-delay", "data": {"timeout": {"duration": 0, "unit": "seconds"}}},
                send("ok", "answered"),
                send("late", "too late"),
            ]),
            json!([
                {"id": "e1", "source": "t", "target": "w"},
                {"id": "e2", "source": "w", "target": "ok"},
                {"id": "e3", "source": "w", "target": "late", "sourceHandle": "timeout"},
            ]),
        );
    }

    #[tokio::test]
    async fn test_smart_delay_timeout_takes_timeout_edge() {
        let h = Harness::new();
        smart_delay_flow(&h);
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        let job = only_job(&h, &id);
        assert_eq!(job.payload.reason, WakeReason::Timeout);

        assert_eq!(d.run_job(&job).await.unwrap(), JobStatus::Done);
        assert_eq!(h.gateway.texts(), vec!["too late".to_string()]);
        assert_eq!(session(&h, &id).status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_reply_cancels_timeout_job() {
        let h = Harness::new();
        smart_delay_flow(&h);
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        let job = only_job(&h, &id);

        let mut reply = h.trigger();
        reply.incoming = Some(Inbound::text("hi"));
        d.start_or_resume(&reply).await.unwrap();
        assert_eq!(h.gateway.texts(), vec!["answered".to_string()]);
        assert_eq!(h.store.jobs().find(&job.id).unwrap().unwrap().status, JobStatus::Cancelled);

        assert_eq!(d.run_job(&job).await.unwrap(), JobStatus::Skipped);
        assert_eq!(h.gateway.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_reply_never_follows_timeout_edge() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "w", "type": "smart-delay", "data": {"timeout": {"duration": 1, "unit": "hours"}}},
                send("late", "too late"),
            ]),
            json!([
                {"id": "e1", "source": "t", "target": "w"},
                {"id": "e2", "source": "w", "target": "late", "sourceHandle": "timeout"},
            ]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        let mut reply = h.trigger();
        reply.incoming = Some(Inbound::text("hi, I am here"));
        d.start_or_resume(&reply).await.unwrap();

        assert!(h.gateway.texts().is_empty());
        assert_eq!(session(&h, &id).status, SessionStatus::Completed);
    }

    fn go_to_flows(
        h: &Harness,
        return_after: bool,
    ) {
        deploy(
            h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                send("a", "a"),
                {"id": "g", "type": "go-to-flow", "data": {"flowId": "f2", "returnAfter": return_after}},
                send("c", "c"),
            ]),
            chain(&["t", "a", "g", "c"]),
        );
        deploy(h, "f2", json!([{"id": "t2", "type": "trigger"}, send("b", "b")]), chain(&["t2", "b"]));
    }

    #[tokio::test]
    async fn test_go_to_flow_returns_to_caller() {
        let h = Harness::new();
        go_to_flows(&h, true);
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(h.gateway.texts(), vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        let s = session(&h, &id);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.flow_id, "f1");
        assert!(s.call_stack.is_empty());
        assert_eq!(h.store.sessions().query(&Query::new()).unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_go_to_flow_without_return_starts_new_session() {
        let h = Harness::new();
        go_to_flows(&h, false);
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(h.gateway.texts(), vec!["a".to_string(), "b".to_string()]);

        let sessions = h.store.sessions().query(&Query::new()).unwrap().rows;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.status == SessionStatus::Completed));
        let next = sessions.iter().find(|s| s.id != id).unwrap();
        assert_eq!(next.flow_id, "f2");
    }

    #[tokio::test]
    async fn test_human_takeover_blocks_automation() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([{"id": "t", "type": "trigger"}, {"id": "h", "type": "human-takeover"}, send("m", "never")]),
            chain(&["t", "h", "m"]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        let s = session(&h, &id);
        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.human_takeover_at.is_some());
        assert!(h.store.conversations().find("conv1").unwrap().unwrap().automation_paused);

        assert!(d.start_or_resume(&h.trigger()).await.unwrap().is_none());
        assert!(h.gateway.texts().is_empty());

        let mut conversation = h.store.conversations().find("conv1").unwrap().unwrap();
        conversation.automation_paused = false;
        h.store.conversations().update(&conversation).unwrap();
        let again = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_ne!(again, id);
    }

    #[tokio::test]
    async fn test_runaway_loop_is_cancelled() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "a", "type": "add-tag", "data": {"tag": "x"}},
                {"id": "b", "type": "remove-tag", "data": {"tag": "x"}},
            ]),
            json!([
                {"id": "e1", "source": "t", "target": "a"},
                {"id": "e2", "source": "a", "target": "b"},
                {"id": "e3", "source": "b", "target": "a"},
            ]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(session(&h, &id).status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_session_cancels_jobs() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([{"id": "t", "type": "trigger"}, {"id": "d", "type": "delay", "data": {"duration": 1, "unit": "hours"}}]),
            chain(&["t", "d"]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        let job = only_job(&h, &id);

        assert!(d.cancel_session(&id, "test").await.unwrap());
        assert_eq!(session(&h, &id).status, SessionStatus::Cancelled);
        assert!(h.store.pending_jobs(&id).unwrap().is_empty());
        assert_eq!(d.run_job(&job).await.unwrap(), JobStatus::Skipped);
        assert!(!d.cancel_session(&id, "test").await.unwrap());
        assert!(!d.cancel_session("missing", "test").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_idle_waiting_sessions() {
        let h = Harness::new();
        smart_delay_flow(&h);
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(d.expire_idle(utils::time::time_millis() - 60_000, 10).await.unwrap(), 0);
        assert_eq!(d.expire_idle(utils::time::time_millis() + 1_000, 10).await.unwrap(), 1);

        let s = session(&h, &id);
        assert_eq!(s.status, SessionStatus::Expired);
        assert!(!s.waiting_for_input);
        assert!(h.store.pending_jobs(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_waiting_session_supersedes_old() {
        let h = Harness::new();
        smart_delay_flow(&h);
        let now = utils::time::time_millis();
        h.store
            .sessions()
            .create(&Session {
                id: "old".into(),
                workspace_id: "w1".into(),
                contact_id: "c1".into(),
                flow_id: "f1".into(),
                channel_id: "ch1".into(),
                current_node_id: Some("w".into()),
                waiting_for_input: true,
                start_time: now,
                update_time: now,
                ..Default::default()
            })
            .unwrap();
        let d = Dispatcher::new(h.services.clone());

        let id = d.start(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(session(&h, "old").status, SessionStatus::Cancelled);
        assert_eq!(h.store.find_waiting_session("c1", "ch1").unwrap().map(|s| s.id), Some(id));
    }

    #[tokio::test]
    async fn test_explicit_resume_applies_reply() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "w", "type": "smart-delay", "data": {"variable": "city"}},
                send("m", "see you in {{city}}"),
            ]),
            chain(&["t", "w", "m"]),
        );
        let d = Dispatcher::new(h.services.clone());

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(d.resume_session(&id, Some(Inbound::text("Oslo"))).await.unwrap(), Some(id.clone()));
        assert_eq!(h.gateway.texts(), vec!["see you in Oslo".to_string()]);
        assert!(d.resume_session("missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_follow_up_scenario() {
        let h = Harness::new();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                send("hi", "Hi"),
                {"id": "d", "type": "delay", "data": {"duration": 5, "unit": "minutes"}},
                send("follow", "Following up"),
            ]),
            chain(&["t", "hi", "d", "follow"]),
        );
        let d = Dispatcher::new(h.services.clone());
        let before = utils::time::time_millis();

        let id = d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(h.store.sessions().query(&Query::new()).unwrap().count, 1);
        assert_eq!(h.gateway.texts(), vec!["Hi".to_string()]);
        let job = only_job(&h, &id);
        assert!(job.run_at >= before + 300_000 && job.run_at <= utils::time::time_millis() + 300_000);
        assert!(session(&h, &id).is_active());

        assert_eq!(d.run_job(&job).await.unwrap(), JobStatus::Done);
        assert_eq!(h.gateway.texts(), vec!["Hi".to_string(), "Following up".to_string()]);
        assert_eq!(session(&h, &id).status, SessionStatus::Completed);
        let completed = h.store.analytics().query(&Query::new().eq("event_type", "flow_completed")).unwrap();
        assert_eq!(completed.count, 1);
    }

    #[tokio::test]
    async fn test_unsubscribed_contact_follows_false_edge() {
        let h = Harness::new();
        let mut contact = h.store.contacts().find("c1").unwrap().unwrap();
        contact.is_subscribed = false;
        h.store.contacts().update(&contact).unwrap();
        deploy(
            &h,
            "f1",
            json!([
                {"id": "t", "type": "trigger"},
                {"id": "c", "type": "condition", "data": {"rules": [{"field": "is_subscribed", "operator": "equals", "value": true}]}},
                send("yes", "subscriber"),
                send("no", "visitor"),
            ]),
            json!([
                {"id": "e1", "source": "t", "target": "c"},
                {"id": "e2", "source": "c", "target": "yes", "sourceHandle": "true"},
                {"id": "e3", "source": "c", "target": "no", "sourceHandle": "false"},
            ]),
        );
        let d = Dispatcher::new(h.services.clone());

        d.start_or_resume(&h.trigger()).await.unwrap().unwrap();
        assert_eq!(h.gateway.texts(), vec!["visitor".to_string()]);
    }
}
